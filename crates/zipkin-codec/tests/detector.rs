use assert_matches::assert_matches;

use zipkin_codec::codec::{decoder_for_list_message, decoder_for_message};
use zipkin_codec::{BytesDecoder, BytesEncoder, CodecError, SpanBytesDecoder, SpanBytesEncoder};

use crate::common::{client_span, formats, init_logger, shared_server_span};

mod common;

#[test]
fn test_list_messages() {
    init_logger();
    let spans = [client_span(), shared_server_span()];
    for (encoder, decoder) in formats() {
        let bytes = encoder.encode_list(&spans);
        let detected = decoder_for_list_message(&bytes).unwrap();
        assert_eq!(detected, decoder, "{encoder:?}");
        assert_eq!(detected.decode_list(&bytes).unwrap(), spans);
    }
}

#[test]
fn test_single_messages() {
    for (encoder, decoder) in [
        (SpanBytesEncoder::JsonV1, SpanBytesDecoder::JsonV1),
        (SpanBytesEncoder::Thrift, SpanBytesDecoder::Thrift),
    ] {
        let bytes = encoder.encode(&client_span());
        assert_eq!(decoder_for_message(&bytes).unwrap(), decoder);
    }
}

#[test]
fn test_single_message_unsupported() {
    for encoder in [SpanBytesEncoder::JsonV2, SpanBytesEncoder::Proto3] {
        let bytes = encoder.encode(&client_span());
        assert_matches!(decoder_for_message(&bytes), Err(CodecError::Unsupported(_)));
    }
}

#[test]
fn test_framing_mismatch() {
    for encoder in [SpanBytesEncoder::JsonV1, SpanBytesEncoder::Thrift] {
        let single = encoder.encode(&client_span());
        assert_matches!(
            decoder_for_list_message(&single),
            Err(CodecError::InvalidArgument(_))
        );

        let list = encoder.encode_list(&[client_span()]);
        assert_matches!(decoder_for_message(&list), Err(CodecError::InvalidArgument(_)));
    }

    let list = SpanBytesEncoder::JsonV2.encode_list(&[client_span()]);
    assert_matches!(decoder_for_message(&list), Err(CodecError::InvalidArgument(_)));
}

#[test]
fn test_legacy_thrift_list_element_type() {
    let mut bytes = SpanBytesEncoder::Thrift.encode_list(&[client_span()]);
    assert_eq!(bytes[0], 12);
    bytes[0] = 11;

    let decoder = decoder_for_list_message(&bytes).unwrap();
    assert_eq!(decoder, SpanBytesDecoder::Thrift);
    assert_eq!(decoder.decode_list(&bytes).unwrap(), vec![client_span()]);
}

#[test]
fn test_other_list_element_types_are_malformed() {
    let mut bytes = SpanBytesEncoder::Thrift.encode_list(&[client_span()]);
    bytes[0] = 13;
    let err = SpanBytesDecoder::Thrift.decode_list(&bytes).unwrap_err();
    assert!(err.is_malformed(), "{err}");
}

#[test]
fn test_unrecognized_leading_byte() {
    let err = decoder_for_list_message(b"GET / HTTP/1.1").unwrap_err();
    assert!(err.is_malformed());
    assert_eq!(err.to_string(), "Could not detect the span format");
}

#[test]
fn test_proto3_list_as_single_message() {
    let bytes = SpanBytesEncoder::Proto3.encode_list(&[client_span(), shared_server_span()]);
    assert_matches!(decoder_for_message(&bytes), Err(CodecError::Unsupported(_)));
}

#[test]
fn test_proto3_single_span_as_list() {
    let bytes = SpanBytesEncoder::Proto3.encode(&client_span());
    let decoder = decoder_for_list_message(&bytes).unwrap();
    assert_eq!(decoder, SpanBytesDecoder::Proto3);
    assert_eq!(decoder.decode_list(&bytes).unwrap(), vec![client_span()]);
}

#[test]
fn test_empty_message() {
    for err in [
        decoder_for_message(b"").unwrap_err(),
        decoder_for_list_message(b"").unwrap_err(),
    ] {
        assert!(err.is_malformed(), "{err}");
        assert_eq!(err.to_string(), "Empty message");
    }
}

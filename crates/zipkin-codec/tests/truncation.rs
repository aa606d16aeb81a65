use assert_matches::assert_matches;
use proptest::prelude::*;

use zipkin_codec::{BytesDecoder, BytesEncoder, CodecError, SpanBytesDecoder, SpanBytesEncoder};

use crate::common::{all_spans, client_span};

mod common;

fn assert_truncated(result: Result<Vec<zipkin_codec::Span>, CodecError>) {
    assert_matches!(
        result,
        Err(CodecError::Truncated { length, available, context: Some(_) })
            if length > available as u64
    );
}

proptest! {
    #[test]
    fn test_truncated_proto3(index in 0..all_spans().len(), cut in any::<prop::sample::Index>()) {
        let bytes = SpanBytesEncoder::Proto3.encode_list(&[all_spans()[index].clone()]);
        let cut = 1 + cut.index(bytes.len() - 1);
        assert_truncated(SpanBytesDecoder::Proto3.decode_list(&bytes[..cut]));
    }

    #[test]
    fn test_truncated_thrift_list(index in 0..all_spans().len(), cut in any::<prop::sample::Index>()) {
        let bytes = SpanBytesEncoder::Thrift.encode_list(&[all_spans()[index].clone()]);
        let cut = 1 + cut.index(bytes.len() - 1);
        assert_truncated(SpanBytesDecoder::Thrift.decode_list(&bytes[..cut]));
    }

    #[test]
    fn test_truncated_thrift_span(cut in any::<prop::sample::Index>()) {
        let bytes = SpanBytesEncoder::Thrift.encode(&client_span());
        let cut = 1 + cut.index(bytes.len() - 1);
        let mut out = Vec::new();
        let err = SpanBytesDecoder::Thrift.decode(&bytes[..cut], &mut out).unwrap_err();
        prop_assert!(err.is_truncated(), "{}", err);
    }
}

#[test]
fn test_declared_length_message() {
    // A span message declaring 66 bytes with only 8 following.
    let mut bytes = vec![0x0a, 66];
    bytes.extend_from_slice(&[0; 8]);
    let err = SpanBytesDecoder::Proto3.decode_list(&bytes).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Truncated: length 66 > bytes available 8 reading List<Span> from proto3"
    );
}

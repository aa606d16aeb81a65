//! Wire codecs for Zipkin spans.
//!
//! Spans use the V2 model ([`Span`]) and can be encoded as, or decoded from:
//!
//! | Format   | Encoder / decoder  | Notes                                        |
//! |----------|--------------------|----------------------------------------------|
//! | JSON V2  | `JsonV2`           | The native schema.                           |
//! | JSON V1  | `JsonV1`           | Legacy schema, converted through [`v1`].     |
//! | Thrift   | `Thrift`           | Legacy TBinaryProtocol, converted via [`v1`].|
//! | Proto3   | `Proto3`           | `zipkin.proto3.ListOfSpans`.                 |
//!
//! Every writer computes its exact size before writing, so encoding allocates
//! once. Decoding never panics on hostile input: declared lengths are checked
//! against the bytes remaining, and failures surface as [`CodecError`] naming
//! what was being read.
//!
//! # Usage
//!
//! ```
//! use zipkin_codec::{BytesDecoder, BytesEncoder, Span, SpanBytesDecoder, SpanBytesEncoder};
//!
//! let span = Span::builder()
//!     .trace_id("7180c278b62e8f6a216a2aea45d08fc9")
//!     .id("5b4185666d50f68b")
//!     .name("get")
//!     .build()?;
//!
//! let bytes = SpanBytesEncoder::Proto3.encode_list(&[span.clone()]);
//! let decoder = zipkin_codec::codec::decoder_for_list_message(&bytes)?;
//! assert_eq!(decoder, SpanBytesDecoder::Proto3);
//! assert_eq!(decoder.decode_list(&bytes)?, vec![span]);
//! # Ok::<(), zipkin_codec::CodecError>(())
//! ```

pub mod buffer;
pub mod codec;
mod error;
pub mod json;
pub mod model;
pub mod proto3;
pub mod thrift;
pub mod v1;

pub use codec::{
    BytesDecoder, BytesEncoder, DependencyLinkBytesDecoder, DependencyLinkBytesEncoder, Encoding,
    SpanBytesDecoder, SpanBytesEncoder,
};
pub use error::{CodecError, ReadContext};
pub use model::{
    Annotation, Dependencies, DependencyLink, Endpoint, EndpointBuilder, Kind, Span, SpanBuilder,
};

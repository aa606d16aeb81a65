#![allow(dead_code)]

use zipkin_codec::{Endpoint, Kind, Span, SpanBytesDecoder, SpanBytesEncoder};

pub const TODAY: u64 = 1_472_470_996_199_000;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn formats() -> [(SpanBytesEncoder, SpanBytesDecoder); 4] {
    [
        (SpanBytesEncoder::JsonV1, SpanBytesDecoder::JsonV1),
        (SpanBytesEncoder::JsonV2, SpanBytesDecoder::JsonV2),
        (SpanBytesEncoder::Thrift, SpanBytesDecoder::Thrift),
        (SpanBytesEncoder::Proto3, SpanBytesDecoder::Proto3),
    ]
}

pub fn frontend() -> Endpoint {
    Endpoint::builder()
        .service_name("frontend")
        .ip("172.17.0.13")
        .build()
        .unwrap()
}

pub fn backend() -> Endpoint {
    Endpoint::builder()
        .service_name("backend")
        .ip("192.168.99.101")
        .port(9000)
        .build()
        .unwrap()
}

/// A client span with every field a legacy format can carry.
pub fn client_span() -> Span {
    Span::builder()
        .trace_id("7180c278b62e8f6a216a2aea45d08fc9")
        .parent_id("6b221d5bc9e6496c")
        .id("5b4185666d50f68b")
        .name("get")
        .kind(Kind::Client)
        .local_endpoint(frontend())
        .remote_endpoint(backend())
        .timestamp(TODAY)
        .duration(207_000)
        .add_annotation(TODAY + 4_000, "ws")
        .add_annotation(TODAY + 202_000, "wr")
        .put_tag("http.path", "/api")
        .put_tag("clnt/finagle.version", "6.45.0")
        .debug(true)
        .build()
        .unwrap()
}

/// The server side of `client_span`, sharing its span ID.
pub fn shared_server_span() -> Span {
    Span::builder()
        .trace_id("7180c278b62e8f6a216a2aea45d08fc9")
        .parent_id("6b221d5bc9e6496c")
        .id("5b4185666d50f68b")
        .name("get")
        .kind(Kind::Server)
        .shared(true)
        .local_endpoint(backend())
        .remote_endpoint(frontend())
        .timestamp(TODAY + 100_000)
        .duration(87_000)
        .put_tag("http.method", "GET")
        .build()
        .unwrap()
}

/// Only the required identifiers.
pub fn minimal_span() -> Span {
    Span::builder().trace_id("1").id("2").build().unwrap()
}

pub fn local_span_128() -> Span {
    Span::builder()
        .trace_id("463ac35c9f6413ad48485a3953bb6124")
        .id("48485a3953bb6124")
        .name("encode")
        .local_endpoint(backend())
        .timestamp(TODAY)
        .duration(15)
        .build()
        .unwrap()
}

pub fn local_span_64() -> Span {
    Span::builder()
        .trace_id("48485a3953bb6124")
        .id("48485a3953bb6124")
        .name("decode")
        .local_endpoint(frontend())
        .timestamp(TODAY)
        .duration(15)
        .build()
        .unwrap()
}

/// Strings a codec has to escape or encode as multi-byte UTF-8.
pub fn utf8_span() -> Span {
    Span::builder()
        .trace_id("1")
        .id("1")
        .name("サービス \"quoted\"")
        .local_endpoint(
            Endpoint::builder()
                .service_name("ξ-service")
                .ip("2001:db8::c001")
                .port(443)
                .build()
                .unwrap(),
        )
        .timestamp(TODAY)
        .add_annotation(TODAY + 1, "snowman ☃\u{2028}")
        .put_tag("error", "tab\tnewline\nbackslash\\ 💩")
        .build()
        .unwrap()
}

pub fn all_spans() -> Vec<Span> {
    vec![
        client_span(),
        shared_server_span(),
        minimal_span(),
        local_span_128(),
        local_span_64(),
        utf8_span(),
    ]
}

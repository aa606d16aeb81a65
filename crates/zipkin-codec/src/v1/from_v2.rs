use super::*;
use crate::model::{Kind, Span};

/// Core annotation values for each kind: begin, end and the remote address key.
fn core_annotations(kind: Kind, has_duration: bool) -> (&'static str, Option<&'static str>, &'static str) {
    match kind {
        Kind::Client => (CLIENT_SEND, Some(CLIENT_RECV), SERVER_ADDR),
        Kind::Server => (SERVER_RECV, Some(SERVER_SEND), CLIENT_ADDR),
        Kind::Producer => (MESSAGE_SEND, Some(WIRE_SEND), MESSAGE_ADDR),
        // Without a duration the only meaningful point is when the message was received.
        Kind::Consumer if has_duration => (WIRE_RECV, Some(MESSAGE_RECV), MESSAGE_ADDR),
        Kind::Consumer => (MESSAGE_RECV, None, MESSAGE_ADDR),
    }
}

impl From<&Span> for V1Span {
    fn from(span: &Span) -> Self {
        let mut v1 = V1Span {
            trace_id_high: span.trace_id_high(),
            trace_id: span.trace_id_low(),
            id: span.id_u64(),
            parent_id: span.parent_id_u64(),
            name: span.name().unwrap_or_default().to_string(),
            debug: span.debug(),
            ..Default::default()
        };

        // A shared span's timing belongs to the side that started it.
        if !span.shared() {
            v1.timestamp = span.timestamp().unwrap_or(0);
            v1.duration = span.duration().unwrap_or(0);
        }

        let local = span.local_endpoint().cloned();
        let core = span.kind().map(|kind| core_annotations(kind, span.duration().is_some()));

        let mut end = None;
        if let (Some((begin_value, end_value, _)), Some(timestamp)) = (core, span.timestamp()) {
            v1.annotations.push(V1Annotation::new(timestamp, begin_value, local.clone()));
            if let (Some(end_value), Some(duration)) = (end_value, span.duration()) {
                end = Some(V1Annotation::new(
                    timestamp.saturating_add(duration),
                    end_value,
                    local.clone(),
                ));
            }
        }
        for annotation in span.annotations() {
            v1.annotations.push(V1Annotation::new(
                annotation.timestamp(),
                annotation.value(),
                local.clone(),
            ));
        }
        v1.annotations.extend(end);

        for (key, value) in span.tags() {
            v1.binary_annotations
                .push(V1BinaryAnnotation::string(key, value, local.clone()));
        }

        if v1.annotations.is_empty() && v1.binary_annotations.is_empty() && local.is_some() {
            v1.binary_annotations
                .push(V1BinaryAnnotation::string(LOCAL_COMPONENT, "", local));
        }

        if let Some((_, _, address_key)) = core {
            v1.binary_annotations.extend(V1BinaryAnnotation::address(
                address_key,
                span.remote_endpoint().cloned(),
            ));
        }
        v1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Endpoint;

    fn frontend() -> Endpoint {
        Endpoint::builder()
            .service_name("frontend")
            .ip("172.17.0.13")
            .build()
            .unwrap()
    }

    fn backend() -> Endpoint {
        Endpoint::builder()
            .service_name("backend")
            .ip("192.168.99.101")
            .port(9000)
            .build()
            .unwrap()
    }

    fn base() -> crate::model::SpanBuilder {
        Span::builder().trace_id("1").id("2").name("get")
    }

    #[test]
    fn test_client_span() {
        let span = base()
            .kind(Kind::Client)
            .timestamp(10)
            .duration(5)
            .local_endpoint(frontend())
            .remote_endpoint(backend())
            .add_annotation(12, "foo")
            .put_tag("http.path", "/api")
            .build()
            .unwrap();
        let v1 = V1Span::from(&span);

        assert_eq!((v1.timestamp, v1.duration), (10, 5));
        let values: Vec<_> = v1
            .annotations
            .iter()
            .map(|a| (a.timestamp, a.value.as_str()))
            .collect();
        assert_eq!(values, [(10, "cs"), (12, "foo"), (15, "cr")]);
        assert!(v1.annotations.iter().all(|a| a.endpoint == Some(frontend())));

        assert_eq!(
            v1.binary_annotations,
            [
                V1BinaryAnnotation::string("http.path", "/api", Some(frontend())),
                V1BinaryAnnotation::bool(SERVER_ADDR, true, Some(backend())),
            ]
        );
    }

    #[test]
    fn test_shared_server_omits_span_timing() {
        let span = base()
            .kind(Kind::Server)
            .shared(true)
            .timestamp(10)
            .duration(5)
            .local_endpoint(backend())
            .build()
            .unwrap();
        let v1 = V1Span::from(&span);

        assert_eq!((v1.timestamp, v1.duration), (0, 0));
        let values: Vec<_> = v1.annotations.iter().map(|a| a.value.as_str()).collect();
        assert_eq!(values, ["sr", "ss"]);
    }

    #[test]
    fn test_no_duration_writes_only_begin() {
        let span = base()
            .kind(Kind::Consumer)
            .timestamp(10)
            .local_endpoint(backend())
            .build()
            .unwrap();
        let v1 = V1Span::from(&span);
        let values: Vec<_> = v1.annotations.iter().map(|a| a.value.as_str()).collect();
        assert_eq!(values, ["mr"]);
    }

    #[test]
    fn test_consumer_with_duration_uses_wire_receive() {
        let span = base()
            .kind(Kind::Consumer)
            .timestamp(10)
            .duration(2)
            .build()
            .unwrap();
        let v1 = V1Span::from(&span);
        let values: Vec<_> = v1
            .annotations
            .iter()
            .map(|a| (a.timestamp, a.value.as_str()))
            .collect();
        assert_eq!(values, [(10, "wr"), (12, "mr")]);
    }

    #[test]
    fn test_local_span_gets_local_component() {
        let span = base()
            .timestamp(10)
            .duration(5)
            .local_endpoint(frontend())
            .build()
            .unwrap();
        let v1 = V1Span::from(&span);
        assert!(v1.annotations.is_empty());
        assert_eq!(
            v1.binary_annotations,
            [V1BinaryAnnotation::string(LOCAL_COMPONENT, "", Some(frontend()))]
        );
    }

    #[test]
    fn test_remote_without_kind_is_dropped() {
        let span = base().remote_endpoint(backend()).build().unwrap();
        let v1 = V1Span::from(&span);
        assert!(v1.binary_annotations.is_empty());
    }

    #[test]
    fn test_ids() {
        let span = Span::builder()
            .trace_id("48485a3953bb61246b221d5bc9e6496c")
            .parent_id("1")
            .id("2")
            .build()
            .unwrap();
        let v1 = V1Span::from(&span);
        assert_eq!(v1.trace_id_high, 0x48485a3953bb6124);
        assert_eq!(v1.trace_id, 0x6b221d5bc9e6496c);
        assert_eq!((v1.parent_id, v1.id), (1, 2));
        assert_eq!(v1.name, "");
    }
}

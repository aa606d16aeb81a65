use super::*;
use crate::error::CodecError;
use crate::model::{Annotation, Kind, Span, SpanBuilder};

/// Splits a legacy span into one span per participating service.
///
/// Core annotations decide each side's kind and timing; address annotations
/// become remote endpoints; string binary annotations become tags.
pub fn convert(source: &V1Span) -> Result<Vec<Span>, CodecError> {
    let mut converter = Converter::new(source);
    converter.process_annotations();
    converter.process_binary_annotations();
    converter.spans.into_iter().map(SpanBuilder::build).collect()
}

struct Converter<'a> {
    source: &'a V1Span,
    spans: Vec<SpanBuilder>,
    cs: Option<&'a V1Annotation>,
    cr: Option<&'a V1Annotation>,
    sr: Option<&'a V1Annotation>,
    ss: Option<&'a V1Annotation>,
    ms: Option<&'a V1Annotation>,
    mr: Option<&'a V1Annotation>,
    ws: Option<&'a V1Annotation>,
    wr: Option<&'a V1Annotation>,
    client: Option<usize>,
    server: Option<usize>,
    messaging: Option<usize>,
}

fn same_service(left: Option<&Endpoint>, right: Option<&Endpoint>) -> bool {
    left.and_then(Endpoint::service_name) == right.and_then(Endpoint::service_name)
}

fn core_kind(value: &str) -> Option<Kind> {
    match value {
        CLIENT_SEND | CLIENT_RECV => Some(Kind::Client),
        SERVER_SEND | SERVER_RECV => Some(Kind::Server),
        MESSAGE_SEND => Some(Kind::Producer),
        MESSAGE_RECV => Some(Kind::Consumer),
        _ => None,
    }
}

fn elapsed(begin: &V1Annotation, end: Option<&V1Annotation>) -> Option<u64> {
    end.map(|end| end.timestamp.saturating_sub(begin.timestamp))
        .filter(|d| *d != 0)
}

impl<'a> Converter<'a> {
    fn new(source: &'a V1Span) -> Self {
        let mut first = Self::new_builder(source, None);
        if source.timestamp != 0 {
            first.timestamp = Some(source.timestamp);
            first.duration = Some(source.duration).filter(|d| *d != 0);
        }
        Self {
            source,
            spans: vec![first],
            cs: None,
            cr: None,
            sr: None,
            ss: None,
            ms: None,
            mr: None,
            ws: None,
            wr: None,
            client: None,
            server: None,
            messaging: None,
        }
    }

    fn new_builder(source: &V1Span, local: Option<&Endpoint>) -> SpanBuilder {
        SpanBuilder {
            trace_id: Some(source.trace_id_hex()),
            parent_id: (source.parent_id != 0).then(|| format!("{:016x}", source.parent_id)),
            id: Some(format!("{:016x}", source.id)),
            name: Some(source.name.clone()).filter(|n| !n.is_empty()),
            local_endpoint: local.cloned(),
            debug: source.debug,
            ..Default::default()
        }
    }

    /// Finds the span for a service, claiming the first span if it has no
    /// endpoint yet, else starting a new one.
    fn for_endpoint(&mut self, endpoint: Option<&Endpoint>) -> usize {
        let Some(endpoint) = endpoint else {
            return 0;
        };
        let existing = self.spans.iter().position(|b| {
            b.local_endpoint.is_some() && same_service(b.local_endpoint.as_ref(), Some(endpoint))
        });
        if let Some(i) = existing {
            return i;
        }
        if self.spans[0].local_endpoint.is_none() {
            self.spans[0].local_endpoint = Some(endpoint.clone());
            return 0;
        }
        self.spans.push(Self::new_builder(self.source, Some(endpoint)));
        self.spans.len() - 1
    }

    fn core_slot(&mut self, value: &str) -> Option<&mut Option<&'a V1Annotation>> {
        match value {
            CLIENT_SEND => Some(&mut self.cs),
            CLIENT_RECV => Some(&mut self.cr),
            SERVER_RECV => Some(&mut self.sr),
            SERVER_SEND => Some(&mut self.ss),
            MESSAGE_SEND => Some(&mut self.ms),
            MESSAGE_RECV => Some(&mut self.mr),
            WIRE_SEND => Some(&mut self.ws),
            WIRE_RECV => Some(&mut self.wr),
            _ => None,
        }
    }

    fn add_annotation(&mut self, annotation: &V1Annotation) {
        let i = self.for_endpoint(annotation.endpoint.as_ref());
        self.spans[i]
            .annotations
            .push(Annotation::new(annotation.timestamp, annotation.value.clone()));
    }

    /// Prefers the span-level timing when complete, else derives it from annotations.
    fn set_timing(&mut self, i: usize, begin: &V1Annotation, end: Option<&V1Annotation>) {
        let source = self.source;
        let builder = &mut self.spans[i];
        if source.timestamp != 0 && source.duration != 0 {
            builder.timestamp = Some(source.timestamp);
            builder.duration = Some(source.duration);
        } else {
            builder.timestamp = Some(begin.timestamp).filter(|t| *t != 0);
            builder.duration = elapsed(begin, end);
        }
    }

    fn process_annotations(&mut self) {
        let source = self.source;
        for annotation in &source.annotations {
            let is_core = match self.core_slot(&annotation.value) {
                Some(slot) if slot.is_none() => {
                    *slot = Some(annotation);
                    true
                }
                _ => false,
            };
            if !is_core {
                self.add_annotation(annotation);
                continue;
            }
            if let Some(kind) = core_kind(&annotation.value) {
                let i = self.for_endpoint(annotation.endpoint.as_ref());
                self.spans[i].kind = Some(kind);
            }
        }
        self.process_rpc();
        self.process_messaging();
    }

    fn process_rpc(&mut self) {
        if let (Some(cs), Some(sr)) = (self.cs, self.sr) {
            // Both sides of the call were reported in one span.
            let client = self.for_endpoint(cs.endpoint.as_ref());
            self.set_timing(client, cs, self.cr);
            if self.cr.is_none() && self.source.duration == 0 {
                self.spans[client].duration = None;
            }
            let server = if same_service(cs.endpoint.as_ref(), sr.endpoint.as_ref()) {
                self.spans
                    .push(Self::new_builder(self.source, sr.endpoint.as_ref()));
                self.spans.len() - 1
            } else {
                self.for_endpoint(sr.endpoint.as_ref())
            };
            self.spans[client].kind = Some(Kind::Client);
            let builder = &mut self.spans[server];
            builder.kind = Some(Kind::Server);
            builder.shared = true;
            builder.timestamp = Some(sr.timestamp).filter(|t| *t != 0);
            builder.duration = elapsed(sr, self.ss);
            self.client = Some(client);
            self.server = Some(server);
            return;
        }

        if let Some(cs) = self.cs {
            let i = self.for_endpoint(cs.endpoint.as_ref());
            self.set_timing(i, cs, self.cr);
            self.client = Some(i);
        } else if let Some(cr) = self.cr {
            self.keep_as_annotation(cr);
        }

        if let Some(sr) = self.sr {
            let i = self.for_endpoint(sr.endpoint.as_ref());
            self.set_timing(i, sr, self.ss);
            // Timing is only reported by the side that started the span.
            let source = self.source;
            if source.timestamp == 0 || (self.ss.is_some() && source.duration == 0) {
                self.spans[i].shared = true;
            }
            self.server = Some(i);
        } else if let Some(ss) = self.ss {
            self.keep_as_annotation(ss);
        }
    }

    fn process_messaging(&mut self) {
        if let (Some(ms), Some(mr)) = (self.ms, self.mr) {
            let producer = self.for_endpoint(ms.endpoint.as_ref());
            let consumer = if same_service(ms.endpoint.as_ref(), mr.endpoint.as_ref()) {
                self.spans
                    .push(Self::new_builder(self.source, mr.endpoint.as_ref()));
                self.spans.len() - 1
            } else {
                self.for_endpoint(mr.endpoint.as_ref())
            };

            let builder = &mut self.spans[producer];
            builder.kind = Some(Kind::Producer);
            builder.timestamp = Some(ms.timestamp).filter(|t| *t != 0);
            builder.duration = elapsed(ms, self.ws);

            let begin = self.wr.unwrap_or(mr);
            let builder = &mut self.spans[consumer];
            builder.kind = Some(Kind::Consumer);
            builder.timestamp = Some(begin.timestamp).filter(|t| *t != 0);
            builder.duration = self.wr.and_then(|wr| elapsed(wr, Some(mr)));
            self.messaging = Some(producer);
            return;
        }

        if let Some(ms) = self.ms {
            let i = self.for_endpoint(ms.endpoint.as_ref());
            self.set_timing(i, ms, self.ws);
            self.messaging = Some(i);
        } else if let Some(ws) = self.ws {
            self.add_annotation(ws);
        }

        if let Some(mr) = self.mr {
            let i = self.for_endpoint(mr.endpoint.as_ref());
            match self.wr {
                Some(wr) => self.set_timing(i, wr, Some(mr)),
                None => self.set_timing(i, mr, None),
            }
            self.messaging.get_or_insert(i);
        } else if let Some(wr) = self.wr {
            self.add_annotation(wr);
        }
    }

    /// An end annotation without its begin says nothing about the kind.
    fn keep_as_annotation(&mut self, annotation: &V1Annotation) {
        let i = self.for_endpoint(annotation.endpoint.as_ref());
        self.spans[i].kind = None;
        self.add_annotation(annotation);
    }

    fn process_binary_annotations(&mut self) {
        let source = self.source;
        let (mut ca, mut sa, mut ma) = (None, None, None);
        for binary in &source.binary_annotations {
            let key = binary.key.as_str();
            let is_address = matches!(key, CLIENT_ADDR | SERVER_ADDR | MESSAGE_ADDR)
                && match &binary.value {
                    BinaryValue::Bool(value) => *value,
                    BinaryValue::String(value) => value == "1",
                };
            if is_address {
                let slot = match key {
                    CLIENT_ADDR => &mut ca,
                    SERVER_ADDR => &mut sa,
                    _ => &mut ma,
                };
                if slot.is_none() {
                    *slot = binary.endpoint.as_ref();
                }
                continue;
            }
            match &binary.value {
                BinaryValue::String(value) => {
                    let i = self.for_endpoint(binary.endpoint.as_ref());
                    if key == LOCAL_COMPONENT && value.is_empty() {
                        continue;
                    }
                    self.spans[i].tags.insert(binary.key.clone(), value.clone());
                }
                BinaryValue::Bool(_) => {
                    log::trace!("ignoring boolean binary annotation {key}");
                }
            }
        }

        let no_rpc = self.cs.is_none() && self.cr.is_none() && self.sr.is_none() && self.ss.is_none();
        if no_rpc && ca.is_some() && sa.is_some() {
            // A proxy recorded both addresses without timing.
            let i = self.for_endpoint(ca);
            self.spans[i].remote_endpoint = sa.cloned();
            return;
        }

        if let Some(sa) = sa {
            match self.client {
                Some(i) => self.spans[i].remote_endpoint = Some(sa.clone()),
                None if no_rpc => {
                    self.spans[0].kind = Some(Kind::Client);
                    self.spans[0].remote_endpoint = Some(sa.clone());
                }
                None => {}
            }
        }
        if let Some(ca) = ca {
            match self.server {
                Some(i) => self.spans[i].remote_endpoint = Some(ca.clone()),
                None if no_rpc => {
                    self.spans[0].kind = Some(Kind::Server);
                    self.spans[0].remote_endpoint = Some(ca.clone());
                }
                None => {}
            }
        }
        if let Some(ma) = ma {
            let i = self.messaging.unwrap_or(0);
            self.spans[i].remote_endpoint = Some(ma.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn v1() -> V1Span {
        V1Span {
            trace_id: 1,
            id: 3,
            parent_id: 2,
            name: "get".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_client_with_server_address() {
        let source = V1Span {
            timestamp: 10,
            duration: 5,
            annotations: vec![
                V1Annotation::new(10, CLIENT_SEND, Some(frontend())),
                V1Annotation::new(12, "foo", Some(frontend())),
                V1Annotation::new(15, CLIENT_RECV, Some(frontend())),
            ],
            binary_annotations: vec![
                V1BinaryAnnotation::string("http.path", "/api", Some(frontend())),
                V1BinaryAnnotation::bool(SERVER_ADDR, true, Some(backend())),
            ],
            ..v1()
        };

        let spans = convert(&source).unwrap();
        assert_eq!(
            spans,
            [Span::builder()
                .trace_id("1")
                .parent_id("2")
                .id("3")
                .name("get")
                .kind(Kind::Client)
                .timestamp(10)
                .duration(5)
                .local_endpoint(frontend())
                .remote_endpoint(backend())
                .add_annotation(12, "foo")
                .put_tag("http.path", "/api")
                .build()
                .unwrap()]
        );
    }

    #[test]
    fn test_shared_span_splits_by_service() {
        let source = V1Span {
            timestamp: 10,
            duration: 10,
            annotations: vec![
                V1Annotation::new(10, CLIENT_SEND, Some(frontend())),
                V1Annotation::new(12, SERVER_RECV, Some(backend())),
                V1Annotation::new(18, SERVER_SEND, Some(backend())),
                V1Annotation::new(20, CLIENT_RECV, Some(frontend())),
            ],
            ..v1()
        };

        let spans = convert(&source).unwrap();
        assert_eq!(spans.len(), 2);

        let client = &spans[0];
        assert_eq!(client.kind(), Some(Kind::Client));
        assert_eq!((client.timestamp(), client.duration()), (Some(10), Some(10)));
        assert_eq!(client.local_endpoint(), Some(&frontend()));
        assert!(!client.shared());

        let server = &spans[1];
        assert_eq!(server.kind(), Some(Kind::Server));
        assert_eq!((server.timestamp(), server.duration()), (Some(12), Some(6)));
        assert_eq!(server.local_endpoint(), Some(&backend()));
        assert!(server.shared());
    }

    #[test]
    fn test_loopback_forks_server() {
        let source = V1Span {
            annotations: vec![
                V1Annotation::new(10, CLIENT_SEND, Some(frontend())),
                V1Annotation::new(12, SERVER_RECV, Some(frontend())),
            ],
            ..v1()
        };

        let spans = convert(&source).unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].kind(), Some(Kind::Client));
        assert_eq!(spans[1].kind(), Some(Kind::Server));
        assert_eq!(spans[1].local_endpoint(), Some(&frontend()));
    }

    #[test]
    fn test_server_without_span_timestamp_is_shared() {
        let source = V1Span {
            annotations: vec![
                V1Annotation::new(10, SERVER_RECV, Some(backend())),
                V1Annotation::new(15, SERVER_SEND, Some(backend())),
            ],
            ..v1()
        };
        let spans = convert(&source).unwrap();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].shared());
        assert_eq!((spans[0].timestamp(), spans[0].duration()), (Some(10), Some(5)));
    }

    #[test]
    fn test_server_with_span_timing_is_not_shared() {
        let source = V1Span {
            timestamp: 10,
            duration: 5,
            annotations: vec![
                V1Annotation::new(10, SERVER_RECV, Some(backend())),
                V1Annotation::new(15, SERVER_SEND, Some(backend())),
            ],
            ..v1()
        };
        let spans = convert(&source).unwrap();
        assert!(!spans[0].shared());
    }

    #[test]
    fn test_local_component_only_sets_endpoint() {
        let source = V1Span {
            timestamp: 10,
            duration: 5,
            binary_annotations: vec![V1BinaryAnnotation::string(
                LOCAL_COMPONENT,
                "",
                Some(frontend()),
            )],
            ..v1()
        };
        let spans = convert(&source).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].local_endpoint(), Some(&frontend()));
        assert!(spans[0].tags().is_empty());
        assert_eq!(spans[0].kind(), None);
    }

    #[test]
    fn test_server_address_alone_means_client() {
        let source = V1Span {
            binary_annotations: vec![
                V1BinaryAnnotation::string(LOCAL_COMPONENT, "", Some(frontend())),
                V1BinaryAnnotation::bool(SERVER_ADDR, true, Some(backend())),
            ],
            ..v1()
        };
        let spans = convert(&source).unwrap();
        assert_eq!(spans[0].kind(), Some(Kind::Client));
        assert_eq!(spans[0].remote_endpoint(), Some(&backend()));
        assert_eq!(spans[0].local_endpoint(), Some(&frontend()));
    }

    #[test]
    fn test_string_address_one_is_accepted() {
        let source = V1Span {
            annotations: vec![V1Annotation::new(10, SERVER_RECV, Some(backend()))],
            binary_annotations: vec![V1BinaryAnnotation::string(
                CLIENT_ADDR,
                "1",
                Some(frontend()),
            )],
            ..v1()
        };
        let spans = convert(&source).unwrap();
        assert_eq!(spans[0].remote_endpoint(), Some(&frontend()));
    }

    #[test]
    fn test_other_booleans_are_ignored() {
        let source = V1Span {
            binary_annotations: vec![V1BinaryAnnotation::bool("error", true, None)],
            ..v1()
        };
        let spans = convert(&source).unwrap();
        assert!(spans[0].tags().is_empty());
    }

    #[test]
    fn test_end_without_begin_is_an_annotation() {
        let source = V1Span {
            annotations: vec![V1Annotation::new(15, CLIENT_RECV, Some(frontend()))],
            ..v1()
        };
        let spans = convert(&source).unwrap();
        assert_eq!(spans[0].kind(), None);
        assert_eq!(spans[0].annotations(), [Annotation::new(15, "cr")]);
    }

    #[test]
    fn test_messaging_timing() {
        let source = V1Span {
            annotations: vec![
                V1Annotation::new(10, WIRE_RECV, Some(backend())),
                V1Annotation::new(12, MESSAGE_RECV, Some(backend())),
            ],
            binary_annotations: vec![V1BinaryAnnotation::bool(
                MESSAGE_ADDR,
                true,
                Some(frontend()),
            )],
            ..v1()
        };
        let spans = convert(&source).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].kind(), Some(Kind::Consumer));
        assert_eq!((spans[0].timestamp(), spans[0].duration()), (Some(10), Some(2)));
        assert_eq!(spans[0].remote_endpoint(), Some(&frontend()));
    }

    #[test]
    fn test_zero_ids_fail() {
        let source = V1Span {
            trace_id: 0,
            ..v1()
        };
        assert!(convert(&source).is_err());
    }
}

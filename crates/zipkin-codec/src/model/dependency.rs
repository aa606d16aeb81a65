use crate::error::CodecError;

/// Calls from one service to another, aggregated over a time window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyLink {
    parent: String,
    child: String,
    call_count: u64,
    error_count: u64,
}

impl DependencyLink {
    pub fn builder() -> DependencyLinkBuilder {
        DependencyLinkBuilder::default()
    }

    /// The caller's lower-case service name.
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// The callee's lower-case service name.
    pub fn child(&self) -> &str {
        &self.child
    }

    pub fn call_count(&self) -> u64 {
        self.call_count
    }

    /// How many of the calls failed.
    pub fn error_count(&self) -> u64 {
        self.error_count
    }
}

#[derive(Debug, Clone, Default)]
pub struct DependencyLinkBuilder {
    pub(crate) parent: Option<String>,
    pub(crate) child: Option<String>,
    pub(crate) call_count: u64,
    pub(crate) error_count: u64,
}

impl DependencyLinkBuilder {
    pub fn parent(mut self, parent: impl AsRef<str>) -> Self {
        self.parent = Some(parent.as_ref().to_lowercase());
        self
    }

    pub fn child(mut self, child: impl AsRef<str>) -> Self {
        self.child = Some(child.as_ref().to_lowercase());
        self
    }

    pub fn call_count(mut self, call_count: u64) -> Self {
        self.call_count = call_count;
        self
    }

    pub fn error_count(mut self, error_count: u64) -> Self {
        self.error_count = error_count;
        self
    }

    pub fn build(self) -> Result<DependencyLink, CodecError> {
        match (self.parent, self.child) {
            (Some(parent), Some(child)) => Ok(DependencyLink {
                parent,
                child,
                call_count: self.call_count,
                error_count: self.error_count,
            }),
            (None, Some(_)) => Err(CodecError::invalid_argument("Missing: parent")),
            (Some(_), None) => Err(CodecError::invalid_argument("Missing: child")),
            (None, None) => Err(CodecError::invalid_argument("Missing: parent child")),
        }
    }
}

/// Dependency links observed between `start_ts` and `end_ts`, in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependencies {
    start_ts: u64,
    end_ts: u64,
    links: Vec<DependencyLink>,
}

impl Dependencies {
    pub fn create(start_ts: u64, end_ts: u64, links: Vec<DependencyLink>) -> Self {
        Self {
            start_ts,
            end_ts,
            links,
        }
    }

    pub fn start_ts(&self) -> u64 {
        self.start_ts
    }

    pub fn end_ts(&self) -> u64 {
        self.end_ts
    }

    pub fn links(&self) -> &[DependencyLink] {
        &self.links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_names_are_lowercased() {
        let link = DependencyLink::builder()
            .parent("Web")
            .child("API")
            .call_count(3)
            .build()
            .unwrap();
        assert_eq!(link.parent(), "web");
        assert_eq!(link.child(), "api");
        assert_eq!(link.call_count(), 3);
        assert_eq!(link.error_count(), 0);
    }

    #[test]
    fn test_missing_child() {
        assert_matches!(
            DependencyLink::builder().parent("web").build(),
            Err(CodecError::InvalidArgument(msg)) if msg == "Missing: child"
        );
    }
}

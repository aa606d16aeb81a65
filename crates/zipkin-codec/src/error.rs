use std::fmt;

/// Names what was being decoded when an error surfaced, e.g. `List<Span>` from `proto3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadContext {
    pub what: &'static str,
    pub format: &'static str,
}

impl fmt::Display for ReadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " reading {} from {}", self.what, self.format)
    }
}

struct Suffix<'a>(&'a Option<ReadContext>);

impl fmt::Display for Suffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(context) => context.fmt(f),
            None => Ok(()),
        }
    }
}

/// Errors raised while building, encoding or decoding spans.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// A declared length exceeds the bytes remaining in the input.
    #[error("Truncated: length {length} > bytes available {available}{}", Suffix(.context))]
    Truncated {
        length: u64,
        available: usize,
        context: Option<ReadContext>,
    },

    /// The input is structurally invalid, independent of its length.
    #[error("{message}{}", Suffix(.context))]
    Malformed {
        message: String,
        context: Option<ReadContext>,
    },

    /// A value violates a constraint of the data model.
    #[error("{0}")]
    InvalidArgument(String),

    /// The operation is deliberately not implemented for this format.
    #[error("{0}")]
    Unsupported(String),
}

impl CodecError {
    pub(crate) fn truncated(length: u64, available: usize) -> Self {
        CodecError::Truncated {
            length,
            available,
            context: None,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        CodecError::Malformed {
            message: message.into(),
            context: None,
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        CodecError::InvalidArgument(message.into())
    }

    /// Attaches what was being read. A rejected builder value becomes
    /// `Malformed`, as it came from the input rather than the caller.
    pub(crate) fn reading(self, what: &'static str, format: &'static str) -> Self {
        let context = Some(ReadContext { what, format });
        match self {
            CodecError::Truncated {
                length,
                available,
                context: None,
            } => CodecError::Truncated {
                length,
                available,
                context,
            },
            CodecError::Malformed {
                message,
                context: None,
            } => CodecError::Malformed { message, context },
            CodecError::InvalidArgument(message) => CodecError::Malformed { message, context },
            other => other,
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, CodecError::Truncated { .. })
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, CodecError::Malformed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_message() {
        let err = CodecError::truncated(66, 8);
        assert_eq!(err.to_string(), "Truncated: length 66 > bytes available 8");

        let err = err.reading("List<Span>", "proto3");
        assert_eq!(
            err.to_string(),
            "Truncated: length 66 > bytes available 8 reading List<Span> from proto3"
        );
    }

    #[test]
    fn test_reading_keeps_first_context() {
        let err = CodecError::malformed("Malformed")
            .reading("Span", "json")
            .reading("List<Span>", "json");
        assert_eq!(err.to_string(), "Malformed reading Span from json");
    }

    #[test]
    fn test_invalid_argument_while_reading_is_malformed() {
        let err = CodecError::invalid_argument("invalid port 65536").reading("Span", "json");
        assert!(err.is_malformed());
        assert_eq!(err.to_string(), "invalid port 65536 reading Span from json");
    }

    #[test]
    fn test_unsupported_is_untouched() {
        let err = CodecError::Unsupported("nope".into()).reading("Span", "proto3");
        assert_eq!(err, CodecError::Unsupported("nope".into()));
    }
}

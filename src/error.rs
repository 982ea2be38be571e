use crate::vendor::Vendor;

/// Failures that stop the pipeline. The first one raised aborts every later stage.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("No decodable text body: {reason}")]
    EmptyBody { reason: String },
    #[error("Failed to parse subject - no matching {vendor} pattern found: {subject}")]
    UnrecognizedSubject { vendor: Vendor, subject: String },
    #[error("Failed to find {section} section in email body")]
    SectionNotFound { section: String },
    #[error("Advisory {what} is empty")]
    EmptyAdvisoryContent { what: String },
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("title already exists: {id}")]
    Duplicate { title: String, id: u64 },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Unknown record id: {0}")]
    UnknownRecord(u64),
}

impl PipelineError {
    /// Process exit status for this failure. An unrecognized subject is treated as
    /// "not handled" unless the caller asked for strict handling.
    pub fn exit_code(&self, strict: bool) -> i32 {
        match self {
            PipelineError::UnrecognizedSubject { .. } if !strict => 0,
            PipelineError::SectionNotFound { .. } => 0,
            _ => 1,
        }
    }

    /// Short reason string handed to the failure notification.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let unrecognized = PipelineError::UnrecognizedSubject {
            vendor: Vendor::Debian,
            subject: "hello".to_string(),
        };
        assert_eq!(unrecognized.exit_code(false), 0);
        assert_eq!(unrecognized.exit_code(true), 1);

        let empty = PipelineError::EmptyBody {
            reason: "no text/plain part".to_string(),
        };
        assert_eq!(empty.exit_code(false), 1);

        let section = PipelineError::SectionNotFound {
            section: "Package".to_string(),
        };
        assert_eq!(section.exit_code(true), 0);

        let sink = PipelineError::from(SinkError::UnknownRecord(7));
        assert_eq!(sink.exit_code(false), 1);
    }

    #[test]
    fn test_reason_mentions_subject() {
        let err = PipelineError::UnrecognizedSubject {
            vendor: Vendor::Mageia,
            subject: "MGASA-oops".to_string(),
        };
        assert!(err.reason().contains("MGASA-oops"));
        assert!(err.reason().contains("mageia"));
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A required field is missing or an argument is out of range
    #[error("Validation error: {0}")]
    Validation(String),

    /// Buffer shorter than the record layout requires
    #[error("Malformed {record}: expected at least {expected} bytes, got {actual} bytes")]
    Malformed {
        record: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Field bytes could not be turned into a value
    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    pub(crate) fn required(codec: &str, field: &str) -> Self {
        Self::Validation(format!("{codec}: {field} is required"))
    }

    pub(crate) fn ensure_len(record: &'static str, buf: &[u8], expected: usize) -> Result<()> {
        if buf.len() < expected {
            return Err(Self::Malformed {
                record,
                expected,
                actual: buf.len(),
            });
        }
        Ok(())
    }
}

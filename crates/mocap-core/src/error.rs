// crates/mocap-core/src/error.rs

use std::fmt;

use thiserror::Error;

/// Classification of every failure raised by the toolkit.
///
/// Kinds form a tree rooted at [`ErrorKind::Exception`]; [`Error::is`] matches a
/// kind or any of its ancestors so callers can handle failures at the level of
/// detail they need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Exception,
    LogicError,
    InvalidArgument,
    OutOfRange,
    DomainError,
    RuntimeError,
    /// Structural failure inside a pipeline node.
    ProcessObject,
    AcquisitionFileReader,
    AcquisitionFileWriter,
    /// Decode/encode failure reported by the named codec.
    Codec(&'static str),
}

impl ErrorKind {
    pub fn parent(self) -> Option<ErrorKind> {
        match self {
            ErrorKind::Exception => None,
            ErrorKind::LogicError | ErrorKind::RuntimeError => Some(ErrorKind::Exception),
            ErrorKind::InvalidArgument
            | ErrorKind::OutOfRange
            | ErrorKind::DomainError
            | ErrorKind::ProcessObject => Some(ErrorKind::LogicError),
            ErrorKind::AcquisitionFileReader | ErrorKind::AcquisitionFileWriter => {
                Some(ErrorKind::InvalidArgument)
            }
            ErrorKind::Codec(_) => Some(ErrorKind::RuntimeError),
        }
    }

    /// True when `self` is `ancestor` or derives from it.
    pub fn is_a(self, ancestor: ErrorKind) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind == ancestor {
                return true;
            }
            current = kind.parent();
        }
        false
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Exception => "Exception",
            ErrorKind::LogicError => "LogicError",
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::OutOfRange => "OutOfRange",
            ErrorKind::DomainError => "DomainError",
            ErrorKind::RuntimeError => "RuntimeError",
            ErrorKind::ProcessObject => "ProcessObject",
            ErrorKind::AcquisitionFileReader => "AcquisitionFileReader",
            ErrorKind::AcquisitionFileWriter => "AcquisitionFileWriter",
            ErrorKind::Codec(_) => "Codec",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Codec(codec) => write!(f, "{codec} codec"),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn logic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LogicError, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::OutOfRange, message)
    }

    pub fn domain(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DomainError, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RuntimeError, message)
    }

    pub fn process_object(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProcessObject, message)
    }

    pub fn reader(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AcquisitionFileReader, message)
    }

    pub fn writer(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AcquisitionFileWriter, message)
    }

    pub fn codec(codec: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Codec(codec), message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The human readable message, without the kind prefix.
    pub fn what(&self) -> &str {
        &self.message
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind.is_a(kind)
    }

    pub fn is_logic_error(&self) -> bool {
        self.is(ErrorKind::LogicError)
    }

    pub fn is_runtime_error(&self) -> bool {
        self.is(ErrorKind::RuntimeError)
    }

    pub fn is_codec_error(&self) -> bool {
        matches!(self.kind, ErrorKind::Codec(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::runtime(err.to_string()).with_source(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_their_ancestors() {
        let err = Error::reader("Filename must be specified");
        assert!(err.is(ErrorKind::AcquisitionFileReader));
        assert!(err.is(ErrorKind::InvalidArgument));
        assert!(err.is_logic_error());
        assert!(err.is(ErrorKind::Exception));
        assert!(!err.is_runtime_error());
        assert_eq!(err.what(), "Filename must be specified");
    }

    #[test]
    fn codec_errors_are_runtime_errors() {
        let err = Error::codec("C3D", "Invalid header key.");
        assert!(err.is_runtime_error());
        assert!(err.is_codec_error());
        assert!(err.is(ErrorKind::Codec("C3D")));
        assert!(!err.is(ErrorKind::Codec("TRC")));
        assert_eq!(err.to_string(), "Invalid header key.");
    }

    #[test]
    fn io_errors_keep_their_source() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated");
        let err = Error::from(io);
        assert_eq!(err.kind(), ErrorKind::RuntimeError);
        assert!(std::error::Error::source(&err).is_some());
    }
}

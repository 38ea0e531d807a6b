// crates/mocap-io/src/errors.rs

use std::io;

use thiserror::Error;

/// Failure raised by a codec while decoding or encoding a file.
///
/// Every variant names the codec it comes from; the display text is the raw
/// diagnostic so it can be surfaced as is.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("{reason}")]
    FormatMismatch {
        codec: &'static str,
        reason: String,
    },

    #[error("{message}")]
    InvalidHeader {
        codec: &'static str,
        message: String,
    },

    #[error("{message}")]
    InvalidData {
        codec: &'static str,
        message: String,
    },

    #[error("Unexpected end of file")]
    UnexpectedEof { codec: &'static str },

    #[error("{codec} I/O error: {source}")]
    Io {
        codec: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{codec} CSV error: {source}")]
    Csv {
        codec: &'static str,
        #[source]
        source: csv::Error,
    },

    /// The acquisition cannot be encoded without losing or inventing data.
    #[error("{message}")]
    Inconsistent {
        codec: &'static str,
        message: String,
    },

    #[error("{codec} files cannot be written")]
    WriteUnsupported { codec: &'static str },
}

impl CodecError {
    pub fn codec(&self) -> &'static str {
        match self {
            CodecError::FormatMismatch { codec, .. }
            | CodecError::InvalidHeader { codec, .. }
            | CodecError::InvalidData { codec, .. }
            | CodecError::UnexpectedEof { codec }
            | CodecError::Io { codec, .. }
            | CodecError::Csv { codec, .. }
            | CodecError::Inconsistent { codec, .. }
            | CodecError::WriteUnsupported { codec } => codec,
        }
    }

    /// Maps a stream error, turning a short read into [`CodecError::UnexpectedEof`].
    pub fn io(codec: &'static str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::UnexpectedEof {
            CodecError::UnexpectedEof { codec }
        } else {
            CodecError::Io { codec, source }
        }
    }

    pub fn header(codec: &'static str, message: impl Into<String>) -> Self {
        CodecError::InvalidHeader {
            codec,
            message: message.into(),
        }
    }

    pub fn data(codec: &'static str, message: impl Into<String>) -> Self {
        CodecError::InvalidData {
            codec,
            message: message.into(),
        }
    }

    pub fn inconsistent(codec: &'static str, message: impl Into<String>) -> Self {
        CodecError::Inconsistent {
            codec,
            message: message.into(),
        }
    }
}

impl From<CodecError> for mocap_core::Error {
    fn from(err: CodecError) -> Self {
        let codec = err.codec();
        let message = err.to_string();
        match err {
            CodecError::Io { source, .. } => {
                mocap_core::Error::codec(codec, message).with_source(source)
            }
            CodecError::Csv { source, .. } => {
                mocap_core::Error::codec(codec, message).with_source(source)
            }
            _ => mocap_core::Error::codec(codec, message),
        }
    }
}

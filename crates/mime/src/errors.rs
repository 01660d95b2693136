//! Errors raised while locating or splicing a MIME/XOP envelope.

#[allow(clippy::module_name_repetitions)]
#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    #[error("buffer is not supposed to be longer than {expected} bytes but got {got}")]
    BufferTooLong { expected: usize, got: usize },

    #[error("Boundary not found in Content-Type header parameters, {0}")]
    BoundaryNotFound(String),

    #[error("Misplaced boundary in mime message, {0}")]
    MisplacedBoundary(String),

    #[error("no end boundary found before end of buffer")]
    UnterminatedMultipart,

    #[error("malformed part header block: {0}")]
    MalformedHeaders(String),

    #[error("no part found after the SOAP/XOP root part")]
    MissingSoapPart,
}

pub type ParserResult<T> = Result<T, ParserError>;

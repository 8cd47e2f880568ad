use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Prompt must not be empty")]
    EmptyPrompt,
    #[error("Model load error: {0}")]
    ModelLoad(String),
    #[error("Generation error: {0}")]
    Generation(String),
    #[error("Image error: {0}")]
    Image(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for GenError {
    fn from(err: reqwest::Error) -> Self {
        GenError::Http(err.to_string())
    }
}

impl From<image::ImageError> for GenError {
    fn from(err: image::ImageError) -> Self {
        GenError::Image(err.to_string())
    }
}

#[cfg(feature = "local")]
impl From<candle_core::Error> for GenError {
    fn from(err: candle_core::Error) -> Self {
        GenError::Generation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GenError>;

/// Why an upload produced no URL. Carried as data inside an upload result and
/// never raised out of the upload client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadFailure {
    #[error("file not found: {0}")]
    FileMissing(String),
    #[error("could not read file: {0}")]
    Io(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

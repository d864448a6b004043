use thiserror::Error;

/// Result type returned from functions that can have our `Error`s.
pub type Result<T, E = AutobrightError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AutobrightError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    InvalidRegex(#[from] regex::Error),

    #[error("{0}")]
    DBus(#[from] zbus::Error),

    #[error("{0}")]
    ParseInt(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloat(#[from] std::num::ParseFloatError),

    #[error("{message}: {source}")]
    Context {
        message: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Unrecognized reading {0:?}")]
    InvalidReading(String),

    #[error("No matching devices exist")]
    NoDevices,

    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub(crate) trait ResultExt<T> {
    /// Wrap the error with a short description of what was being attempted.
    fn error(self, message: &'static str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn error(self, message: &'static str) -> Result<T> {
        self.map_err(|source| AutobrightError::Context {
            message,
            source: source.into(),
        })
    }
}

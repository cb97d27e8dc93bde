use std::fmt;
use std::io;

/// Fatal conditions. Absence of a hand is never an error: it travels as
/// `None` through the selector and mapper and ends as silence.
#[derive(Debug)]
pub enum SynthError {
    /// Unknown strategy name or an invalid numeric setting. Raised at startup only.
    Config(String),
    /// Audio device could not be opened, started or closed, or was lost mid-session.
    Device(String),
    /// Reading a config file or a landmark recording failed.
    Io(io::Error),
}

pub type Result<T> = std::result::Result<T, SynthError>;

impl fmt::Display for SynthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthError::Config(msg) => write!(f, "configuration error: {}", msg),
            SynthError::Device(msg) => write!(f, "audio device error: {}", msg),
            SynthError::Io(e) => write!(f, "i/o error: {}", e),
        }
    }
}

impl std::error::Error for SynthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SynthError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SynthError {
    fn from(e: io::Error) -> Self {
        SynthError::Io(e)
    }
}

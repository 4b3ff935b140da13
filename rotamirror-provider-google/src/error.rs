use rotamirror_core::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GoogleError {
    #[error("Service account credentials are unusable: {0}")]
    Credentials(String),

    #[error("Google authentication failed: {0}")]
    Auth(String),

    #[error("Request to Google Calendar failed: {0}")]
    Transport(String),

    #[error("Google Calendar returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected Google Calendar response: {0}")]
    Decode(String),
}

impl From<GoogleError> for StoreError {
    fn from(err: GoogleError) -> Self {
        match err {
            GoogleError::Credentials(message) | GoogleError::Auth(message) => {
                StoreError::Auth(message)
            }
            GoogleError::Transport(message) => StoreError::Transport(message),
            GoogleError::Api { status, message } => StoreError::Api { status, message },
            GoogleError::Decode(message) => StoreError::Decode(message),
        }
    }
}

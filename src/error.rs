use thiserror::Error;

/// Error code the server reports when the stored access token is no
/// longer valid and the authorization flow must be re-run.
pub const TOKEN_EXPIRED_CODE: &str = "1007";

#[derive(Error, Debug)]
pub enum Error {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server error {code}: {message}")]
    Server { code: String, message: String },

    #[error("response is not the expected JSON: {body}")]
    MalformedResponse { body: String },

    #[error("no access token set; complete the authorization flow first")]
    NoAccessToken,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The server-provided error code, if this is a server-reported
    /// failure. Lets callers branch on codes such as
    /// [`TOKEN_EXPIRED_CODE`] without inspecting error types.
    pub fn server_code(&self) -> Option<&str> {
        match self {
            Error::Server { code, .. } => Some(code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

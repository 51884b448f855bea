use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;
pub type SignResult<T> = std::result::Result<T, SignError>;
pub type TokenReaderResult<T> = std::result::Result<T, TokenReaderError>;
pub type EngineResult<T> = std::result::Result<T, EngineError>;

const OAUTH_PROBLEM_KEY: &str = "oauth_problem";

#[derive(Error, Debug)]
pub enum Error {
    /// The authorization server rejected a token lifecycle request.
    #[error("authorization failed ({status}) : {body}")]
    Authorization { status: u16, body: String },
    /// The resource server rejected an authenticated request.
    #[error("http request failed ({status}) : {body}")]
    Http { status: u16, body: String },
    #[error("precondition violated : {0}")]
    Precondition(#[from] PreconditionError),
    #[error("json (de)serialization failed : {0}")]
    Json(#[from] serde_json::Error),
    #[error("token acquisition failed : {0}")]
    TokenReader(#[from] TokenReaderError),
    #[error("OAuth sign failed : {0}")]
    Signer(#[from] SignError),
    #[error("request failed : {0}")]
    Transport(#[source] EngineError),
    #[error("invalid configuration : {0}")]
    Config(String),
    #[error("stream write failed : {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Maps an engine failure raised while acquiring or refreshing tokens.
    pub(crate) fn authorization(err: EngineError) -> Self {
        match err {
            EngineError::Status { status_code, data } => Error::Authorization {
                status: status_code,
                body: data,
            },
            other => Error::from_engine(other),
        }
    }

    /// Maps an engine failure raised by an authenticated resource call.
    pub(crate) fn http(err: EngineError) -> Self {
        match err {
            EngineError::Status { status_code, data } => Error::Http {
                status: status_code,
                body: data,
            },
            other => Error::from_engine(other),
        }
    }

    fn from_engine(err: EngineError) -> Self {
        match err {
            EngineError::TokenReader(err) => Error::TokenReader(err),
            other => Error::Transport(other),
        }
    }

    /// HTTP status reported by the remote side, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Authorization { status, .. } | Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw body returned by the remote side, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            Error::Authorization { body, .. } | Error::Http { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Check if the remote side refused the credentials.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Authorization { .. }) || self.status() == Some(401)
    }

    /// Check if the caller used the flow out of order.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::Precondition(_))
    }

    /// The `oauth_problem` value of a url-encoded error body,
    /// e.g. `token_expired` or `signature_invalid`.
    pub fn oauth_problem(&self) -> Option<String> {
        let body = self.body()?;
        url::form_urlencoded::parse(body.trim().as_bytes())
            .find(|(k, _)| k == OAUTH_PROBLEM_KEY)
            .map(|(_, v)| v.into_owned())
    }
}

/// Raised when an operation is invoked in a state that cannot serve it.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("no request token is stored; call get_request_token first")]
    MissingRequestToken,
    #[error("no access token is stored; complete the authorization flow first")]
    MissingAccessToken,
    #[error("no session handle is stored; the access token cannot be refreshed")]
    MissingSessionHandle,
}

/// Failure reported by a [`SignedRequestEngine`](crate::SignedRequestEngine).
#[derive(Error, Debug)]
pub enum EngineError {
    /// The server answered with a non-success status.
    #[error("server responded {status_code} : {data}")]
    Status { status_code: u16, data: String },
    #[error("request failed : {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("invalid url : {0}")]
    Url(#[from] url::ParseError),
    #[error("malformed token response : {0}")]
    TokenReader(#[from] TokenReaderError),
    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug, Clone)]
pub enum SignError {
    #[error("unsupported signature method : {0}")]
    UnsupportedMethod(String),
}

#[derive(Error, Debug, Clone)]
pub enum TokenReaderError {
    #[error("response has malformed format: not found {0} in {1}")]
    TokenKeyNotFound(&'static str, String),
}

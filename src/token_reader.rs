use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Response;
use serde::Deserialize;

use crate::{EngineError, EngineResult, Token, TokenReaderError, TokenReaderResult};

const OAUTH_TOKEN_KEY: &str = "oauth_token";
const OAUTH_TOKEN_SECRET_KEY: &str = "oauth_token_secret";
const OAUTH_SESSION_HANDLE_KEY: &str = "oauth_session_handle";
const OAUTH_EXPIRES_IN_KEY: &str = "oauth_expires_in";
const OAUTH_CALLBACK_CONFIRMED_KEY: &str = "oauth_callback_confirmed";

/// Represents response of token acquisition.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    /// OAuth Token
    pub oauth_token: String,
    /// OAuth Token Secret
    pub oauth_token_secret: String,
    /// Other contents
    #[serde(flatten)]
    pub remain: HashMap<String, String>,
}

impl TokenResponse {
    pub fn token(&self) -> Token {
        Token::new(self.oauth_token.clone(), self.oauth_token_secret.clone())
    }

    /// Handle for renewing the access token, when the server issues one.
    pub fn session_handle(&self) -> Option<&str> {
        self.remain
            .get(OAUTH_SESSION_HANDLE_KEY)
            .map(String::as_str)
            .filter(|h| !h.is_empty())
    }

    /// Access token lifetime in seconds. Unparseable values read as absent.
    pub fn expires_in(&self) -> Option<u32> {
        self.remain
            .get(OAUTH_EXPIRES_IN_KEY)
            .and_then(|v| v.trim().parse().ok())
    }

    pub fn callback_confirmed(&self) -> bool {
        self.remain
            .get(OAUTH_CALLBACK_CONFIRMED_KEY)
            .map_or(false, |v| v == "true")
    }
}

/// Reads a token endpoint reply, turning non-success statuses into
/// [`EngineError::Status`].
// this trait is sealed
#[async_trait]
pub trait TokenReader: private::Sealed {
    async fn parse_oauth_token(self) -> EngineResult<TokenResponse>;
}

#[async_trait]
impl TokenReader for Response {
    async fn parse_oauth_token(self) -> EngineResult<TokenResponse> {
        let status = self.status();
        let text = self.text().await?;
        if !status.is_success() {
            return Err(EngineError::Status {
                status_code: status.as_u16(),
                data: text,
            });
        }
        Ok(read_oauth_token(text)?)
    }
}

/// Parses a url-encoded token reply body.
pub fn read_oauth_token(text: String) -> TokenReaderResult<TokenResponse> {
    let mut destructured = url::form_urlencoded::parse(text.trim().as_bytes())
        .into_owned()
        .collect::<HashMap<String, String>>();
    let oauth_token = destructured.remove(OAUTH_TOKEN_KEY);
    let oauth_token_secret = destructured.remove(OAUTH_TOKEN_SECRET_KEY);
    match (oauth_token, oauth_token_secret) {
        (Some(t), Some(s)) => Ok(TokenResponse {
            oauth_token: t,
            oauth_token_secret: s,
            remain: destructured,
        }),
        (None, _) => Err(TokenReaderError::TokenKeyNotFound(OAUTH_TOKEN_KEY, text)),
        (_, _) => Err(TokenReaderError::TokenKeyNotFound(
            OAUTH_TOKEN_SECRET_KEY,
            text,
        )),
    }
}

mod private {
    use reqwest::Response;

    pub trait Sealed {}
    impl Sealed for Response {}
}

//! The three-legged handshake and session-handle renewal.

use chrono::{DateTime, Duration, Utc};
use http::Method;
use tracing::{debug, info};

use crate::token_reader::read_oauth_token;
use crate::{Error, OAuth1HttpClient, OAuthState, PreconditionError, Result, StatePatch, Token};

const OAUTH_SESSION_HANDLE_KEY: &str = "oauth_session_handle";

pub(crate) fn expiry_after(now: DateTime<Utc>, expires_in: u32) -> DateTime<Utc> {
    now + Duration::seconds(i64::from(expires_in))
}

impl OAuth1HttpClient {
    /// Obtains an unauthorized request token and stores it.
    pub async fn get_request_token(&self) -> Result<Token> {
        let response = self
            .engine
            .request_token()
            .await
            .map_err(Error::authorization)?;
        let token = response.token();
        debug!(
            request_token = %token.identifier(),
            callback_confirmed = response.callback_confirmed(),
            "request token obtained"
        );
        self.state
            .set(StatePatch::new().request_token(token.clone()));
        Ok(token)
    }

    /// URL the resource owner visits to approve the stored request token.
    pub fn build_authorise_url(&self) -> Result<String> {
        let token = self
            .state
            .request_token()
            .ok_or(PreconditionError::MissingRequestToken)?;
        Ok(self.config.authorise_url(token.identifier()))
    }

    /// Exchanges the stored request token and `verifier` for an access token.
    pub async fn swap_request_token_for_access_token(&self, verifier: &str) -> Result<OAuthState> {
        let request_token = self
            .state
            .request_token()
            .ok_or(PreconditionError::MissingRequestToken)?;
        let response = self
            .engine
            .access_token(&request_token, verifier)
            .await
            .map_err(Error::authorization)?;

        let expires_at = response
            .expires_in()
            .map(|secs| expiry_after(Utc::now(), secs));
        self.state.set(
            StatePatch::new()
                .access_token(response.token())
                .session_handle(response.session_handle())
                .expires_at(expires_at),
        );
        info!(expires_at = ?expires_at, "access token obtained");
        Ok(self.state.get())
    }

    /// Renews the access token with the stored session handle.
    ///
    /// `expires_at` is left as it was. A reply without a new session handle
    /// keeps the current one.
    pub async fn refresh_access_token(&self) -> Result<OAuthState> {
        let (access_token, session_handle) = self.state.refresh_credentials();
        let access_token = access_token.ok_or(PreconditionError::MissingAccessToken)?;
        let session_handle = session_handle.ok_or(PreconditionError::MissingSessionHandle)?;

        let url = self.config.access_token_url();
        let body = self
            .engine
            .secure_request(
                &access_token,
                Method::POST,
                &url,
                &[(OAUTH_SESSION_HANDLE_KEY, session_handle.as_str())],
            )
            .await
            .map_err(Error::authorization)?;
        let response = read_oauth_token(body)?;

        let mut patch = StatePatch::new().access_token(response.token());
        if let Some(handle) = response.session_handle() {
            patch = patch.session_handle(Some(handle));
        }
        self.state.set(patch);
        info!("access token refreshed");
        Ok(self.state.get())
    }
}

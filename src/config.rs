use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result, SignatureMethodKind};

pub const DEFAULT_API_BASE_PATH: &str = "/api.xro/2.0/";
pub const DEFAULT_REQUEST_TOKEN_PATH: &str = "/oauth/RequestToken";
pub const DEFAULT_ACCESS_TOKEN_PATH: &str = "/oauth/AccessToken";
pub const DEFAULT_ACCEPT: &str = "application/json";
/// Path, relative to the API base URL, of the user-facing consent page.
pub const AUTHORIZE_PATH: &str = "/oauth/Authorize";

fn default_api_base_path() -> String {
    DEFAULT_API_BASE_PATH.to_string()
}

fn default_request_token_path() -> String {
    DEFAULT_REQUEST_TOKEN_PATH.to_string()
}

fn default_access_token_path() -> String {
    DEFAULT_ACCESS_TOKEN_PATH.to_string()
}

fn default_accept() -> String {
    DEFAULT_ACCEPT.to_string()
}

fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Immutable per-client configuration.
///
/// Every field except the consumer credentials and `api_base_url` has a
/// default, so a minimal JSON/TOML/YAML document deserializes directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub api_base_url: String,
    #[serde(default = "default_api_base_path")]
    pub api_base_path: String,
    #[serde(default = "default_request_token_path")]
    pub request_token_path: String,
    #[serde(default = "default_access_token_path")]
    pub access_token_path: String,
    #[serde(default)]
    pub signature_method: SignatureMethodKind,
    #[serde(default = "default_accept")]
    pub accept: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub callback_url: Option<String>,
}

impl ClientConfig {
    pub fn new<TKey, TSecret, TUrl>(consumer_key: TKey, consumer_secret: TSecret, api_base_url: TUrl) -> Self
    where
        TKey: Into<String>,
        TSecret: Into<String>,
        TUrl: Into<String>,
    {
        ClientConfig {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            api_base_url: api_base_url.into(),
            api_base_path: default_api_base_path(),
            request_token_path: default_request_token_path(),
            access_token_path: default_access_token_path(),
            signature_method: SignatureMethodKind::default(),
            accept: default_accept(),
            user_agent: default_user_agent(),
            callback_url: None,
        }
    }

    pub fn with_api_base_path(self, api_base_path: impl Into<String>) -> Self {
        ClientConfig {
            api_base_path: api_base_path.into(),
            ..self
        }
    }

    pub fn with_token_paths(
        self,
        request_token_path: impl Into<String>,
        access_token_path: impl Into<String>,
    ) -> Self {
        ClientConfig {
            request_token_path: request_token_path.into(),
            access_token_path: access_token_path.into(),
            ..self
        }
    }

    pub fn with_signature_method(self, signature_method: SignatureMethodKind) -> Self {
        ClientConfig {
            signature_method,
            ..self
        }
    }

    /// As [`with_signature_method`](Self::with_signature_method), parsing
    /// the wire name (`HMAC-SHA1`, `PLAINTEXT`).
    pub fn with_signature_method_name(self, name: &str) -> Result<Self> {
        Ok(self.with_signature_method(name.parse()?))
    }

    pub fn with_accept(self, accept: impl Into<String>) -> Self {
        ClientConfig {
            accept: accept.into(),
            ..self
        }
    }

    pub fn with_user_agent(self, user_agent: impl Into<String>) -> Self {
        ClientConfig {
            user_agent: user_agent.into(),
            ..self
        }
    }

    pub fn with_callback_url(self, callback_url: impl Into<String>) -> Self {
        ClientConfig {
            callback_url: Some(callback_url.into()),
            ..self
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.consumer_key.is_empty() {
            return Err(Error::Config("consumer_key is required".to_string()));
        }
        if self.consumer_secret.is_empty() {
            return Err(Error::Config("consumer_secret is required".to_string()));
        }
        Url::parse(&self.api_base_url).map_err(|e| {
            Error::Config(format!("api_base_url {:?} is not a url: {}", self.api_base_url, e))
        })?;
        if let Some(ref callback) = self.callback_url {
            if callback != "oob" {
                Url::parse(callback).map_err(|e| {
                    Error::Config(format!("callback_url {:?} is not a url: {}", callback, e))
                })?;
            }
        }
        Ok(())
    }

    /// `{api_base_url}{request_token_path}`
    pub fn request_token_url(&self) -> String {
        format!("{}{}", self.api_base_url, self.request_token_path)
    }

    /// `{api_base_url}{access_token_path}`
    pub fn access_token_url(&self) -> String {
        format!("{}{}", self.api_base_url, self.access_token_path)
    }

    /// `{api_base_url}{api_base_path}{endpoint}`
    pub fn resource_url(&self, endpoint: &str) -> String {
        format!("{}{}{}", self.api_base_url, self.api_base_path, endpoint)
    }

    /// `{api_base_url}/oauth/Authorize?oauth_token={token}`
    pub fn authorise_url(&self, request_token: &str) -> String {
        format!(
            "{}{}?oauth_token={}",
            self.api_base_url, AUTHORIZE_PATH, request_token
        )
    }
}

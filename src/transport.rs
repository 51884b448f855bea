//! Construction of signing-capable transports.
//!
//! A [`TransportFactory`] owns everything an engine is bound to: the
//! [`TransportConfig`], the [`ConnectionOpener`] deciding how connections
//! leave the process, and the [`EngineFactory`] that turns both into a
//! [`SignedRequestEngine`].

use std::fmt;
use std::sync::Arc;

use reqwest::{ClientBuilder as ReqwestClientBuilder, Proxy};
use serde::{Deserialize, Serialize};

use crate::{
    ClientConfig, Consumer, Error, ReqwestEngine, Result, SignatureMethodKind, SignedRequestEngine,
};

/// Everything a signed-request engine is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub consumer: Consumer,
    pub request_token_url: String,
    pub access_token_url: String,
    pub callback_url: Option<String>,
    pub signature_method: SignatureMethodKind,
    /// Send `oauth_version="1.0"`.
    pub oauth_version: bool,
    pub accept: String,
    pub user_agent: String,
}

impl TransportConfig {
    /// Same binding with the `Accept` header replaced.
    pub fn with_accept(self, accept: impl Into<String>) -> Self {
        TransportConfig {
            accept: accept.into(),
            ..self
        }
    }
}

impl From<&ClientConfig> for TransportConfig {
    fn from(config: &ClientConfig) -> Self {
        TransportConfig {
            consumer: Consumer::new(config.consumer_key.clone(), config.consumer_secret.clone()),
            request_token_url: config.request_token_url(),
            access_token_url: config.access_token_url(),
            callback_url: config.callback_url.clone(),
            signature_method: config.signature_method,
            oauth_version: true,
            accept: config.accept.clone(),
            user_agent: config.user_agent.clone(),
        }
    }
}

/// Decides the route every connection of an engine takes.
///
/// Applied once, when the engine's HTTP client is built; the client then
/// picks plain or TLS connections per request from the target URL scheme.
pub trait ConnectionOpener: Send + Sync + fmt::Debug {
    fn configure(&self, builder: ReqwestClientBuilder) -> Result<ReqwestClientBuilder>;
}

/// Connects straight to the target, ignoring proxy environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectOpener;

impl ConnectionOpener for DirectOpener {
    fn configure(&self, builder: ReqwestClientBuilder) -> Result<ReqwestClientBuilder> {
        Ok(builder.no_proxy())
    }
}

/// A forward proxy every outbound connection is routed through.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyAgent {
    url: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

impl ProxyAgent {
    pub fn new(url: impl Into<String>) -> Self {
        ProxyAgent {
            url: url.into(),
            username: None,
            password: None,
        }
    }

    pub fn basic_auth(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        ProxyAgent {
            username: Some(username.into()),
            password: Some(password.into()),
            ..self
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn to_proxy(&self) -> Result<Proxy> {
        // http targets are forwarded, https targets are tunnelled with CONNECT
        let proxy = Proxy::all(self.url.as_str())
            .map_err(|e| Error::Config(format!("invalid proxy {:?}: {}", self.url, e)))?;
        Ok(match (&self.username, &self.password) {
            (Some(username), password) => {
                proxy.basic_auth(username, password.as_deref().unwrap_or_default())
            }
            (None, _) => proxy,
        })
    }
}

impl fmt::Debug for ProxyAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyAgent")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Routes every connection through a [`ProxyAgent`].
#[derive(Debug, Clone)]
pub struct ProxyOpener {
    agent: ProxyAgent,
}

impl ProxyOpener {
    pub fn new(agent: ProxyAgent) -> Self {
        ProxyOpener { agent }
    }
}

impl ConnectionOpener for ProxyOpener {
    fn configure(&self, builder: ReqwestClientBuilder) -> Result<ReqwestClientBuilder> {
        Ok(builder.proxy(self.agent.to_proxy()?))
    }
}

/// Builds the engine a client signs with. Swap it to change signing
/// backends or to observe traffic in tests.
pub trait EngineFactory: Send + Sync {
    fn build(
        &self,
        config: TransportConfig,
        opener: &dyn ConnectionOpener,
    ) -> Result<Arc<dyn SignedRequestEngine>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReqwestEngineFactory;

impl EngineFactory for ReqwestEngineFactory {
    fn build(
        &self,
        config: TransportConfig,
        opener: &dyn ConnectionOpener,
    ) -> Result<Arc<dyn SignedRequestEngine>> {
        Ok(Arc::new(ReqwestEngine::new(config, opener)?))
    }
}

pub struct TransportFactory {
    config: TransportConfig,
    opener: Arc<dyn ConnectionOpener>,
    factory: Arc<dyn EngineFactory>,
}

impl TransportFactory {
    pub fn new(
        config: TransportConfig,
        opener: Arc<dyn ConnectionOpener>,
        factory: Arc<dyn EngineFactory>,
    ) -> Self {
        TransportFactory {
            config,
            opener,
            factory,
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Engine bound to the configured headers.
    pub fn engine(&self) -> Result<Arc<dyn SignedRequestEngine>> {
        self.factory.build(self.config.clone(), self.opener.as_ref())
    }

    /// A fresh engine whose `Accept` header is `accept`.
    ///
    /// Downloads of different content types each get their own engine and
    /// never share header state.
    pub fn engine_with_accept(&self, accept: &str) -> Result<Arc<dyn SignedRequestEngine>> {
        self.factory
            .build(self.config.clone().with_accept(accept), self.opener.as_ref())
    }
}

impl fmt::Debug for TransportFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportFactory")
            .field("config", &self.config)
            .field("opener", &self.opener)
            .finish_non_exhaustive()
    }
}

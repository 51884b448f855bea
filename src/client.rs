use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::state::StateStore;
use crate::transport::{
    ConnectionOpener, DirectOpener, EngineFactory, ProxyAgent, ProxyOpener, ReqwestEngineFactory,
    TransportConfig, TransportFactory,
};
use crate::{
    ClientConfig, Error, OAuthState, PreconditionError, Result, SignedRequestEngine, StatePatch,
    Token,
};

const JSON_CONTENT_TYPE: &str = "application/json";

/// OAuth 1.0a client for a JSON resource API.
///
/// One instance carries one authorization context. The flow operations
/// (`get_request_token`, `swap_request_token_for_access_token`,
/// `refresh_access_token`) must not overlap; resource calls may run
/// concurrently once an access token is stored.
pub struct OAuth1HttpClient {
    pub(crate) config: ClientConfig,
    pub(crate) state: StateStore,
    pub(crate) transport: TransportFactory,
    pub(crate) engine: Arc<dyn SignedRequestEngine>,
}

impl fmt::Debug for OAuth1HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth1HttpClient")
            .field("api_base_url", &self.config.api_base_url)
            .field("state", &self.state)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl OAuth1HttpClient {
    /// Client on the default reqwest engine with direct connections.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Snapshot of the current authorization state.
    pub fn state(&self) -> OAuthState {
        self.state.get()
    }

    /// Merges `patch` into the stored state, e.g. to restore persisted tokens.
    pub fn set_state(&self, patch: StatePatch) {
        self.state.set(patch);
    }

    fn authorized_token(&self) -> Result<Token> {
        self.state
            .access_token()
            .ok_or_else(|| PreconditionError::MissingAccessToken.into())
    }

    /// Signed GET of `{api_base_url}{api_base_path}{endpoint}`, decoded as JSON.
    pub async fn get<T>(&self, endpoint: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.get_inner(endpoint, None).await
    }

    /// As [`get`](Self::get) with the `Accept` header overridden for this call.
    pub async fn get_with_accept<T>(&self, endpoint: &str, accept: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.get_inner(endpoint, Some(accept)).await
    }

    async fn get_inner<T>(&self, endpoint: &str, accept: Option<&str>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let token = self.authorized_token()?;
        let url = self.config.resource_url(endpoint);
        debug!(%endpoint, "GET");
        let response = self
            .engine
            .get(&url, &token, accept)
            .await
            .map_err(Error::http)?;
        Ok(serde_json::from_str(&response.body)?)
    }

    pub async fn put<T, B>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let token = self.authorized_token()?;
        let url = self.config.resource_url(endpoint);
        let body = serde_json::to_vec(body)?;
        debug!(%endpoint, bytes = body.len(), "PUT");
        let response = self
            .engine
            .put(&url, &token, body, JSON_CONTENT_TYPE)
            .await
            .map_err(Error::http)?;
        Ok(serde_json::from_str(&response.body)?)
    }

    pub async fn post<T, B>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let token = self.authorized_token()?;
        let url = self.config.resource_url(endpoint);
        let body = serde_json::to_vec(body)?;
        debug!(%endpoint, bytes = body.len(), "POST");
        let response = self
            .engine
            .post(&url, &token, body, JSON_CONTENT_TYPE)
            .await
            .map_err(Error::http)?;
        Ok(serde_json::from_str(&response.body)?)
    }

    /// Signed DELETE. An empty reply body resolves to `None`.
    pub async fn delete<T>(&self, endpoint: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let token = self.authorized_token()?;
        let url = self.config.resource_url(endpoint);
        debug!(%endpoint, "DELETE");
        let response = self
            .engine
            .delete(&url, &token)
            .await
            .map_err(Error::http)?;
        if response.body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&response.body)?))
    }

    /// Downloads `endpoint` as `mime_type` into `sink`, chunk by chunk.
    ///
    /// The sink is shut down exactly once, after the last chunk or on the
    /// first failure, and is dropped when this returns.
    pub async fn write_to_stream<W>(&self, endpoint: &str, mime_type: &str, mut sink: W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let copied = self.copy_to(endpoint, mime_type, &mut sink).await;
        let closed = sink.shutdown().await;
        match (copied, closed) {
            (Ok(written), Ok(())) => {
                debug!(%endpoint, %mime_type, bytes = written, "download complete");
                Ok(written)
            }
            (Err(err), _) => {
                warn!(%endpoint, %mime_type, error = %err, "download failed");
                Err(err)
            }
            (Ok(_), Err(err)) => Err(err.into()),
        }
    }

    async fn copy_to<W>(&self, endpoint: &str, mime_type: &str, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let token = self.authorized_token()?;
        let url = self.config.resource_url(endpoint);
        let engine = self.transport.engine_with_accept(mime_type)?;
        let mut chunks = engine.get_stream(&url, &token).await.map_err(Error::http)?;

        let mut written = 0u64;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(Error::http)?;
            sink.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        Ok(written)
    }
}

/// Assembles an [`OAuth1HttpClient`].
pub struct ClientBuilder {
    config: ClientConfig,
    opener: Arc<dyn ConnectionOpener>,
    factory: Arc<dyn EngineFactory>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        ClientBuilder {
            config,
            opener: Arc::new(DirectOpener),
            factory: Arc::new(ReqwestEngineFactory),
        }
    }

    /// Route every connection through a forward proxy.
    pub fn proxy(self, agent: ProxyAgent) -> Self {
        self.connection_opener(ProxyOpener::new(agent))
    }

    pub fn connection_opener<T>(self, opener: T) -> Self
    where
        T: ConnectionOpener + 'static,
    {
        ClientBuilder {
            opener: Arc::new(opener),
            ..self
        }
    }

    /// Replace the signing backend.
    pub fn engine_factory<T>(self, factory: T) -> Self
    where
        T: EngineFactory + 'static,
    {
        ClientBuilder {
            factory: Arc::new(factory),
            ..self
        }
    }

    pub fn build(self) -> Result<OAuth1HttpClient> {
        self.config.validate()?;
        let transport = TransportFactory::new(
            TransportConfig::from(&self.config),
            self.opener,
            self.factory,
        );
        let engine = transport.engine()?;
        info!(
            api_base_url = %self.config.api_base_url,
            signature_method = %self.config.signature_method,
            "oauth1 client ready"
        );
        Ok(OAuth1HttpClient {
            config: self.config,
            state: StateStore::new(),
            transport,
            engine,
        })
    }
}

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use http::header::{ACCEPT, HeaderMap, HeaderValue};
use http::Method;
use reqwest::Client as ReqwestClient;
use tracing::{debug, trace};
use url::Url;

use crate::request::RequestBuilder;
use crate::token_reader::TokenReader;
use crate::transport::{ConnectionOpener, TransportConfig};
use crate::{EngineError, EngineResult, Error, OAuthParameters, Result, Token, TokenResponse};

/// Callback value telling the server the verifier is delivered out-of-band.
pub const OUT_OF_BAND_CALLBACK: &str = "oob";

/// Response body chunks of a streamed download.
pub type ByteStream = Pin<Box<dyn Stream<Item = EngineResult<Bytes>> + Send>>;

/// A completed signed exchange with a success status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineResponse {
    pub status: u16,
    pub body: String,
}

/// Produces OAuth1-signed requests and reports their outcome.
///
/// Non-success statuses come back as [`EngineError::Status`] carrying the
/// raw body; callers decide what kind of failure that is.
#[async_trait]
pub trait SignedRequestEngine: Send + Sync {
    /// Obtain an unauthorized request token. No token signs this call.
    async fn request_token(&self) -> EngineResult<TokenResponse>;

    /// Exchange an authorized request token and its verifier.
    async fn access_token(
        &self,
        request_token: &Token,
        verifier: &str,
    ) -> EngineResult<TokenResponse>;

    /// Send `params` to `url` signed with `token`, returning the raw body.
    async fn secure_request(
        &self,
        token: &Token,
        method: Method,
        url: &str,
        params: &[(&str, &str)],
    ) -> EngineResult<String>;

    async fn get(
        &self,
        url: &str,
        token: &Token,
        accept: Option<&str>,
    ) -> EngineResult<EngineResponse>;

    async fn put(
        &self,
        url: &str,
        token: &Token,
        body: Vec<u8>,
        content_type: &str,
    ) -> EngineResult<EngineResponse>;

    async fn post(
        &self,
        url: &str,
        token: &Token,
        body: Vec<u8>,
        content_type: &str,
    ) -> EngineResult<EngineResponse>;

    async fn delete(&self, url: &str, token: &Token) -> EngineResult<EngineResponse>;

    /// Signed GET whose body is handed over chunk by chunk.
    async fn get_stream(&self, url: &str, token: &Token) -> EngineResult<ByteStream>;
}

/// [`SignedRequestEngine`] on top of reqwest, signing with oauth1-request.
pub struct ReqwestEngine {
    http: ReqwestClient,
    config: TransportConfig,
}

impl fmt::Debug for ReqwestEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestEngine")
            .field("config", &self.config)
            .finish()
    }
}

impl ReqwestEngine {
    /// Builds the engine; every connection it makes goes through `opener`.
    pub fn new(config: TransportConfig, opener: &dyn ConnectionOpener) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let accept = HeaderValue::from_str(&config.accept)
            .map_err(|_| Error::Config(format!("invalid Accept header {:?}", config.accept)))?;
        headers.insert(ACCEPT, accept);

        let builder = ReqwestClient::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone());
        let http = opener
            .configure(builder)?
            .build()
            .map_err(|e| Error::Config(format!("failed to build http client: {}", e)))?;

        debug!(accept = %config.accept, opener = ?opener, "signed request engine ready");
        Ok(ReqwestEngine { http, config })
    }

    fn parameters(&self) -> OAuthParameters<'_> {
        OAuthParameters::new()
            .signature_method(self.config.signature_method)
            .version(self.config.oauth_version)
    }

    fn builder(&self, method: Method, url: &str) -> EngineResult<RequestBuilder> {
        let url = Url::parse(url)?;
        trace!(
            %method,
            host = url.host_str().unwrap_or_default(),
            secure = url.scheme() == "https",
            "opening signed request"
        );
        Ok(RequestBuilder::new(&self.http, method, url))
    }

    fn sign(
        &self,
        builder: RequestBuilder,
        token: Option<&Token>,
        parameters: OAuthParameters<'_>,
    ) -> reqwest::RequestBuilder {
        builder.sign(&self.config.consumer.with_token(token), parameters)
    }

    async fn send(request: reqwest::RequestBuilder) -> EngineResult<EngineResponse> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            debug!(status = status.as_u16(), "signed request rejected");
            return Err(EngineError::Status {
                status_code: status.as_u16(),
                data: body,
            });
        }
        Ok(EngineResponse {
            status: status.as_u16(),
            body,
        })
    }

    async fn send_body(
        &self,
        method: Method,
        url: &str,
        token: &Token,
        body: Vec<u8>,
        content_type: &str,
    ) -> EngineResult<EngineResponse> {
        let builder = self.builder(method, url)?.body_with_type(body, content_type);
        let request = self.sign(builder, Some(token), self.parameters());
        Self::send(request).await
    }
}

#[async_trait]
impl SignedRequestEngine for ReqwestEngine {
    async fn request_token(&self) -> EngineResult<TokenResponse> {
        let callback = self
            .config
            .callback_url
            .as_deref()
            .unwrap_or(OUT_OF_BAND_CALLBACK);
        let builder = self.builder(Method::POST, &self.config.request_token_url)?;
        let request = self.sign(builder, None, self.parameters().callback(callback));
        request.send().await?.parse_oauth_token().await
    }

    async fn access_token(
        &self,
        request_token: &Token,
        verifier: &str,
    ) -> EngineResult<TokenResponse> {
        let builder = self.builder(Method::POST, &self.config.access_token_url)?;
        let request = self.sign(
            builder,
            Some(request_token),
            self.parameters().verifier(verifier),
        );
        request.send().await?.parse_oauth_token().await
    }

    async fn secure_request(
        &self,
        token: &Token,
        method: Method,
        url: &str,
        params: &[(&str, &str)],
    ) -> EngineResult<String> {
        let carries_body = !matches!(method, Method::GET | Method::HEAD | Method::DELETE);
        let builder = self.builder(method, url)?;
        let builder = if carries_body {
            builder.form(params)
        } else {
            builder.query(params)
        };
        let request = self.sign(builder, Some(token), self.parameters());
        Ok(Self::send(request).await?.body)
    }

    async fn get(
        &self,
        url: &str,
        token: &Token,
        accept: Option<&str>,
    ) -> EngineResult<EngineResponse> {
        let mut builder = self.builder(Method::GET, url)?;
        if let Some(accept) = accept {
            builder = builder.header(ACCEPT, accept);
        }
        let request = self.sign(builder, Some(token), self.parameters());
        Self::send(request).await
    }

    async fn put(
        &self,
        url: &str,
        token: &Token,
        body: Vec<u8>,
        content_type: &str,
    ) -> EngineResult<EngineResponse> {
        self.send_body(Method::PUT, url, token, body, content_type)
            .await
    }

    async fn post(
        &self,
        url: &str,
        token: &Token,
        body: Vec<u8>,
        content_type: &str,
    ) -> EngineResult<EngineResponse> {
        self.send_body(Method::POST, url, token, body, content_type)
            .await
    }

    async fn delete(&self, url: &str, token: &Token) -> EngineResult<EngineResponse> {
        let builder = self.builder(Method::DELETE, url)?;
        let request = self.sign(builder, Some(token), self.parameters());
        Self::send(request).await
    }

    async fn get_stream(&self, url: &str, token: &Token) -> EngineResult<ByteStream> {
        let builder = self.builder(Method::GET, url)?;
        let request = self.sign(builder, Some(token), self.parameters());
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let data = response.text().await?;
            return Err(EngineError::Status {
                status_code: status.as_u16(),
                data,
            });
        }

        let chunks = futures::stream::try_unfold(response, |mut response| async move {
            match response.chunk().await {
                Ok(Some(chunk)) => Ok(Some((chunk, response))),
                Ok(None) => Ok(None),
                Err(err) => Err(EngineError::from(err)),
            }
        });
        Ok(Box::pin(chunks))
    }
}

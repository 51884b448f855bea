//! Recording doubles shared by the unit tests.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use parking_lot::Mutex;
use tokio::io::AsyncWrite;

use crate::token_reader::read_oauth_token;
use crate::transport::{ConnectionOpener, DirectOpener, EngineFactory, TransportConfig};
use crate::{
    ByteStream, ClientConfig, EngineError, EngineResponse, EngineResult, OAuth1HttpClient, Result,
    SignedRequestEngine, StatePatch, Token, TokenResponse,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    RequestToken,
    AccessToken {
        request_token: Token,
        verifier: String,
    },
    SecureRequest {
        token: Token,
        method: Method,
        url: String,
        params: Vec<(String, String)>,
    },
    Get {
        url: String,
        token: Token,
        accept: Option<String>,
    },
    Put {
        url: String,
        token: Token,
        body: Vec<u8>,
        content_type: String,
    },
    Post {
        url: String,
        token: Token,
        body: Vec<u8>,
        content_type: String,
    },
    Delete {
        url: String,
        token: Token,
    },
    GetStream {
        url: String,
        token: Token,
    },
}

/// Engine that records every call and replays scripted replies in order.
#[derive(Default)]
pub(crate) struct MockEngine {
    calls: Mutex<Vec<Call>>,
    tokens: Mutex<VecDeque<EngineResult<TokenResponse>>>,
    bodies: Mutex<VecDeque<EngineResult<String>>>,
    streams: Mutex<VecDeque<EngineResult<Vec<EngineResult<Bytes>>>>>,
}

impl MockEngine {
    pub(crate) fn new() -> Self {
        Default::default()
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Queue a url-encoded token endpoint reply.
    pub(crate) fn push_token(&self, body: &str) {
        let parsed = read_oauth_token(body.to_string()).map_err(EngineError::from);
        self.tokens.lock().push_back(parsed);
    }

    pub(crate) fn fail_token(&self, err: EngineError) {
        self.tokens.lock().push_back(Err(err));
    }

    /// Queue a reply for the next body-returning call.
    pub(crate) fn push_body(&self, body: EngineResult<&str>) {
        self.bodies.lock().push_back(body.map(str::to_string));
    }

    pub(crate) fn push_stream(&self, chunks: Vec<EngineResult<Bytes>>) {
        self.streams.lock().push_back(Ok(chunks));
    }

    pub(crate) fn fail_stream(&self, err: EngineError) {
        self.streams.lock().push_back(Err(err));
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn next_token(&self) -> EngineResult<TokenResponse> {
        self.tokens
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(EngineError::Other("no scripted token reply".to_string())))
    }

    fn next_body(&self) -> EngineResult<String> {
        self.bodies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(EngineError::Other("no scripted body".to_string())))
    }

    fn next_response(&self) -> EngineResult<EngineResponse> {
        self.next_body().map(|body| EngineResponse { status: 200, body })
    }
}

#[async_trait]
impl SignedRequestEngine for MockEngine {
    async fn request_token(&self) -> EngineResult<TokenResponse> {
        self.record(Call::RequestToken);
        self.next_token()
    }

    async fn access_token(
        &self,
        request_token: &Token,
        verifier: &str,
    ) -> EngineResult<TokenResponse> {
        self.record(Call::AccessToken {
            request_token: request_token.clone(),
            verifier: verifier.to_string(),
        });
        self.next_token()
    }

    async fn secure_request(
        &self,
        token: &Token,
        method: Method,
        url: &str,
        params: &[(&str, &str)],
    ) -> EngineResult<String> {
        self.record(Call::SecureRequest {
            token: token.clone(),
            method,
            url: url.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        self.next_body()
    }

    async fn get(
        &self,
        url: &str,
        token: &Token,
        accept: Option<&str>,
    ) -> EngineResult<EngineResponse> {
        self.record(Call::Get {
            url: url.to_string(),
            token: token.clone(),
            accept: accept.map(str::to_string),
        });
        self.next_response()
    }

    async fn put(
        &self,
        url: &str,
        token: &Token,
        body: Vec<u8>,
        content_type: &str,
    ) -> EngineResult<EngineResponse> {
        self.record(Call::Put {
            url: url.to_string(),
            token: token.clone(),
            body,
            content_type: content_type.to_string(),
        });
        self.next_response()
    }

    async fn post(
        &self,
        url: &str,
        token: &Token,
        body: Vec<u8>,
        content_type: &str,
    ) -> EngineResult<EngineResponse> {
        self.record(Call::Post {
            url: url.to_string(),
            token: token.clone(),
            body,
            content_type: content_type.to_string(),
        });
        self.next_response()
    }

    async fn delete(&self, url: &str, token: &Token) -> EngineResult<EngineResponse> {
        self.record(Call::Delete {
            url: url.to_string(),
            token: token.clone(),
        });
        self.next_response()
    }

    async fn get_stream(&self, url: &str, token: &Token) -> EngineResult<ByteStream> {
        self.record(Call::GetStream {
            url: url.to_string(),
            token: token.clone(),
        });
        let chunks = self
            .streams
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(EngineError::Other("no scripted stream".to_string())))?;
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

/// Hands out the same [`MockEngine`] for every build and records the
/// `Accept` header each build was asked for.
#[derive(Clone)]
pub(crate) struct MockFactory {
    engine: Arc<MockEngine>,
    accepts: Arc<Mutex<Vec<String>>>,
}

impl MockFactory {
    pub(crate) fn new(engine: Arc<MockEngine>) -> Self {
        MockFactory {
            engine,
            accepts: Default::default(),
        }
    }

    pub(crate) fn accepts(&self) -> Vec<String> {
        self.accepts.lock().clone()
    }
}

impl EngineFactory for MockFactory {
    fn build(
        &self,
        config: TransportConfig,
        _opener: &dyn ConnectionOpener,
    ) -> Result<Arc<dyn SignedRequestEngine>> {
        self.accepts.lock().push(config.accept);
        Ok(self.engine.clone())
    }
}

pub(crate) fn test_config() -> ClientConfig {
    ClientConfig::new("ck", "cs", "https://api.example.com")
}

pub(crate) fn mock_client(engine: Arc<MockEngine>) -> (OAuth1HttpClient, MockFactory) {
    let factory = MockFactory::new(engine);
    let client = OAuth1HttpClient::builder(test_config())
        .connection_opener(DirectOpener)
        .engine_factory(factory.clone())
        .build()
        .unwrap();
    (client, factory)
}

/// Client whose state already holds the access token `acc`/`accs`.
pub(crate) fn authorized_client(engine: Arc<MockEngine>) -> OAuth1HttpClient {
    let (client, _) = mock_client(engine);
    client.set_state(StatePatch::new().access_token(Token::new("acc", "accs")));
    client
}

#[derive(Debug, Default)]
struct SinkLog {
    data: Vec<u8>,
    shutdowns: usize,
    bytes_at_shutdown: Option<usize>,
}

/// `AsyncWrite` that keeps what it was given, readable after it is moved.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingSink {
    log: Arc<Mutex<SinkLog>>,
}

impl RecordingSink {
    pub(crate) fn new() -> Self {
        Default::default()
    }

    pub(crate) fn data(&self) -> Vec<u8> {
        self.log.lock().data.clone()
    }

    pub(crate) fn shutdowns(&self) -> usize {
        self.log.lock().shutdowns
    }

    pub(crate) fn bytes_at_shutdown(&self) -> Option<usize> {
        self.log.lock().bytes_at_shutdown
    }
}

impl AsyncWrite for RecordingSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut log = self.log.lock();
        if log.shutdowns > 0 {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "write after shutdown",
            )));
        }
        log.data.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut log = self.log.lock();
        log.shutdowns += 1;
        log.bytes_at_shutdown = Some(log.data.len());
        Poll::Ready(Ok(()))
    }
}

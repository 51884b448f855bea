/*!
oauth1-http-client: an OAuth 1.0a client for JSON accounting APIs, built on
[reqwest](https://crates.io/crates/reqwest) and
[oauth1-request](https://crates.io/crates/oauth1-request).

# Overview

[`OAuth1HttpClient`] walks the three-legged handshake (request token,
user authorization, verifier exchange), renews the access token with the
server-issued session handle, and signs every resource call with the
stored access token. The authorization state lives in the client and can
be read out or restored with [`OAuth1HttpClient::state`] and
[`OAuth1HttpClient::set_state`].

# How to use

## Acquiring an access token

```no_run
# async fn run() -> oauth1_http_client::Result<()> {
use std::io;

use oauth1_http_client::{ClientConfig, OAuth1HttpClient};

let config = ClientConfig::new("[CONSUMER_KEY]", "[CONSUMER_SECRET]", "https://api.xero.com");
let client = OAuth1HttpClient::new(config)?;

// step 1: acquire request token
client.get_request_token().await?;

// step 2: let the user approve it and read the verifier
println!("please visit: {}", client.build_authorise_url()?);
let mut user_input = String::new();
io::stdin().read_line(&mut user_input)?;

// step 3: exchange for the access token
let state = client
    .swap_request_token_for_access_token(user_input.trim())
    .await?;
println!("token expires at {:?}", state.expires_at);
# Ok(())
# }
```

## Calling the API

```no_run
# async fn run() -> oauth1_http_client::Result<()> {
use oauth1_http_client::{ClientConfig, OAuth1HttpClient, ProxyAgent, StatePatch, Token};
use serde_json::Value;

let config = ClientConfig::new("[CONSUMER_KEY]", "[CONSUMER_SECRET]", "https://api.xero.com");
let client = OAuth1HttpClient::builder(config)
    .proxy(ProxyAgent::new("http://proxy.internal:3128"))
    .build()?;
client.set_state(StatePatch::new().access_token(Token::new("[ACCESS_TOKEN]", "[TOKEN_SECRET]")));

let invoices: Value = client.get("Invoices").await?;
println!("{:#}", invoices);

let file = tokio::fs::File::create("invoice.pdf").await?;
client
    .write_to_stream("Invoices/[INVOICE_ID]", "application/pdf", file)
    .await?;
# Ok(())
# }
```
*/
mod client;
mod config;
mod engine;
mod error;
mod flow;
mod request;
mod secrets;
mod signer;
mod state;
mod token_reader;
mod transport;

#[cfg(test)]
mod testing;

// exposed to external program
pub use client::{ClientBuilder, OAuth1HttpClient};
pub use config::{
    ClientConfig, AUTHORIZE_PATH, DEFAULT_ACCEPT, DEFAULT_ACCESS_TOKEN_PATH, DEFAULT_API_BASE_PATH,
    DEFAULT_REQUEST_TOKEN_PATH,
};
pub use engine::{
    ByteStream, EngineResponse, ReqwestEngine, SignedRequestEngine, OUT_OF_BAND_CALLBACK,
};
pub use error::{
    EngineError, EngineResult, Error, PreconditionError, Result, SignError, SignResult,
    TokenReaderError, TokenReaderResult,
};
pub use secrets::{Consumer, Secrets, SecretsProvider, Token};
pub use signer::{OAuthParameters, SignatureMethodKind, Signer};
pub use state::{OAuthState, StatePatch};
pub use token_reader::{read_oauth_token, TokenReader, TokenResponse};
pub use transport::{
    ConnectionOpener, DirectOpener, EngineFactory, ProxyAgent, ProxyOpener, ReqwestEngineFactory,
    TransportConfig, TransportFactory,
};

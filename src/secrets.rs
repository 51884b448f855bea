use std::fmt;

use serde::{Deserialize, Serialize};

pub trait SecretsProvider {
    fn get_consumer_key_pair<'a>(&'a self) -> (&'a str, &'a str);

    fn get_token_pair_option<'a>(&'a self) -> Option<(&'a str, &'a str)>;

    fn get_token_option_pair<'a>(&'a self) -> (Option<&'a str>, Option<&'a str>) {
        self.get_token_pair_option()
            .map(|s| (Some(s.0), Some(s.1)))
            .unwrap_or_else(|| (None, None))
    }
}

/// An issued OAuth token and its secret.
///
/// Tokens are replaced wholesale; there is no way to mutate one in place.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    identifier: String,
    secret: String,
}

impl Token {
    pub fn new<TId, TSecret>(identifier: TId, secret: TSecret) -> Self
    where
        TId: Into<String>,
        TSecret: Into<String>,
    {
        Token {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// The consumer key and secret issued to the application.
#[derive(Clone, PartialEq, Eq)]
pub struct Consumer {
    key: String,
    secret: String,
}

impl Consumer {
    pub fn new<TKey, TSecret>(key: TKey, secret: TSecret) -> Self
    where
        TKey: Into<String>,
        TSecret: Into<String>,
    {
        Consumer {
            key: key.into(),
            secret: secret.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Pairs the consumer with the token a request is signed under.
    pub fn with_token<'a>(&'a self, token: Option<&'a Token>) -> Secrets<'a> {
        Secrets {
            consumer: self,
            token,
        }
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Borrowed view of everything one signature needs.
#[derive(Debug, Clone, Copy)]
pub struct Secrets<'a> {
    consumer: &'a Consumer,
    token: Option<&'a Token>,
}

impl SecretsProvider for Secrets<'_> {
    fn get_consumer_key_pair<'a>(&'a self) -> (&'a str, &'a str) {
        (&self.consumer.key, &self.consumer.secret)
    }

    fn get_token_pair_option<'a>(&'a self) -> Option<(&'a str, &'a str)> {
        self.token.map(|t| (t.identifier(), t.secret()))
    }
}

use std::borrow::Cow;
use std::convert::TryFrom;
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::{SecretsProvider, SignError, SignResult};
use http::Method;
use oauth1_request::signature_method::{HmacSha1, Plaintext, Sign, SignatureMethod};
use oauth1_request::signer::Signer as OAuthSigner;
use oauth1_request::Options;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use url::Url;

const OAUTH_IDENTIFIER: &str = "oauth_";
const REALM_IDENTIFIER: &str = "realm";
/// Keys the backend writes itself from `Options`.
const PROTOCOL_KEYS: &[&str] = &[
    "oauth_callback",
    "oauth_consumer_key",
    "oauth_nonce",
    "oauth_signature",
    "oauth_signature_method",
    "oauth_timestamp",
    "oauth_token",
    "oauth_verifier",
    "oauth_version",
];
const RFC3986_RESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Signature methods the signing backend can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SignatureMethodKind {
    HmacSha1,
    Plaintext,
}

impl SignatureMethodKind {
    /// The `oauth_signature_method` wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureMethodKind::HmacSha1 => "HMAC-SHA1",
            SignatureMethodKind::Plaintext => "PLAINTEXT",
        }
    }
}

impl Default for SignatureMethodKind {
    fn default() -> Self {
        SignatureMethodKind::HmacSha1
    }
}

impl fmt::Display for SignatureMethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureMethodKind {
    type Err = SignError;

    fn from_str(s: &str) -> SignResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HMAC-SHA1" => Ok(SignatureMethodKind::HmacSha1),
            "PLAINTEXT" => Ok(SignatureMethodKind::Plaintext),
            _ => Err(SignError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl TryFrom<String> for SignatureMethodKind {
    type Error = SignError;

    fn try_from(value: String) -> SignResult<Self> {
        value.parse()
    }
}

impl From<SignatureMethodKind> for String {
    fn from(kind: SignatureMethodKind) -> Self {
        kind.as_str().to_string()
    }
}

#[derive(Debug, Clone)]
pub struct Signer<'a, TSecretsProvider>
where
    TSecretsProvider: SecretsProvider,
{
    secrets: &'a TSecretsProvider,
    parameters: OAuthParameters<'a>,
}

impl<'a, TSecretsProvider> Signer<'a, TSecretsProvider>
where
    TSecretsProvider: SecretsProvider,
{
    pub fn new(secrets: &'a TSecretsProvider, parameters: OAuthParameters<'a>) -> Self {
        Signer {
            secrets,
            parameters,
        }
    }

    /// Builds the `Authorization` header value for a request.
    ///
    /// `url` must not carry a query string; every query and form-body pair
    /// goes into `payload` in urlencoded form instead.
    pub fn generate_signature(
        &self,
        method: &Method,
        url: Url,
        payload: &str,
        is_form_body: bool,
    ) -> String {
        match self.parameters.signature_method {
            SignatureMethodKind::HmacSha1 => {
                self.sign_with(HmacSha1, method, url, payload, is_form_body)
            }
            SignatureMethodKind::Plaintext => {
                self.sign_with(Plaintext, method, url, payload, is_form_body)
            }
        }
    }

    fn sign_with<TSignatureMethod>(
        &self,
        sig_method: TSignatureMethod,
        method: &Method,
        url: Url,
        payload: &str,
        is_form_body: bool,
    ) -> String
    where
        TSignatureMethod: SignatureMethod + Clone,
    {
        let (consumer_key, consumer_secret) = self.secrets.get_consumer_key_pair();
        let (token, token_secret) = self.secrets.get_token_option_pair();
        let options = self.parameters.build_options(token);

        // the backend wants parameters appended in dictionary order, with the
        // oauth_* block inserted where "oauth_" sorts
        let parsed_payload: Vec<(Cow<str>, Cow<str>)> =
            url::form_urlencoded::parse(payload.as_bytes()).collect();
        let oauth_identifier = vec![(Cow::from(OAUTH_IDENTIFIER), Cow::from(""))];
        let mut sorted_query = [parsed_payload, oauth_identifier].concat();
        sorted_query.sort();

        // oauth_* pairs with no slot in `Options` are fed inside the oauth_* block
        let extensions = sorted_query
            .iter()
            .filter(|(k, _)| is_extension_key(k))
            .map(|(k, v)| (double_encode(k), double_encode(v)))
            .collect();
        let sig_method = WithExtensions {
            inner: sig_method,
            extensions,
        };

        let mut divided = sorted_query.splitn(2, |(k, _)| k == &OAUTH_IDENTIFIER);
        let query_before_oauth = divided.next().unwrap_or_default();
        let query_after_oauth = divided.next().unwrap_or_default();

        let mut signer = if is_form_body {
            OAuthSigner::form_with_signature_method(
                sig_method,
                method.as_str(),
                url,
                consumer_secret,
                token_secret,
            )
        } else {
            OAuthSigner::with_signature_method(
                sig_method,
                method.as_str(),
                url,
                consumer_secret,
                token_secret,
            )
        };

        // [a ~ oauth_)
        for (key, value) in query_before_oauth {
            if !key.starts_with(OAUTH_IDENTIFIER) {
                signer.parameter(key, value);
            }
        }
        let mut signer = signer.oauth_parameters(consumer_key, &options);
        // (oauth_ ~ z]
        for (key, value) in query_after_oauth {
            if !key.starts_with(OAUTH_IDENTIFIER) {
                signer.parameter(key, value);
            }
        }

        let sign = signer.finish().authorization;

        if let Some(ref realm) = self.parameters.realm {
            format!("{},{}=\"{}\"", sign, REALM_IDENTIFIER, realm.as_ref())
        } else {
            sign
        }
    }
}

fn is_extension_key(key: &str) -> bool {
    key.starts_with(OAUTH_IDENTIFIER) && !PROTOCOL_KEYS.contains(&key)
}

/// Encoded once for the parameter string and once more for the base string.
fn double_encode(value: &str) -> String {
    let once = utf8_percent_encode(value, RFC3986_RESERVED).to_string();
    utf8_percent_encode(&once, RFC3986_RESERVED).to_string()
}

/// Signature method that splices extra `oauth_*` parameters, such as
/// `oauth_session_handle`, into the base string at their sorted position.
#[derive(Debug, Clone)]
struct WithExtensions<SM> {
    inner: SM,
    /// Sorted by key, already double encoded.
    extensions: Vec<(String, String)>,
}

impl<SM: SignatureMethod> SignatureMethod for WithExtensions<SM> {
    type Sign = ExtensionSign<SM::Sign>;

    fn sign_with(
        self,
        consumer_secret: impl Display,
        token_secret: Option<impl Display>,
    ) -> Self::Sign {
        ExtensionSign {
            inner: self.inner.sign_with(consumer_secret, token_secret),
            pending: self.extensions.into_iter().rev().collect(),
        }
    }
}

struct ExtensionSign<S> {
    inner: S,
    // smallest key last
    pending: Vec<(String, String)>,
}

impl<S: Sign> ExtensionSign<S> {
    /// Runs right after the delimiter preceding `key` was written.
    fn flush_before(&mut self, key: &str) {
        while let Some((k, v)) = self.pending.pop() {
            if k.as_str() >= key {
                self.pending.push((k, v));
                break;
            }
            self.inner.parameter(&k, v);
            self.inner.delimiter();
        }
    }
}

impl<S: Sign> Sign for ExtensionSign<S> {
    type Signature = S::Signature;

    fn get_signature_method_name(&self) -> &'static str {
        self.inner.get_signature_method_name()
    }

    fn request_method(&mut self, method: &str) {
        self.inner.request_method(method);
    }

    fn uri(&mut self, uri: impl Display) {
        self.inner.uri(uri);
    }

    fn parameter(&mut self, key: &str, value: impl Display) {
        self.flush_before(key);
        self.inner.parameter(key, value);
    }

    fn delimiter(&mut self) {
        self.inner.delimiter();
    }

    fn finish(mut self) -> S::Signature {
        while let Some((k, v)) = self.pending.pop() {
            self.inner.delimiter();
            self.inner.parameter(&k, v);
        }
        self.inner.finish()
    }

    fn callback(&mut self, default_key: &'static str, value: impl Display) {
        self.flush_before(default_key);
        self.inner.callback(default_key, value);
    }

    fn consumer_key(&mut self, default_key: &'static str, value: impl Display) {
        self.flush_before(default_key);
        self.inner.consumer_key(default_key, value);
    }

    fn nonce(&mut self, default_key: &'static str, value: impl Display) {
        self.flush_before(default_key);
        self.inner.nonce(default_key, value);
    }

    fn use_nonce(&self) -> bool {
        self.inner.use_nonce()
    }

    fn signature_method(&mut self, default_key: &'static str, default_value: &'static str) {
        self.flush_before(default_key);
        self.inner.signature_method(default_key, default_value);
    }

    fn timestamp(&mut self, default_key: &'static str, value: u64) {
        self.flush_before(default_key);
        self.inner.timestamp(default_key, value);
    }

    fn use_timestamp(&self) -> bool {
        self.inner.use_timestamp()
    }

    fn token(&mut self, default_key: &'static str, value: impl Display) {
        self.flush_before(default_key);
        self.inner.token(default_key, value);
    }

    fn verifier(&mut self, default_key: &'static str, value: impl Display) {
        self.flush_before(default_key);
        self.inner.verifier(default_key, value);
    }

    fn version(&mut self, default_key: &'static str, default_value: &'static str) {
        self.flush_before(default_key);
        self.inner.version(default_key, default_value);
    }
}

/// Per-request protocol parameters handed to the signer.
#[derive(Debug, Clone, Default)]
pub struct OAuthParameters<'a> {
    callback: Option<Cow<'a, str>>,
    nonce: Option<Cow<'a, str>>,
    realm: Option<Cow<'a, str>>,
    signature_method: SignatureMethodKind,
    timestamp: Option<u64>,
    verifier: Option<Cow<'a, str>>,
    version: bool,
}

impl<'a> OAuthParameters<'a> {
    pub fn new() -> Self {
        Default::default()
    }

    /// set the oauth_callback value
    pub fn callback<T>(self, callback: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            callback: Some(callback.into()),
            ..self
        }
    }

    /// set the oauth_nonce value
    pub fn nonce<T>(self, nonce: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            nonce: Some(nonce.into()),
            ..self
        }
    }

    /// set the realm value
    pub fn realm<T>(self, realm: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            realm: Some(realm.into()),
            ..self
        }
    }

    pub fn signature_method(self, signature_method: SignatureMethodKind) -> Self {
        OAuthParameters {
            signature_method,
            ..self
        }
    }

    /// set the oauth_timestamp value
    pub fn timestamp<T>(self, timestamp: T) -> Self
    where
        T: Into<u64>,
    {
        OAuthParameters {
            timestamp: Some(timestamp.into()),
            ..self
        }
    }

    /// set the oauth_verifier value
    pub fn verifier<T>(self, verifier: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            verifier: Some(verifier.into()),
            ..self
        }
    }

    /// When `true`, `oauth_version="1.0"` is sent. OAuth 1.0a allows the
    /// parameter to be omitted, in which case the server assumes 1.0.
    pub fn version<T>(self, version: T) -> Self
    where
        T: Into<bool>,
    {
        OAuthParameters {
            version: version.into(),
            ..self
        }
    }

    fn build_options<'s>(&'s self, token: Option<&'s str>) -> Options<'s> {
        let mut opt = Options::new();

        // NOTE: items must be added by alphabetical order

        if let Some(ref callback) = self.callback {
            opt.callback(callback.as_ref());
        }
        if let Some(ref nonce) = self.nonce {
            opt.nonce(nonce.as_ref());
        }
        if let Some(timestamp) = self.timestamp {
            opt.timestamp(timestamp);
        }
        if let Some(token) = token {
            opt.token(token);
        }
        if let Some(ref verifier) = self.verifier {
            opt.verifier(verifier.as_ref());
        }
        opt.version(self.version);

        opt
    }
}

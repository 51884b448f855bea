// ----------------------------------------------------------------------------
// This source code contains derived artifacts from seanmonstar's `reqwest`.
// for further information(including license information),
// please visit their repository: https://github.com/seanmonstar/reqwest .
// ----------------------------------------------------------------------------
use std::convert::TryFrom;

use http::{header::AUTHORIZATION, header::CONTENT_TYPE, Method};
use reqwest::{
    header::HeaderName, header::HeaderValue, Client as ReqwestClient,
    RequestBuilder as ReqwestRequestBuilder, Url,
};
use serde::Serialize;

use crate::{OAuthParameters, SecretsProvider, Signer};

/// Wraps reqwest's builder and keeps a copy of everything that takes part in
/// the signature base string, so the `Authorization` header can be computed
/// right before sending.
pub(crate) struct RequestBuilder {
    method: Method,
    inner: ReqwestRequestBuilder,
    url: Url,
    form_body: Option<String>,
}

impl RequestBuilder {
    pub(crate) fn new(client: &ReqwestClient, method: Method, url: Url) -> Self {
        RequestBuilder {
            inner: client.request(method.clone(), url.clone()),
            method,
            url,
            form_body: None,
        }
    }

    /// Modify the query string of the URL.
    ///
    /// Appends, never overwrites: repeated keys show up twice.
    pub fn query<T: Serialize + ?Sized>(mut self, query: &T) -> Self {
        {
            let mut pairs = self.url.query_pairs_mut();
            let serializer = serde_urlencoded::Serializer::new(&mut pairs);
            let _ = query.serialize(serializer);
        }
        if let Some("") = self.url.query() {
            self.url.set_query(None);
        }
        self.inner = self.inner.query(query);
        self
    }

    /// Send a form body. Its pairs are part of the signature.
    pub fn form<T: Serialize + ?Sized>(mut self, form: &T) -> Self {
        match serde_urlencoded::to_string(form) {
            Ok(body) => {
                self.inner = self.inner.form(form);
                self.form_body = Some(body);
                self
            }
            // let reqwest surface the serialization error on send
            Err(_) => self.pass_through(|b| b.form(form)),
        }
    }

    /// Send an opaque body. It is not part of the signature.
    pub fn body_with_type(self, body: Vec<u8>, content_type: &str) -> Self {
        self.header(CONTENT_TYPE, content_type)
            .pass_through(|b| b.body(body))
    }

    /// Add a `Header` to this Request.
    pub fn header<K, V>(self, key: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        self.pass_through(|b| b.header(key, value))
    }

    fn pass_through<F>(self, f: F) -> Self
    where
        F: FnOnce(ReqwestRequestBuilder) -> ReqwestRequestBuilder,
    {
        RequestBuilder {
            inner: f(self.inner),
            ..self
        }
    }

    /// Generate the OAuth signature and return reqwest's `RequestBuilder`.
    pub fn sign<T>(self, secrets: &T, parameters: OAuthParameters<'_>) -> ReqwestRequestBuilder
    where
        T: SecretsProvider,
    {
        let mut base_url = self.url;
        let query = base_url
            .query()
            .filter(|q| !q.is_empty())
            .map(str::to_string);
        base_url.set_query(None);

        let is_form_body = self.form_body.is_some();
        let payload = match (query, self.form_body) {
            (Some(q), Some(b)) if !b.is_empty() => format!("{}&{}", q, b),
            (Some(q), _) => q,
            (None, Some(b)) => b,
            (None, None) => String::new(),
        };

        let signature = Signer::new(secrets, parameters).generate_signature(
            &self.method,
            base_url,
            &payload,
            is_form_body,
        );
        self.inner.header(AUTHORIZATION, signature)
    }
}

#[cfg(test)]
mod tests {
    use http::header::AUTHORIZATION;
    use http::Method;
    use url::Url;

    use super::RequestBuilder;
    use crate::{Consumer, OAuthParameters, SignatureMethodKind, Token};

    fn extract_signature(auth_header: &str) -> String {
        let content = auth_header.strip_prefix("OAuth ").unwrap();
        let mapped_header = content
            .split(',')
            .map(|item| item.splitn(2, '=').collect::<Vec<&str>>())
            .filter(|v| v.len() == 2)
            .map(|v| (v[0], v[1]))
            .collect::<Vec<(&str, &str)>>();
        let sig_content = mapped_header.iter().find(|(k, _)| k == &"oauth_signature");
        percent_encoding::percent_decode_str(sig_content.unwrap().1.trim_matches('"'))
            .decode_utf8_lossy()
            .to_string()
    }

    fn builder(method: Method, endpoint: &str) -> RequestBuilder {
        RequestBuilder::new(
            &reqwest::Client::new(),
            method,
            Url::parse(endpoint).unwrap(),
        )
    }

    #[test]
    fn sign_request_token_call() {
        // https://tools.ietf.org/html/rfc5849
        let consumer = Consumer::new("dpf43f3p2l4k3l03", "kd94hf93k423kf44");
        let params = OAuthParameters::new()
            .nonce("wIjqoS")
            .timestamp(137_131_200u64)
            .callback("http://printer.example.com/ready")
            .realm("photos");

        let req = builder(Method::POST, "https://photos.example.net/initiate")
            .sign(&consumer.with_token(None), params)
            .build()
            .unwrap();

        let sign = req.headers().get(AUTHORIZATION).unwrap().to_str().unwrap();
        assert!(sign.ends_with(",realm=\"photos\""));
        assert_eq!(extract_signature(sign), "74KNZJeDHnMBp0EMJ9ZHt/XKycU=");
    }

    #[test]
    fn sign_get_with_query() {
        // https://tools.ietf.org/html/rfc5849
        let consumer = Consumer::new("dpf43f3p2l4k3l03", "kd94hf93k423kf44");
        let token = Token::new("nnch734d00sl2jdk", "pfkkdhi9sl3r4s00");
        let params = OAuthParameters::new()
            .nonce("chapoH")
            .timestamp(137_131_202u64)
            .realm("Photos");

        let req = builder(
            Method::GET,
            "http://photos.example.net/photos?file=vacation.jpg&size=original",
        )
        .sign(&consumer.with_token(Some(&token)), params)
        .build()
        .unwrap();

        assert_eq!(req.url().query(), Some("file=vacation.jpg&size=original"));
        let sign = req.headers().get(AUTHORIZATION).unwrap().to_str().unwrap();
        assert_eq!(extract_signature(sign), "MdpQcU8iPSUjWoN/UDMsK2sui9I=");
    }

    #[test]
    fn query_appends_to_captured_url() {
        let req = builder(Method::GET, "https://photos.example.net/photos")
            .query(&[("file", "vacation.jpg")])
            .query(&[("size", "original")]);
        assert_eq!(req.url.query(), Some("file=vacation.jpg&size=original"));

        let req = builder(Method::GET, "https://photos.example.net/photos")
            .query(&Vec::<(&str, &str)>::new());
        assert_eq!(req.url.query(), None);
    }

    #[test]
    fn sign_post_form_body() {
        // https://developer.twitter.com/ja/docs/basics/authentication/guides/creating-a-signature
        let consumer = Consumer::new(
            "xvz1evFS4wEEPTGEFPHBog",
            "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw",
        );
        let token = Token::new(
            "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb",
            "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE",
        );
        let params = OAuthParameters::new()
            .nonce("kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg")
            .timestamp(1_318_622_958u64)
            .version(true);

        let req = builder(
            Method::POST,
            "https://api.twitter.com/1.1/statuses/update.json",
        )
        .form(&[
            ("include_entities", "true"),
            (
                "status",
                "Hello Ladies + Gentlemen, a signed OAuth request!",
            ),
        ]);
        assert_eq!(
            req.form_body.as_deref(),
            Some("include_entities=true&status=Hello+Ladies+%2B+Gentlemen%2C+a+signed+OAuth+request%21")
        );

        let req = req
            .sign(&consumer.with_token(Some(&token)), params)
            .build()
            .unwrap();
        let sign = req.headers().get(AUTHORIZATION).unwrap().to_str().unwrap();
        assert!(sign.contains("oauth_version=\"1.0\""));
        assert_eq!(extract_signature(sign), "hCtSmYh+iHYCEqBWrE7C7hYmtUk=");
    }

    fn sign_refresh(form: &[(&str, &str)]) -> String {
        let consumer = Consumer::new("consumer-key", "consumer-secret");
        let token = Token::new("acc", "accs");
        let params = OAuthParameters::new()
            .nonce("nonce123")
            .timestamp(1_700_000_000u64)
            .version(true);

        let req = builder(Method::POST, "https://api.example.com/oauth/AccessToken")
            .form(form)
            .sign(&consumer.with_token(Some(&token)), params)
            .build()
            .unwrap();
        let sign = req.headers().get(AUTHORIZATION).unwrap().to_str().unwrap();
        // travels in the body only
        assert!(!sign.contains("oauth_session_handle"));
        extract_signature(sign)
    }

    #[test]
    fn session_handle_is_part_of_the_signature() {
        assert_eq!(
            sign_refresh(&[("oauth_session_handle", "SESH1")]),
            "UiJzyzHZbp9Gw0so7JewP5DwjT8="
        );
        assert_eq!(
            sign_refresh(&[("oauth_session_handle", "SESH/1 +x")]),
            "KHMZ/QUQvewSWlSFPh2gybww1yQ="
        );
        assert_eq!(
            sign_refresh(&[("a", "1"), ("oauth_session_handle", "SESH1"), ("z", "2")]),
            "bRu8L+sm7JnAou7jMM2Abam++kU="
        );
        assert_ne!(
            sign_refresh(&[("oauth_session_handle", "SESH1")]),
            sign_refresh(&[("oauth_session_handle", "OTHER")])
        );
    }

    #[test]
    fn protocol_keys_in_payload_are_not_signed_twice() {
        assert_eq!(
            sign_refresh(&[("oauth_nonce", "ignored")]),
            sign_refresh(&[])
        );
    }

    #[test]
    fn plaintext_signature_is_the_joined_secrets() {
        let consumer = Consumer::new("dpf43f3p2l4k3l03", "kd94hf93k423kf44");
        let token = Token::new("nnch734d00sl2jdk", "pfkkdhi9sl3r4s00");
        let params = OAuthParameters::new()
            .nonce("chapoH")
            .timestamp(137_131_202u64)
            .signature_method(SignatureMethodKind::Plaintext);

        let req = builder(Method::GET, "https://photos.example.net/photos")
            .sign(&consumer.with_token(Some(&token)), params)
            .build()
            .unwrap();

        let sign = req.headers().get(AUTHORIZATION).unwrap().to_str().unwrap();
        assert!(sign.contains("oauth_signature_method=\"PLAINTEXT\""));
        assert_eq!(extract_signature(sign), "kd94hf93k423kf44&pfkkdhi9sl3r4s00");
    }

    #[test]
    fn opaque_body_is_not_signed_as_form() {
        let consumer = Consumer::new("ck", "cs");
        let req = builder(Method::PUT, "https://api.example.com/Invoices")
            .body_with_type(b"{\"Name\":\"x\"}".to_vec(), "application/json");
        assert!(req.form_body.is_none());

        let req = req
            .sign(&consumer.with_token(None), OAuthParameters::new())
            .build()
            .unwrap();
        assert_eq!(
            req.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert!(req.headers().get(AUTHORIZATION).is_some());
    }
}

//! Test helpers: a mock identity provider serving a JWK set and minting tokens.

use std::time::SystemTime;

use jsonwebtoken::{
    jwk::{
        AlgorithmParameters, CommonParameters, Jwk, JwkSet, KeyAlgorithm, PublicKeyUse,
        RSAKeyParameters, RSAKeyType,
    },
    Algorithm, EncodingKey, Header,
};
use openssl::{pkey::Private, rsa::Rsa};
use serde_json::{json, Value};
use url::Url;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::config::AuthConfig;

pub(crate) const DOMAIN: &str = "coffee.test";
pub(crate) const AUDIENCE: &str = "coffeeshop";

pub(crate) fn now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

pub(crate) struct MockIdentityProvider {
    server: MockServer,
    kid: String,
    rsa_private_key: Rsa<Private>,
    jwk_set: JwkSet,
}

impl MockIdentityProvider {
    pub(crate) async fn start() -> MockIdentityProvider {
        let rsa_private_key = Rsa::generate(2048).unwrap();
        let kid = "42".to_string();

        let jwk = Jwk {
            common: CommonParameters {
                public_key_use: Some(PublicKeyUse::Signature),
                key_algorithm: Some(KeyAlgorithm::RS256),
                key_id: Some(kid.clone()),
                ..CommonParameters::default()
            },
            algorithm: AlgorithmParameters::RSA(RSAKeyParameters {
                key_type: RSAKeyType::RSA,
                n: base64_url::encode(&rsa_private_key.n().to_vec()),
                e: base64_url::encode(&rsa_private_key.e().to_vec()),
            }),
        };
        let jwk_set = JwkSet { keys: vec![jwk] };

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&jwk_set))
            .mount(&server)
            .await;

        MockIdentityProvider {
            server,
            kid,
            rsa_private_key,
            jwk_set,
        }
    }

    pub(crate) fn kid(&self) -> &str {
        &self.kid
    }

    pub(crate) fn jwks_url(&self) -> Url {
        Url::parse(&self.server.uri())
            .unwrap()
            .join(".well-known/jwks.json")
            .unwrap()
    }

    /// The served key set, for verifiers that should not touch the network.
    pub(crate) fn jwk_set(&self) -> JwkSet {
        self.jwk_set.clone()
    }

    /// Tokens are issued for `https://coffee.test/`; keys come from the mock server.
    pub(crate) fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(DOMAIN, AUDIENCE)
            .unwrap()
            .with_jwks_url(self.jwks_url())
    }

    pub(crate) async fn jwks_requests(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or_default()
    }

    pub(crate) fn public_key_pem(&self) -> Vec<u8> {
        self.rsa_private_key.public_key_to_pem().unwrap()
    }

    /// Valid, unexpired claims carrying the given permissions.
    pub(crate) fn claims(permissions: &[&str]) -> Value {
        let issued_at = now();
        json!({
            "sub": "auth0|barista",
            "aud": AUDIENCE,
            "iss": format!("https://{DOMAIN}/"),
            "iat": issued_at,
            "exp": issued_at + 3600,
            "permissions": permissions,
        })
    }

    /// Signs `claims` with RS256 under this provider's `kid`.
    pub(crate) fn token(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        self.token_with_header(header, claims)
    }

    pub(crate) fn token_with_header(&self, header: Header, claims: &Value) -> String {
        jsonwebtoken::encode(
            &header,
            claims,
            &EncodingKey::from_rsa_der(&self.rsa_private_key.private_key_to_der().unwrap()),
        )
        .unwrap()
    }
}

use jsonwebtoken::{
    decode,
    errors::{Error as JwtError, ErrorKind},
    jwk::AlgorithmParameters,
    DecodingKey, Validation,
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    config::AuthConfig, key_source::KeySource, remote_jwk_set::RemoteJwkSet, AuthError, Claims,
    JwksError,
};

/// Verifies bearer tokens against the identity provider's keys and the configured audience and issuer.
#[derive(Clone)]
pub struct TokenVerifier {
    keys: KeySource,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig, keys: impl Into<KeySource>) -> Self {
        let mut validation = Validation::new(jsonwebtoken::Algorithm::RS256);
        validation.algorithms = config.algorithms().to_vec();
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_audience(&[config.audience()]);
        validation.set_issuer(&[config.issuer()]);
        validation.set_required_spec_claims(&["exp", "aud", "iss"]);

        Self {
            keys: keys.into(),
            validation,
        }
    }

    /// A verifier that fetches keys from `config.jwks_url()`, honouring the configured timeout, cache and rate
    /// limit.
    pub fn from_config(config: &AuthConfig) -> Result<Self, JwksError> {
        let mut builder = RemoteJwkSet::builder(config.jwks_url().clone())
            .with_timeout(config.jwks_timeout())
            .with_min_refresh_interval(config.jwks_min_refresh_interval());
        if let Some(time_to_live) = config.jwks_cache_ttl() {
            builder = builder.with_cache(time_to_live);
        }
        if let Some((num, per)) = config.jwks_rate_limit() {
            builder = builder.with_rate_limit(num, per);
        }
        Ok(Self::new(config, builder.build()?))
    }

    /// Checks the token's signature and standard claims and returns its claims.
    ///
    /// Steps run in order and the first failure wins: `kid` from the unverified header, key lookup, RS256 signature,
    /// then expiry, audience and issuer.
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let kid = unverified_kid(token)?.ok_or_else(AuthError::missing_kid)?;

        let jwk = self
            .keys
            .signing_key(&kid)
            .await
            .map_err(|err| {
                warn!(error = %err, "failed to retrieve JWK set");
                AuthError::from(err)
            })?
            .ok_or_else(|| {
                debug!(kid = %kid, "no signing key matches the token");
                AuthError::no_matching_key()
            })?;

        let decoding_key = match jwk.algorithm {
            AlgorithmParameters::RSA(ref rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
                .map_err(|_| AuthError::unparseable_token()),
            _ => Err(AuthError::unparseable_token()),
        }?;

        let token = decode::<Claims>(token, &decoding_key, &self.validation).map_err(|err| {
            debug!(error = %err, "token rejected");
            classify(&err)
        })?;
        Ok(token.claims)
    }
}

#[derive(Deserialize)]
struct UnverifiedHeader {
    kid: Option<String>,
}

/// Reads `kid` from the header segment without looking at `alg`; the algorithm is checked by `decode`.
fn unverified_kid(token: &str) -> Result<Option<String>, AuthError> {
    let segment = token.split_once('.').map_or(token, |(header, _)| header);
    let header = base64_url::decode(segment)
        .ok()
        .and_then(|json| serde_json::from_slice::<UnverifiedHeader>(&json).ok())
        .ok_or_else(|| {
            debug!("undecodable token header");
            AuthError::unparseable_token()
        })?;
    Ok(header.kid)
}

fn classify(err: &JwtError) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::token_expired(),
        ErrorKind::InvalidAudience
        | ErrorKind::InvalidIssuer
        | ErrorKind::ImmatureSignature
        | ErrorKind::MissingRequiredClaim(_) => AuthError::invalid_claims(),
        _ => AuthError::unparseable_token(),
    }
}

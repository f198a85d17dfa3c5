use std::sync::Arc;

use jsonwebtoken::jwk::{Jwk, JwkSet, PublicKeyUse};

use crate::{remote_jwk_set::RemoteJwkSet, JwksError};

/// Where the verifier looks up signing keys.
#[derive(Clone)]
pub enum KeySource {
    /// Keys fixed at startup; lookups never touch the network.
    Fixed(Arc<JwkSet>),
    Remote(RemoteJwkSet),
}

impl KeySource {
    /// Finds the key with the given `kid`, ignoring keys published for encryption only.
    pub async fn signing_key(&self, kid: &str) -> Result<Option<Jwk>, JwksError> {
        let jwk = match self {
            KeySource::Fixed(jwk_set) => jwk_set.find(kid).cloned(),
            KeySource::Remote(remote_jwk_set) => remote_jwk_set.find(kid).await?,
        };
        Ok(jwk.filter(is_signing_key))
    }
}

fn is_signing_key(jwk: &Jwk) -> bool {
    !matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption))
}

impl From<JwkSet> for KeySource {
    fn from(jwk_set: JwkSet) -> Self {
        KeySource::Fixed(Arc::new(jwk_set))
    }
}

impl From<RemoteJwkSet> for KeySource {
    fn from(remote_jwk_set: RemoteJwkSet) -> Self {
        KeySource::Remote(remote_jwk_set)
    }
}

#[cfg(test)]
mod test {
    use jsonwebtoken::jwk::PublicKeyUse;

    use super::KeySource;
    use crate::testing::MockIdentityProvider;
    use crate::RemoteJwkSet;

    #[tokio::test]
    async fn test_fixed_keys_are_found_by_kid() {
        let provider = MockIdentityProvider::start().await;
        let keys = KeySource::from(provider.jwk_set());

        assert!(keys.signing_key(provider.kid()).await.unwrap().is_some());
        assert!(keys.signing_key("unknown").await.unwrap().is_none());
        assert_eq!(provider.jwks_requests().await, 0);
    }

    #[tokio::test]
    async fn test_encryption_keys_are_skipped() {
        let provider = MockIdentityProvider::start().await;
        let mut jwk_set = provider.jwk_set();
        jwk_set.keys[0].common.public_key_use = Some(PublicKeyUse::Encryption);

        let keys = KeySource::from(jwk_set);
        assert!(keys.signing_key(provider.kid()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remote_keys_are_fetched() {
        let provider = MockIdentityProvider::start().await;
        let keys = KeySource::from(RemoteJwkSet::builder(provider.jwks_url()).build().unwrap());

        assert!(keys.signing_key(provider.kid()).await.unwrap().is_some());
        assert_eq!(provider.jwks_requests().await, 1);
    }
}

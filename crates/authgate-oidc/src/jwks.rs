//! Provider signing-key retrieval.
//!
//! Fetches the provider's JSON Web Key Set and turns its entries into
//! decoding keys for ID-token signature validation. Keys are fetched fresh
//! when needed; a failed fetch fails the login attempt.

use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::{JwkSet, PublicKeyUse};
use url::Url;

use crate::error::OidcError;

/// Fetches signing keys from a provider's JWKS endpoint.
#[derive(Debug)]
pub struct JwksClient {
    http_client: reqwest::Client,
}

impl JwksClient {
    /// Creates a client using the given HTTP transport.
    #[must_use]
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Returns the decoding key with the given key id.
    ///
    /// # Errors
    ///
    /// - [`OidcError::ProviderUnreachable`] when the key set cannot be
    ///   fetched
    /// - [`OidcError::InvalidIdToken`] when no key with that id exists or
    ///   the key is unusable
    pub async fn key_for(&self, jwks_uri: &Url, kid: &str) -> Result<DecodingKey, OidcError> {
        let jwks = self.fetch(jwks_uri).await?;

        let jwk = jwks
            .keys
            .iter()
            .find(|k| k.common.key_id.as_deref() == Some(kid))
            .ok_or_else(|| {
                OidcError::InvalidIdToken(format!(
                    "no signing key with kid '{kid}' in provider key set"
                ))
            })?;

        DecodingKey::from_jwk(jwk)
            .map_err(|e| OidcError::InvalidIdToken(format!("unusable signing key '{kid}': {e}")))
    }

    /// Returns all signing keys in the set, for tokens without a `kid`
    /// header. Encryption keys are excluded.
    ///
    /// # Errors
    ///
    /// - [`OidcError::ProviderUnreachable`] when the key set cannot be
    ///   fetched
    /// - [`OidcError::InvalidIdToken`] when the set holds no usable signing
    ///   key
    pub async fn signing_keys(&self, jwks_uri: &Url) -> Result<Vec<DecodingKey>, OidcError> {
        let jwks = self.fetch(jwks_uri).await?;

        let keys: Vec<DecodingKey> = jwks
            .keys
            .iter()
            .filter(|k| !matches!(&k.common.public_key_use, Some(PublicKeyUse::Encryption)))
            .filter_map(|jwk| DecodingKey::from_jwk(jwk).ok())
            .collect();

        if keys.is_empty() {
            Err(OidcError::InvalidIdToken(
                "no usable signing keys in provider key set".to_string(),
            ))
        } else {
            tracing::debug!("Found {} signing keys from {}", keys.len(), jwks_uri);
            Ok(keys)
        }
    }

    async fn fetch(&self, jwks_uri: &Url) -> Result<JwkSet, OidcError> {
        tracing::debug!("Fetching provider key set from {}", jwks_uri);

        let response = self
            .http_client
            .get(jwks_uri.as_str())
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Failed to fetch key set from {}: {}", jwks_uri, e);
                OidcError::unreachable(jwks_uri.as_str(), e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(OidcError::unreachable(
                jwks_uri.as_str(),
                format!("HTTP {}", response.status().as_u16()),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| OidcError::InvalidIdToken(format!("failed to parse provider key set: {e}")))
    }
}

//! Provider metadata resolution.
//!
//! Fetches the identity provider's endpoint set from its
//! `.well-known/openid-configuration` document and verifies that the
//! document's declared issuer matches the configured one. Resolution is
//! fresh per login flow; correctness never depends on caching.
//!
//! # References
//!
//! - [OpenID Connect Discovery 1.0](https://openid.net/specs/openid-connect-discovery-1_0.html)

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::OidcError;

/// Provider metadata from the `.well-known/openid-configuration` document.
///
/// Only the fields this module consumes are typed; unknown fields are
/// ignored on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// URL the provider asserts as its issuer identifier.
    pub issuer: String,

    /// URL of the provider's authorization endpoint.
    pub authorization_endpoint: String,

    /// URL of the provider's token endpoint.
    pub token_endpoint: String,

    /// URL of the provider's JSON Web Key Set document.
    pub jwks_uri: String,

    /// URL of the provider's userinfo endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,

    /// Scope values the provider supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    /// OAuth 2.0 `response_type` values the provider supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_types_supported: Option<Vec<String>>,

    /// Subject identifier types the provider supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_types_supported: Option<Vec<String>>,

    /// JWS algorithms the provider can sign ID tokens with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token_signing_alg_values_supported: Option<Vec<String>>,

    /// OAuth 2.0 grant types the provider supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_types_supported: Option<Vec<String>>,
}

/// Resolves provider metadata from an issuer URI.
#[derive(Debug)]
pub struct MetadataResolver {
    http_client: reqwest::Client,
}

impl MetadataResolver {
    /// Creates a resolver using the given HTTP client.
    #[must_use]
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Fetches and validates the provider metadata for an issuer.
    ///
    /// # Errors
    ///
    /// - [`OidcError::ProviderUnreachable`] when the document cannot be
    ///   fetched (network failure or non-success HTTP status)
    /// - [`OidcError::InvalidProviderMetadata`] when the document does not
    ///   parse
    /// - [`OidcError::IssuerMismatch`] when the declared issuer differs from
    ///   the requested one
    pub async fn resolve(&self, issuer: &Url) -> Result<ProviderMetadata, OidcError> {
        let discovery_url = discovery_url(issuer);
        tracing::debug!("Retrieving provider metadata from {}", discovery_url);

        let response = self
            .http_client
            .get(discovery_url.as_str())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Failed to fetch provider metadata from {}: {}", issuer, e);
                OidcError::unreachable(discovery_url.as_str(), e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(OidcError::unreachable(
                discovery_url.as_str(),
                format!("HTTP {}", response.status().as_u16()),
            ));
        }

        let metadata: ProviderMetadata = response.json().await.map_err(|e| {
            tracing::warn!("Failed to parse provider metadata from {}: {}", issuer, e);
            OidcError::InvalidProviderMetadata(e.to_string())
        })?;

        validate_issuer(&metadata, issuer)?;

        tracing::debug!("Resolved provider metadata for {}", metadata.issuer);
        Ok(metadata)
    }
}

/// Builds the discovery URL for an issuer:
/// `{issuer}/.well-known/openid-configuration`.
fn discovery_url(issuer: &Url) -> Url {
    let mut discovery_url = issuer.clone();
    let path = issuer.path().trim_end_matches('/');
    discovery_url.set_path(&format!("{}/.well-known/openid-configuration", path));
    discovery_url
}

/// The issuer returned in the document must be identical to the issuer the
/// document was retrieved for (trailing slashes disregarded).
fn validate_issuer(metadata: &ProviderMetadata, expected: &Url) -> Result<(), OidcError> {
    let expected_normalized = expected.as_str().trim_end_matches('/');
    let declared_normalized = metadata.issuer.trim_end_matches('/');

    if expected_normalized != declared_normalized {
        return Err(OidcError::issuer_mismatch(
            expected_normalized,
            declared_normalized,
        ));
    }

    Ok(())
}

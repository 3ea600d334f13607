//! Authorization-code exchange and ID-token validation.
//!
//! The exchange is a confidential-client token request: HTTP Basic client
//! authentication against the provider's token endpoint with the
//! `authorization_code` grant. A rejection with an OAuth error code, a
//! rejection without one, and a transport failure all surface as distinct
//! errors so operators can tell a misconfigured client from an unreachable
//! provider.
//!
//! When a signing algorithm is configured, the returned ID token must pass
//! signature, issuer and audience validation (expiry too, when present)
//! before any claim is trusted. Without a configured algorithm the claims
//! are parsed unverified; see the configuration docs for the trust
//! implications.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use serde::Deserialize;
use url::Url;

use crate::callback::AuthorizationCode;
use crate::claims::ClaimsBundle;
use crate::discovery::ProviderMetadata;
use crate::error::OidcError;
use crate::jwks::JwksClient;

/// Clock skew tolerated when checking ID-token time claims.
const CLOCK_SKEW_LEEWAY_SECS: u64 = 60;

/// Tokens returned by the provider's token endpoint.
///
/// `claims` holds the claims asserted by the ID token, validated when a
/// signing algorithm is configured.
#[derive(Debug, Clone)]
pub struct TokenSet {
    /// Bearer token for the userinfo endpoint.
    pub access_token: String,

    /// The raw ID token (JWT).
    pub id_token: String,

    /// Optional refresh token. Unused by this module.
    pub refresh_token: Option<String>,

    /// Access-token lifetime in seconds, as reported by the provider.
    pub expires_in: Option<u64>,

    /// Claims asserted by the ID token.
    pub claims: ClaimsBundle,
}

/// Wire format of a successful token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    id_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

/// Wire format of an OAuth error object. Only the code is consulted;
/// unknown fields (descriptions, URIs) are ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct OAuthErrorBody {
    pub(crate) error: String,
}

/// Exchanges authorization codes for validated token sets.
#[derive(Debug)]
pub struct TokenExchanger {
    http_client: reqwest::Client,
    client_id: String,
    client_secret: Option<String>,
    signing_algorithm: Option<Algorithm>,
    jwks: JwksClient,
}

impl TokenExchanger {
    /// Creates an exchanger for the given client credentials.
    ///
    /// `signing_algorithm` of `None` disables ID-token signature validation.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        client_id: impl Into<String>,
        client_secret: Option<String>,
        signing_algorithm: Option<Algorithm>,
    ) -> Self {
        let jwks = JwksClient::new(http_client.clone());
        Self {
            http_client,
            client_id: client_id.into(),
            client_secret,
            signing_algorithm,
            jwks,
        }
    }

    /// Exchanges an authorization code for tokens at the token endpoint.
    ///
    /// The code is consumed exactly once; a failed exchange requires a new
    /// login attempt from the start.
    ///
    /// # Errors
    ///
    /// - [`OidcError::TokenExchangeFailed`] when the endpoint rejects the
    ///   request with an OAuth error code
    /// - [`OidcError::ProviderUnreachable`] when the endpoint cannot be
    ///   reached, or answers an error without an OAuth error code
    /// - [`OidcError::InvalidProviderResponse`] when a successful response
    ///   does not parse
    /// - [`OidcError::InvalidIdToken`] when ID-token validation fails
    pub async fn exchange(
        &self,
        code: &AuthorizationCode,
        callback_url: &str,
        metadata: &ProviderMetadata,
    ) -> Result<TokenSet, OidcError> {
        tracing::debug!(
            "Retrieving tokens from token endpoint {}",
            metadata.token_endpoint
        );

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", callback_url),
        ];

        let response = self
            .http_client
            .post(&metadata.token_endpoint)
            .basic_auth(
                &self.client_id,
                Some(self.client_secret.as_deref().unwrap_or("")),
            )
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Token request to {} failed: {}", metadata.token_endpoint, e);
                OidcError::unreachable(&metadata.token_endpoint, e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();

            return Err(match serde_json::from_str::<OAuthErrorBody>(&body) {
                Ok(oauth_error) => OidcError::TokenExchangeFailed {
                    error_code: oauth_error.error,
                },
                // A rejection without an OAuth error code usually means the
                // request never reached the provider itself.
                Err(_) => OidcError::unreachable(
                    &metadata.token_endpoint,
                    format!("token endpoint returned HTTP {status} with no OAuth error code"),
                ),
            });
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| OidcError::InvalidProviderResponse(format!("token response: {e}")))?;

        let claims = match self.signing_algorithm {
            Some(algorithm) => {
                self.validate_id_token(&token_response.id_token, algorithm, metadata)
                    .await?
            }
            None => decode_unverified(&token_response.id_token)?,
        };

        Ok(TokenSet {
            access_token: token_response.access_token,
            id_token: token_response.id_token,
            refresh_token: token_response.refresh_token,
            expires_in: token_response.expires_in,
            claims,
        })
    }

    /// Validates the ID token's signature, issuer and audience against the
    /// provider's key set and returns its claims.
    async fn validate_id_token(
        &self,
        id_token: &str,
        algorithm: Algorithm,
        metadata: &ProviderMetadata,
    ) -> Result<ClaimsBundle, OidcError> {
        tracing::debug!(
            "Validating ID token with {:?} and key set from {}",
            algorithm,
            metadata.jwks_uri
        );

        let header = decode_header(id_token)
            .map_err(|e| OidcError::InvalidIdToken(format!("unreadable header: {e}")))?;
        let jwks_uri = Url::parse(&metadata.jwks_uri)
            .map_err(|e| OidcError::InvalidProviderMetadata(format!("jwks_uri: {e}")))?;

        let candidates = match header.kid.as_deref() {
            Some(kid) => vec![self.jwks.key_for(&jwks_uri, kid).await?],
            None => self.jwks.signing_keys(&jwks_uri).await?,
        };

        let mut validation = Validation::new(algorithm);
        validation.set_required_spec_claims(&["iss", "aud"]);
        validation.set_audience(&[&self.client_id]);
        validation.set_issuer(&[metadata.issuer.trim_end_matches('/')]);
        validation.leeway = CLOCK_SKEW_LEEWAY_SECS;

        let mut last_error = None;
        for key in &candidates {
            match decode::<ClaimsBundle>(id_token, key, &validation) {
                Ok(data) => {
                    tracing::debug!("Validated ID token for subject {}", data.claims.sub);
                    return Ok(data.claims);
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(OidcError::InvalidIdToken(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no signing keys available".to_string()),
        ))
    }
}

/// Parses ID-token claims without signature verification.
///
/// Used only when no signing algorithm is configured; the claims are
/// trusted as transported.
fn decode_unverified(id_token: &str) -> Result<ClaimsBundle, OidcError> {
    let mut parts = id_token.split('.');
    let (Some(_header), Some(payload)) = (parts.next(), parts.next()) else {
        return Err(OidcError::InvalidIdToken("not a JWT".to_string()));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| OidcError::InvalidIdToken(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| OidcError::InvalidIdToken(format!("claims are not valid JSON: {e}")))
}

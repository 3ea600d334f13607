//! Userinfo claim resolution.
//!
//! The ID token's claims are usually sufficient. A supplementary lookup at
//! the provider's userinfo endpoint happens only when the claims needed for
//! identity derivation are missing: no display-name material, or (with group
//! sync enabled) no groups claim. A successful lookup replaces the bundle
//! entirely; there is no claim-by-claim merge.

use crate::claims::ClaimsBundle;
use crate::discovery::ProviderMetadata;
use crate::error::OidcError;
use crate::token::{OAuthErrorBody, TokenSet};

/// Resolves the claims bundle for a login attempt, consulting the userinfo
/// endpoint when the ID token alone is not enough.
#[derive(Debug)]
pub struct UserInfoResolver {
    http_client: reqwest::Client,
    sync_groups: bool,
    groups_claim: String,
}

impl UserInfoResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        sync_groups: bool,
        groups_claim: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            sync_groups,
            groups_claim: groups_claim.into(),
        }
    }

    /// Returns the claims to derive the identity from.
    ///
    /// # Errors
    ///
    /// - [`OidcError::UserInfoFailed`] when the userinfo endpoint rejects
    ///   the lookup with an OAuth error code
    /// - [`OidcError::ProviderUnreachable`] on IO failure, or when the
    ///   endpoint errors without an OAuth error code
    /// - [`OidcError::InvalidProviderMetadata`] when a lookup is needed but
    ///   the provider metadata has no userinfo endpoint
    /// - [`OidcError::InvalidProviderResponse`] when a successful response
    ///   does not parse
    pub async fn resolve(
        &self,
        tokens: &TokenSet,
        metadata: &ProviderMetadata,
    ) -> Result<ClaimsBundle, OidcError> {
        if !self.needs_lookup(&tokens.claims) {
            return Ok(tokens.claims.clone());
        }

        let endpoint = metadata.userinfo_endpoint.as_deref().ok_or_else(|| {
            OidcError::InvalidProviderMetadata("no userinfo_endpoint in provider metadata".to_string())
        })?;

        tracing::debug!("Retrieving user info from {}", endpoint);

        let response = self
            .http_client
            .get(endpoint)
            .bearer_auth(&tokens.access_token)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("UserInfo request to {} failed: {}", endpoint, e);
                OidcError::unreachable(endpoint, e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();

            return Err(match serde_json::from_str::<OAuthErrorBody>(&body) {
                Ok(oauth_error) => OidcError::UserInfoFailed {
                    error_code: oauth_error.error,
                },
                Err(_) => OidcError::unreachable(
                    endpoint,
                    format!("userinfo endpoint returned HTTP {status} with no OAuth error code"),
                ),
            });
        }

        let claims: ClaimsBundle = response
            .json()
            .await
            .map_err(|e| OidcError::InvalidProviderResponse(format!("userinfo response: {e}")))?;

        tracing::debug!("User info resolved for subject {}", claims.sub);
        Ok(claims)
    }

    /// The ID-token claims are insufficient when no display-name material is
    /// present, or when group sync needs a claim the token does not carry.
    fn needs_lookup(&self, claims: &ClaimsBundle) -> bool {
        let nameless = claims.name.is_none() && claims.preferred_username.is_none();
        let groupless = self.sync_groups && !claims.has_claim(&self.groups_claim);
        nameless || groupless
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn metadata_for(server_uri: &str) -> ProviderMetadata {
        serde_json::from_value(serde_json::json!({
            "issuer": server_uri,
            "authorization_endpoint": format!("{server_uri}/auth"),
            "token_endpoint": format!("{server_uri}/token"),
            "userinfo_endpoint": format!("{server_uri}/userinfo"),
            "jwks_uri": format!("{server_uri}/certs")
        }))
        .unwrap()
    }

    fn metadata_without_userinfo(server_uri: &str) -> ProviderMetadata {
        serde_json::from_value(serde_json::json!({
            "issuer": server_uri,
            "authorization_endpoint": format!("{server_uri}/auth"),
            "token_endpoint": format!("{server_uri}/token"),
            "jwks_uri": format!("{server_uri}/certs")
        }))
        .unwrap()
    }

    fn token_set(claims: serde_json::Value) -> TokenSet {
        TokenSet {
            access_token: "at-123".to_string(),
            id_token: "unused".to_string(),
            refresh_token: None,
            expires_in: None,
            claims: serde_json::from_value(claims).unwrap(),
        }
    }

    fn resolver(sync_groups: bool) -> UserInfoResolver {
        UserInfoResolver::new(reqwest::Client::new(), sync_groups, "groups")
    }

    #[tokio::test]
    async fn test_id_token_claims_suffice() {
        // No mock server: any network call would fail the test.
        let tokens = token_set(serde_json::json!({
            "sub": "user-1",
            "name": "John Doo"
        }));

        let claims = resolver(false)
            .resolve(&tokens, &metadata_for("http://127.0.0.1:9"))
            .await
            .unwrap();

        assert_eq!(claims.name.as_deref(), Some("John Doo"));
    }

    #[tokio::test]
    async fn test_lookup_when_display_name_material_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer at-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sub": "user-1",
                "name": "John Doo",
                "email": "john.doo@acme.com"
            })))
            .mount(&server)
            .await;

        let tokens = token_set(serde_json::json!({ "sub": "user-1" }));

        let claims = resolver(false)
            .resolve(&tokens, &metadata_for(&server.uri()))
            .await
            .unwrap();

        assert_eq!(claims.name.as_deref(), Some("John Doo"));
        assert_eq!(claims.email.as_deref(), Some("john.doo@acme.com"));
    }

    #[tokio::test]
    async fn test_lookup_replaces_claims_entirely() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sub": "user-1",
                "name": "From Lookup"
            })))
            .mount(&server)
            .await;

        // Email present in the ID token but absent from the lookup response:
        // it must not survive the substitution.
        let tokens = token_set(serde_json::json!({
            "sub": "user-1",
            "email": "token-only@acme.com"
        }));

        let claims = resolver(false)
            .resolve(&tokens, &metadata_for(&server.uri()))
            .await
            .unwrap();

        assert_eq!(claims.name.as_deref(), Some("From Lookup"));
        assert!(claims.email.is_none());
    }

    #[tokio::test]
    async fn test_lookup_when_groups_claim_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sub": "user-1",
                "name": "John Doo",
                "groups": ["admins"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        // Name present, but group sync is on and the token has no groups.
        let tokens = token_set(serde_json::json!({
            "sub": "user-1",
            "name": "John Doo"
        }));

        let claims = resolver(true)
            .resolve(&tokens, &metadata_for(&server.uri()))
            .await
            .unwrap();

        assert_eq!(
            claims.string_list_claim("groups"),
            Some(vec!["admins".to_string()])
        );
    }

    #[tokio::test]
    async fn test_no_lookup_when_groups_claim_present() {
        let tokens = token_set(serde_json::json!({
            "sub": "user-1",
            "name": "John Doo",
            "groups": []
        }));

        // Present-but-empty counts as present; no lookup happens.
        let claims = resolver(true)
            .resolve(&tokens, &metadata_for("http://127.0.0.1:9"))
            .await
            .unwrap();

        assert_eq!(claims.string_list_claim("groups"), Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_error_with_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "invalid_token"
            })))
            .mount(&server)
            .await;

        let tokens = token_set(serde_json::json!({ "sub": "user-1" }));

        let err = resolver(false)
            .resolve(&tokens, &metadata_for(&server.uri()))
            .await
            .unwrap_err();

        assert!(
            matches!(err, OidcError::UserInfoFailed { ref error_code } if error_code == "invalid_token")
        );
    }

    #[tokio::test]
    async fn test_error_without_code_mentions_proxy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(503).set_body_string("service unavailable"))
            .mount(&server)
            .await;

        let tokens = token_set(serde_json::json!({ "sub": "user-1" }));

        let err = resolver(false)
            .resolve(&tokens, &metadata_for(&server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, OidcError::ProviderUnreachable { .. }));
        let message = err.to_string();
        assert!(message.contains("no OAuth error code"));
        assert!(message.contains("proxy"));
    }

    #[tokio::test]
    async fn test_missing_userinfo_endpoint() {
        let tokens = token_set(serde_json::json!({ "sub": "user-1" }));

        let err = resolver(false)
            .resolve(&tokens, &metadata_without_userinfo("http://127.0.0.1:9"))
            .await
            .unwrap_err();

        assert!(matches!(err, OidcError::InvalidProviderMetadata(_)));
    }
}

//! Authorization request construction.
//!
//! Builds the redirect URL that sends the user's browser to the provider's
//! authorization endpoint. Only the authorization-code response type is
//! supported. The function is deterministic: identical inputs produce an
//! identical URL, and there are no side effects beyond URL construction.

use url::Url;

use crate::discovery::ProviderMetadata;
use crate::error::OidcError;

/// Builds the authorization request URL for the provider.
///
/// The query encodes `response_type=code`, the client id, the callback URL,
/// the requested scopes (space-delimited) and the opaque anti-forgery state
/// issued by the host.
///
/// # Errors
///
/// - [`OidcError::InvalidRedirectUri`] when `callback_url` is not a valid
///   absolute URI
/// - [`OidcError::InvalidProviderMetadata`] when the metadata's
///   authorization endpoint does not parse as a URL
pub fn build_authorization_request(
    metadata: &ProviderMetadata,
    client_id: &str,
    scopes: &str,
    callback_url: &str,
    state: &str,
) -> Result<Url, OidcError> {
    tracing::debug!("Creating authentication request");

    if Url::parse(callback_url).is_err() {
        return Err(OidcError::InvalidRedirectUri(callback_url.to_string()));
    }

    let mut url = Url::parse(&metadata.authorization_endpoint).map_err(|e| {
        OidcError::InvalidProviderMetadata(format!("authorization_endpoint: {e}"))
    })?;

    {
        let mut params = url.query_pairs_mut();
        params.append_pair("response_type", "code");
        params.append_pair("client_id", client_id);
        params.append_pair("redirect_uri", callback_url);
        params.append_pair("scope", scopes);
        params.append_pair("state", state);
    }

    tracing::debug!("Authentication request URI: {}", url);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> ProviderMetadata {
        serde_json::from_value(serde_json::json!({
            "issuer": "https://oidc.org",
            "authorization_endpoint": "https://oidc.org/protocol/openid-connect/auth",
            "token_endpoint": "https://oidc.org/protocol/openid-connect/token",
            "jwks_uri": "https://oidc.org/protocol/openid-connect/certs"
        }))
        .unwrap()
    }

    #[test]
    fn test_build_authorization_request() {
        let url = build_authorization_request(
            &metadata(),
            "id",
            "openid email profile",
            "http://localhost/callback/oidc",
            "state",
        )
        .unwrap();

        assert_eq!(
            url.as_str(),
            "https://oidc.org/protocol/openid-connect/auth?response_type=code&client_id=id\
             &redirect_uri=http%3A%2F%2Flocalhost%2Fcallback%2Foidc&scope=openid+email+profile&state=state"
        );
    }

    #[test]
    fn test_state_is_carried_verbatim() {
        let url = build_authorization_request(
            &metadata(),
            "id",
            "openid",
            "http://localhost/callback",
            "st/at e+1",
        )
        .unwrap();

        assert!(url.query().unwrap().contains("state=st%2Fat+e%2B1"));
        let state = url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert_eq!(state, "st/at e+1");
    }

    #[test]
    fn test_response_type_is_always_code() {
        let url = build_authorization_request(
            &metadata(),
            "other-client",
            "openid",
            "https://host.example.com/cb",
            "s",
        )
        .unwrap();

        let response_type = url
            .query_pairs()
            .find(|(k, _)| k == "response_type")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert_eq!(response_type, "code");
    }

    #[test]
    fn test_deterministic_for_identical_inputs() {
        let a = build_authorization_request(&metadata(), "id", "openid", "http://h/cb", "s").unwrap();
        let b = build_authorization_request(&metadata(), "id", "openid", "http://h/cb", "s").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_relative_callback_url_is_rejected() {
        let err = build_authorization_request(&metadata(), "id", "openid", "/callback", "s")
            .unwrap_err();
        assert!(matches!(err, OidcError::InvalidRedirectUri(uri) if uri == "/callback"));
    }

    #[test]
    fn test_garbage_callback_url_is_rejected() {
        let err = build_authorization_request(&metadata(), "id", "openid", "not a url", "s")
            .unwrap_err();
        assert!(matches!(err, OidcError::InvalidRedirectUri(_)));
    }
}

//! Login flow orchestration.
//!
//! # Overview
//!
//! A login is a two-phase protocol exchange:
//!
//! 1. **Init**: the host asks for a login; the orchestrator obtains an
//!    anti-forgery state from the host, builds the authorization request and
//!    issues a redirect to the provider. No server-side state is retained
//!    beyond what the host's anti-forgery service owns.
//! 2. **Callback**: the provider redirects back; the orchestrator has the
//!    host verify the anti-forgery state, extracts the authorization code,
//!    exchanges it for validated tokens, resolves the user's claims, maps
//!    them to a canonical identity, and hands that identity to the host.
//!
//! Any step's failure aborts the whole attempt. There is no partial-success
//! state and no automatic retry; every external call is single-shot, and the
//! user restarts from the beginning.
//!
//! Each attempt's data (state, code, tokens, claims) is local to that
//! attempt; concurrent logins share nothing but the read-only configuration.

use crate::authorize::build_authorization_request;
use crate::callback::extract_authorization_code;
use crate::config::{ConfigError, OidcConfig};
use crate::discovery::MetadataResolver;
use crate::error::OidcError;
use crate::identity::{CanonicalIdentity, IdentityMapper};
use crate::token::TokenExchanger;
use crate::userinfo::UserInfoResolver;

/// Host collaborator for the initiation phase of a login.
pub trait InitContext {
    /// Issues a fresh anti-forgery state token bound to this attempt.
    fn generate_csrf_state(&mut self) -> String;

    /// Absolute URL the provider should redirect back to.
    fn callback_url(&self) -> String;

    /// Sends an HTTP redirect to the given URL.
    fn redirect_to(&mut self, url: &str);
}

/// Host collaborator for the callback phase of a login.
pub trait CallbackContext {
    /// Verifies (and consumes) the anti-forgery state of this attempt.
    fn verify_csrf_state(&mut self) -> bool;

    /// Absolute URL the provider was told to redirect back to.
    fn callback_url(&self) -> String;

    /// Full URL of the incoming callback request.
    fn request_url(&self) -> String;

    /// Raw query string of the incoming callback request.
    fn query_string(&self) -> Option<String>;

    /// Commits the authenticated identity to the host.
    fn authenticate(&mut self, identity: CanonicalIdentity);

    /// Redirects the browser to the page the user originally requested.
    fn redirect_to_requested_page(&mut self);
}

/// Orchestrates the two-phase OIDC login flow.
#[derive(Debug)]
pub struct OidcFlow {
    config: OidcConfig,
    metadata: MetadataResolver,
    tokens: TokenExchanger,
    userinfo: UserInfoResolver,
    mapper: IdentityMapper,
}

impl OidcFlow {
    /// Builds the flow from its configuration, wiring all components around
    /// one shared HTTP client. Unknown login strategies and signing
    /// algorithms are rejected here, at startup, not at request time.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the configuration does not validate.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should not happen in
    /// practice).
    pub fn new(config: OidcConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let strategy = config
            .login_strategy()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        let algorithm = config.signing_algorithm()?;

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");

        let metadata = MetadataResolver::new(http_client.clone());
        let tokens = TokenExchanger::new(
            http_client.clone(),
            config.client_id.clone().unwrap_or_default(),
            config.client_secret.clone(),
            algorithm,
        );
        let userinfo = UserInfoResolver::new(
            http_client,
            config.sync_groups,
            config.groups_claim.clone(),
        );
        let mapper = IdentityMapper::new(strategy, config.sync_groups, config.groups_claim.clone());

        Ok(Self {
            config,
            metadata,
            tokens,
            userinfo,
            mapper,
        })
    }

    /// Builds the flow from explicitly injected components (for tests or
    /// hosts that share transports).
    #[must_use]
    pub fn with_components(
        config: OidcConfig,
        metadata: MetadataResolver,
        tokens: TokenExchanger,
        userinfo: UserInfoResolver,
        mapper: IdentityMapper,
    ) -> Self {
        Self {
            config,
            metadata,
            tokens,
            userinfo,
            mapper,
        }
    }

    /// Returns the configuration this flow was built from.
    #[must_use]
    pub fn config(&self) -> &OidcConfig {
        &self.config
    }

    /// Starts a login: builds the authorization request and redirects the
    /// browser to the provider.
    ///
    /// # Errors
    ///
    /// Returns [`OidcError::AuthenticationDisabled`] when the module is not
    /// enabled, and any error from metadata resolution or request building.
    pub async fn init(&self, ctx: &mut dyn InitContext) -> Result<(), OidcError> {
        tracing::debug!("Starting authentication workflow");

        if !self.config.is_enabled() {
            return Err(OidcError::AuthenticationDisabled);
        }

        let state = ctx.generate_csrf_state();
        let callback_url = ctx.callback_url();
        let metadata = self.metadata.resolve(self.issuer()?).await?;
        let request_uri = build_authorization_request(
            &metadata,
            self.client_id()?,
            &self.config.scopes,
            &callback_url,
            &state,
        )?;

        tracing::debug!("Redirecting to authorization endpoint");
        ctx.redirect_to(request_uri.as_str());
        Ok(())
    }

    /// Handles the provider's redirect back: verifies the anti-forgery
    /// state, completes the protocol exchange, commits the identity and
    /// redirects to the originally requested page.
    ///
    /// # Errors
    ///
    /// Returns [`OidcError::CsrfVerificationFailed`] when the state does not
    /// verify, and any error from the remaining steps. Every failure is
    /// terminal for this attempt.
    pub async fn callback(&self, ctx: &mut dyn CallbackContext) -> Result<(), OidcError> {
        tracing::debug!("Handling authentication response");

        if !self.config.is_enabled() {
            return Err(OidcError::AuthenticationDisabled);
        }
        if !ctx.verify_csrf_state() {
            return Err(OidcError::CsrfVerificationFailed);
        }

        let code = extract_authorization_code(&ctx.request_url(), ctx.query_string().as_deref())?;
        let callback_url = ctx.callback_url();
        let metadata = self.metadata.resolve(self.issuer()?).await?;
        let tokens = self.tokens.exchange(&code, &callback_url, &metadata).await?;
        let claims = self.userinfo.resolve(&tokens, &metadata).await?;
        let identity = self.mapper.map(&claims)?;

        tracing::info!(
            "Authenticated user '{}' via OpenID Connect",
            identity.provider_login
        );
        ctx.authenticate(identity);

        tracing::debug!("Redirecting to requested page");
        ctx.redirect_to_requested_page();
        Ok(())
    }

    fn issuer(&self) -> Result<&url::Url, OidcError> {
        self.config
            .issuer_uri
            .as_ref()
            .ok_or(OidcError::AuthenticationDisabled)
    }

    fn client_id(&self) -> Result<&str, OidcError> {
        self.config
            .client_id
            .as_deref()
            .ok_or(OidcError::AuthenticationDisabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LOGIN_STRATEGY_PROVIDER_ID;
    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SUB: &str = "8f63a486-6699-4f25-beef-118dd240bef8";
    const CALLBACK_URL: &str = "http://localhost/callback/oidc";

    struct TestInitContext {
        redirect: Option<String>,
    }

    impl InitContext for TestInitContext {
        fn generate_csrf_state(&mut self) -> String {
            "state".to_string()
        }

        fn callback_url(&self) -> String {
            CALLBACK_URL.to_string()
        }

        fn redirect_to(&mut self, url: &str) {
            self.redirect = Some(url.to_string());
        }
    }

    struct TestCallbackContext {
        csrf_ok: bool,
        query: String,
        identity: Option<CanonicalIdentity>,
        redirected: bool,
    }

    impl TestCallbackContext {
        fn new(csrf_ok: bool, query: &str) -> Self {
            Self {
                csrf_ok,
                query: query.to_string(),
                identity: None,
                redirected: false,
            }
        }
    }

    impl CallbackContext for TestCallbackContext {
        fn verify_csrf_state(&mut self) -> bool {
            self.csrf_ok
        }

        fn callback_url(&self) -> String {
            CALLBACK_URL.to_string()
        }

        fn request_url(&self) -> String {
            CALLBACK_URL.to_string()
        }

        fn query_string(&self) -> Option<String> {
            Some(self.query.clone())
        }

        fn authenticate(&mut self, identity: CanonicalIdentity) {
            self.identity = Some(identity);
        }

        fn redirect_to_requested_page(&mut self) {
            self.redirected = true;
        }
    }

    fn unsigned_id_token(claims: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
        format!("{header}.{payload}.")
    }

    async fn mock_provider(server: &MockServer, id_token_claims: serde_json::Value) {
        let issuer = server.uri();
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "issuer": issuer,
                "authorization_endpoint": format!("{issuer}/protocol/openid-connect/auth"),
                "token_endpoint": format!("{issuer}/protocol/openid-connect/token"),
                "userinfo_endpoint": format!("{issuer}/protocol/openid-connect/userinfo"),
                "jwks_uri": format!("{issuer}/protocol/openid-connect/certs")
            })))
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/protocol/openid-connect/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-123",
                "token_type": "Bearer",
                "id_token": unsigned_id_token(&id_token_claims)
            })))
            .mount(server)
            .await;
    }

    fn flow_config(issuer: &str) -> OidcConfig {
        OidcConfig::new()
            .with_enabled(true)
            .with_issuer_uri(Url::parse(issuer).unwrap())
            .with_client_id("id")
            .with_client_secret("secret")
            .with_login_strategy(LOGIN_STRATEGY_PROVIDER_ID)
    }

    #[tokio::test]
    async fn test_init_redirects_to_authorization_endpoint() {
        let server = MockServer::start().await;
        mock_provider(&server, serde_json::json!({ "sub": SUB })).await;

        let flow = OidcFlow::new(flow_config(&server.uri())).unwrap();
        let mut ctx = TestInitContext { redirect: None };

        flow.init(&mut ctx).await.unwrap();

        let redirect = ctx.redirect.unwrap();
        assert!(redirect.starts_with(&format!("{}/protocol/openid-connect/auth?", server.uri())));
        assert!(redirect.contains("response_type=code"));
        assert!(redirect.contains("client_id=id"));
        assert!(redirect.contains("state=state"));
        assert!(redirect.contains("scope=openid+email+profile"));
    }

    #[tokio::test]
    async fn test_init_fails_when_disabled() {
        let flow = OidcFlow::new(OidcConfig::new()).unwrap();
        let mut ctx = TestInitContext { redirect: None };

        let err = flow.init(&mut ctx).await.unwrap_err();
        assert!(matches!(err, OidcError::AuthenticationDisabled));
        assert!(ctx.redirect.is_none());
    }

    #[tokio::test]
    async fn test_callback_authenticates_end_to_end() {
        let server = MockServer::start().await;
        mock_provider(
            &server,
            serde_json::json!({
                "sub": SUB,
                "name": "John Doo",
                "email": "john.doo@acme.com"
            }),
        )
        .await;

        let flow = OidcFlow::new(flow_config(&server.uri())).unwrap();
        let mut ctx = TestCallbackContext::new(true, "code=valid_code&state=state");

        flow.callback(&mut ctx).await.unwrap();

        let identity = ctx.identity.unwrap();
        assert_eq!(identity.provider_login, SUB);
        assert_eq!(identity.name, "John Doo");
        assert_eq!(identity.email.as_deref(), Some("john.doo@acme.com"));
        assert!(ctx.redirected);
    }

    #[tokio::test]
    async fn test_callback_falls_back_to_userinfo_lookup() {
        let server = MockServer::start().await;
        // ID token with neither name nor preferred_username.
        mock_provider(&server, serde_json::json!({ "sub": SUB })).await;
        Mock::given(method("GET"))
            .and(path("/protocol/openid-connect/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sub": SUB,
                "name": "John Doo"
            })))
            .mount(&server)
            .await;

        let flow = OidcFlow::new(flow_config(&server.uri())).unwrap();
        let mut ctx = TestCallbackContext::new(true, "code=valid_code&state=state");

        flow.callback(&mut ctx).await.unwrap();

        assert_eq!(ctx.identity.unwrap().name, "John Doo");
    }

    #[tokio::test]
    async fn test_callback_fails_on_csrf_mismatch() {
        let server = MockServer::start().await;
        mock_provider(&server, serde_json::json!({ "sub": SUB })).await;

        let flow = OidcFlow::new(flow_config(&server.uri())).unwrap();
        let mut ctx = TestCallbackContext::new(false, "code=valid_code&state=state");

        let err = flow.callback(&mut ctx).await.unwrap_err();

        assert!(matches!(err, OidcError::CsrfVerificationFailed));
        assert!(ctx.identity.is_none());
        assert!(!ctx.redirected);
    }

    #[tokio::test]
    async fn test_callback_surfaces_provider_error() {
        let server = MockServer::start().await;
        mock_provider(&server, serde_json::json!({ "sub": SUB })).await;

        let flow = OidcFlow::new(flow_config(&server.uri())).unwrap();
        let mut ctx = TestCallbackContext::new(true, "error=access_denied");

        let err = flow.callback(&mut ctx).await.unwrap_err();

        assert!(matches!(err, OidcError::AuthorizationFailed { .. }));
        assert!(ctx.identity.is_none());
    }

    #[test]
    fn test_unknown_strategy_is_rejected_at_startup() {
        let config = OidcConfig::new().with_login_strategy("xxx");

        let err = OidcFlow::new(config).unwrap_err();
        assert!(err.to_string().contains("login strategy not supported: xxx"));
    }
}

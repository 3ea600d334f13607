//! Module configuration.
//!
//! The configuration surface mirrors what the host application exposes to
//! administrators: the provider connection (issuer, client credentials,
//! scopes), the identity-derivation policy (login strategy, group sync), the
//! auto-login switch, and a handful of presentation-only settings. Values
//! are validated once at startup so that bad settings fail the module load
//! instead of individual login attempts.

use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::OidcError;

/// Login strategy: use the `preferred_username` claim.
pub const LOGIN_STRATEGY_PREFERRED_USERNAME: &str = "preferred-username";
/// Login strategy: use the subject identifier (`sub` claim).
pub const LOGIN_STRATEGY_PROVIDER_ID: &str = "provider-id";
/// Login strategy: use the `email` claim.
pub const LOGIN_STRATEGY_EMAIL: &str = "email";
/// Login strategy: derive a unique login from the subject identifier.
pub const LOGIN_STRATEGY_UNIQUE: &str = "unique";
/// Login strategy: use an administrator-configured claim.
pub const LOGIN_STRATEGY_CUSTOM_CLAIM: &str = "custom-claim";

/// Default requested scopes.
pub const DEFAULT_SCOPES: &str = "openid email profile";
/// Default claim consulted for group synchronization.
pub const DEFAULT_GROUPS_CLAIM: &str = "groups";
/// Default claim consulted by the `custom-claim` login strategy.
pub const DEFAULT_CUSTOM_CLAIM: &str = "upn";

/// The policy choosing which claim becomes the canonical login identifier.
///
/// Resolved from the configured strategy name at startup; unknown names are
/// rejected there rather than at request time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginStrategy {
    /// Login is the `preferred_username` claim.
    PreferredUsername,
    /// Login is the subject identifier.
    ProviderId,
    /// Login is the `email` claim.
    Email,
    /// Login is `"{sub}@oidc"`, unique across identity providers.
    Unique,
    /// Login is the named claim.
    CustomClaim(String),
}

impl LoginStrategy {
    /// Resolves a strategy from its configured name.
    ///
    /// # Errors
    ///
    /// Returns [`OidcError::UnsupportedStrategy`] for unknown names.
    pub fn from_config(name: &str, custom_claim: &str) -> Result<Self, OidcError> {
        match name {
            LOGIN_STRATEGY_PREFERRED_USERNAME => Ok(Self::PreferredUsername),
            LOGIN_STRATEGY_PROVIDER_ID => Ok(Self::ProviderId),
            LOGIN_STRATEGY_EMAIL => Ok(Self::Email),
            LOGIN_STRATEGY_UNIQUE => Ok(Self::Unique),
            LOGIN_STRATEGY_CUSTOM_CLAIM => Ok(Self::CustomClaim(custom_claim.to_string())),
            other => Err(OidcError::UnsupportedStrategy(other.to_string())),
        }
    }
}

/// Configuration for the OpenID Connect authentication module.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OidcConfig {
    /// Master switch. The module is effectively enabled only when this is
    /// set and both [`issuer_uri`](Self::issuer_uri) and
    /// [`client_id`](Self::client_id) are configured.
    pub enabled: bool,

    /// Issuer URI of the identity provider, e.g.
    /// `https://auth.example.com/realms/sso`.
    pub issuer_uri: Option<Url>,

    /// OAuth client id registered with the provider.
    pub client_id: Option<String>,

    /// OAuth client secret. Sent as an empty Basic-auth password when unset.
    pub client_secret: Option<String>,

    /// Requested scopes, space-delimited.
    pub scopes: String,

    /// JWS algorithm the provider signs ID tokens with (e.g. `RS256`).
    ///
    /// When unset, ID-token signature validation is skipped entirely and the
    /// token's claims are trusted as transported. This is a deliberate,
    /// configuration-gated reduction of security for deployments that reach
    /// the provider over a trusted network only.
    pub id_token_signing_algorithm: Option<String>,

    /// Name of the login strategy; see the `LOGIN_STRATEGY_*` constants.
    pub login_strategy: String,

    /// Claim consulted by the `custom-claim` login strategy.
    pub login_strategy_custom_claim: String,

    /// Synchronize group memberships from the provider on every login.
    pub sync_groups: bool,

    /// Claim holding the group memberships.
    pub groups_claim: String,

    /// Redirect requests for the host login page straight to the provider.
    pub auto_login: bool,

    /// Allow unknown users to sign up on first login.
    pub allow_users_to_sign_up: bool,

    /// Text of the login button. Presentation only.
    pub login_button_text: String,

    /// Path of the login button icon. Presentation only.
    pub icon_path: String,

    /// Background color of the login button. Presentation only.
    pub background_color: String,

    /// Public base URL of the host application.
    pub base_url: String,

    /// Context path prefix of the host application.
    pub context_path: String,

    /// Transport-level timeout for calls to the provider.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            issuer_uri: None,
            client_id: None,
            client_secret: None,
            scopes: DEFAULT_SCOPES.to_string(),
            id_token_signing_algorithm: None,
            login_strategy: LOGIN_STRATEGY_PREFERRED_USERNAME.to_string(),
            login_strategy_custom_claim: DEFAULT_CUSTOM_CLAIM.to_string(),
            sync_groups: false,
            groups_claim: DEFAULT_GROUPS_CLAIM.to_string(),
            auto_login: false,
            allow_users_to_sign_up: false,
            login_button_text: "OpenID Connect".to_string(),
            icon_path: "/static/oidc/openid.svg".to_string(),
            background_color: "#236a97".to_string(),
            base_url: String::new(),
            context_path: String::new(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl OidcConfig {
    /// Creates a configuration with default values (disabled).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables the module.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the issuer URI.
    #[must_use]
    pub fn with_issuer_uri(mut self, issuer: Url) -> Self {
        self.issuer_uri = Some(issuer);
        self
    }

    /// Sets the client id.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Sets the requested scopes (space-delimited).
    #[must_use]
    pub fn with_scopes(mut self, scopes: impl Into<String>) -> Self {
        self.scopes = scopes.into();
        self
    }

    /// Sets the required ID-token signing algorithm.
    #[must_use]
    pub fn with_id_token_signing_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.id_token_signing_algorithm = Some(algorithm.into());
        self
    }

    /// Sets the login strategy name.
    #[must_use]
    pub fn with_login_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.login_strategy = strategy.into();
        self
    }

    /// Sets the claim used by the `custom-claim` strategy.
    #[must_use]
    pub fn with_custom_claim(mut self, claim: impl Into<String>) -> Self {
        self.login_strategy_custom_claim = claim.into();
        self
    }

    /// Enables or disables group synchronization.
    #[must_use]
    pub fn with_sync_groups(mut self, sync: bool) -> Self {
        self.sync_groups = sync;
        self
    }

    /// Sets the groups claim name.
    #[must_use]
    pub fn with_groups_claim(mut self, claim: impl Into<String>) -> Self {
        self.groups_claim = claim.into();
        self
    }

    /// Enables or disables auto-login.
    #[must_use]
    pub fn with_auto_login(mut self, auto_login: bool) -> Self {
        self.auto_login = auto_login;
        self
    }

    /// Sets the host base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the host context path.
    #[must_use]
    pub fn with_context_path(mut self, context_path: impl Into<String>) -> Self {
        self.context_path = context_path.into();
        self
    }

    /// Returns `true` when the module can actually authenticate users: the
    /// switch is on and the provider connection is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled && self.issuer_uri.is_some() && self.client_id.is_some()
    }

    /// Resolves the configured login strategy.
    ///
    /// # Errors
    ///
    /// Returns [`OidcError::UnsupportedStrategy`] for unknown strategy names.
    pub fn login_strategy(&self) -> Result<LoginStrategy, OidcError> {
        LoginStrategy::from_config(&self.login_strategy, &self.login_strategy_custom_claim)
    }

    /// Resolves the configured ID-token signing algorithm, if any.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the algorithm name is not a
    /// known JWS algorithm.
    pub fn signing_algorithm(&self) -> Result<Option<Algorithm>, ConfigError> {
        self.id_token_signing_algorithm
            .as_deref()
            .map(|name| {
                Algorithm::from_str(name).map_err(|_| {
                    ConfigError::InvalidValue(format!("unknown ID token signing algorithm: {name}"))
                })
            })
            .transpose()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the login strategy or the
    /// signing algorithm is not a supported value, or if the `custom-claim`
    /// strategy is selected without a claim name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let strategy = self
            .login_strategy()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        if let LoginStrategy::CustomClaim(claim) = &strategy
            && claim.is_empty()
        {
            return Err(ConfigError::Missing(
                "login_strategy_custom_claim".to_string(),
            ));
        }

        self.signing_algorithm()?;
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

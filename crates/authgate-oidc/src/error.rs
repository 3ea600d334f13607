//! Error types for the OpenID Connect login flow.
//!
//! Every failure is terminal for the current login attempt: nothing in this
//! crate retries, downgrades, or swallows an error. Variants carry enough
//! detail (error code, claim name, endpoint) to tell misconfiguration apart
//! from a genuine attack or a provider outage.

/// Errors that can occur during a delegated OIDC login attempt.
#[derive(Debug, thiserror::Error)]
pub enum OidcError {
    /// An identity provider endpoint could not be reached, or answered
    /// without a usable OAuth error object. A missing outbound proxy is the
    /// most common cause, so the message points operators at it.
    #[error(
        "identity provider not reachable at {endpoint}: {detail} - check the outbound HTTP proxy configuration"
    )]
    ProviderUnreachable {
        /// The endpoint that was being contacted.
        endpoint: String,
        /// Transport-level detail (connect error, HTTP status, ...).
        detail: String,
    },

    /// The issuer declared in the provider metadata document does not match
    /// the configured issuer URI.
    #[error("issuer mismatch: provider metadata declares {actual}, configuration expects {expected}")]
    IssuerMismatch {
        /// The configured issuer URI.
        expected: String,
        /// The issuer declared by the metadata document.
        actual: String,
    },

    /// The provider reported an error in the redirect back from the
    /// authorization endpoint.
    #[error("authorization request failed: {error} - {description}")]
    AuthorizationFailed {
        /// The OAuth error code.
        error: String,
        /// Optional human-readable description from the provider.
        description: String,
    },

    /// The callback request could not be parsed.
    #[error("malformed callback request: {0}")]
    CallbackParseError(String),

    /// The token endpoint rejected the code exchange with an OAuth error.
    #[error("token request rejected by provider: {error_code}")]
    TokenExchangeFailed {
        /// The OAuth error code returned by the token endpoint.
        error_code: String,
    },

    /// The userinfo endpoint rejected the lookup with an OAuth error.
    #[error("userinfo request rejected by provider: {error_code}")]
    UserInfoFailed {
        /// The OAuth error code returned by the userinfo endpoint.
        error_code: String,
    },

    /// ID token validation failed (signature, issuer, audience, or claims).
    #[error("invalid ID token: {0}")]
    InvalidIdToken(String),

    /// A claim required by the configured login strategy (or group sync) is
    /// absent from the resolved user info.
    #[error(
        "claim '{0}' is missing in user info - make sure the provider supplies it in the ID token or at the userinfo endpoint"
    )]
    MissingClaim(String),

    /// The configured login strategy is not one of the supported values.
    #[error("login strategy not supported: {0}")]
    UnsupportedStrategy(String),

    /// The anti-forgery state of the callback request did not verify.
    #[error("state verification failed for callback request")]
    CsrfVerificationFailed,

    /// The callback URL handed over by the host is not a valid absolute URI.
    #[error("invalid redirect URI: {0}")]
    InvalidRedirectUri(String),

    /// The provider metadata document is missing or malformed in a way that
    /// prevents the flow from continuing.
    #[error("invalid provider metadata: {0}")]
    InvalidProviderMetadata(String),

    /// A provider endpoint answered successfully but with a body that does
    /// not parse as the expected wire format.
    #[error("invalid provider response: {0}")]
    InvalidProviderResponse(String),

    /// OpenID Connect authentication is disabled or not fully configured.
    #[error("OpenID Connect authentication is disabled")]
    AuthenticationDisabled,
}

impl OidcError {
    /// Creates a `ProviderUnreachable` error for the given endpoint.
    #[must_use]
    pub fn unreachable(endpoint: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ProviderUnreachable {
            endpoint: endpoint.into(),
            detail: detail.into(),
        }
    }

    /// Creates an `IssuerMismatch` error.
    #[must_use]
    pub fn issuer_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::IssuerMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates an `AuthorizationFailed` error from the provider's error
    /// response parameters.
    #[must_use]
    pub fn authorization_failed(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self::AuthorizationFailed {
            error: error.into(),
            description: description.into(),
        }
    }

    /// Returns `true` if this error was reported by (or on the way to) the
    /// identity provider.
    #[must_use]
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnreachable { .. }
                | Self::AuthorizationFailed { .. }
                | Self::TokenExchangeFailed { .. }
                | Self::UserInfoFailed { .. }
                | Self::InvalidProviderResponse(_)
        )
    }

    /// Returns `true` if this is a security validation error.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidIdToken(_)
                | Self::IssuerMismatch { .. }
                | Self::CsrfVerificationFailed
                | Self::CallbackParseError(_)
        )
    }

    /// Returns `true` if this error points at the module configuration.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedStrategy(_)
                | Self::InvalidRedirectUri(_)
                | Self::AuthenticationDisabled
        )
    }
}

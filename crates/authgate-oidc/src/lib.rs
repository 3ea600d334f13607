//! # authgate-oidc
//!
//! Delegated end-user authentication against an external OpenID Connect
//! identity provider.
//!
//! The host application plugs this module in as an authentication
//! mechanism: it delegates "please authenticate this user" and receives
//! back a canonical identity (login, display name, email, optional group
//! memberships) or a hard failure. The module owns the protocol exchange
//! (authorization request, callback handling, code-for-token exchange,
//! ID-token validation, claim resolution) and the policy that derives the
//! host identity from the provider's claims.
//!
//! ## Modules
//!
//! - [`config`] - Settings surface and startup validation
//! - [`discovery`] - Provider metadata resolution
//! - [`authorize`] - Authorization request construction
//! - [`callback`] - Callback parsing and code extraction
//! - [`token`] - Code exchange and ID-token validation
//! - [`jwks`] - Provider signing-key retrieval
//! - [`userinfo`] - Userinfo fallback lookup
//! - [`identity`] - Login strategies and identity mapping
//! - [`flow`] - Two-phase flow orchestration and host collaborators
//! - [`autologin`] - Login-page auto-redirect
//! - [`error`] - Flow error taxonomy
//!
//! ## Example
//!
//! ```ignore
//! use authgate_oidc::{OidcConfig, OidcFlow};
//! use url::Url;
//!
//! let config = OidcConfig::new()
//!     .with_enabled(true)
//!     .with_issuer_uri(Url::parse("https://auth.example.com/realms/sso")?)
//!     .with_client_id("my-host")
//!     .with_client_secret("...")
//!     .with_id_token_signing_algorithm("RS256");
//!
//! let flow = OidcFlow::new(config)?;
//!
//! // On "begin login": flow.init(&mut init_ctx).await?;
//! // On the provider's redirect back: flow.callback(&mut callback_ctx).await?;
//! ```

pub mod authorize;
pub mod autologin;
pub mod callback;
pub mod claims;
pub mod config;
pub mod discovery;
pub mod error;
pub mod flow;
pub mod identity;
pub mod jwks;
pub mod token;
pub mod userinfo;

pub use authorize::build_authorization_request;
pub use autologin::{AutoLoginFilter, LOGIN_PAGE_PATH};
pub use callback::{AuthorizationCode, extract_authorization_code};
pub use claims::ClaimsBundle;
pub use config::{ConfigError, LoginStrategy, OidcConfig};
pub use discovery::{MetadataResolver, ProviderMetadata};
pub use error::OidcError;
pub use flow::{CallbackContext, InitContext, OidcFlow};
pub use identity::{CanonicalIdentity, IdentityMapper, PROVIDER_KEY};
pub use jwks::JwksClient;
pub use token::{TokenExchanger, TokenSet};
pub use userinfo::UserInfoResolver;

/// Type alias for login-flow results.
pub type FlowResult<T> = Result<T, OidcError>;

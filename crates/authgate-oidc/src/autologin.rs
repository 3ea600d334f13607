//! Auto-login interception for the host login page.
//!
//! When enabled, requests for the host's login page are redirected straight
//! to the provider-initiated login, so users never see the local login form.
//! A referrer ending in the opt-out marker lets a single request through,
//! which is how administrators reach the local form when the provider is
//! down. Pure redirect logic; no protocol state.

use crate::config::OidcConfig;
use crate::identity::PROVIDER_KEY;

/// Path of the host login page this filter intercepts.
pub const LOGIN_PAGE_PATH: &str = "/sessions/new";

/// Referrer suffix that opts a single request out of auto-login.
const SKIP_REQUEST_MARKER: &str = "auto-login=false";

/// Decides whether a login-page request should be redirected to the
/// provider-initiated login.
pub struct AutoLoginFilter {
    config: OidcConfig,
}

impl AutoLoginFilter {
    /// Creates a filter over the module configuration.
    #[must_use]
    pub fn new(config: OidcConfig) -> Self {
        Self { config }
    }

    /// Pattern of requests the host should route through this filter.
    #[must_use]
    pub fn url_pattern(&self) -> &'static str {
        LOGIN_PAGE_PATH
    }

    /// Returns the redirect target for a login-page request, or `None` when
    /// the request should pass through to the regular login page.
    #[must_use]
    pub fn redirect_target(&self, referrer: Option<&str>) -> Option<String> {
        if !self.config.is_enabled() || !self.config.auto_login {
            return None;
        }

        tracing::debug!("Referrer: {:?}", referrer);
        if referrer.is_some_and(|r| r.ends_with(SKIP_REQUEST_MARKER)) {
            return None;
        }

        let target = format!(
            "{}/sessions/init/{}?return_to={}/projects",
            self.config.base_url, PROVIDER_KEY, self.config.context_path
        );
        tracing::debug!("Redirecting to login page: {}", target);
        Some(target)
    }
}

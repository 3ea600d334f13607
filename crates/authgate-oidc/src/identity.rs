//! Canonical identity mapping.
//!
//! Applies the configured login strategy and optional group synchronization
//! to a resolved claims bundle, producing the identity handed back to the
//! host. Missing claims fail the login attempt; a trust-relevant value is
//! never silently substituted.

use std::collections::BTreeSet;

use crate::claims::ClaimsBundle;
use crate::config::LoginStrategy;
use crate::error::OidcError;

/// Key identifying this authentication mechanism to the host.
pub const PROVIDER_KEY: &str = "oidc";

/// The identity handed to the host after a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalIdentity {
    /// Unique login within this provider. Never empty.
    pub provider_login: String,

    /// Display name.
    pub name: String,

    /// Email address, when the provider supplied one.
    pub email: Option<String>,

    /// Group memberships. `Some` exactly when group sync is enabled; the
    /// set may be empty only when the claim was present but empty.
    pub groups: Option<BTreeSet<String>>,
}

/// Maps claim bundles to canonical identities.
#[derive(Debug)]
pub struct IdentityMapper {
    strategy: LoginStrategy,
    sync_groups: bool,
    groups_claim: String,
}

impl IdentityMapper {
    /// Creates a mapper for the given policy.
    #[must_use]
    pub fn new(strategy: LoginStrategy, sync_groups: bool, groups_claim: impl Into<String>) -> Self {
        Self {
            strategy,
            sync_groups,
            groups_claim: groups_claim.into(),
        }
    }

    /// Derives the canonical identity from a claims bundle.
    ///
    /// # Errors
    ///
    /// Returns [`OidcError::MissingClaim`] when the login strategy's claim,
    /// the display-name claims, or (with group sync enabled) the groups
    /// claim are absent.
    pub fn map(&self, claims: &ClaimsBundle) -> Result<CanonicalIdentity, OidcError> {
        let provider_login = self.login(claims)?;
        let name = display_name(claims)?;
        let email = claims.email.clone();
        let groups = if self.sync_groups {
            Some(self.groups(claims)?)
        } else {
            None
        };

        Ok(CanonicalIdentity {
            provider_login,
            name,
            email,
            groups,
        })
    }

    fn login(&self, claims: &ClaimsBundle) -> Result<String, OidcError> {
        match &self.strategy {
            LoginStrategy::PreferredUsername => {
                non_empty(claims.preferred_username.as_deref(), "preferred_username")
            }
            LoginStrategy::ProviderId => non_empty(Some(claims.sub.as_str()), "sub"),
            LoginStrategy::Email => non_empty(claims.email.as_deref(), "email"),
            LoginStrategy::Unique => {
                let sub = non_empty(Some(claims.sub.as_str()), "sub")?;
                Ok(format!("{sub}@{PROVIDER_KEY}"))
            }
            LoginStrategy::CustomClaim(claim) => non_empty(claims.string_claim(claim), claim),
        }
    }

    fn groups(&self, claims: &ClaimsBundle) -> Result<BTreeSet<String>, OidcError> {
        claims
            .string_list_claim(&self.groups_claim)
            .map(|groups| groups.into_iter().collect())
            .ok_or_else(|| OidcError::MissingClaim(self.groups_claim.clone()))
    }
}

/// Display name is the `name` claim, with `preferred_username` as fallback.
fn display_name(claims: &ClaimsBundle) -> Result<String, OidcError> {
    claims
        .name
        .clone()
        .or_else(|| claims.preferred_username.clone())
        .ok_or_else(|| OidcError::MissingClaim("name|preferred_username".to_string()))
}

/// An empty login would break the host's identity model; treat it like a
/// missing claim.
fn non_empty(value: Option<&str>, claim: &str) -> Result<String, OidcError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(OidcError::MissingClaim(claim.to_string())),
    }
}

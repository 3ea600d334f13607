//! User claim bundles.
//!
//! A [`ClaimsBundle`] is an immutable snapshot of the claims asserted about
//! the end user, sourced either from a validated ID token or from the
//! provider's userinfo endpoint. When the userinfo endpoint is consulted,
//! its response replaces the ID-token-derived bundle entirely; claims are
//! never merged in place.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Claims asserted about the authenticated end user.
///
/// Standard OIDC claims are typed fields; everything else is retained in
/// [`extra`](Self::extra) and reachable through the claim accessors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimsBundle {
    /// Subject identifier. Always present in valid claims.
    pub sub: String,

    /// Issuer identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Audience (string or array on the wire, normalized to an array).
    #[serde(
        default,
        deserialize_with = "deserialize_audience",
        skip_serializing_if = "Option::is_none"
    )]
    pub aud: Option<Vec<String>>,

    /// Expiration time (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issued-at time (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// User's full name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// User's preferred username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,

    /// User's email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Whether the email address has been verified by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,

    /// User's given name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,

    /// User's family name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,

    /// Claims not covered by the typed fields.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ClaimsBundle {
    /// Returns the string value of a claim, typed fields included.
    ///
    /// Non-string values (lists, objects, numbers, `null`) yield `None`.
    #[must_use]
    pub fn string_claim(&self, claim: &str) -> Option<&str> {
        match claim {
            "sub" => Some(self.sub.as_str()),
            "iss" => self.iss.as_deref(),
            "name" => self.name.as_deref(),
            "preferred_username" => self.preferred_username.as_deref(),
            "email" => self.email.as_deref(),
            "given_name" => self.given_name.as_deref(),
            "family_name" => self.family_name.as_deref(),
            _ => self.extra.get(claim).and_then(Value::as_str),
        }
    }

    /// Returns a claim as a list of strings.
    ///
    /// A list-valued claim yields its string entries (non-string entries are
    /// skipped); a string-valued claim yields a single-entry list. Anything
    /// else, including `null`, yields `None`.
    #[must_use]
    pub fn string_list_claim(&self, claim: &str) -> Option<Vec<String>> {
        if let Some(value) = self.string_claim(claim) {
            return Some(vec![value.to_string()]);
        }
        match self.extra.get(claim)? {
            Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Returns `true` if the claim is present with a non-null value.
    #[must_use]
    pub fn has_claim(&self, claim: &str) -> bool {
        match claim {
            "sub" => true,
            "iss" => self.iss.is_some(),
            "name" => self.name.is_some(),
            "preferred_username" => self.preferred_username.is_some(),
            "email" => self.email.is_some(),
            "given_name" => self.given_name.is_some(),
            "family_name" => self.family_name.is_some(),
            _ => self.extra.get(claim).is_some_and(|v| !v.is_null()),
        }
    }
}

/// Deserializer for the audience claim, which can be a string or an array.
fn deserialize_audience<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(
        Option::<OneOrMany>::deserialize(deserializer)?.map(|aud| match aud {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }),
    )
}

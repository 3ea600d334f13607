//! Callback request parsing.
//!
//! When the provider redirects the browser back to the host, the query
//! string carries either an authorization code or an error response. The
//! query is decoded exactly: pairs are split on `&`, a pair without `=` (or
//! with an empty key) carries no parameter, keys and values are
//! percent-decoded with `+` meaning space, and when a key repeats all values
//! are retained in order but only the first is consulted.

use url::Url;
use url::form_urlencoded;

use crate::error::OidcError;

/// An opaque, single-use authorization code extracted from the callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode(String);

impl AuthorizationCode {
    /// Wraps a raw code value.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the code value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper and returns the code value.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Extracts the authorization code from a callback request.
///
/// # Errors
///
/// - [`OidcError::AuthorizationFailed`] when the provider reported an error
///   (`error` / `error_description` parameters)
/// - [`OidcError::CallbackParseError`] when the request URL is malformed, a
///   parameter does not decode, or no `code` parameter is present
pub fn extract_authorization_code(
    request_url: &str,
    query_string: Option<&str>,
) -> Result<AuthorizationCode, OidcError> {
    tracing::debug!(
        "Retrieving authorization code from callback request's query parameters"
    );

    Url::parse(request_url)
        .map_err(|e| OidcError::CallbackParseError(format!("invalid callback URL: {e}")))?;

    let params = parse_query_pairs(query_string.unwrap_or(""))?;

    if let Some(error) = first_value(&params, "error") {
        let description = first_value(&params, "error_description").unwrap_or_default();
        return Err(OidcError::authorization_failed(error, description));
    }

    let code = first_value(&params, "code").ok_or_else(|| {
        OidcError::CallbackParseError("no authorization code in callback request".to_string())
    })?;

    Ok(AuthorizationCode::new(code))
}

/// Decodes a raw query string into key/value pairs, order preserved.
fn parse_query_pairs(query: &str) -> Result<Vec<(String, String)>, OidcError> {
    let mut pairs = Vec::new();
    if query.is_empty() {
        return Ok(pairs);
    }

    for pair in query.split('&') {
        match pair.find('=') {
            Some(idx) if idx > 0 => {}
            _ => continue,
        }

        let Some((key, value)) = form_urlencoded::parse(pair.as_bytes()).next() else {
            continue;
        };
        // Escapes that do not decode to UTF-8 come back as replacement
        // characters; reject them instead of passing mangled values on.
        if key.contains('\u{FFFD}') || value.contains('\u{FFFD}') {
            return Err(OidcError::CallbackParseError(format!(
                "undecodable parameter '{pair}'"
            )));
        }

        pairs.push((key.into_owned(), value.into_owned()));
    }

    Ok(pairs)
}

/// Returns the first value recorded for a key.
fn first_value<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

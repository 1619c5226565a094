//! Session credential carried on every request.
//!
//! Sign-in itself belongs to whatever issues the session cookie. This module
//! only holds the issued `NAME=VALUE` cookie and renders it as the two headers
//! the Container Station API expects.

use std::fmt;

/// Session credential issued by the authentication provider.
///
/// The raw value is a cookie pair such as `NAS_SID=abc123`. The same pair is
/// sent back as `Cookie`, and its value part doubles as the bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    cookie: String,
}

impl Credential {
    /// Wrap a `NAME=VALUE` cookie pair.
    ///
    /// Anything after the first `;` (cookie attributes copied from a
    /// `Set-Cookie` header) is dropped.
    pub fn from_cookie(cookie: impl AsRef<str>) -> Self {
        let pair = cookie
            .as_ref()
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        Self { cookie: pair }
    }

    /// Value for the `Cookie` header.
    pub fn cookie(&self) -> &str {
        &self.cookie
    }

    /// Token for the `Authorization: Bearer` header.
    ///
    /// Falls back to the whole cookie when it carries no `=`.
    pub fn bearer(&self) -> &str {
        self.cookie
            .split_once('=')
            .map(|(_, value)| value)
            .unwrap_or(&self.cookie)
    }

    pub fn is_empty(&self) -> bool {
        self.bearer().is_empty()
    }
}

// Never print the session secret.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.cookie.split_once('=').map(|(n, _)| n).unwrap_or("");
        f.debug_struct("Credential")
            .field("cookie", &format_args!("{name}=***"))
            .finish()
    }
}

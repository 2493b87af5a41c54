//! Session cookie attributes.
//!
//! The HTTP layer owns header transport; this module only decides what the
//! session cookie should carry and pulls the raw candidate identifier out of
//! an inbound `Cookie` header. Candidates are not validated here; pass them
//! to [`Session::load`](crate::Session::load).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::id::SessionId;

/// Default cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "tether_sid";

/// `SameSite` policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SameSite::Strict => write!(f, "Strict"),
            SameSite::Lax => write!(f, "Lax"),
            SameSite::None => write!(f, "None"),
        }
    }
}

/// Configured cookie attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
    pub name: String,
    pub path: String,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    /// Cookie lifetime in seconds. `None` follows the session TTL.
    pub lifetime_secs: Option<u64>,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            path: "/".to_string(),
            http_only: true,
            secure: true,
            same_site: SameSite::Lax,
            lifetime_secs: None,
        }
    }
}

/// Identifier plus the attributes an outbound cookie should carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    /// Identifier, or empty for a removal cookie.
    pub value: String,
    pub max_age_secs: u64,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
}

impl SessionCookie {
    /// Cookie carrying `id`, living for the configured lifetime or `ttl`.
    pub fn for_session(id: &SessionId, settings: &CookieSettings, ttl: Duration) -> Self {
        Self {
            name: settings.name.clone(),
            value: id.to_string(),
            max_age_secs: settings.lifetime_secs.unwrap_or(ttl.as_secs()),
            http_only: settings.http_only,
            secure: settings.secure,
            same_site: settings.same_site,
            path: settings.path.clone(),
        }
    }

    /// Cookie that clears the session on the client, sent after destroy.
    pub fn expired(settings: &CookieSettings) -> Self {
        Self {
            name: settings.name.clone(),
            value: String::new(),
            max_age_secs: 0,
            http_only: settings.http_only,
            secure: settings.secure,
            same_site: settings.same_site,
            path: settings.path.clone(),
        }
    }
}

/// Renders a `Set-Cookie` header value.
impl fmt::Display for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; Max-Age={}; Path={}; SameSite={}",
            self.name, self.value, self.max_age_secs, self.path, self.same_site
        )?;
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        Ok(())
    }
}

/// Raw value of cookie `name` in a `Cookie` request header.
///
/// Returns the first match. No format check is applied.
pub fn find_session_id<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key.trim() == name).then(|| value.trim().trim_matches('"'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_session_defaults_to_ttl() {
        let id = SessionId::generate();
        let cookie = SessionCookie::for_session(&id, &CookieSettings::default(), Duration::from_secs(600));
        assert_eq!(cookie.name, DEFAULT_COOKIE_NAME);
        assert_eq!(cookie.value, id.as_str());
        assert_eq!(cookie.max_age_secs, 600);
        assert!(cookie.http_only);
        assert!(cookie.secure);
        assert_eq!(cookie.same_site, SameSite::Lax);
        assert_eq!(cookie.path, "/");
    }

    #[test]
    fn test_explicit_lifetime_wins() {
        let settings = CookieSettings {
            lifetime_secs: Some(0),
            ..Default::default()
        };
        let cookie = SessionCookie::for_session(&SessionId::generate(), &settings, Duration::from_secs(600));
        assert_eq!(cookie.max_age_secs, 0);
    }

    #[test]
    fn test_set_cookie_rendering() {
        let settings = CookieSettings {
            secure: false,
            same_site: SameSite::Strict,
            ..Default::default()
        };
        let rendered = SessionCookie::expired(&settings).to_string();
        assert_eq!(rendered, "tether_sid=; Max-Age=0; Path=/; SameSite=Strict; HttpOnly");
    }

    #[test]
    fn test_find_session_id() {
        let header = "theme=dark; tether_sid=abc123 ; other=\"x\"";
        assert_eq!(find_session_id(header, "tether_sid"), Some("abc123"));
        assert_eq!(find_session_id(header, "other"), Some("x"));
        assert_eq!(find_session_id(header, "missing"), None);
        assert_eq!(find_session_id("", "tether_sid"), None);
        assert_eq!(find_session_id("novalue; tether_sid=", "tether_sid"), Some(""));
    }
}

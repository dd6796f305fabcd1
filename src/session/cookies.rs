// src/session/cookies.rs — Minimal cookie jar for a single site
//
// Only name → value pairs are kept. Domain, path and expiry attributes are
// ignored except for deletion (Max-Age <= 0 or an empty value), which the
// site uses to rotate its session cookie on sign-in.

use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
}

/// One parsed `Set-Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    /// The server asked for the cookie to be removed.
    pub removal: bool,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cookies.keys().map(String::as_str)
    }

    /// Apply a single `Set-Cookie` header value.
    pub fn apply(&mut self, header: &str) {
        let Some(cookie) = parse_set_cookie(header) else {
            tracing::debug!("Ignoring malformed Set-Cookie header");
            return;
        };
        if cookie.removal {
            self.cookies.remove(&cookie.name);
        } else {
            self.cookies.insert(cookie.name, cookie.value);
        }
    }

    /// Apply every `Set-Cookie` header of a response. Returns how many were seen.
    pub fn absorb(&mut self, headers: &HeaderMap) -> usize {
        let mut seen = 0;
        for value in headers.get_all(SET_COOKIE) {
            if let Ok(text) = value.to_str() {
                self.apply(text);
                seen += 1;
            }
        }
        seen
    }

    /// `Cookie` request header, or None for an empty jar.
    pub fn header_value(&self) -> Option<HeaderValue> {
        if self.cookies.is_empty() {
            return None;
        }
        let joined = self
            .cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&joined).ok()
    }
}

pub fn parse_set_cookie(header: &str) -> Option<SetCookie> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = value.trim().trim_matches('"');

    let mut removal = value.is_empty();
    for attr in parts {
        let (key, val) = attr.split_once('=').unwrap_or((attr, ""));
        if key.trim().eq_ignore_ascii_case("max-age") {
            if let Ok(age) = val.trim().parse::<i64>() {
                removal |= age <= 0;
            }
        }
    }

    Some(SetCookie {
        name: name.to_string(),
        value: value.to_string(),
        removal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set_cookie() {
        let c = parse_set_cookie("_omakase_session=abc%3D%3D; path=/; HttpOnly; SameSite=Lax").unwrap();
        assert_eq!(c.name, "_omakase_session");
        assert_eq!(c.value, "abc%3D%3D");
        assert!(!c.removal);
    }

    #[test]
    fn test_parse_removal() {
        assert!(parse_set_cookie("remember_user_token=; path=/").unwrap().removal);
        assert!(parse_set_cookie("a=b; Max-Age=0").unwrap().removal);
        assert!(!parse_set_cookie("a=b; max-age=3600").unwrap().removal);
    }

    #[test]
    fn test_parse_malformed() {
        assert!(parse_set_cookie("").is_none());
        assert!(parse_set_cookie("novalue").is_none());
        assert!(parse_set_cookie("=x").is_none());
    }

    #[test]
    fn test_jar_absorb_and_header() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("b=2; path=/"));
        headers.append(SET_COOKIE, HeaderValue::from_static("a=1; HttpOnly"));

        let mut jar = CookieJar::new();
        assert_eq!(jar.absorb(&headers), 2);
        assert_eq!(jar.len(), 2);
        assert_eq!(jar.header_value().unwrap(), "a=1; b=2");
    }

    #[test]
    fn test_jar_rotation_and_removal() {
        let mut jar = CookieJar::new();
        jar.apply("session=old");
        jar.apply("session=new");
        assert_eq!(jar.get("session"), Some("new"));
        jar.apply("session=; Max-Age=0");
        assert!(jar.is_empty());
        assert!(jar.header_value().is_none());
    }

    #[test]
    fn test_jar_serializes_as_map() {
        let mut jar = CookieJar::new();
        jar.insert("a", "1");
        assert_eq!(serde_json::to_string(&jar).unwrap(), r#"{"a":"1"}"#);
    }
}

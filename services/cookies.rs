/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Session cookie bridge.
//!
//! Pages loaded from `file://` have no cookie store of their own, so the web
//! application forwards `document.cookie` assignments here and reads the
//! resulting header string back.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc2822;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// URL every session cookie is stored under.
pub const COOKIE_URL: &str = "https://github.com/ngageoint/opensphere-electron";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameSite {
    Unspecified,
    NoRestriction,
    #[default]
    Lax,
    Strict,
}

impl SameSite {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "lax" => Some(Self::Lax),
            "strict" => Some(Self::Strict),
            "none" | "no_restriction" => Some(Self::NoRestriction),
            "unspecified" => Some(Self::Unspecified),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub url: String,
    pub name: String,
    pub value: String,
    /// Seconds since the UNIX epoch; `None` for a session cookie.
    pub expiration_date: Option<i64>,
    pub secure: bool,
    pub same_site: SameSite,
}

impl Cookie {
    pub fn is_expired(&self, now_secs: i64) -> bool {
        self.expiration_date.is_some_and(|expires| expires <= now_secs)
    }
}

/// Parse a `document.cookie` assignment such as
/// `name=value; max-age=3600; secure; sameSite=strict`.
///
/// `max-age` takes precedence over `expires`. Unparseable attribute values are
/// ignored. Returns `None` when the leading pair is not exactly `name=value`.
pub fn parse_set_cookie(input: &str, now_secs: i64) -> Option<Cookie> {
    let mut parts = input.split(';').map(str::trim);
    let (name, value) = split_pair(parts.next()?)?;

    let mut max_age = None;
    let mut expires = None;
    let mut secure = false;
    let mut same_site = None;

    for attribute in parts {
        let mut kv = attribute.splitn(2, '=').map(str::trim);
        let key = kv.next().unwrap_or_default();
        let value = kv.next().filter(|value| !value.is_empty());
        match (key.to_ascii_lowercase().as_str(), value) {
            ("secure", _) => secure = true,
            ("max-age", Some(value)) => max_age = value.parse::<i64>().ok(),
            ("expires", Some(value)) => expires = parse_expires(value),
            ("samesite", Some(value)) => same_site = SameSite::parse(value),
            _ => {},
        }
    }

    let expiration_date = match max_age {
        Some(max_age) => Some(now_secs.saturating_add(max_age)),
        None => expires,
    };

    Some(Cookie {
        url: COOKIE_URL.to_string(),
        name: name.to_string(),
        value: value.to_string(),
        expiration_date,
        secure,
        same_site: same_site.unwrap_or_default(),
    })
}

fn split_pair(pair: &str) -> Option<(&str, &str)> {
    let mut kv = pair.split('=').map(str::trim);
    match (kv.next(), kv.next(), kv.next()) {
        (Some(name), Some(value), None) if !name.is_empty() => Some((name, value)),
        _ => None,
    }
}

fn parse_expires(value: &str) -> Option<i64> {
    let http_date = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    PrimitiveDateTime::parse(value, http_date)
        .map(PrimitiveDateTime::assume_utc)
        .or_else(|_| OffsetDateTime::parse(value, &Rfc2822))
        .map(OffsetDateTime::unix_timestamp)
        .inspect_err(|e| log::debug!("cookies: ignoring unparseable expires '{value}': {e}"))
        .ok()
}

pub fn now_unix_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Cookies stored for [`COOKIE_URL`], keyed by name.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: Mutex<Vec<Cookie>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a parsed cookie, replacing any cookie with the same name.
    pub fn set(&self, cookie: Cookie) {
        let mut cookies = self.cookies.lock();
        match cookies.iter_mut().find(|existing| existing.name == cookie.name) {
            Some(existing) => *existing = cookie,
            None => cookies.push(cookie),
        }
    }

    /// Parse and store a `document.cookie` assignment. Returns whether the
    /// input named a cookie.
    pub fn set_from_str(&self, input: &str, now_secs: i64) -> bool {
        match parse_set_cookie(input, now_secs) {
            Some(cookie) => {
                log::debug!("cookies: set '{}'", cookie.name);
                self.set(cookie);
                true
            },
            None => {
                log::warn!("cookies: ignoring malformed cookie assignment");
                false
            },
        }
    }

    /// `name=value; name2=value2` for every unexpired cookie. Expired cookies
    /// are dropped from the jar.
    pub fn cookie_header(&self, now_secs: i64) -> String {
        let mut cookies = self.cookies.lock();
        cookies.retain(|cookie| !cookie.is_expired(now_secs));
        cookies
            .iter()
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

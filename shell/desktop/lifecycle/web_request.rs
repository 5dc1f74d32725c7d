/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Header rewriting installed on every shell window's session.

use std::collections::BTreeMap;

/// Response headers that would stop remote pages from loading in frames.
pub const DISCARDED_RESPONSE_HEADERS: [&str; 3] = ["content-security-policy", "x-frame-options", "x-xss-protection"];

pub type HeaderList = Vec<(String, String)>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WebRequestRules {
    request_headers: BTreeMap<String, String>,
}

impl WebRequestRules {
    pub fn new(request_headers: BTreeMap<String, String>) -> Self {
        Self { request_headers }
    }

    pub fn request_header_overrides(&self) -> &BTreeMap<String, String> {
        &self.request_headers
    }

    /// Set every configured header on an outgoing request, replacing any
    /// existing value with the same (case-insensitive) name.
    pub fn apply_to_request(&self, headers: &mut HeaderList) {
        for (name, value) in &self.request_headers {
            headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
            headers.push((name.clone(), value.clone()));
        }
    }

    /// Drop framing/XSS restrictions from a response.
    pub fn filter_response(&self, headers: &mut HeaderList) {
        headers.retain(|(name, _)| {
            !DISCARDED_RESPONSE_HEADERS
                .iter()
                .any(|discarded| name.eq_ignore_ascii_case(discarded))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderList {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn response_filter_is_case_insensitive() {
        let mut response = headers(&[
            ("Content-Type", "text/html"),
            ("X-Frame-Options", "DENY"),
            ("content-security-policy", "default-src 'self'"),
            ("X-XSS-Protection", "1"),
        ]);
        WebRequestRules::default().filter_response(&mut response);
        assert_eq!(response, headers(&[("Content-Type", "text/html")]));
    }

    #[test]
    fn configured_request_headers_replace_existing() {
        let mut configured = BTreeMap::new();
        configured.insert("X-Client".to_string(), "opensphere-shell".to_string());
        let rules = WebRequestRules::new(configured);

        let mut request = headers(&[("x-client", "browser"), ("Accept", "*/*")]);
        rules.apply_to_request(&mut request);
        assert_eq!(
            request,
            headers(&[("Accept", "*/*"), ("X-Client", "opensphere-shell")])
        );
    }
}

/*
 * uri.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Corriere, an HTTP exchange engine.
 *
 * Corriere is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Corriere is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Corriere.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Target URLs for exchanges: http:// and https:// with host, optional port, path and query.
//! Also resolves redirect `Location` values against the current URL.

use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::{ExchangeError, Result};

/// Characters encoded in the request target. Existing `%XX` escapes, `/`, `?`, `&`, `=` pass through.
const REQUEST_TARGET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

/// Parsed components of an exchange URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUrl {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    /// Origin-form request target: path plus optional `?query`, always starting with `/`.
    pub target: String,
}

impl TargetUrl {
    /// Parse an absolute http:// or https:// URL. The fragment, if any, is dropped.
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        let (scheme, rest) = if let Some(r) = strip_prefix_ignore_case(url, "https://") {
            (Scheme::Https, r)
        } else if let Some(r) = strip_prefix_ignore_case(url, "http://") {
            (Scheme::Http, r)
        } else {
            return Err(ExchangeError::config(format!(
                "URL scheme must be http or https: {:?}",
                url
            )));
        };
        let rest = match rest.find('#') {
            Some(i) => &rest[..i],
            None => rest,
        };

        let (authority, target) = match rest.find(['/', '?']) {
            Some(i) if rest.as_bytes()[i] == b'?' => (&rest[..i], format!("/{}", &rest[i..])),
            Some(i) => (&rest[..i], rest[i..].to_string()),
            None => (rest, "/".to_string()),
        };
        // Userinfo is not sent on the wire.
        let authority = match authority.rfind('@') {
            Some(i) => &authority[i + 1..],
            None => authority,
        };

        let (host, port) = if authority.starts_with('[') {
            match authority.find(']') {
                Some(end) => {
                    let h = &authority[1..end];
                    let after = &authority[end + 1..];
                    let p = match after.strip_prefix(':') {
                        Some(port_str) => parse_port(port_str)?,
                        None => scheme.default_port(),
                    };
                    (h, p)
                }
                None => return Err(ExchangeError::config("unterminated IPv6 bracket")),
            }
        } else {
            match authority.rfind(':') {
                Some(i) => (&authority[..i], parse_port(&authority[i + 1..])?),
                None => (authority, scheme.default_port()),
            }
        };

        if host.is_empty() {
            return Err(ExchangeError::config("URL has no host"));
        }

        Ok(Self {
            scheme,
            host: host.to_ascii_lowercase(),
            port,
            target: utf8_percent_encode(&target, REQUEST_TARGET).to_string(),
        })
    }

    pub fn is_secure(&self) -> bool {
        self.scheme == Scheme::Https
    }

    /// Value for the `Host` header: port omitted when it is the scheme default.
    pub fn host_header(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == self.scheme.default_port() {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    /// True when scheme, host and port all match.
    pub fn same_origin(&self, other: &TargetUrl) -> bool {
        self.scheme == other.scheme && self.host == other.host && self.port == other.port
    }

    /// Resolve a `Location` header value: absolute URL, scheme-relative, absolute path or relative path.
    pub fn resolve(&self, location: &str) -> Result<TargetUrl> {
        let location = location.trim();
        if location.is_empty() {
            return Err(ExchangeError::config("empty redirect location"));
        }
        let lower = location.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return TargetUrl::parse(location);
        }
        if let Some(rest) = location.strip_prefix("//") {
            return TargetUrl::parse(&format!("{}://{}", self.scheme.as_str(), rest));
        }
        let origin = format!("{}://{}", self.scheme.as_str(), self.host_header());
        if location.starts_with('/') {
            return TargetUrl::parse(&format!("{}{}", origin, location));
        }
        let path = self.target.split('?').next().unwrap_or("/");
        let base = match path.rfind('/') {
            Some(i) => &path[..=i],
            None => "/",
        };
        TargetUrl::parse(&format!("{}{}{}", origin, base, location))
    }
}

impl fmt::Display for TargetUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme.as_str(), self.host_header(), self.target)
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

fn parse_port(s: &str) -> Result<u16> {
    s.parse::<u16>()
        .map_err(|_| ExchangeError::config(format!("invalid port: {:?}", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ports_by_scheme() {
        let u = TargetUrl::parse("https://example.com").unwrap();
        assert_eq!(u.port, 443);
        assert_eq!(u.target, "/");
        assert!(u.is_secure());
        let u = TargetUrl::parse("http://example.com/a?b=c").unwrap();
        assert_eq!(u.port, 80);
        assert_eq!(u.target, "/a?b=c");
    }

    #[test]
    fn explicit_port_and_query_without_path() {
        let u = TargetUrl::parse("http://127.0.0.1:8080?x=1#frag").unwrap();
        assert_eq!(u.host, "127.0.0.1");
        assert_eq!(u.port, 8080);
        assert_eq!(u.target, "/?x=1");
        assert_eq!(u.host_header(), "127.0.0.1:8080");
    }

    #[test]
    fn ipv6_literal() {
        let u = TargetUrl::parse("http://[::1]:9000/x").unwrap();
        assert_eq!(u.host, "::1");
        assert_eq!(u.host_header(), "[::1]:9000");
    }

    #[test]
    fn spaces_in_path_are_encoded() {
        let u = TargetUrl::parse("http://h/a b").unwrap();
        assert_eq!(u.target, "/a%20b");
    }

    #[test]
    fn rejects_other_schemes_and_missing_host() {
        assert!(TargetUrl::parse("ftp://h/").is_err());
        assert!(TargetUrl::parse("http:///path").is_err());
        assert!(TargetUrl::parse("http://h:notaport/").is_err());
    }

    #[test]
    fn resolve_location_forms() {
        let base = TargetUrl::parse("http://h:8080/dir/page?q=1").unwrap();
        assert_eq!(base.resolve("/other").unwrap().to_string(), "http://h:8080/other");
        assert_eq!(base.resolve("next").unwrap().to_string(), "http://h:8080/dir/next");
        assert_eq!(base.resolve("//x.org/y").unwrap().to_string(), "http://x.org/y");
        assert_eq!(
            base.resolve("https://secure.org/z").unwrap().to_string(),
            "https://secure.org/z"
        );
        assert!(!base.same_origin(&base.resolve("//x.org/y").unwrap()));
        assert!(base.same_origin(&base.resolve("/other").unwrap()));
    }
}

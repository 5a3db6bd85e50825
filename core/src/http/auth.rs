/*
 * auth.rs
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

//! Authorization header choice. Resolved once, at dispatch time.
//!
//! Precedence: user/password (Basic) over bearer token (Bearer) over a raw header value.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    pub user: Option<String>,
    pub password: Option<String>,
    /// Base64-encode `user:password` for Basic (the default). When false the pair is sent verbatim.
    pub encode_basic: bool,
    pub bearer_token: Option<String>,
    /// Sent as the whole `Authorization` value.
    pub raw: Option<String>,
}

impl Default for Authorization {
    fn default() -> Self {
        Self {
            user: None,
            password: None,
            encode_basic: true,
            bearer_token: None,
            raw: None,
        }
    }
}

impl Authorization {
    pub fn basic(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            password: Some(password.into()),
            ..Self::default()
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn raw(value: impl Into<String>) -> Self {
        Self {
            raw: Some(value.into()),
            ..Self::default()
        }
    }

    /// The `Authorization` header value, or None when nothing is configured.
    pub fn resolve(&self) -> Option<String> {
        if let Some(user) = self.user.as_deref().filter(|u| !u.is_empty()) {
            let pair = format!("{}:{}", user, self.password.as_deref().unwrap_or(""));
            return Some(if self.encode_basic {
                format!("Basic {}", BASE64.encode(pair.as_bytes()))
            } else {
                format!("Basic {}", pair)
            });
        }
        if let Some(token) = self.bearer_token.as_deref().filter(|t| !t.is_empty()) {
            return Some(format!("Bearer {}", token));
        }
        self.raw.clone().filter(|r| !r.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_is_base64() {
        let a = Authorization::basic("Aladdin", "open sesame");
        assert_eq!(a.resolve().as_deref(), Some("Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="));
    }

    #[test]
    fn basic_unencoded() {
        let mut a = Authorization::basic("u", "p");
        a.encode_basic = false;
        assert_eq!(a.resolve().as_deref(), Some("Basic u:p"));
    }

    #[test]
    fn user_beats_bearer_beats_raw() {
        let mut a = Authorization::raw("Custom x");
        assert_eq!(a.resolve().as_deref(), Some("Custom x"));
        a.bearer_token = Some("tok".into());
        assert_eq!(a.resolve().as_deref(), Some("Bearer tok"));
        a.user = Some("u".into());
        assert!(a.resolve().unwrap().starts_with("Basic "));
    }

    #[test]
    fn empty_resolves_to_none() {
        assert_eq!(Authorization::default().resolve(), None);
    }
}

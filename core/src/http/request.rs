/*
 * request.rs
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

//! Exchange description: method, URL, headers, authorization, TLS policy, timeout, redirect and
//! chunked flags, plus the outbound body.
//!
//! The caller owns the `ExchangeSpec`; the engine only reads it.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::io::AsyncRead;

use crate::error::{ExchangeError, Result};
use crate::http::auth::Authorization;
use crate::http::headers::{is_valid_name, HeaderMap};
use crate::json::Serializer;
use crate::uri::TargetUrl;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(100);

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Put,
    Post,
    Delete,
    Patch,
    Connect,
    Options,
    Trace,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
        }
    }

    /// GET and HEAD never transmit a body.
    pub fn allows_body(&self) -> bool {
        !matches!(self, Method::Get | Method::Head)
    }
}

impl FromStr for Method {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self> {
        let m = match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "PUT" => Method::Put,
            "POST" => Method::Post,
            "DELETE" => Method::Delete,
            "PATCH" => Method::Patch,
            "CONNECT" => Method::Connect,
            "OPTIONS" => Method::Options,
            "TRACE" => Method::Trace,
            _ => return Err(ExchangeError::config(format!("invalid method: {:?}", s))),
        };
        Ok(m)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client certificate for mutual TLS: a PEM file holding the certificate chain and private key.
/// With a password the key must be an encrypted PKCS#8 block.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCertificate {
    pub path: PathBuf,
    pub password: Option<String>,
}

impl fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("path", &self.path)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Server certificate trust and client identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsPolicy {
    /// Accept any server certificate. Only for test servers.
    pub ignore_certificate_errors: bool,
    pub client_certificate: Option<ClientCertificate>,
}

/// Everything needed to perform one exchange except the body.
#[derive(Debug, Clone)]
pub struct ExchangeSpec {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    /// Overridden by an explicit `Content-Type` in `headers`.
    pub content_type: Option<String>,
    pub authorization: Authorization,
    pub tls: TlsPolicy,
    pub timeout: Duration,
    pub allow_auto_redirect: bool,
    /// Send byte bodies with chunked transfer coding instead of `Content-Length`.
    pub chunked: bool,
}

impl ExchangeSpec {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            content_type: None,
            authorization: Authorization::default(),
            tls: TlsPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
            allow_auto_redirect: true,
            chunked: false,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    /// Add or replace a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn authorization(mut self, authorization: Authorization) -> Self {
        self.authorization = authorization;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn allow_auto_redirect(mut self, allow: bool) -> Self {
        self.allow_auto_redirect = allow;
        self
    }

    pub fn chunked(mut self, chunked: bool) -> Self {
        self.chunked = chunked;
        self
    }

    pub fn ignore_certificate_errors(mut self, ignore: bool) -> Self {
        self.tls.ignore_certificate_errors = ignore;
        self
    }

    pub fn client_certificate(mut self, path: impl Into<PathBuf>, password: Option<String>) -> Self {
        self.tls.client_certificate = Some(ClientCertificate {
            path: path.into(),
            password,
        });
        self
    }

    /// Check URL and timeout; returns the parsed target.
    pub fn validate(&self) -> Result<TargetUrl> {
        if self.url.trim().is_empty() {
            return Err(ExchangeError::config("missing URL"));
        }
        if self.timeout.is_zero() {
            return Err(ExchangeError::config("timeout must be positive"));
        }
        if let Some((name, _)) = self.headers.iter().find(|(name, _)| !is_valid_name(name)) {
            return Err(ExchangeError::config(format!("invalid header name: {:?}", name)));
        }
        TargetUrl::parse(&self.url)
    }
}

/// Outbound body source.
pub enum RequestBody {
    Empty,
    Bytes(Bytes),
    /// Caller-managed stream of unknown length; sent with chunked coding framed as it is read.
    Stream(Box<dyn AsyncRead + Send + Unpin>),
    /// Bytes already framed with chunked coding, terminal chunk included (see `ChunkedBodyWriter`).
    Chunked(Bytes),
}

impl RequestBody {
    pub fn bytes(data: impl Into<Bytes>) -> Self {
        RequestBody::Bytes(data.into())
    }

    pub fn stream(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        RequestBody::Stream(Box::new(reader))
    }

    /// Serialize `value` with `serializer`.
    pub fn json<S: Serializer, T: Serialize + ?Sized>(
        serializer: &S,
        value: &T,
        pretty: bool,
    ) -> Result<Self> {
        Ok(RequestBody::Bytes(Bytes::from(serializer.serialize(value, pretty)?)))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RequestBody::Empty => true,
            RequestBody::Bytes(b) => b.is_empty(),
            RequestBody::Stream(_) | RequestBody::Chunked(_) => false,
        }
    }

    /// A copy for re-sending after a redirect. Streams cannot be replayed.
    pub fn try_clone(&self) -> Option<RequestBody> {
        match self {
            RequestBody::Empty => Some(RequestBody::Empty),
            RequestBody::Bytes(b) => Some(RequestBody::Bytes(b.clone())),
            RequestBody::Chunked(b) => Some(RequestBody::Chunked(b.clone())),
            RequestBody::Stream(_) => None,
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            RequestBody::Stream(_) => f.write_str("Stream"),
            RequestBody::Chunked(b) => write!(f, "Chunked({} bytes)", b.len()),
        }
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(data: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(data))
    }
}

impl From<&'static str> for RequestBody {
    fn from(data: &'static str) -> Self {
        RequestBody::Bytes(Bytes::from_static(data.as_bytes()))
    }
}

impl From<String> for RequestBody {
    fn from(data: String) -> Self {
        RequestBody::Bytes(Bytes::from(data))
    }
}

/*
 * writer.rs
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

//! Request head encoding: request line, Host, caller headers, connection and framing headers.

use bytes::{BufMut, BytesMut};
use tracing::warn;

use crate::http::headers::{is_valid_name, HeaderMap};
use crate::http::request::Method;
use crate::uri::TargetUrl;

/// How the request body is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLength {
    None,
    Fixed(u64),
    Chunked,
}

/// Headers the transport owns; caller values for these are never written.
const TRANSPORT_HEADERS: &[&str] = &[
    "host",
    "connection",
    "close",
    "content-length",
    "transfer-encoding",
];

fn is_transport_header(name: &str) -> bool {
    TRANSPORT_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Encode the head for one request on a dedicated connection (`Connection: close`).
///
/// Names that are not tokens are skipped; `ExchangeSpec::validate` rejects them earlier.
pub fn encode_request_head(
    method: Method,
    url: &TargetUrl,
    headers: &HeaderMap,
    length: BodyLength,
) -> BytesMut {
    let mut out = BytesMut::with_capacity(256);
    let line = format!("{} {} HTTP/1.1\r\nHost: {}\r\n", method.as_str(), url.target, url.host_header());
    out.put_slice(line.as_bytes());
    for (name, value) in headers.iter() {
        if is_transport_header(name) {
            continue;
        }
        if !is_valid_name(name) {
            warn!("header {:?} not written: name is not a token", name);
            continue;
        }
        // Header values cannot carry line breaks.
        let value = value.replace(['\r', '\n'], " ");
        out.put_slice(name.as_bytes());
        out.put_slice(b": ");
        out.put_slice(value.as_bytes());
        out.put_slice(b"\r\n");
    }
    out.put_slice(b"Connection: close\r\n");
    match length {
        BodyLength::None => {}
        BodyLength::Fixed(n) => out.put_slice(format!("Content-Length: {}\r\n", n).as_bytes()),
        BodyLength::Chunked => out.put_slice(b"Transfer-Encoding: chunked\r\n"),
    }
    out.put_slice(b"\r\n");
    out
}

/*
 * parser.rs
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

//! HTTP/1.1 response head push parser: status line and headers. The body is left in the buffer
//! for the chunked, event-stream or plain body readers.

use bytes::{Buf, BytesMut};

use crate::error::{FramingError, Result};
use crate::http::headers::HeaderMap;

/// Status line and headers of one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    /// e.g. `HTTP/1.1`
    pub version: String,
    pub status: u16,
    pub reason: String,
    pub headers: HeaderMap,
}

impl ResponseHead {
    /// 1xx other than 101 Switching Protocols: another head follows.
    pub fn is_interim(&self) -> bool {
        (100..200).contains(&self.status) && self.status != 101
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    StatusLine,
    Headers,
    HeadersComplete,
}

/// Push parser for a response head. Feed bytes via `receive` until it yields the head.
pub struct ResponseHeadParser {
    state: ParseState,
    max_head: usize,
    consumed: usize,
    version: String,
    status: u16,
    reason: String,
    headers: HeaderMap,
    /// Last header line, kept until the next line shows it is not folded.
    last_header: Option<(String, String)>,
}

impl ResponseHeadParser {
    pub fn new(max_head: usize) -> Self {
        Self {
            state: ParseState::StatusLine,
            max_head,
            consumed: 0,
            version: String::new(),
            status: 0,
            reason: String::new(),
            headers: HeaderMap::new(),
            last_header: None,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.max_head);
    }

    /// Find CRLF in buf; return number of bytes to the start of CRLF, or None if not found.
    fn find_crlf(buf: &[u8]) -> Option<usize> {
        let mut i = 0;
        while i + 1 < buf.len() {
            if buf[i] == b'\r' && buf[i + 1] == b'\n' {
                return Some(i);
            }
            i += 1;
        }
        None
    }

    /// Consume complete lines from `buf`. Returns the head once the blank line has been read;
    /// anything after it stays in `buf`.
    pub fn receive(&mut self, buf: &mut BytesMut) -> Result<Option<ResponseHead>> {
        loop {
            if self.state == ParseState::HeadersComplete {
                return Ok(None);
            }
            let line_end = match Self::find_crlf(buf) {
                Some(n) => n,
                None => {
                    if self.consumed + buf.len() > self.max_head {
                        return Err(FramingError::InvalidHead("response head too large".into()).into());
                    }
                    return Ok(None);
                }
            };
            self.consumed += line_end + 2;
            if self.consumed > self.max_head {
                return Err(FramingError::InvalidHead("response head too large".into()).into());
            }
            let line = buf.split_to(line_end);
            buf.advance(2);
            let line_str = std::str::from_utf8(&line)
                .map_err(|_| FramingError::InvalidHead("head is not valid UTF-8".into()))?;
            match self.state {
                ParseState::StatusLine => {
                    // HTTP/1.1 200 OK or HTTP/1.1 200
                    let parts: Vec<&str> = line_str.splitn(3, ' ').collect();
                    let version = parts.first().copied().unwrap_or("");
                    if !version.starts_with("HTTP/") {
                        return Err(FramingError::InvalidHead(format!("bad status line {:?}", line_str)).into());
                    }
                    let code = parts
                        .get(1)
                        .filter(|s| s.len() == 3)
                        .and_then(|s| s.parse::<u16>().ok())
                        .ok_or_else(|| FramingError::InvalidHead(format!("bad status code in {:?}", line_str)))?;
                    self.version = version.to_string();
                    self.status = code;
                    self.reason = parts.get(2).map(|s| s.trim().to_string()).unwrap_or_default();
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    if line_str.is_empty() {
                        self.flush_header();
                        self.state = ParseState::HeadersComplete;
                        return Ok(Some(ResponseHead {
                            version: std::mem::take(&mut self.version),
                            status: self.status,
                            reason: std::mem::take(&mut self.reason),
                            headers: std::mem::take(&mut self.headers),
                        }));
                    }
                    if line_str.starts_with([' ', '\t']) {
                        // Obsolete line folding: continuation of the previous value.
                        if let Some((_, value)) = self.last_header.as_mut() {
                            value.push(' ');
                            value.push_str(line_str.trim());
                        }
                        continue;
                    }
                    self.flush_header();
                    if let Some(colon) = line_str.find(':') {
                        let name = line_str[..colon].trim();
                        let value = line_str[colon + 1..].trim();
                        self.last_header = Some((name.to_string(), value.to_string()));
                    }
                }
                ParseState::HeadersComplete => return Ok(None),
            }
        }
    }

    fn flush_header(&mut self) {
        if let Some((name, value)) = self.last_header.take() {
            self.headers.append(name, value);
        }
    }
}

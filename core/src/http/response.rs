/*
 * response.rs
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

//! Response envelope: status, headers, timing and a lazily read body.
//!
//! The body is classified once from the head. Standard bodies are read into memory only when
//! asked for, and the bytes are cached so repeated reads never touch the connection again.

use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ExchangeError, FramingError, Result};
use crate::http::body::{unexpected_eof, BodyStream};
use crate::http::chunked::ChunkedBodyReader;
use crate::http::client::InboundResponse;
use crate::http::h1::ResponseHead;
use crate::http::headers::HeaderMap;
use crate::http::request::Method;
use crate::http::sse::SseReader;
use crate::json::{JsonSerializer, Serializer};
use crate::uri::TargetUrl;

/// How the response body is framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// `Content-Length`, or read until the server closes.
    Standard,
    Chunked,
    /// `text/event-stream`, chunked or not.
    EventStream,
    /// HEAD responses, 1xx, 204 and 304.
    Empty,
}

impl BodyFraming {
    pub fn classify(method: Method, head: &ResponseHead) -> Self {
        if method == Method::Head || matches!(head.status, 100..=199 | 204 | 304) {
            return BodyFraming::Empty;
        }
        let is_event_stream = head
            .headers
            .get("content-type")
            .and_then(|v| v.split(';').next())
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("text/event-stream"));
        if is_event_stream {
            BodyFraming::EventStream
        } else if is_chunked(&head.headers) {
            BodyFraming::Chunked
        } else {
            BodyFraming::Standard
        }
    }
}

fn is_chunked(headers: &HeaderMap) -> bool {
    headers.has_token("transfer-encoding", "chunked")
}

/// Wall-clock start and end of an exchange, and the monotonic time between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed: Duration,
}

/// Running clock for one exchange.
pub(crate) struct Stopwatch {
    started_at: DateTime<Utc>,
    start: Instant,
}

impl Stopwatch {
    pub(crate) fn start() -> Self {
        Self {
            started_at: Utc::now(),
            start: Instant::now(),
        }
    }

    pub(crate) fn finish(&self) -> Timing {
        Timing {
            started_at: self.started_at,
            finished_at: Utc::now(),
            elapsed: self.start.elapsed(),
        }
    }
}

enum Body {
    Stream(BodyStream),
    Chunks(ChunkedBodyReader),
    Events(SseReader),
    /// Standard body handed out for materialization; either cached or failed.
    Taken,
}

/// One received response. Dropping it closes the connection.
pub struct Response {
    head: ResponseHead,
    url: TargetUrl,
    framing: BodyFraming,
    timing: Option<Timing>,
    body: Body,
    cached: Option<Bytes>,
}

impl Response {
    pub(crate) fn new(inbound: InboundResponse, method: Method, url: TargetUrl) -> Self {
        let InboundResponse { head, body } = inbound;
        let framing = BodyFraming::classify(method, &head);
        let max_line = body.max_line_length();
        let body = match framing {
            BodyFraming::Chunked => Body::Chunks(ChunkedBodyReader::new(body)),
            BodyFraming::EventStream if is_chunked(&head.headers) => {
                Body::Events(SseReader::over_chunked(ChunkedBodyReader::new(body), max_line))
            }
            BodyFraming::EventStream => Body::Events(SseReader::new(body)),
            BodyFraming::Standard | BodyFraming::Empty => Body::Stream(body),
        };
        debug!("{} response from {}: {:?} body", head.status, url, framing);
        Self {
            head,
            url,
            framing,
            timing: None,
            body,
            cached: None,
        }
    }

    pub(crate) fn set_timing(&mut self, timing: Timing) {
        self.timing = Some(timing);
    }

    pub fn status(&self) -> u16 {
        self.head.status
    }

    pub fn reason(&self) -> &str {
        &self.head.reason
    }

    /// e.g. `HTTP/1.1`
    pub fn version(&self) -> &str {
        &self.head.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name)
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length").and_then(|v| v.trim().parse().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn framing(&self) -> BodyFraming {
        self.framing
    }

    /// URL of the final hop after redirects.
    pub fn url(&self) -> &TargetUrl {
        &self.url
    }

    pub fn timing(&self) -> Option<&Timing> {
        self.timing.as_ref()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.head.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.head.status)
    }

    /// Whole body in memory. Cached: later calls return the same bytes without reading.
    /// Chunked bodies yield the concatenation of the chunks not yet read through `chunks()`.
    pub async fn bytes(&mut self, cancel: &CancellationToken) -> Result<Bytes> {
        if let Some(cached) = &self.cached {
            return Ok(cached.clone());
        }
        let data = match self.framing {
            BodyFraming::Empty => Bytes::new(),
            BodyFraming::EventStream => {
                return Err(ExchangeError::InvalidState("event stream must be read with events()"))
            }
            BodyFraming::Chunked => match &mut self.body {
                Body::Chunks(reader) => reader.read_remaining(cancel).await?,
                _ => return Err(ExchangeError::InvalidState("chunked body unavailable")),
            },
            BodyFraming::Standard => {
                let length = self.content_length();
                match std::mem::replace(&mut self.body, Body::Taken) {
                    Body::Stream(mut stream) => read_standard(&mut stream, length, cancel).await?,
                    _ => return Err(ExchangeError::InvalidState("body read failed earlier")),
                }
            }
        };
        self.cached = Some(data.clone());
        Ok(data)
    }

    /// Body as text; invalid UTF-8 is replaced.
    pub async fn text(&mut self, cancel: &CancellationToken) -> Result<String> {
        let data = self.bytes(cancel).await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Body decoded with the default JSON serializer.
    pub async fn json<T: DeserializeOwned>(&mut self, cancel: &CancellationToken) -> Result<T> {
        self.deserialize_with(&JsonSerializer, cancel).await
    }

    pub async fn deserialize_with<S: Serializer, T: DeserializeOwned>(
        &mut self,
        serializer: &S,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let text = self.text(cancel).await?;
        serializer.deserialize(&text)
    }

    /// Chunk-by-chunk reader for a chunked body.
    pub fn chunks(&mut self) -> Result<&mut ChunkedBodyReader> {
        match &mut self.body {
            Body::Chunks(reader) => Ok(reader),
            _ => Err(ExchangeError::InvalidState("response body is not chunked")),
        }
    }

    /// Event reader for a `text/event-stream` body.
    pub fn events(&mut self) -> Result<&mut SseReader> {
        match &mut self.body {
            Body::Events(reader) => Ok(reader),
            _ => Err(ExchangeError::InvalidState("response body is not an event stream")),
        }
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.head.status)
            .field("url", &self.url.to_string())
            .field("framing", &self.framing)
            .field("timing", &self.timing)
            .finish()
    }
}

async fn read_standard(
    stream: &mut BodyStream,
    length: Option<u64>,
    cancel: &CancellationToken,
) -> Result<Bytes> {
    match length {
        Some(n) => {
            let len = usize::try_from(n)
                .map_err(|_| FramingError::InvalidHead(format!("content length {} too large", n)))?;
            let data = stream.read_exact_or_eof(len, cancel).await?;
            if data.len() < len {
                return Err(unexpected_eof("stream ended before Content-Length bytes"));
            }
            Ok(data)
        }
        None => stream.read_to_end(cancel).await,
    }
}

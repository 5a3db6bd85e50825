/*
 * sse.rs
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

//! Server-Sent Events decoder for `text/event-stream` bodies: one event per call.
//!
//! Lines end with LF or CR LF. `event`, `id`, `data` and `retry` fields build up an event until
//! a blank line. Comment lines (leading `:`) and lines without a colon are skipped.

use bytes::{Buf, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{FramingError, Result};
use crate::http::body::BodyStream;
use crate::http::chunked::ChunkedBodyReader;
use crate::json::{JsonSerializer, Serializer};

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// One dispatched event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub id: Option<String>,
    pub event: Option<String>,
    pub data: String,
    /// Reconnection time in milliseconds.
    pub retry: Option<u64>,
}

impl SseEvent {
    /// Event type, `message` when no `event` field was sent.
    pub fn event_type(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }

    /// Decode `data` as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        JsonSerializer.deserialize(&self.data)
    }
}

/// Fields seen since the last dispatch.
#[derive(Debug, Default)]
struct PendingEvent {
    id: Option<String>,
    event: Option<String>,
    data: String,
    has_data: bool,
    retry: Option<u64>,
}

impl PendingEvent {
    /// `event` or `data` seen: a blank line dispatches.
    fn has_content(&self) -> bool {
        self.event.is_some() || self.has_data
    }

    fn any_field(&self) -> bool {
        self.has_content() || self.id.is_some() || self.retry.is_some()
    }

    fn take(&mut self) -> SseEvent {
        let mut pending = std::mem::take(self);
        if pending.data.ends_with('\n') {
            pending.data.pop();
        }
        SseEvent {
            id: pending.id,
            event: pending.event,
            data: pending.data,
            retry: pending.retry,
        }
    }
}

/// Where event-stream bytes come from: the raw body, or a chunked body already being decoded.
enum Source {
    Raw(BodyStream),
    Chunked(ChunkedBodyReader),
}

/// Forward-only event reader. Not for concurrent use.
pub struct SseReader {
    source: Source,
    buf: BytesMut,
    eof: bool,
    first_line: bool,
    max_line: usize,
    pending: PendingEvent,
    last_event_id: Option<String>,
    retry: Option<u64>,
}

impl SseReader {
    pub fn new(stream: BodyStream) -> Self {
        let max_line = stream.max_line_length();
        Self::with_source(Source::Raw(stream), max_line)
    }

    /// Events carried inside a chunked body.
    pub fn over_chunked(reader: ChunkedBodyReader, max_line: usize) -> Self {
        Self::with_source(Source::Chunked(reader), max_line)
    }

    fn with_source(source: Source, max_line: usize) -> Self {
        Self {
            source,
            buf: BytesMut::new(),
            eof: false,
            first_line: true,
            max_line,
            pending: PendingEvent::default(),
            last_event_id: None,
            retry: None,
        }
    }

    /// Most recent `id` field seen on the stream.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Most recent valid `retry` value.
    pub fn retry(&self) -> Option<u64> {
        self.retry
    }

    /// Next event; `Ok(None)` at end of stream.
    pub async fn next_event(&mut self, cancel: &CancellationToken) -> Result<Option<SseEvent>> {
        loop {
            match self.next_line(cancel).await? {
                Some(line) if line.is_empty() => {
                    if self.pending.has_content() {
                        return Ok(Some(self.dispatch()));
                    }
                }
                Some(line) => self.apply(&line),
                None => {
                    if self.pending.any_field() {
                        return Ok(Some(self.dispatch()));
                    }
                    return Ok(None);
                }
            }
        }
    }

    /// Read every remaining event.
    pub async fn collect(&mut self, cancel: &CancellationToken) -> Result<Vec<SseEvent>> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event(cancel).await? {
            events.push(event);
        }
        Ok(events)
    }

    fn dispatch(&mut self) -> SseEvent {
        let event = self.pending.take();
        trace!("sse event {:?} ({} bytes of data)", event.event_type(), event.data.len());
        event
    }

    fn apply(&mut self, line: &str) {
        if line.starts_with(':') {
            return;
        }
        let Some(colon) = line.find(':') else {
            return;
        };
        let field = &line[..colon];
        let value = &line[colon + 1..];
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => self.pending.event = Some(value.to_string()),
            "id" => {
                self.pending.id = Some(value.to_string());
                self.last_event_id = Some(value.to_string());
            }
            "data" => {
                self.pending.data.push_str(value);
                self.pending.data.push('\n');
                self.pending.has_data = true;
            }
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.pending.retry = Some(ms);
                    self.retry = Some(ms);
                }
            }
            _ => {}
        }
    }

    /// Next line without its terminator. A final unterminated line is returned at end of stream.
    async fn next_line(&mut self, cancel: &CancellationToken) -> Result<Option<String>> {
        let mut scanned = 0;
        loop {
            if let Some(i) = self.buf[scanned..].iter().position(|&b| b == b'\n') {
                let end = scanned + i;
                let line = self.buf.split_to(end + 1);
                return Ok(Some(self.decode_line(&line[..end])));
            }
            scanned = self.buf.len();
            if scanned > self.max_line {
                return Err(FramingError::LineTooLong(self.max_line).into());
            }
            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let line = self.buf.split();
                return Ok(Some(self.decode_line(&line)));
            }
            match self.pull(cancel).await? {
                Some(bytes) => self.buf.extend_from_slice(&bytes),
                None => self.eof = true,
            }
        }
    }

    /// Drop a trailing CR (CRLF endings, or a last line cut off by end of stream) and the BOM.
    fn decode_line(&mut self, line: &[u8]) -> String {
        let mut line = line.strip_suffix(b"\r").unwrap_or(line);
        if self.first_line {
            self.first_line = false;
            if line.starts_with(BOM) {
                line.advance(BOM.len());
            }
        }
        String::from_utf8_lossy(line).into_owned()
    }

    async fn pull(&mut self, cancel: &CancellationToken) -> Result<Option<Bytes>> {
        match &mut self.source {
            Source::Raw(stream) => stream.read_available(cancel).await,
            Source::Chunked(reader) => loop {
                match reader.next_chunk(cancel).await? {
                    Some(record) if record.is_final => return Ok(None),
                    Some(record) if record.bytes.is_empty() => continue,
                    Some(record) => return Ok(Some(record.bytes)),
                    None => return Ok(None),
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExchangeError;

    fn reader(data: &'static [u8]) -> SseReader {
        SseReader::new(BodyStream::new(data))
    }

    async fn all(data: &'static [u8]) -> Vec<SseEvent> {
        reader(data).collect(&CancellationToken::new()).await.unwrap()
    }

    fn data_only(data: &str) -> SseEvent {
        SseEvent {
            data: data.to_string(),
            ..SseEvent::default()
        }
    }

    #[tokio::test]
    async fn multi_line_data_is_joined() {
        let events = all(b"data: A\n\ndata: B\ndata: C\n\n").await;
        assert_eq!(events, vec![data_only("A"), data_only("B\nC")]);
    }

    #[tokio::test]
    async fn comment_alone_is_no_event() {
        assert!(all(b":keepalive\n\n").await.is_empty());
    }

    #[tokio::test]
    async fn all_fields_and_crlf() {
        let events = all(b"event: update\r\nid: 7\r\nretry: 1500\r\ndata: {\"n\":1}\r\n\r\n").await;
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.event.as_deref(), Some("update"));
        assert_eq!(e.id.as_deref(), Some("7"));
        assert_eq!(e.retry, Some(1500));
        let v: serde_json::Value = e.json().unwrap();
        assert_eq!(v["n"], 1);
    }

    #[tokio::test]
    async fn only_one_leading_space_is_stripped() {
        let events = all(b"data:  two\ndata:none\n\n").await;
        assert_eq!(events[0].data, " two\nnone");
    }

    #[tokio::test]
    async fn lines_without_colon_and_unknown_fields_are_ignored() {
        let events = all(b"data\nfoo: bar\ndata: x\n\n").await;
        assert_eq!(events, vec![data_only("x")]);
    }

    #[tokio::test]
    async fn bad_retry_is_ignored() {
        let mut r = reader(b"retry: soon\ndata: x\n\n");
        let e = r.next_event(&CancellationToken::new()).await.unwrap().unwrap();
        assert_eq!(e.retry, None);
        assert_eq!(r.retry(), None);
    }

    #[tokio::test]
    async fn partial_event_at_end_of_stream_is_emitted() {
        let events = all(b"data: a\n\nevent: tail\ndata: last").await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event.as_deref(), Some("tail"));
        assert_eq!(events[1].data, "last");
    }

    #[tokio::test]
    async fn carriage_return_before_end_of_stream_is_dropped() {
        assert_eq!(all(b"data: x\r").await, vec![data_only("x")]);
        assert_eq!(all(b"data: a\r\n\r\nid: 2\r\ndata: b\r").await[1].data, "b");
    }

    #[tokio::test]
    async fn id_alone_carries_into_next_event() {
        let mut r = reader(b"id: 1\n\ndata: x\n\n");
        let events = r.collect(&CancellationToken::new()).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id.as_deref(), Some("1"));
        assert_eq!(r.last_event_id(), Some("1"));
    }

    #[tokio::test]
    async fn empty_data_field_still_dispatches() {
        let events = all(b"data:\n\n").await;
        assert_eq!(events, vec![data_only("")]);
        assert_eq!(events[0].event_type(), "message");
    }

    #[tokio::test]
    async fn byte_order_mark_is_skipped() {
        let events = all(b"\xEF\xBB\xBFdata: bom\n\n").await;
        assert_eq!(events, vec![data_only("bom")]);
    }

    #[tokio::test]
    async fn events_inside_chunked_body() {
        let body = BodyStream::new(&b"8\r\ndata: sp\r\n7\r\nlit\n\nda\r\n9\r\nta: two\n\n\r\n0\r\n\r\n"[..]);
        let mut r = SseReader::over_chunked(ChunkedBodyReader::new(body), 1024);
        let events = r.collect(&CancellationToken::new()).await.unwrap();
        assert_eq!(events, vec![data_only("split"), data_only("two")]);
    }

    #[tokio::test]
    async fn overlong_line_is_framing_error() {
        let stream = BodyStream::with_buffered(
            Box::new(std::io::Cursor::new(vec![b'x'; 100])),
            BytesMut::new(),
            16,
            32,
        );
        let err = SseReader::new(stream)
            .next_event(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Framing(FramingError::LineTooLong(32))));
    }

    #[tokio::test]
    async fn cancellation_between_events() {
        let cancel = CancellationToken::new();
        let (tx, rx) = tokio::io::duplex(64);
        let mut r = SseReader::new(BodyStream::new(rx));
        cancel.cancel();
        assert!(r.next_event(&cancel).await.unwrap_err().is_cancelled());
        drop(tx);
    }
}

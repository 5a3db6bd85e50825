/*
 * body.rs
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

//! Buffered inbound byte source for response bodies.
//!
//! Wraps the connection's read half together with bytes already buffered while the response head
//! was parsed. Every read that may wait on the network races the cancellation token.

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::{ExchangeError, FramingError, Result};

/// Forward-only, single-consumer byte source. Dropping it closes the underlying stream.
pub struct BodyStream {
    reader: Box<dyn AsyncRead + Send + Unpin>,
    buf: BytesMut,
    read_size: usize,
    max_line: usize,
    eof: bool,
}

impl BodyStream {
    /// Stream with default buffer and line limits.
    pub fn new(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        let config = EngineConfig::default();
        Self::with_buffered(
            Box::new(reader),
            BytesMut::new(),
            config.read_buffer_size,
            config.max_line_length,
        )
    }

    /// Stream whose first bytes are `buffered` (read ahead while parsing the head).
    pub fn with_buffered(
        reader: Box<dyn AsyncRead + Send + Unpin>,
        buffered: BytesMut,
        read_size: usize,
        max_line: usize,
    ) -> Self {
        Self {
            reader,
            buf: buffered,
            read_size: read_size.max(1),
            max_line: max_line.max(1),
            eof: false,
        }
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line
    }

    /// Read more bytes into the buffer. Returns 0 at end of stream.
    async fn fill(&mut self, cancel: &CancellationToken) -> Result<usize> {
        if self.eof {
            return Ok(0);
        }
        if cancel.is_cancelled() {
            return Err(ExchangeError::Cancelled);
        }
        self.buf.reserve(self.read_size);
        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExchangeError::Cancelled),
            r = self.reader.read_buf(&mut self.buf) => r?,
        };
        if n == 0 {
            self.eof = true;
        }
        Ok(n)
    }

    /// Find CRLF in buf; return number of bytes to the start of CRLF, or None if not found.
    fn find_crlf(buf: &[u8]) -> Option<usize> {
        buf.windows(2).position(|w| w == b"\r\n")
    }

    /// Next CRLF-terminated line, without the CRLF. None at a clean end of stream;
    /// a partial line at end of stream is an `UnexpectedEof` transport error.
    pub async fn read_crlf_line(&mut self, cancel: &CancellationToken) -> Result<Option<Bytes>> {
        let mut scanned = 0;
        loop {
            if let Some(i) = Self::find_crlf(&self.buf[scanned..]) {
                let end = scanned + i;
                if end > self.max_line {
                    return Err(FramingError::LineTooLong(self.max_line).into());
                }
                let line = self.buf.split_to(end).freeze();
                self.buf.advance(2);
                return Ok(Some(line));
            }
            if self.buf.len() > self.max_line + 1 {
                return Err(FramingError::LineTooLong(self.max_line).into());
            }
            // A CR at the very end may pair with an LF still to come.
            scanned = self.buf.len().saturating_sub(1);
            if self.fill(cancel).await? == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(unexpected_eof("stream ended inside a line"));
            }
        }
    }

    /// Up to `n` bytes; fewer only when the stream ends first.
    pub async fn read_exact_or_eof(&mut self, n: usize, cancel: &CancellationToken) -> Result<Bytes> {
        while self.buf.len() < n {
            if self.fill(cancel).await? == 0 {
                break;
            }
        }
        let take = n.min(self.buf.len());
        Ok(self.buf.split_to(take).freeze())
    }

    /// Whatever is buffered, or the next read from the stream. None at end of stream.
    pub async fn read_available(&mut self, cancel: &CancellationToken) -> Result<Option<Bytes>> {
        if self.buf.is_empty() && self.fill(cancel).await? == 0 {
            return Ok(None);
        }
        Ok(Some(self.buf.split().freeze()))
    }

    /// Everything up to end of stream.
    pub async fn read_to_end(&mut self, cancel: &CancellationToken) -> Result<Bytes> {
        while self.fill(cancel).await? > 0 {}
        Ok(self.buf.split().freeze())
    }
}

pub(crate) fn unexpected_eof(msg: &'static str) -> ExchangeError {
    ExchangeError::Transport(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, msg))
}

/*
 * reader.rs
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

//! Inbound chunked body decoder: one chunk per call.
//!
//! States: ReadSize → ReadData → ReadTrailingCrlf → (ReadSize | Done). A zero-size chunk goes
//! straight to Done after its trailer section has been consumed.

use bytes::{Bytes, BytesMut};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{ExchangeError, FramingError, Result};
use crate::http::body::{unexpected_eof, BodyStream};
use crate::http::headers::HeaderMap;

/// One decoded chunk. The terminal record has empty `bytes` and `is_final` set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    pub bytes: Bytes,
    pub is_final: bool,
}

impl ChunkRecord {
    fn data(bytes: Bytes) -> Self {
        Self {
            bytes,
            is_final: false,
        }
    }

    fn terminal() -> Self {
        Self {
            bytes: Bytes::new(),
            is_final: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    ReadSize,
    ReadData(u64),
    ReadTrailingCrlf,
    Done,
    /// A previous call failed; the stream position is unknown.
    Failed,
}

/// Forward-only decoder over a response body. Not for concurrent use.
pub struct ChunkedBodyReader {
    stream: BodyStream,
    state: ReadState,
    trailers: HeaderMap,
    chunks: u64,
}

impl ChunkedBodyReader {
    pub fn new(stream: BodyStream) -> Self {
        Self {
            stream,
            state: ReadState::ReadSize,
            trailers: HeaderMap::new(),
            chunks: 0,
        }
    }

    /// Next chunk; `Ok(None)` once the terminal record has been returned.
    ///
    /// Framing errors, transport errors and cancellation leave the reader failed; later calls
    /// return `InvalidState`. Chunks returned before the failure stay valid.
    pub async fn next_chunk(&mut self, cancel: &CancellationToken) -> Result<Option<ChunkRecord>> {
        match self.state {
            ReadState::Done => return Ok(None),
            ReadState::Failed => {
                return Err(ExchangeError::InvalidState("chunked reader failed earlier"))
            }
            _ => {}
        }
        match self.decode(cancel).await {
            Ok(record) => Ok(record),
            Err(e) => {
                self.state = ReadState::Failed;
                Err(e)
            }
        }
    }

    /// Trailer headers that followed the terminal chunk.
    pub fn trailers(&self) -> &HeaderMap {
        &self.trailers
    }

    pub fn is_done(&self) -> bool {
        self.state == ReadState::Done
    }

    /// Data chunks decoded so far.
    pub fn chunk_count(&self) -> u64 {
        self.chunks
    }

    /// Concatenate the payload of every remaining chunk.
    pub async fn read_remaining(&mut self, cancel: &CancellationToken) -> Result<Bytes> {
        let mut out = BytesMut::new();
        while let Some(record) = self.next_chunk(cancel).await? {
            out.extend_from_slice(&record.bytes);
        }
        Ok(out.freeze())
    }

    async fn decode(&mut self, cancel: &CancellationToken) -> Result<Option<ChunkRecord>> {
        let mut data = Bytes::new();
        loop {
            match self.state {
                ReadState::ReadSize => {
                    let line = self
                        .stream
                        .read_crlf_line(cancel)
                        .await?
                        .ok_or_else(|| unexpected_eof("stream ended before chunk size"))?;
                    let size = parse_chunk_size(&line)?;
                    if size == 0 {
                        self.read_trailers(cancel).await?;
                        self.state = ReadState::Done;
                        trace!("chunked body complete after {} chunks", self.chunks);
                        return Ok(Some(ChunkRecord::terminal()));
                    }
                    self.state = ReadState::ReadData(size);
                }
                ReadState::ReadData(size) => {
                    let len = usize::try_from(size)
                        .map_err(|_| FramingError::InvalidChunkSize(format!("{:x}", size)))?;
                    data = self.stream.read_exact_or_eof(len, cancel).await?;
                    if data.len() < len {
                        return Err(FramingError::IncompleteChunk {
                            expected: size,
                            received: data.len() as u64,
                        }
                        .into());
                    }
                    self.state = ReadState::ReadTrailingCrlf;
                }
                ReadState::ReadTrailingCrlf => {
                    let crlf = self.stream.read_exact_or_eof(2, cancel).await?;
                    if &crlf[..] != b"\r\n" {
                        return Err(FramingError::MissingChunkTerminator.into());
                    }
                    self.state = ReadState::ReadSize;
                    self.chunks += 1;
                    trace!("chunk {} decoded ({} bytes)", self.chunks, data.len());
                    return Ok(Some(ChunkRecord::data(data)));
                }
                ReadState::Done | ReadState::Failed => return Ok(None),
            }
        }
    }

    /// Consume trailer lines up to the blank line. A clean end of stream also ends the section.
    async fn read_trailers(&mut self, cancel: &CancellationToken) -> Result<()> {
        while let Some(line) = self.stream.read_crlf_line(cancel).await? {
            if line.is_empty() {
                break;
            }
            let text = String::from_utf8_lossy(&line);
            match text.find(':') {
                Some(colon) if colon > 0 => {
                    self.trailers
                        .append(text[..colon].trim(), text[colon + 1..].trim());
                }
                _ => return Err(FramingError::InvalidTrailer(text.into_owned()).into()),
            }
        }
        Ok(())
    }
}

/// Hex size before any `;` extension. Surrounding blanks are tolerated.
fn parse_chunk_size(line: &[u8]) -> Result<u64> {
    let text = std::str::from_utf8(line)
        .map_err(|_| FramingError::InvalidChunkSize(String::from_utf8_lossy(line).into_owned()))?;
    let hex = text.split(';').next().unwrap_or(text).trim_matches([' ', '\t']);
    if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(FramingError::InvalidChunkSize(text.to_string()).into());
    }
    u64::from_str_radix(hex, 16)
        .map_err(|_| ExchangeError::from(FramingError::InvalidChunkSize(text.to_string())))
}

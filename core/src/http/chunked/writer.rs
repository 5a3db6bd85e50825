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

//! Outbound chunked body, filled by repeated application calls before anything is sent.

use bytes::{Bytes, BytesMut};

use crate::error::{ExchangeError, Result};
use crate::http::chunked::framer::{encode_chunk_into, TERMINAL_CHUNK};

/// Buffers chunk frames. No I/O happens here; the engine sends the buffer once it is finalized.
#[derive(Debug, Default)]
pub struct ChunkedBodyWriter {
    buf: BytesMut,
    chunks: usize,
    finalized: bool,
}

impl ChunkedBodyWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame `data` as one chunk. Empty data writes nothing: a zero-size frame would end the body.
    pub fn append_chunk(&mut self, data: &[u8]) -> Result<()> {
        if self.finalized {
            return Err(ExchangeError::InvalidState("chunked body already finalized"));
        }
        if data.is_empty() {
            return Ok(());
        }
        encode_chunk_into(data, &mut self.buf);
        self.chunks += 1;
        Ok(())
    }

    /// Append the terminal chunk. The body is complete afterwards.
    pub fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Err(ExchangeError::InvalidState("chunked body already finalized"));
        }
        self.buf.extend_from_slice(TERMINAL_CHUNK);
        self.finalized = true;
        Ok(())
    }

    /// Number of data chunks appended so far.
    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    /// Framed bytes buffered so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The complete framed body. Fails until `finalize` has been called.
    pub fn into_body(self) -> Result<Bytes> {
        if !self.finalized {
            return Err(ExchangeError::InvalidState("chunked body not finalized"));
        }
        Ok(self.buf.freeze())
    }
}

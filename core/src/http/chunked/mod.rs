/*
 * mod.rs
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

//! Chunked transfer coding (RFC 7230 §4.1): frame helpers, outbound body writer, inbound reader.

mod framer;
mod reader;
mod writer;

pub use framer::{encode_chunk, encode_chunk_into, TERMINAL_CHUNK};
pub use reader::{ChunkRecord, ChunkedBodyReader};
pub use writer::ChunkedBodyWriter;

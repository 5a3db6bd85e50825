/*
 * framer.rs
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

//! Chunk frames: `<hex-size>\r\n<data>\r\n`, and the terminal `0\r\n\r\n`.

use bytes::{BufMut, BytesMut};

/// Zero-size chunk with an empty trailer section; ends a chunked body.
pub const TERMINAL_CHUNK: &[u8] = b"0\r\n\r\n";

/// Append one frame for `data` to `out`. An empty `data` produces the terminal frame.
pub fn encode_chunk_into(data: &[u8], out: &mut BytesMut) {
    if data.is_empty() {
        out.put_slice(TERMINAL_CHUNK);
        return;
    }
    let size = format!("{:x}\r\n", data.len());
    out.reserve(size.len() + data.len() + 2);
    out.put_slice(size.as_bytes());
    out.put_slice(data);
    out.put_slice(b"\r\n");
}

pub fn encode_chunk(data: &[u8]) -> BytesMut {
    let mut out = BytesMut::new();
    encode_chunk_into(data, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_is_lowercase_hex() {
        let data = vec![b'x'; 26];
        let framed = encode_chunk(&data);
        assert!(framed.starts_with(b"1a\r\n"));
        assert!(framed.ends_with(b"x\r\n"));
        assert_eq!(framed.len(), 4 + 26 + 2);
    }

    #[test]
    fn empty_data_is_terminal() {
        assert_eq!(&encode_chunk(b"")[..], TERMINAL_CHUNK);
    }
}

/*
 * json.rs
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

//! Pluggable body serialization. `JsonSerializer` (serde_json) is the default;
//! callers may supply any other `Serializer` for request bodies and typed response bodies.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ExchangeError, Result};

/// Serialize values to text and back.
pub trait Serializer {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T, pretty: bool) -> Result<String>;

    fn deserialize<T: DeserializeOwned>(&self, text: &str) -> Result<T>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T, pretty: bool) -> Result<String> {
        let out = if pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        out.map_err(|e| ExchangeError::Serialization(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, text: &str) -> Result<T> {
        serde_json::from_str(text).map_err(|e| ExchangeError::Serialization(e.to_string()))
    }
}

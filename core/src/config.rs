/*
 * config.rs
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

//! Engine configuration: user agent, redirect limit, buffer and line limits, connect timeout.
//! Loaded from JSON (serde) or built in code from `Default`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ExchangeError, Result};

pub const DEFAULT_USER_AGENT: &str = "Corriere/0.1";
const DEFAULT_MAX_REDIRECTS: u32 = 50;
const DEFAULT_READ_BUFFER_SIZE: usize = 8192;
const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;

/// Settings shared by every exchange an `ExchangeEngine` performs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sent as `User-Agent` unless the exchange sets its own.
    pub user_agent: Option<String>,
    pub max_redirects: u32,
    /// Size of each read from the connection.
    pub read_buffer_size: usize,
    /// Upper bound for response head lines, chunk-size lines, trailers and SSE lines.
    pub max_line_length: usize,
    pub connect_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl EngineConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| ExchangeError::config(format!("invalid engine config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.read_buffer_size == 0 {
            return Err(ExchangeError::config("read buffer size must be positive"));
        }
        if self.max_line_length == 0 {
            return Err(ExchangeError::config("max line length must be positive"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ExchangeError::config("connect timeout must be positive"));
        }
        Ok(())
    }
}

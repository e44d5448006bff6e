// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Logging setup.
//!
//! The event system only talks to the `log` facade; this module installs the
//! `env_logger` sink the engine's binaries use. `RUST_LOG` always wins over the
//! configured default filter.

use anyhow::{Context, Result};
use env_logger::{Builder, Env};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Logger configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter applied when `RUST_LOG` is not set, in `env_logger` syntax.
    pub default_filter: String,
    /// Per-module level overrides, e.g. `("ember_core::event", "trace")`.
    pub modules: Vec<(String, String)>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            modules: Vec::new(),
        }
    }
}

impl LogConfig {
    /// Reads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read log config '{}'", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("Failed to parse log config '{}'", path.display()))
    }

    /// Parses a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        for (module, level) in &config.modules {
            level
                .parse::<log::LevelFilter>()
                .with_context(|| format!("Invalid level '{level}' for module '{module}'"))?;
        }
        Ok(config)
    }

    fn builder(&self) -> Builder {
        let mut builder = Builder::from_env(Env::default().default_filter_or(&self.default_filter));
        for (module, level) in &self.modules {
            if let Ok(level) = level.parse::<log::LevelFilter>() {
                builder.filter_module(module, level);
            }
        }
        builder
    }
}

/// Installs the global logger.
///
/// Fails if a logger is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    config
        .builder()
        .try_init()
        .context("A global logger is already installed")?;
    log::debug!("Logging initialized (default filter '{}').", config.default_filter);
    Ok(())
}

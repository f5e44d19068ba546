// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

static CONFIG: OnceLock<NovajoinConfig> = OnceLock::new();

pub const DEFAULT_CHUNK_SIZE: usize = 4096;

fn default_log_level() -> String {
    "info".to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

#[derive(Clone, Deserialize)]
pub struct NovajoinConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional full tracing EnvFilter expression.
    /// If set, this takes precedence over `log_level`.
    #[serde(default)]
    pub log_filter: Option<String>,

    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Desired row count of chunks produced by build-side accumulation.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Default for NovajoinConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_filter: None,
            runtime: RuntimeConfig::default(),
        }
    }
}

impl NovajoinConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config file: {}", path.display()))?;
        let cfg: NovajoinConfig =
            toml::from_str(&s).with_context(|| format!("parse toml: {}", path.display()))?;
        Ok(cfg)
    }
}

pub fn init_from_path(path: impl AsRef<Path>) -> Result<&'static NovajoinConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let cfg = NovajoinConfig::load_from_file(path.as_ref())?;
    let _ = CONFIG.set(cfg);
    Ok(CONFIG.get().expect("CONFIG set"))
}

/// Global config accessor. Loads `$NOVAJOIN_CONFIG` or `./novajoin.toml` on
/// first use and degrades to defaults when neither exists.
pub fn config() -> &'static NovajoinConfig {
    CONFIG.get_or_init(|| {
        let Some(path) = config_path_from_env_or_default() else {
            return NovajoinConfig::default();
        };
        match NovajoinConfig::load_from_file(&path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!(
                    "failed to load config {}: {:#}, fallback to defaults",
                    path.display(),
                    err
                );
                NovajoinConfig::default()
            }
        }
    })
}

fn config_path_from_env_or_default() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("NOVAJOIN_CONFIG") {
        if !p.trim().is_empty() {
            return Some(PathBuf::from(p));
        }
    }
    let candidate = PathBuf::from("novajoin.toml");
    if candidate.exists() {
        return Some(candidate);
    }
    None
}

pub fn chunk_size() -> usize {
    config().runtime.chunk_size.max(1)
}

pub fn log_filter() -> String {
    let cfg = config();
    cfg.log_filter
        .clone()
        .unwrap_or_else(|| cfg.log_level.clone())
}

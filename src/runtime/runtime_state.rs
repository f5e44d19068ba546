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
use crate::common::config;

/// RuntimeState is a per-fragment-instance execution context.
///
/// Today it mainly provides access to frequently used query options, in
/// particular the desired chunk row count used when the build side is
/// materialized.
#[derive(Clone, Debug, Default)]
pub struct RuntimeState {
    chunk_size: Option<usize>,
}

impl RuntimeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State whose chunk size comes from query options rather than config.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: Some(chunk_size.max(1)),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size.unwrap_or_else(config::chunk_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_chunk_size_comes_from_config() {
        let state = RuntimeState::default();
        assert_eq!(state.chunk_size(), config::chunk_size());
    }

    #[test]
    fn query_option_overrides_config() {
        let state = RuntimeState::with_chunk_size(7);
        assert_eq!(state.chunk_size(), 7);
    }

    #[test]
    fn zero_chunk_size_is_clamped() {
        let state = RuntimeState::with_chunk_size(0);
        assert_eq!(state.chunk_size(), 1);
    }
}

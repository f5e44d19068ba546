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
//! Runtime-filter types for the cross-join build side.
//!
//! Responsibilities:
//! - Defines the filter carrier, the per-node collector registry, and the
//!   rewrite hook the build-finalization path invokes for single-row builds.
//!
//! Key exported interfaces:
//! - Types: `RuntimeInFilter`, `RuntimeFilterCollector`, `RuntimeFilterHub`.
//! - Traits: `RuntimeFilterRewriter`.

use crate::exec::chunk::Chunk;

mod hub;
mod in_filter;

pub use hub::{RuntimeFilterCollector, RuntimeFilterHub};
pub use in_filter::RuntimeInFilter;

/// Expression-evaluation collaborator deriving equality ("in") filters from
/// the unique build-side row of a cross join.
///
/// Invoked at build finalization, only when the finalized build table holds
/// exactly one row.
pub trait RuntimeFilterRewriter: Send + Sync {
    fn rewrite_runtime_filter(&self, one_row_chunk: &Chunk) -> Result<Vec<RuntimeInFilter>, String>;
}

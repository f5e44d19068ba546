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
//! Shared build/probe state for cross-join execution.
//!
//! Responsibilities:
//! - Accumulates build-side chunks from parallel build workers and
//!   materializes them into the shared build table exactly once.
//! - Publishes the cross-join runtime filter at build finalization.
//! - Merges per-prober build match flags so the last prober can emit
//!   unmatched build rows for outer joins.
//!
//! Key exported interfaces:
//! - Types: `CrossJoinContext`, `CrossJoinContextParams`, `BuildArtifact`,
//!   `JoinStage`.
//!
//! Current limitations:
//! - Row matching itself and unmatched-row emission are the probe operator's
//!   business; this context only coordinates their shared state.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::exec::chunk::{Chunk, ChunkAccumulator};
use crate::exec::runtime_filter::{
    RuntimeFilterCollector, RuntimeFilterHub, RuntimeFilterRewriter,
};
use crate::novajoin_logging::debug;
use crate::runtime::RuntimeState;

/// Lifecycle of one cross-join context. Transitions only move forward.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum JoinStage {
    Init,
    Building,
    BuildFinalized,
    Probing,
    ProbeFinalized,
    Closed,
}

/// Construction parameters supplied by the pipeline builder.
pub struct CrossJoinContextParams {
    pub plan_node_id: i32,
    /// Parallel build workers expected to call `finish_one_build_worker`.
    pub num_build_workers: usize,
    /// Parallel probe workers expected to call `finish_probe`.
    pub num_probe_workers: usize,
    pub rf_hub: Arc<RuntimeFilterHub>,
    /// Expression-evaluation collaborator for the single-row filter rewrite.
    pub rf_rewriter: Option<Arc<dyn RuntimeFilterRewriter>>,
}

/// Materialized, read-only build side of one cross join.
///
/// Every chunk is non-empty; all but possibly the last hold exactly the
/// recorded desired row count, which is what makes `chunk_start` a pure
/// multiplication.
pub struct BuildArtifact {
    chunks: Vec<Chunk>,
    desired_chunk_size: usize,
    num_rows: usize,
}

impl BuildArtifact {
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn desired_chunk_size(&self) -> usize {
        self.desired_chunk_size
    }

    /// Global row offset of the chunk at `index`.
    pub fn chunk_start(&self, index: usize) -> usize {
        self.desired_chunk_size * index
    }
}

struct ProbeState {
    num_post_probers: usize,
    shared_build_match_flags: Vec<u8>,
}

/// Shared state of one cross-join build/probe stage.
///
/// Build workers append into disjoint per-worker slots, so the build phase
/// needs no cross-worker synchronization. The last worker through the build
/// barrier materializes the table and publishes the runtime filter; the last
/// prober through the probe barrier completes the merged match-flag view.
pub struct CrossJoinContext {
    plan_node_id: i32,
    num_build_workers: usize,
    num_probe_workers: usize,
    rf_hub: Arc<RuntimeFilterHub>,
    rf_rewriter: Option<Arc<dyn RuntimeFilterRewriter>>,

    input_chunks: Vec<Mutex<Vec<Chunk>>>,
    num_finished_build_workers: AtomicUsize,
    build: Mutex<Option<Arc<BuildArtifact>>>,
    build_finished: AtomicBool,

    probe: Mutex<ProbeState>,
    stage: Mutex<JoinStage>,
}

impl CrossJoinContext {
    pub fn new(params: CrossJoinContextParams) -> Self {
        let num_build_workers = params.num_build_workers.max(1);
        let num_probe_workers = params.num_probe_workers.max(1);
        let mut input_chunks = Vec::with_capacity(num_build_workers);
        input_chunks.resize_with(num_build_workers, || Mutex::new(Vec::new()));
        Self {
            plan_node_id: params.plan_node_id,
            num_build_workers,
            num_probe_workers,
            rf_hub: params.rf_hub,
            rf_rewriter: params.rf_rewriter,
            input_chunks,
            num_finished_build_workers: AtomicUsize::new(0),
            build: Mutex::new(None),
            build_finished: AtomicBool::new(false),
            probe: Mutex::new(ProbeState {
                num_post_probers: 0,
                shared_build_match_flags: Vec::new(),
            }),
            stage: Mutex::new(JoinStage::Init),
        }
    }

    pub fn plan_node_id(&self) -> i32 {
        self.plan_node_id
    }

    pub fn stage(&self) -> JoinStage {
        *self.stage.lock().expect("join stage lock")
    }

    fn advance_stage(&self, next: JoinStage) {
        let mut stage = self.stage.lock().expect("join stage lock");
        if *stage < next {
            debug!(
                "cross join node {} stage {:?} -> {:?}",
                self.plan_node_id, *stage, next
            );
            *stage = next;
        }
    }

    /// Appends a build-side chunk to `worker_id`'s slot. Empty chunks are
    /// stored and contribute zero rows at finalization.
    pub fn append_build_chunk(&self, worker_id: usize, chunk: Chunk) -> Result<(), String> {
        let Some(slot) = self.input_chunks.get(worker_id) else {
            return Err(format!(
                "cross join node {} build worker id {} out of range ({} workers)",
                self.plan_node_id, worker_id, self.num_build_workers
            ));
        };
        if self.stage() >= JoinStage::BuildFinalized {
            return Err(format!(
                "cross join node {} append after build finalized",
                self.plan_node_id
            ));
        }
        self.advance_stage(JoinStage::Building);
        slot.lock().expect("build slot lock").push(chunk);
        Ok(())
    }

    /// Build-side fan-in barrier. Called once per build worker; the caller
    /// whose increment completes the expected count materializes the build
    /// table, publishes the runtime filter and marks the build finished.
    ///
    /// An error from the finalizer is fatal for the query: the counter has
    /// already advanced, so the barrier must never be retried.
    pub fn finish_one_build_worker(&self, state: &RuntimeState) -> Result<(), String> {
        let prev = self.num_finished_build_workers.fetch_add(1, Ordering::AcqRel);
        if prev + 1 != self.num_build_workers {
            return Ok(());
        }
        // Last build worker; no other worker can still be appending.
        let artifact = self.materialize_build_side(state)?;
        self.init_runtime_filter(&artifact)?;
        debug!(
            "cross join node {} build finalized: {} chunks, {} rows",
            self.plan_node_id,
            artifact.chunks.len(),
            artifact.num_rows
        );
        *self.build.lock().expect("build artifact lock") = Some(Arc::new(artifact));
        self.build_finished.store(true, Ordering::Release);
        self.advance_stage(JoinStage::BuildFinalized);
        Ok(())
    }

    fn materialize_build_side(&self, state: &RuntimeState) -> Result<BuildArtifact, String> {
        let desired_chunk_size = state.chunk_size();
        let mut accumulator = ChunkAccumulator::new(desired_chunk_size);
        let mut num_rows = 0;
        for slot in &self.input_chunks {
            let chunks = std::mem::take(&mut *slot.lock().expect("build slot lock"));
            for chunk in chunks {
                if chunk.is_empty() {
                    continue;
                }
                num_rows += chunk.len();
                accumulator.push(chunk)?;
            }
        }
        accumulator.finalize()?;
        let mut chunks = Vec::new();
        while let Some(chunk) = accumulator.pull() {
            chunks.push(chunk);
        }
        Ok(BuildArtifact {
            chunks,
            desired_chunk_size,
            num_rows,
        })
    }

    fn init_runtime_filter(&self, artifact: &BuildArtifact) -> Result<(), String> {
        // A build side with anything but exactly one row admits no equality
        // rewrite; publishing PassThrough unblocks the probe-side consumers.
        let collector = match (artifact.num_rows, &self.rf_rewriter) {
            (1, Some(rewriter)) => {
                let one_row_chunk = artifact
                    .chunks
                    .iter()
                    .find(|c| c.len() == 1)
                    .ok_or_else(|| {
                        format!(
                            "cross join node {} build table has one row but no one-row chunk",
                            self.plan_node_id
                        )
                    })?;
                RuntimeFilterCollector::InFilters(rewriter.rewrite_runtime_filter(one_row_chunk)?)
            }
            _ => RuntimeFilterCollector::PassThrough,
        };
        self.rf_hub.set_collector(self.plan_node_id, collector)
    }

    pub fn is_build_finished(&self) -> bool {
        self.build_finished.load(Ordering::Acquire)
    }

    pub fn build(&self) -> Option<Arc<BuildArtifact>> {
        self.build.lock().expect("build artifact lock").clone()
    }

    pub fn num_build_rows(&self) -> usize {
        self.build().map(|b| b.num_rows).unwrap_or(0)
    }

    /// Global row offset of build chunk `index` under the desired chunk size
    /// recorded at finalization.
    pub fn build_chunk_start(&self, index: usize) -> Result<usize, String> {
        let Some(artifact) = self.build() else {
            return Err(format!(
                "cross join node {} build chunk start before build finalized",
                self.plan_node_id
            ));
        };
        if index >= artifact.chunks.len() {
            return Err(format!(
                "cross join node {} build chunk index {} out of range ({} chunks)",
                self.plan_node_id,
                index,
                artifact.chunks.len()
            ));
        }
        Ok(artifact.chunk_start(index))
    }

    /// Probe-side fan-in barrier and match-flag merger. Called once per probe
    /// worker with its local per-build-row match flags (empty when the worker
    /// saw no probe rows). Returns whether this call was the last expected
    /// prober.
    ///
    /// The prober count and the shared flags live under one mutex: the merge
    /// is a read-modify-write over the whole vector and cannot be folded into
    /// a single atomic.
    pub fn finish_probe(&self, worker_id: i32, local_match_flags: &[u8]) -> Result<bool, String> {
        let mut probe = self.probe.lock().expect("join stage lock");
        probe.num_post_probers += 1;
        let is_last = probe.num_post_probers == self.num_probe_workers;
        debug!(
            "cross join node {} probe worker {} finished {}/{}",
            self.plan_node_id, worker_id, probe.num_post_probers, self.num_probe_workers
        );
        if !local_match_flags.is_empty() {
            if probe.shared_build_match_flags.is_empty() {
                probe.shared_build_match_flags = vec![0u8; local_match_flags.len()];
            }
            if probe.shared_build_match_flags.len() != local_match_flags.len() {
                return Err(format!(
                    "cross join node {} build match flag size mismatch: shared={} local={}",
                    self.plan_node_id,
                    probe.shared_build_match_flags.len(),
                    local_match_flags.len()
                ));
            }
            for (shared, local) in probe
                .shared_build_match_flags
                .iter_mut()
                .zip(local_match_flags)
            {
                *shared |= *local;
            }
        }
        drop(probe);
        self.advance_stage(if is_last {
            JoinStage::ProbeFinalized
        } else {
            JoinStage::Probing
        });
        Ok(is_last)
    }

    /// Fully merged build match flags. Valid only after every expected prober
    /// has reported through `finish_probe`; an earlier read is an upstream
    /// scheduling bug.
    pub fn shared_build_match_flags(&self) -> Result<Vec<u8>, String> {
        let probe = self.probe.lock().expect("join stage lock");
        if probe.num_post_probers != self.num_probe_workers {
            return Err(format!(
                "cross join node {} build match flags read before all probers finished: {}/{}",
                self.plan_node_id, probe.num_post_probers, self.num_probe_workers
            ));
        }
        Ok(probe.shared_build_match_flags.clone())
    }

    /// Releases the build table and all buffered state. Idempotent and safe
    /// to call mid-build; in-flight merges are abandoned, not finished.
    pub fn close(&self) {
        for slot in &self.input_chunks {
            slot.lock().expect("build slot lock").clear();
        }
        *self.build.lock().expect("build artifact lock") = None;
        self.probe
            .lock()
            .expect("join stage lock")
            .shared_build_match_flags = Vec::new();
        self.advance_stage(JoinStage::Closed);
    }
}

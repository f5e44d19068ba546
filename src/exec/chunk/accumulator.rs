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
use std::collections::VecDeque;

use arrow::compute::concat_batches;

use super::Chunk;

/// Repacks a stream of arbitrarily sized chunks into chunks close to a desired
/// row count.
///
/// `push` accepts input until `finalize` signals end of input, after which
/// `pull` drains the remaining buffered rows. Empty input chunks are dropped.
/// Row order is preserved and only the last output chunk may be smaller than
/// the desired size. All pushed chunks must share a schema.
pub struct ChunkAccumulator {
    desired_size: usize,
    pending: Vec<Chunk>,
    pending_rows: usize,
    ready: VecDeque<Chunk>,
    finalized: bool,
}

impl ChunkAccumulator {
    pub fn new(desired_size: usize) -> Self {
        Self {
            desired_size: desired_size.max(1),
            pending: Vec::new(),
            pending_rows: 0,
            ready: VecDeque::new(),
            finalized: false,
        }
    }

    pub fn push(&mut self, chunk: Chunk) -> Result<(), String> {
        if self.finalized {
            return Err("chunk accumulator push after finalize".to_string());
        }
        if chunk.is_empty() {
            return Ok(());
        }
        // A whole desired-size chunk with nothing buffered passes through as is.
        if self.pending_rows == 0 && chunk.len() == self.desired_size {
            self.ready.push_back(chunk);
            return Ok(());
        }
        let mut offset = 0;
        while offset < chunk.len() {
            let take = (self.desired_size - self.pending_rows).min(chunk.len() - offset);
            self.pending.push(chunk.slice(offset, take));
            self.pending_rows += take;
            offset += take;
            if self.pending_rows == self.desired_size {
                self.flush()?;
            }
        }
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<(), String> {
        self.finalized = true;
        self.flush()
    }

    pub fn pull(&mut self) -> Option<Chunk> {
        self.ready.pop_front()
    }

    fn flush(&mut self) -> Result<(), String> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut chunks = std::mem::take(&mut self.pending);
        self.pending_rows = 0;
        if chunks.len() == 1 {
            if let Some(chunk) = chunks.pop() {
                self.ready.push_back(chunk);
            }
            return Ok(());
        }
        let schema = chunks[0].schema();
        let batch = concat_batches(&schema, chunks.iter().map(|c| &c.batch))
            .map_err(|e| format!("concat chunks: {e}"))?;
        self.ready.push_back(Chunk::try_new(batch)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{Array, Int32Array, RecordBatch};
    use arrow::datatypes::{DataType, Field, Schema};

    use crate::common::ids::SlotId;
    use crate::exec::chunk::field_with_slot_id;

    fn int_chunk(values: &[i32]) -> Chunk {
        let schema = Arc::new(Schema::new(vec![field_with_slot_id(
            Field::new("a", DataType::Int32, true),
            SlotId::new(1),
        )]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(values.to_vec()))])
            .expect("record batch");
        Chunk::try_new(batch).expect("chunk")
    }

    fn chunk_values(chunk: &Chunk) -> Vec<i32> {
        let column = chunk.columns()[0].clone();
        let values = column
            .as_any()
            .downcast_ref::<Int32Array>()
            .expect("int32 column");
        (0..values.len()).map(|i| values.value(i)).collect()
    }

    fn drain(accumulator: &mut ChunkAccumulator) -> Vec<Chunk> {
        let mut out = Vec::new();
        while let Some(chunk) = accumulator.pull() {
            out.push(chunk);
        }
        out
    }

    #[test]
    fn repack_preserves_rows_and_order() {
        let mut accumulator = ChunkAccumulator::new(4);
        accumulator.push(int_chunk(&[1, 2, 3])).expect("push");
        accumulator.push(int_chunk(&[4, 5, 6, 7])).expect("push");
        accumulator.finalize().expect("finalize");
        let out = drain(&mut accumulator);
        assert_eq!(out.len(), 2);
        assert_eq!(chunk_values(&out[0]), vec![1, 2, 3, 4]);
        assert_eq!(chunk_values(&out[1]), vec![5, 6, 7]);
        assert!(accumulator.pull().is_none());
    }

    #[test]
    fn empty_inputs_are_dropped() {
        let mut accumulator = ChunkAccumulator::new(3);
        accumulator.push(int_chunk(&[])).expect("push");
        accumulator.push(int_chunk(&[1])).expect("push");
        accumulator.push(int_chunk(&[])).expect("push");
        accumulator.finalize().expect("finalize");
        let out = drain(&mut accumulator);
        assert_eq!(out.len(), 1);
        assert_eq!(chunk_values(&out[0]), vec![1]);
    }

    #[test]
    fn full_chunk_passes_through_unsliced() {
        let mut accumulator = ChunkAccumulator::new(3);
        accumulator.push(int_chunk(&[1, 2, 3])).expect("push");
        let first = accumulator.pull().expect("ready before finalize");
        assert_eq!(chunk_values(&first), vec![1, 2, 3]);
        accumulator.finalize().expect("finalize");
        assert!(accumulator.pull().is_none());
    }

    #[test]
    fn desired_size_moves_only_boundaries() {
        let input: Vec<i32> = (0..10).collect();
        let mut flat_by_size = Vec::new();
        for desired in [2usize, 3, 7] {
            let mut accumulator = ChunkAccumulator::new(desired);
            accumulator.push(int_chunk(&input[..4])).expect("push");
            accumulator.push(int_chunk(&input[4..])).expect("push");
            accumulator.finalize().expect("finalize");
            let out = drain(&mut accumulator);
            for chunk in &out[..out.len() - 1] {
                assert_eq!(chunk.len(), desired);
            }
            let flat: Vec<i32> = out.iter().flat_map(|c| chunk_values(c)).collect();
            flat_by_size.push(flat);
        }
        assert_eq!(flat_by_size[0], input);
        assert_eq!(flat_by_size[1], input);
        assert_eq!(flat_by_size[2], input);
    }

    #[test]
    fn push_after_finalize_is_an_error() {
        let mut accumulator = ChunkAccumulator::new(2);
        accumulator.finalize().expect("finalize");
        let err = accumulator
            .push(int_chunk(&[1]))
            .expect_err("expected push error");
        assert!(err.contains("after finalize"), "err={}", err);
    }

    #[test]
    fn zero_desired_size_is_clamped() {
        let mut accumulator = ChunkAccumulator::new(0);
        accumulator.push(int_chunk(&[1, 2])).expect("push");
        accumulator.finalize().expect("finalize");
        let out = drain(&mut accumulator);
        assert_eq!(out.len(), 2);
        assert_eq!(chunk_values(&out[0]), vec![1]);
        assert_eq!(chunk_values(&out[1]), vec![2]);
    }
}

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
//! Exact-value IN runtime filter carrier.
//!
//! Responsibilities:
//! - Carries the admitted build-side values for one probe-side expression.
//!
//! Current limitations:
//! - Probe-time encoding and application of the filter live outside this
//!   crate; consumers read the admitted values and build their own lookup
//!   structure.

use arrow::array::{Array, ArrayRef};

use crate::common::ids::SlotId;

/// Equality ("in") runtime filter derived from build-side rows.
#[derive(Clone, Debug)]
pub struct RuntimeInFilter {
    filter_id: i32,
    slot_id: SlotId,
    values: ArrayRef,
}

impl RuntimeInFilter {
    pub fn try_new(filter_id: i32, slot_id: SlotId, values: ArrayRef) -> Result<Self, String> {
        if values.is_empty() {
            return Err(format!(
                "runtime in filter {} for slot {} has no admitted values",
                filter_id, slot_id
            ));
        }
        Ok(Self {
            filter_id,
            slot_id,
            values,
        })
    }

    pub fn filter_id(&self) -> i32 {
        self.filter_id
    }

    pub fn slot_id(&self) -> SlotId {
        self.slot_id
    }

    pub fn values(&self) -> &ArrayRef {
        &self.values
    }

    pub fn num_values(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::Int32Array;

    #[test]
    fn carries_admitted_values() {
        let values: ArrayRef = Arc::new(Int32Array::from(vec![42]));
        let filter = RuntimeInFilter::try_new(7, SlotId::new(2), values).expect("filter");
        assert_eq!(filter.filter_id(), 7);
        assert_eq!(filter.slot_id(), SlotId::new(2));
        assert_eq!(filter.num_values(), 1);
    }

    #[test]
    fn rejects_empty_values() {
        let values: ArrayRef = Arc::new(Int32Array::from(Vec::<i32>::new()));
        let err = RuntimeInFilter::try_new(1, SlotId::new(1), values)
            .expect_err("expected empty values error");
        assert!(err.contains("no admitted values"), "err={}", err);
    }
}

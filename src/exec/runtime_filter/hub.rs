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
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::in_filter::RuntimeInFilter;

/// Runtime filters published by one cross-join build side.
///
/// `PassThrough` explicitly signals that no selective filter is derivable, so
/// downstream consumers stop waiting for one.
#[derive(Clone, Debug)]
pub enum RuntimeFilterCollector {
    InFilters(Vec<RuntimeInFilter>),
    PassThrough,
}

impl RuntimeFilterCollector {
    pub fn is_pass_through(&self) -> bool {
        matches!(self, Self::PassThrough)
    }

    pub fn in_filters(&self) -> &[RuntimeInFilter] {
        match self {
            Self::InFilters(filters) => filters,
            Self::PassThrough => &[],
        }
    }
}

/// Registry of runtime filter collectors keyed by plan node id.
///
/// Handed to each cross-join context at construction rather than reached
/// through a global, so tests can substitute their own instance. Registration
/// is write-once per plan node for the registry's lifetime.
#[derive(Default)]
pub struct RuntimeFilterHub {
    collectors: Mutex<HashMap<i32, Arc<RuntimeFilterCollector>>>,
}

impl RuntimeFilterHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_collector(
        &self,
        plan_node_id: i32,
        collector: RuntimeFilterCollector,
    ) -> Result<(), String> {
        let mut guard = self.collectors.lock().expect("runtime filter hub lock");
        if guard.contains_key(&plan_node_id) {
            return Err(format!(
                "runtime filter collector for plan node {} already set",
                plan_node_id
            ));
        }
        guard.insert(plan_node_id, Arc::new(collector));
        Ok(())
    }

    pub fn collector(&self, plan_node_id: i32) -> Option<Arc<RuntimeFilterCollector>> {
        let guard = self.collectors.lock().expect("runtime filter hub lock");
        guard.get(&plan_node_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Int32Array};

    use crate::common::ids::SlotId;

    #[test]
    fn set_collector_is_write_once() {
        let hub = RuntimeFilterHub::new();
        hub.set_collector(3, RuntimeFilterCollector::PassThrough)
            .expect("first set");
        let err = hub
            .set_collector(3, RuntimeFilterCollector::PassThrough)
            .expect_err("expected duplicate error");
        assert!(err.contains("already set"), "err={}", err);
        assert!(hub.collector(4).is_none());
    }

    #[test]
    fn collector_reports_pass_through() {
        let hub = RuntimeFilterHub::new();
        hub.set_collector(1, RuntimeFilterCollector::PassThrough)
            .expect("set");
        let collector = hub.collector(1).expect("collector");
        assert!(collector.is_pass_through());
        assert!(collector.in_filters().is_empty());
    }

    #[test]
    fn collector_exposes_in_filters() {
        let hub = RuntimeFilterHub::new();
        let values: ArrayRef = Arc::new(Int32Array::from(vec![5]));
        let filter = RuntimeInFilter::try_new(0, SlotId::new(1), values).expect("filter");
        hub.set_collector(1, RuntimeFilterCollector::InFilters(vec![filter]))
            .expect("set");
        let collector = hub.collector(1).expect("collector");
        assert!(!collector.is_pass_through());
        assert_eq!(collector.in_filters().len(), 1);
        assert_eq!(collector.in_filters()[0].slot_id(), SlotId::new(1));
    }
}

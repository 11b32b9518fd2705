//! Span Mapping
//!
//! Maps instruction node ids to the address of the machine instruction they
//! were lifted from. Only the first span of each record is used.

use crate::lifter::ast::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEntry {
    pub base_va: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanRecord {
    pub id: NodeId,
    #[serde(default)]
    pub spans: Vec<SpanEntry>,
}

impl SpanRecord {
    pub fn new(id: NodeId, base_va: impl Into<String>, size: Option<u32>) -> Self {
        Self {
            id,
            spans: vec![SpanEntry {
                base_va: base_va.into(),
                size,
            }],
        }
    }
}

/// `id -> base_va` lookup.
#[derive(Debug, Clone, Default)]
pub struct SpanMap {
    map: HashMap<NodeId, String>,
}

impl SpanMap {
    pub fn from_records(records: &[SpanRecord]) -> Self {
        let mut map: HashMap<NodeId, String> = HashMap::with_capacity(records.len());
        for record in records {
            match record.spans.first() {
                Some(span) => {
                    map.entry(record.id).or_insert_with(|| span.base_va.clone());
                }
                None => {
                    log::warn!("span record for node {} carries no spans", record.id);
                }
            }
        }
        Self { map }
    }

    pub fn get(&self, id: NodeId) -> Option<&str> {
        self.map.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

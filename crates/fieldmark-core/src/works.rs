//! Work-order aggregation derived from the marking set.
//!
//! Work records are never authored or persisted on their own; they are
//! rebuilt from the markings whenever the collection changes.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::Marking;

/// Aggregated view of all markings sharing one work-order number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkSummary {
    pub work_order: String,
    pub marking_count: usize,
    /// Distinct products across the group, sorted.
    pub products: Vec<String>,
    /// Earliest creation time in the group, epoch millis.
    pub first_seen: i64,
    /// Latest mutation time in the group, epoch millis.
    pub last_modified: i64,
}

/// Normalize a raw work-order number for grouping.
///
/// Alphanumeric runs are uppercased and rejoined with a single dash, so
/// `" wo 2024/017 "`, `"WO-2024-017"`, and `"wo_2024_017"` group together.
pub fn normalize_work_order(raw: &str) -> Option<String> {
    let re = Regex::new(r"[A-Za-z0-9]+").expect("Invalid regex");
    let parts: Vec<String> = re
        .find_iter(raw)
        .map(|m| m.as_str().to_uppercase())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("-"))
    }
}

/// Rebuild work summaries from the marking set, sorted by work order.
///
/// Markings without a usable work-order number are left out.
#[must_use]
pub fn group_by_work_order(markings: &[Marking]) -> Vec<WorkSummary> {
    let mut groups: BTreeMap<String, WorkSummary> = BTreeMap::new();

    for marking in markings {
        let Some(work_order) = marking
            .properties
            .work_order
            .as_deref()
            .and_then(normalize_work_order)
        else {
            continue;
        };

        let created = marking.timestamp.unwrap_or(0);
        let modified = marking.effective_modified();

        let entry = groups
            .entry(work_order.clone())
            .or_insert_with(|| WorkSummary {
                work_order,
                marking_count: 0,
                products: Vec::new(),
                first_seen: created,
                last_modified: modified,
            });
        entry.marking_count += 1;
        entry.first_seen = entry.first_seen.min(created);
        entry.last_modified = entry.last_modified.max(modified);
        if let Some(product) = marking.properties.product.as_deref() {
            if !entry.products.iter().any(|known| known == product) {
                entry.products.push(product.to_string());
            }
        }
    }

    let mut summaries: Vec<WorkSummary> = groups.into_values().collect();
    for summary in &mut summaries {
        summary.products.sort();
    }
    summaries
}

//! Record and result fixtures shared by the job tests
#![allow(dead_code)]

use qc_tool::models::record::RecordBatch;
use qc_tool::models::task::ValidationResultItem;
use serde_json::json;

/// Records "r1".."rN" with distinct text.
pub fn numbered_records(n: usize) -> RecordBatch {
    (1..=n)
        .map(|i| (format!("r{i}"), format!("Heading text for record {i}")))
        .collect()
}

/// One result item per record in `chunk`, in chunk order.
pub fn items_for(chunk: &RecordBatch) -> Vec<ValidationResultItem> {
    chunk
        .ids()
        .map(|id| json!({"id": id, "valid": true, "issues": []}))
        .collect()
}

/// `count` items tagged with the batch they came from.
pub fn tagged_items(batch: usize, count: usize) -> Vec<ValidationResultItem> {
    (0..count)
        .map(|i| json!({"batch": batch, "item": i}))
        .collect()
}

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;

/// Ordered mapping of record id to the free text submitted for validation.
///
/// Serializes as a JSON object. Key order of the source document is kept,
/// so results can be matched back to input order after chunking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordBatch {
    entries: Vec<(String, String)>,
}

impl RecordBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Callers are responsible for id uniqueness.
    pub fn push(&mut self, id: impl Into<String>, text: impl Into<String>) {
        self.entries.push((id.into(), text.into()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(id, text)| (id.as_str(), text.as_str()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    /// Split into ordered chunks of at most `size` records. A `size` of zero
    /// is treated as one.
    pub fn chunks(&self, size: usize) -> Vec<RecordBatch> {
        self.entries
            .chunks(size.max(1))
            .map(|slice| RecordBatch {
                entries: slice.to_vec(),
            })
            .collect()
    }
}

/// Number of chunks a batch of `records` splits into.
pub fn chunk_count(records: usize, size: usize) -> usize {
    records.div_ceil(size.max(1))
}

impl FromIterator<(String, String)> for RecordBatch {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Serialize for RecordBatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, text) in &self.entries {
            map.serialize_entry(id, text)?;
        }
        map.end()
    }
}

struct RecordBatchVisitor;

impl<'de> Visitor<'de> for RecordBatchVisitor {
    type Value = RecordBatch;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object mapping record ids to text")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        let mut seen = HashSet::new();

        while let Some((id, text)) = access.next_entry::<String, String>()? {
            if !seen.insert(id.clone()) {
                return Err(de::Error::custom(format!("duplicate record id: {id}")));
            }
            entries.push((id, text));
        }

        Ok(RecordBatch { entries })
    }
}

impl<'de> Deserialize<'de> for RecordBatch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RecordBatchVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> RecordBatch {
        (1..=n)
            .map(|i| (format!("r{i}"), format!("text {i}")))
            .collect()
    }

    #[test]
    fn test_chunk_sizes() {
        for n in [1, 24, 25, 26, 50, 51, 199] {
            let chunks = numbered(n).chunks(25);
            assert_eq!(chunks.len(), chunk_count(n, 25), "n = {n}");
            assert!(chunks[..chunks.len() - 1].iter().all(|c| c.len() == 25));

            let expected_last = if n % 25 == 0 { 25 } else { n % 25 };
            assert_eq!(chunks.last().unwrap().len(), expected_last, "n = {n}");
        }
    }

    #[test]
    fn test_chunks_preserve_order_and_ids() {
        let batch = numbered(30);
        let chunks = batch.chunks(25);

        let rejoined: Vec<&str> = chunks.iter().flat_map(|c| c.ids()).collect();
        let original: Vec<&str> = batch.ids().collect();
        assert_eq!(rejoined, original);

        assert_eq!(chunks[1].iter().next(), Some(("r26", "text 26")));
    }

    #[test]
    fn test_empty_batch_has_no_chunks() {
        assert!(RecordBatch::new().chunks(25).is_empty());
        assert_eq!(chunk_count(0, 25), 0);
    }

    #[test]
    fn test_zero_chunk_size() {
        assert_eq!(numbered(3).chunks(0).len(), 3);
        assert_eq!(chunk_count(3, 0), 3);
    }

    #[test]
    fn test_json_preserves_key_order() {
        let batch: RecordBatch =
            serde_json::from_str(r#"{"r10": "ten", "r2": "two", "a": "first?"}"#).unwrap();
        let ids: Vec<&str> = batch.ids().collect();
        assert_eq!(ids, vec!["r10", "r2", "a"]);

        let json = serde_json::to_string(&batch).unwrap();
        assert_eq!(json, r#"{"r10":"ten","r2":"two","a":"first?"}"#);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result: Result<RecordBatch, _> = serde_json::from_str(r#"{"r1": "a", "r1": "b"}"#);
        assert!(result.unwrap_err().to_string().contains("duplicate record id"));
    }

    #[test]
    fn test_non_string_text_rejected() {
        let result: Result<RecordBatch, _> = serde_json::from_str(r#"{"r1": 5}"#);
        assert!(result.is_err());
    }
}

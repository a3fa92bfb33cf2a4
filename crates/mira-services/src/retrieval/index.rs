use serde::Serialize;

use mira_processing::Chunk;

/// One embedded chunk.
#[derive(Debug, Clone, Serialize)]
pub struct IndexEntry {
    pub text: String,
    pub source: String,
    pub ordinal: usize,
    pub total: usize,
    #[serde(skip)]
    vector: Vec<f32>,
}

/// In-memory exact nearest-neighbour index over unit-normalised vectors.
///
/// Distances are L2 between normalised vectors, which orders results the
/// same way as cosine similarity. Entries with a dimension different from
/// the first inserted vector are rejected.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VectorIndex {
    fingerprint: String,
    dimension: Option<usize>,
    entries: Vec<IndexEntry>,
}

fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
    vector
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

impl VectorIndex {
    pub fn new(fingerprint: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            dimension: None,
            entries: Vec::new(),
        }
    }

    /// Fingerprint of the file set this index was built from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Add a chunk with its embedding. Returns false when the vector is
    /// empty or its dimension does not match the index.
    pub fn insert(&mut self, chunk: &Chunk, vector: Vec<f32>) -> bool {
        if vector.is_empty() {
            return false;
        }
        match self.dimension {
            Some(dim) if dim != vector.len() => return false,
            None => self.dimension = Some(vector.len()),
            _ => {}
        }
        self.entries.push(IndexEntry {
            text: chunk.text.clone(),
            source: chunk.source.clone(),
            ordinal: chunk.ordinal,
            total: chunk.total,
            vector: normalize(vector),
        });
        true
    }

    /// The `k` nearest entries to `query`, nearest first.
    pub fn nearest(&self, query: &[f32], k: usize) -> Vec<(&IndexEntry, f32)> {
        if k == 0 || Some(query.len()) != self.dimension {
            return vec![];
        }
        let query = normalize(query.to_vec());
        let mut scored: Vec<(&IndexEntry, f32)> = self
            .entries
            .iter()
            .map(|entry| (entry, l2_distance(&entry.vector, &query)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        scored
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Distinct source names in insertion order.
    pub fn sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !sources.contains(&entry.source.as_str()) {
                sources.push(&entry.source);
            }
        }
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, source: &str, ordinal: usize) -> Chunk {
        Chunk {
            text: text.to_string(),
            source: source.to_string(),
            ordinal,
            total: 2,
            start: 0,
        }
    }

    #[test]
    fn nearest_orders_by_distance() {
        let mut index = VectorIndex::new("fp");
        assert!(index.insert(&chunk("east", "a.txt", 0), vec![1.0, 0.0]));
        assert!(index.insert(&chunk("north", "a.txt", 1), vec![0.0, 5.0]));
        assert!(index.insert(&chunk("northeast", "b.txt", 0), vec![1.0, 1.0]));

        let hits = index.nearest(&[0.1, 1.0], 2);
        let texts: Vec<&str> = hits.iter().map(|(e, _)| e.text.as_str()).collect();
        assert_eq!(texts, vec!["north", "northeast"]);
        assert!(hits[0].1 <= hits[1].1);
        assert_eq!(index.sources(), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn magnitude_does_not_affect_ranking() {
        let mut index = VectorIndex::new("fp");
        index.insert(&chunk("x", "a", 0), vec![100.0, 0.0]);
        let hits = index.nearest(&[0.5, 0.0], 1);
        assert!(hits[0].1 < 1e-6);
    }

    #[test]
    fn dimension_mismatch_rejected() {
        let mut index = VectorIndex::new("fp");
        assert!(index.insert(&chunk("a", "a", 0), vec![1.0, 0.0, 0.0]));
        assert!(!index.insert(&chunk("b", "a", 1), vec![1.0, 0.0]));
        assert!(!index.insert(&chunk("c", "a", 1), vec![]));
        assert_eq!(index.len(), 1);
        assert!(index.nearest(&[1.0, 0.0], 4).is_empty());
    }

    #[test]
    fn k_larger_than_index() {
        let mut index = VectorIndex::new("fp");
        index.insert(&chunk("a", "a", 0), vec![1.0]);
        assert_eq!(index.nearest(&[1.0], 20).len(), 1);
        assert!(index.nearest(&[1.0], 0).is_empty());
    }
}

use std::collections::BTreeMap;

use ferngraph_common::types::{Offset, RowIdx};

/// Ordered index from a node offset to the staged rows adjacent to it in one direction.
///
/// Row indices are appended in increasing order, so every list stays sorted. Keys with no
/// remaining rows are removed, which keeps `is_empty` equivalent to "no adjacency at all".
#[derive(Debug, Default, Clone)]
pub struct DirectedCsrIndex {
    index: BTreeMap<Offset, Vec<RowIdx>>,
}

impl DirectedCsrIndex {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of distinct node offsets with at least one row.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.index.len()
    }

    /// Total number of row references held by the index.
    pub fn num_rows(&self) -> usize {
        self.index.values().map(Vec::len).sum()
    }

    pub fn insert(&mut self, node_offset: Offset, row_idx: RowIdx) {
        let rows = self.index.entry(node_offset).or_default();
        debug_assert!(rows.last().is_none_or(|&last| last < row_idx));
        rows.push(row_idx);
    }

    /// Removes `row_idx` from the list of `node_offset`, dropping the key once it is empty.
    pub fn remove(&mut self, node_offset: Offset, row_idx: RowIdx) -> bool {
        let Some(rows) = self.index.get_mut(&node_offset) else {
            return false;
        };
        let Ok(pos) = rows.binary_search(&row_idx) else {
            return false;
        };
        rows.remove(pos);
        if rows.is_empty() {
            self.index.remove(&node_offset);
        }
        true
    }

    #[inline]
    pub fn get(&self, node_offset: Offset) -> Option<&[RowIdx]> {
        self.index.get(&node_offset).map(Vec::as_slice)
    }

    #[inline]
    pub fn contains_node(&self, node_offset: Offset) -> bool {
        self.index.contains_key(&node_offset)
    }

    /// Snapshot of every indexed node offset in ascending order.
    pub fn node_offsets(&self) -> Vec<Offset> {
        self.index.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Offset, &[RowIdx])> {
        self.index.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    pub fn clear(&mut self) {
        self.index.clear();
    }
}

/// Intersection of two sorted row lists.
pub(super) fn intersect_sorted(left: &[RowIdx], right: &[RowIdx]) -> Vec<RowIdx> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        match left[i].cmp(&right[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(left[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

use std::sync::atomic::{AtomicU16, Ordering};

use ferngraph_common::constants::{NODE_GROUP_SIZE, start_offset_of_node_group};
use ferngraph_common::data_type::LogicalType;
use ferngraph_common::types::{InternalId, NodeGroupIdx, Offset, TableId};
use tracing::debug;

use super::compressed_offsets::CompressedNodeOffsetBuffer;
use crate::common::row_group::ChunkedRowGroup;
use crate::error::{StorageError, StorageResult};

/// Bounded-degree adjacency over the nodes of one table, filled concurrently during index
/// construction and turned into rel rows per node group.
pub struct InMemAdjacencyGraph {
    num_nodes: u64,
    max_degree: u16,
    dst_nodes: CompressedNodeOffsetBuffer,
    csr_lengths: Box<[AtomicU16]>,
}

impl InMemAdjacencyGraph {
    pub fn new(num_nodes: u64, max_degree: u16) -> StorageResult<Self> {
        let dst_nodes = CompressedNodeOffsetBuffer::new(num_nodes, u64::from(max_degree))?;
        let len = usize::try_from(num_nodes).map_err(|_| {
            StorageError::ConfigurationRejection(format!("{num_nodes} nodes do not fit in memory"))
        })?;
        let csr_lengths = (0..len).map(|_| AtomicU16::new(0)).collect();
        Ok(Self {
            num_nodes,
            max_degree,
            dst_nodes,
            csr_lengths,
        })
    }

    #[inline]
    pub fn num_nodes(&self) -> u64 {
        self.num_nodes
    }

    #[inline]
    pub fn max_degree(&self) -> u16 {
        self.max_degree
    }

    #[inline]
    pub fn invalid_offset(&self) -> Offset {
        self.dst_nodes.invalid_offset()
    }

    /// Number of neighbours of `node_offset`, zero for offsets outside the graph.
    #[inline]
    pub fn get_csr_length(&self, node_offset: Offset) -> u16 {
        usize::try_from(node_offset)
            .ok()
            .and_then(|idx| self.csr_lengths.get(idx))
            .map_or(0, |len| len.load(Ordering::Acquire))
    }

    fn check_node(&self, node_offset: Offset) -> StorageResult<()> {
        if node_offset < self.num_nodes {
            Ok(())
        } else {
            Err(StorageError::ConsistencyViolation(format!(
                "node offset {node_offset} is outside a graph of {} nodes",
                self.num_nodes
            )))
        }
    }

    /// Appends `nbr` to the neighbours of `node_offset`. Returns `false` once the node is at
    /// `max_degree`.
    pub fn add_neighbor(&self, node_offset: Offset, nbr: Offset) -> StorageResult<bool> {
        self.check_node(node_offset)?;
        self.check_node(nbr)?;
        let claimed = self.csr_lengths[node_offset as usize].fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |len| (len < self.max_degree).then_some(len + 1),
        );
        let Ok(slot) = claimed else {
            return Ok(false);
        };
        self.dst_nodes.view().set_node_offset_atomic(
            node_offset * u64::from(self.max_degree) + u64::from(slot),
            nbr,
        );
        Ok(true)
    }

    /// Replaces the neighbours of `node_offset`.
    pub fn set_neighbors(&self, node_offset: Offset, nbrs: &[Offset]) -> StorageResult<()> {
        self.check_node(node_offset)?;
        if nbrs.len() > usize::from(self.max_degree) {
            return Err(StorageError::ConsistencyViolation(format!(
                "{} neighbours exceed max degree {}",
                nbrs.len(),
                self.max_degree
            )));
        }
        let start = node_offset * u64::from(self.max_degree);
        let view = self.dst_nodes.view();
        for (i, &nbr) in nbrs.iter().enumerate() {
            self.check_node(nbr)?;
            view.set_node_offset_atomic(start + i as u64, nbr);
        }
        for i in nbrs.len()..usize::from(self.max_degree) {
            view.set_node_offset_atomic(start + i as u64, view.invalid_offset());
        }
        self.csr_lengths[node_offset as usize].store(nbrs.len() as u16, Ordering::Release);
        Ok(())
    }

    pub fn get_neighbors(&self, node_offset: Offset) -> Vec<Offset> {
        if node_offset >= self.num_nodes {
            return Vec::new();
        }
        let invalid = self.invalid_offset();
        self.dst_nodes
            .get_neighbors(node_offset, u64::from(self.get_csr_length(node_offset)))
            .take_while(|&nbr| nbr != invalid)
            .collect()
    }

    /// Clears every neighbour list.
    pub fn reset(&self) {
        let view = self.dst_nodes.view();
        for len in self.csr_lengths.iter() {
            len.store(0, Ordering::Release);
        }
        for idx in 0..view.len() {
            view.set_node_offset_atomic(idx, view.invalid_offset());
        }
    }

    /// Emits the relationships of node group `node_group_idx` as a row group in the local rel
    /// layout `[bound, nbr, rel_id]`.
    ///
    /// Rel offsets are dense, starting at `start_rel_offset`. Must run after every writer has
    /// finished.
    pub fn finalize(
        &self,
        node_group_idx: NodeGroupIdx,
        src_table_id: TableId,
        dst_table_id: TableId,
        rel_table_id: TableId,
        start_rel_offset: Offset,
    ) -> StorageResult<ChunkedRowGroup> {
        let start_node_offset = start_offset_of_node_group(node_group_idx);
        let num_nodes_in_group =
            NODE_GROUP_SIZE.min(self.num_nodes.saturating_sub(start_node_offset));
        let num_rels: u64 = (0..num_nodes_in_group)
            .map(|i| u64::from(self.get_csr_length(start_node_offset + i)))
            .sum();

        let mut row_group =
            ChunkedRowGroup::new(rel_table_id, vec![LogicalType::InternalId; 3], num_rels);
        let mut curr_num_rels = 0;
        for i in 0..num_nodes_in_group {
            let bound = start_node_offset + i;
            let csr_len = u64::from(self.get_csr_length(bound));
            for nbr in self.dst_nodes.get_neighbors(bound, csr_len) {
                if nbr >= self.num_nodes {
                    return Err(StorageError::ConsistencyViolation(format!(
                        "node {bound} has neighbour {nbr} outside a graph of {} nodes",
                        self.num_nodes
                    )));
                }
                row_group.append_row(vec![
                    InternalId::new(bound, src_table_id).into(),
                    InternalId::new(nbr, dst_table_id).into(),
                    InternalId::new(start_rel_offset + curr_num_rels, rel_table_id).into(),
                ])?;
                curr_num_rels += 1;
            }
        }
        debug!(
            node_group_idx,
            rel_table_id,
            num_rels = curr_num_rels,
            "finalized adjacency node group"
        );
        Ok(row_group)
    }
}

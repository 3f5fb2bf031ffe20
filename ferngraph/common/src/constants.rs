//! Storage-wide constants shared by the transaction and storage layers.

pub const NODE_GROUP_SIZE_LOG2: u64 = 17;
/// Number of node offsets grouped into one storage unit.
pub const NODE_GROUP_SIZE: u64 = 1 << NODE_GROUP_SIZE_LOG2;

pub const VECTOR_CAPACITY_LOG2: u64 = 11;
/// Maximum number of rows produced by a single scan call.
pub const DEFAULT_VECTOR_CAPACITY: u64 = 1 << VECTOR_CAPACITY_LOG2;

/// First rel offset handed out to uncommitted relationships. Committed rel offsets are dense and
/// start at zero, so local ones never collide with them.
pub const LOCAL_REL_OFFSET_START: u64 = 1 << 62;

pub const DEFAULT_CHECKPOINT_WAIT_TIMEOUT_IN_MICROS: u64 = 5_000_000;

/// Returns the node group a node offset belongs to.
#[inline]
pub fn node_group_idx(offset: u64) -> u64 {
    offset >> NODE_GROUP_SIZE_LOG2
}

#[inline]
pub fn start_offset_of_node_group(node_group_idx: u64) -> u64 {
    node_group_idx << NODE_GROUP_SIZE_LOG2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_group_boundaries() {
        assert_eq!(node_group_idx(0), 0);
        assert_eq!(node_group_idx(NODE_GROUP_SIZE - 1), 0);
        assert_eq!(node_group_idx(NODE_GROUP_SIZE), 1);
        assert_eq!(start_offset_of_node_group(3), 3 * NODE_GROUP_SIZE);
    }
}

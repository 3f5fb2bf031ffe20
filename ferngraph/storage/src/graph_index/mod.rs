pub mod compressed_offsets;
pub mod in_mem_graph;

pub use compressed_offsets::{
    CompressedNodeOffsetBuffer, CompressedOffsetsView, min_num_bytes_to_store,
};
pub use in_mem_graph::InMemAdjacencyGraph;

use std::sync::atomic::{AtomicU8, AtomicU16, AtomicU32, AtomicU64, Ordering};

use ferngraph_common::types::Offset;

use crate::error::{StorageError, StorageResult};

/// An unsigned atomic slot holding a node offset.
pub trait AtomicOffset: Send + Sync + Sized {
    /// Largest offset the slot can hold; doubles as the invalid sentinel.
    const MAX: Offset;

    fn with_offset(offset: Offset) -> Self;

    fn load_relaxed(&self) -> Offset;

    fn store_relaxed(&self, offset: Offset);
}

macro_rules! impl_atomic_offset {
    ($atomic:ty, $prim:ty) => {
        impl AtomicOffset for $atomic {
            const MAX: Offset = <$prim>::MAX as Offset;

            #[inline]
            fn with_offset(offset: Offset) -> Self {
                <$atomic>::new(offset as $prim)
            }

            #[inline]
            fn load_relaxed(&self) -> Offset {
                self.load(Ordering::Relaxed) as Offset
            }

            #[inline]
            fn store_relaxed(&self, offset: Offset) {
                self.store(offset as $prim, Ordering::Relaxed)
            }
        }
    };
}

impl_atomic_offset!(AtomicU8, u8);
impl_atomic_offset!(AtomicU16, u16);
impl_atomic_offset!(AtomicU32, u32);
impl_atomic_offset!(AtomicU64, u64);

/// Fixed-length array of node offsets stored at some byte width.
///
/// Loads and stores are relaxed: writers fill disjoint slots, and readers only look after a
/// synchronization point that follows every write.
pub trait CompressedOffsetsView: Send + Sync {
    fn get_node_offset_atomic(&self, idx: u64) -> Offset;

    fn set_node_offset_atomic(&self, idx: u64, node_offset: Offset);

    fn invalid_offset(&self) -> Offset;

    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes per slot.
    fn byte_width(&self) -> usize;
}

pub struct TypedCompressedView<A> {
    dst_nodes: Box<[A]>,
}

impl<A: AtomicOffset> TypedCompressedView<A> {
    /// Allocates `num_entries` slots, all holding the invalid sentinel.
    pub fn new(num_entries: u64) -> StorageResult<Self> {
        let len = usize::try_from(num_entries).map_err(|_| too_large(num_entries))?;
        let mut dst_nodes = Vec::new();
        dst_nodes
            .try_reserve_exact(len)
            .map_err(|_| too_large(num_entries))?;
        dst_nodes.extend((0..len).map(|_| A::with_offset(A::MAX)));
        Ok(Self {
            dst_nodes: dst_nodes.into_boxed_slice(),
        })
    }
}

impl<A: AtomicOffset> CompressedOffsetsView for TypedCompressedView<A> {
    #[inline]
    fn get_node_offset_atomic(&self, idx: u64) -> Offset {
        self.dst_nodes[idx as usize].load_relaxed()
    }

    #[inline]
    fn set_node_offset_atomic(&self, idx: u64, node_offset: Offset) {
        debug_assert!(node_offset <= A::MAX);
        self.dst_nodes[idx as usize].store_relaxed(node_offset);
    }

    #[inline]
    fn invalid_offset(&self) -> Offset {
        A::MAX
    }

    #[inline]
    fn len(&self) -> u64 {
        self.dst_nodes.len() as u64
    }

    #[inline]
    fn byte_width(&self) -> usize {
        size_of::<A>()
    }
}

fn too_large(num_entries: u64) -> StorageError {
    StorageError::ConfigurationRejection(format!(
        "cannot allocate {num_entries} adjacency slots"
    ))
}

/// Smallest power-of-two byte count whose unsigned range covers the bit width of `value`.
pub fn min_num_bytes_to_store(value: u64) -> u64 {
    let bit_width = u64::from(u64::BITS - value.leading_zeros());
    bit_width.div_ceil(8).next_power_of_two()
}

/// Per-node neighbour slots, `max_degree` per node, at the narrowest width that can address
/// `num_nodes`.
pub struct CompressedNodeOffsetBuffer {
    view: Box<dyn CompressedOffsetsView>,
    max_degree: u64,
}

impl CompressedNodeOffsetBuffer {
    pub fn new(num_nodes: u64, max_degree: u64) -> StorageResult<Self> {
        if max_degree == 0 {
            return Err(StorageError::ConfigurationRejection(
                "max_degree must be positive".to_string(),
            ));
        }
        let num_entries = num_nodes
            .checked_mul(max_degree)
            .ok_or_else(|| too_large(u64::MAX))?;
        let view: Box<dyn CompressedOffsetsView> = match min_num_bytes_to_store(num_nodes) {
            1 => Box::new(TypedCompressedView::<AtomicU8>::new(num_entries)?),
            2 => Box::new(TypedCompressedView::<AtomicU16>::new(num_entries)?),
            4 => Box::new(TypedCompressedView::<AtomicU32>::new(num_entries)?),
            _ => Box::new(TypedCompressedView::<AtomicU64>::new(num_entries)?),
        };
        Ok(Self { view, max_degree })
    }

    #[inline]
    pub fn view(&self) -> &dyn CompressedOffsetsView {
        self.view.as_ref()
    }

    #[inline]
    pub fn max_degree(&self) -> u64 {
        self.max_degree
    }

    #[inline]
    pub fn invalid_offset(&self) -> Offset {
        self.view.invalid_offset()
    }

    /// The first `num_nbrs` slots of `node_offset`.
    pub fn get_neighbors(&self, node_offset: Offset, num_nbrs: u64) -> CompressedOffsets<'_> {
        let start = node_offset * self.max_degree;
        CompressedOffsets {
            view: self.view.as_ref(),
            next: start,
            end: start + num_nbrs.min(self.max_degree),
        }
    }
}

/// Iterator over a slot range of a [`CompressedOffsetsView`].
pub struct CompressedOffsets<'a> {
    view: &'a dyn CompressedOffsetsView,
    next: u64,
    end: u64,
}

impl Iterator for CompressedOffsets<'_> {
    type Item = Offset;

    fn next(&mut self) -> Option<Offset> {
        if self.next >= self.end {
            return None;
        }
        let offset = self.view.get_node_offset_atomic(self.next);
        self.next += 1;
        Some(offset)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.end - self.next) as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for CompressedOffsets<'_> {}

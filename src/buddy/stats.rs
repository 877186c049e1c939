//! Read-only statistics over the buddy pool
//!
//! Pure traversal of the free lists and the used-block index; nothing here
//! mutates pool state. The cumulative split/merge counters are maintained
//! by the pool itself and compiled out without the `tracking` feature.

use alloc::vec::Vec;

#[cfg(feature = "log")]
use log::info;

use super::pool::Pool;

/// Aggregated snapshot of a pool's occupancy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub free_nodes: usize,
    pub used_nodes: usize,
    pub free_bytes: usize,
    pub used_bytes: usize,
    /// Free-list chain length per slot, slot 0 = largest class.
    pub free_nodes_by_slot: Vec<usize>,
    #[cfg(feature = "tracking")]
    pub splits: usize,
    #[cfg(feature = "tracking")]
    pub merges: usize,
}

impl Pool {
    /// Count of free and used block records, in that order.
    pub fn node_counts(&self) -> (usize, usize) {
        let free = self.free_lists().iter().map(|list| list.len()).sum();
        (free, self.used_len())
    }

    /// Free and used byte totals, `2^order` charged per record.
    pub fn byte_counts(&self) -> (usize, usize) {
        let store = self.store();
        let free = self
            .free_lists()
            .iter()
            .flat_map(|list| list.iter(store))
            .map(|block| block.size())
            .sum();
        let used = self.used_blocks().map(|block| block.size()).sum();
        (free, used)
    }

    /// Number of free-list slots (`max_order - min_order + 1`).
    pub fn slot_count(&self) -> usize {
        self.free_lists().len()
    }

    /// Chain length of one free-list slot; 0 for an out-of-range slot.
    pub fn slot_len(&self, pos: usize) -> usize {
        self.free_lists().get(pos).map_or(0, |list| list.len())
    }

    /// Cumulative number of block splits performed.
    #[cfg(feature = "tracking")]
    pub fn splits(&self) -> usize {
        self.split_count()
    }

    /// Cumulative number of buddy merges performed.
    #[cfg(feature = "tracking")]
    pub fn merges(&self) -> usize {
        self.merge_count()
    }

    /// Full snapshot of the pool's occupancy.
    pub fn stats(&self) -> PoolStats {
        let (free_nodes, used_nodes) = self.node_counts();
        let (free_bytes, used_bytes) = self.byte_counts();
        let free_nodes_by_slot = self
            .free_lists()
            .iter()
            .map(|list| list.len())
            .collect::<Vec<_>>();
        PoolStats {
            free_nodes,
            used_nodes,
            free_bytes,
            used_bytes,
            free_nodes_by_slot,
            #[cfg(feature = "tracking")]
            splits: self.split_count(),
            #[cfg(feature = "tracking")]
            merges: self.merge_count(),
        }
    }

    /// Log the per-slot layout of the pool.
    pub fn log_usage(&self) {
        let _stats = self.stats();
        info!("========== Buddy Pool Usage ==========");
        info!("Arena: {:#x} bytes", self.capacity());
        info!(
            "Nodes: {} free / {} used",
            _stats.free_nodes, _stats.used_nodes
        );
        info!(
            "Bytes: {:#x} free / {:#x} used",
            _stats.free_bytes, _stats.used_bytes
        );
        for (_slot, _len) in _stats.free_nodes_by_slot.iter().enumerate() {
            if *_len > 0 {
                info!(
                    "  Slot {} (order {}): {} blocks",
                    _slot,
                    self.max_order() - _slot,
                    _len
                );
            }
        }
        info!("======================================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buddy::HEADER_BYTES;

    #[test]
    fn test_counts_track_allocations() {
        let mut pool = Pool::new(10, 5).unwrap();
        let (free, used) = pool.node_counts();
        assert_eq!((free, used), (1, 0));
        let (free_bytes, used_bytes) = pool.byte_counts();
        assert_eq!((free_bytes, used_bytes), (1024, 0));

        let off = pool.alloc(100).unwrap();
        let (_, used) = pool.node_counts();
        assert_eq!(used, 1);
        let (free_bytes, used_bytes) = pool.byte_counts();
        assert_eq!(free_bytes + used_bytes, 1024);
        assert_eq!(used_bytes, 128); // 100 + header rounds to order 7

        pool.free(off);
        let (free_bytes, used_bytes) = pool.byte_counts();
        assert_eq!((free_bytes, used_bytes), (1024, 0));
    }

    #[test]
    fn test_slot_queries() {
        let mut pool = Pool::new(10, 5).unwrap();
        assert_eq!(pool.slot_count(), 6);
        assert_eq!(pool.slot_len(0), 1);
        assert_eq!(pool.slot_len(99), 0);

        // Splitting down to the smallest class populates one buddy per
        // level.
        let off = pool.alloc(1).unwrap();
        for slot in 1..pool.slot_count() {
            assert_eq!(pool.slot_len(slot), 1);
        }
        assert_eq!(pool.slot_len(0), 0);
        pool.free(off);
        assert_eq!(pool.slot_len(0), 1);
    }

    #[test]
    fn test_stats_snapshot() {
        let mut pool = Pool::new(10, 5).unwrap();
        let off = pool.alloc(HEADER_BYTES).unwrap();
        let stats = pool.stats();
        assert_eq!(stats.used_nodes, 1);
        assert_eq!(stats.free_nodes_by_slot.len(), pool.slot_count());
        assert_eq!(
            stats.free_nodes,
            stats.free_nodes_by_slot.iter().sum::<usize>()
        );
        pool.free(off);
    }
}

//! One hash shard of a reassembly domain.

use crate::fragment::{FragmentKey, ReassemblyQueue};

/// Queues whose keys hash to the same slot, guarded by one mutex.
///
/// `clock` advances on every admission and stamps the queue it touched, so
/// the queue with the smallest stamp is the least recently used.
#[derive(Debug)]
pub(crate) struct Bucket {
    queues: Vec<ReassemblyQueue>,
    clock: u64,
}

impl Bucket {
    pub(crate) const fn new() -> Self {
        Self {
            queues: Vec::new(),
            clock: 0,
        }
    }

    pub(crate) fn len(&self) -> usize { self.queues.len() }

    #[cfg(test)]
    pub(crate) fn fragment_count(&self) -> usize {
        self.queues.iter().map(ReassemblyQueue::nfrag).sum()
    }

    /// Advance the bucket clock and return the new stamp.
    pub(crate) fn stamp(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    pub(crate) fn position(&self, key: &FragmentKey) -> Option<usize> {
        self.queues.iter().position(|queue| queue.key() == *key)
    }

    pub(crate) fn queue_mut(&mut self, index: usize) -> &mut ReassemblyQueue {
        &mut self.queues[index]
    }

    /// Add a queue, returning its index.
    pub(crate) fn push(&mut self, queue: ReassemblyQueue) -> usize {
        self.queues.push(queue);
        self.queues.len() - 1
    }

    /// Remove the queue at `index`. Indices of other queues may change.
    pub(crate) fn remove(&mut self, index: usize) -> ReassemblyQueue {
        self.queues.swap_remove(index)
    }

    /// Age every queue by one tick and remove those that expired.
    pub(crate) fn expire(&mut self) -> Vec<ReassemblyQueue> {
        let mut expired = Vec::new();
        let mut index = 0;
        while index < self.queues.len() {
            if self.queues[index].tick() {
                expired.push(self.queues.swap_remove(index));
            } else {
                index += 1;
            }
        }
        expired
    }

    /// Remove the least recently touched queue.
    pub(crate) fn evict_lru(&mut self) -> Option<ReassemblyQueue> {
        let index = self
            .queues
            .iter()
            .enumerate()
            .min_by_key(|(_, queue)| queue.touched())
            .map(|(index, _)| index)?;
        Some(self.queues.swap_remove(index))
    }

    pub(crate) fn take_all(&mut self) -> Vec<ReassemblyQueue> { std::mem::take(&mut self.queues) }
}

use std::{
    cell::RefCell,
    collections::BTreeMap,
    ops::{Deref, DerefMut},
};

/// Size-keyed pool of scratch byte buffers.
///
/// A pool lives for the duration of one encode or decode call. Buffers are
/// keyed by a power-of-two capacity class: every buffer filed under class `c`
/// has a capacity of at least `c`, so a request is served by the smallest
/// class that fits it.
///
/// Buffers are returned to the pool when the [`ScratchRef`] is dropped.
pub(crate) struct ScratchPool {
    buffers: RefCell<BTreeMap<usize, Vec<Vec<u8>>>>,
}

impl ScratchPool {
    const MIN_CLASS: usize = 64;

    pub fn new() -> ScratchPool {
        ScratchPool {
            buffers: RefCell::new(BTreeMap::new()),
        }
    }

    /// Borrows an empty buffer with a capacity of at least `size` bytes.
    pub fn get_buffer(&self, size: usize) -> ScratchRef<'_> {
        let class = Self::request_class(size);
        let mut buffers = self.buffers.borrow_mut();
        let pooled = buffers
            .range_mut(class..)
            .find_map(|(_, bucket)| bucket.pop());
        let buffer = pooled.unwrap_or_else(|| Vec::with_capacity(class));
        ScratchRef { pool: self, buffer }
    }

    fn return_buffer(&self, mut buffer: Vec<u8>) {
        if buffer.capacity() == 0 {
            return;
        }
        buffer.clear();
        let class = Self::capacity_class(buffer.capacity());
        self.buffers
            .borrow_mut()
            .entry(class)
            .or_default()
            .push(buffer);
    }

    /// Smallest class holding at least `size` bytes.
    fn request_class(size: usize) -> usize {
        size.max(Self::MIN_CLASS).next_power_of_two()
    }

    /// Largest class not exceeding `capacity`.
    fn capacity_class(capacity: usize) -> usize {
        1usize << (usize::BITS - 1 - capacity.leading_zeros())
    }

    #[cfg(test)]
    fn pooled_count(&self) -> usize {
        self.buffers.borrow().values().map(Vec::len).sum()
    }
}

/// A buffer borrowed from a [`ScratchPool`].
pub(crate) struct ScratchRef<'a> {
    pool: &'a ScratchPool,
    buffer: Vec<u8>,
}

impl Deref for ScratchRef<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

impl DerefMut for ScratchRef<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buffer
    }
}

impl Drop for ScratchRef<'_> {
    fn drop(&mut self) {
        let buffer = std::mem::take(&mut self.buffer);
        self.pool.return_buffer(buffer);
    }
}

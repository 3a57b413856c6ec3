//! Host and device buffers.
//!
//! Both buffer kinds are cheap, cloneable handles to shared storage so that
//! asynchronous commands can hold on to them after the submitting call has
//! returned. Dropping the last handle releases the memory.
//!
//! Elements are stored as relaxed atomics: work units of one kernel write
//! disjoint elements from different threads, and completion is published
//! through the backend's own synchronisation.

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

/// Element type moved and transformed by every workload.
pub type Element = i32;

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct Storage {
    id: u64,
    data: Box<[AtomicI32]>,
}

impl Storage {
    fn new(data: impl IntoIterator<Item = Element>) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            data: data.into_iter().map(AtomicI32::new).collect(),
        })
    }

    #[inline]
    fn load(&self, index: usize) -> Element {
        self.data[index].load(Ordering::Relaxed)
    }

    #[inline]
    fn store(&self, index: usize, value: Element) {
        self.data[index].store(value, Ordering::Relaxed);
    }

    fn to_vec(&self) -> Vec<Element> {
        self.data.iter().map(|x| x.load(Ordering::Relaxed)).collect()
    }

    /// Copy all of `src` into the front of `self`.
    fn copy_from(&self, src: &Self) {
        for (d, s) in self.data.iter().zip(src.data.iter()) {
            d.store(s.load(Ordering::Relaxed), Ordering::Relaxed);
        }
    }
}

/// Host-side buffer, the source or destination of host↔device copies.
#[derive(Debug, Clone)]
pub struct HostBuffer(Arc<Storage>);

impl HostBuffer {
    pub fn from_vec(data: Vec<Element>) -> Self {
        Self(Storage::new(data))
    }

    /// `len` elements, all equal to `value`.
    pub fn filled(len: usize, value: Element) -> Self {
        Self(Storage::new(std::iter::repeat_n(value, len)))
    }

    pub fn zeroed(len: usize) -> Self {
        Self::filled(len, 0)
    }

    /// `len` elements where element `i` holds `i` (wrapping past `i32::MAX`).
    pub fn indexed(len: usize) -> Self {
        Self(Storage::new((0..len).map(|i| i as Element)))
    }

    pub fn len(&self) -> usize {
        self.0.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Element> {
        (index < self.len()).then(|| self.0.load(index))
    }

    /// Overwrite every element with `value`.
    pub fn fill(&self, value: Element) {
        for i in 0..self.len() {
            self.0.store(i, value);
        }
    }

    /// Snapshot the current contents.
    pub fn to_vec(&self) -> Vec<Element> {
        self.0.to_vec()
    }

    pub(crate) fn copy_from_device(&self, src: &DeviceBuffer) {
        self.0.copy_from(&src.0);
    }
}

/// Device-resident buffer. Allocated through
/// [`ComputeBackend::alloc`](crate::ComputeBackend::alloc).
#[derive(Debug, Clone)]
pub struct DeviceBuffer(Arc<Storage>);

impl DeviceBuffer {
    /// Zero-initialised storage; backends hand these out from `alloc`.
    pub fn zeroed(len: usize) -> Self {
        Self(Storage::new(std::iter::repeat_n(0, len)))
    }

    /// Process-unique identifier of the underlying allocation.
    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn len(&self) -> usize {
        self.0.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether both handles refer to the same allocation.
    pub fn same_allocation(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    #[inline]
    pub(crate) fn load(&self, index: usize) -> Element {
        self.0.load(index)
    }

    #[inline]
    pub(crate) fn store(&self, index: usize, value: Element) {
        self.0.store(index, value);
    }

    pub(crate) fn copy_from_host(&self, src: &HostBuffer) {
        self.0.copy_from(&src.0);
    }

    #[cfg(test)]
    pub(crate) fn to_vec(&self) -> Vec<Element> {
        self.0.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexed_host_buffer_holds_positions() {
        let buf = HostBuffer::indexed(5);
        assert_eq!(buf.to_vec(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn clones_share_storage() {
        let buf = HostBuffer::zeroed(3);
        let alias = buf.clone();
        buf.0.store(1, 9);
        assert_eq!(alias.to_vec(), vec![0, 9, 0]);
    }

    #[test]
    fn device_buffers_have_distinct_ids() {
        let a = DeviceBuffer::zeroed(4);
        let b = DeviceBuffer::zeroed(4);
        assert_ne!(a.id(), b.id());
        assert!(a.same_allocation(&a.clone()));
        assert!(!a.same_allocation(&b));
    }

    #[test]
    fn host_device_round_trip_copies_prefix() {
        let host = HostBuffer::from_vec(vec![7, 8]);
        let dev = DeviceBuffer::zeroed(4);
        dev.copy_from_host(&host);
        assert_eq!(dev.to_vec(), vec![7, 8, 0, 0]);

        let back = HostBuffer::zeroed(2);
        back.copy_from_device(&dev);
        assert_eq!(back.to_vec(), vec![7, 8]);
    }

    #[test]
    fn get_is_bounds_checked() {
        let buf = HostBuffer::filled(2, 3);
        assert_eq!(buf.get(1), Some(3));
        assert_eq!(buf.get(2), None);
    }
}

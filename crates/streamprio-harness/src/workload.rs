//! Per-queue buffer sets and the commands submitted with them.

use streamprio_runtime::{
    ComputeBackend, DeviceBuffer, Element, ElementOp, HostBuffer, KernelLaunch, LaunchConfig, QueueId,
};

use crate::error::Result;
use crate::validator;

/// Host source, device source, device destination, host destination. All
/// four are released when the set is dropped.
#[derive(Debug, Clone)]
pub struct WorkloadBuffers {
    pub host_src: HostBuffer,
    pub device_src: DeviceBuffer,
    pub device_dst: DeviceBuffer,
    pub host_dst: HostBuffer,
}

impl WorkloadBuffers {
    fn from_host<B: ComputeBackend + ?Sized>(backend: &B, host_src: HostBuffer) -> Result<Self> {
        let len = host_src.len();
        Ok(Self {
            device_src: backend.alloc(len)?,
            device_dst: backend.alloc(len)?,
            host_dst: HostBuffer::zeroed(len),
            host_src,
        })
    }

    /// Every source element equal to `value`.
    pub fn filled<B: ComputeBackend + ?Sized>(backend: &B, len: usize, value: Element) -> Result<Self> {
        Self::from_host(backend, HostBuffer::filled(len, value))
    }

    /// Source element `i` equal to `i`.
    pub fn indexed<B: ComputeBackend + ?Sized>(backend: &B, len: usize) -> Result<Self> {
        Self::from_host(backend, HostBuffer::indexed(len))
    }

    pub fn len(&self) -> usize {
        self.host_src.len()
    }

    pub fn is_empty(&self) -> bool {
        self.host_src.is_empty()
    }

    /// Queue copy-in, one whole-buffer `op` kernel, copy-out. Nothing waits.
    pub fn submit_transform<B: ComputeBackend + ?Sized>(
        &self,
        backend: &B,
        queue: QueueId,
        op: ElementOp,
        launch: LaunchConfig,
    ) -> Result<()> {
        backend.copy_to_device_async(queue, &self.device_src, &self.host_src)?;
        backend.launch(queue, KernelLaunch::whole(op, &self.device_src, &self.device_dst), launch)?;
        backend.copy_to_host_async(queue, &self.host_dst, &self.device_dst)?;
        Ok(())
    }

    /// Blocking copy of the host source to the device. Clears the host
    /// destination first so a stale result from an earlier run never passes.
    pub fn upload<B: ComputeBackend + ?Sized>(&self, backend: &B) -> Result<()> {
        self.host_dst.fill(0);
        Ok(backend.copy_to_device(&self.device_src, &self.host_src)?)
    }

    /// Blocking copy of the device destination back to the host.
    pub fn download<B: ComputeBackend + ?Sized>(&self, backend: &B) -> Result<()> {
        Ok(backend.copy_to_host(&self.host_dst, &self.device_dst)?)
    }

    /// `(offset, len)` of every `chunk_len` chunk, in order; the last one
    /// may be short.
    pub fn chunks(&self, chunk_len: usize) -> impl Iterator<Item = (usize, usize)> + use<> {
        let total = self.len();
        let chunk_len = chunk_len.max(1);
        (0..total).step_by(chunk_len).map(move |offset| (offset, chunk_len.min(total - offset)))
    }

    /// Queue `op` over one `(offset, len)` chunk, device source to device
    /// destination.
    pub fn launch_chunk<B: ComputeBackend + ?Sized>(
        &self,
        backend: &B,
        queue: QueueId,
        op: ElementOp,
        (offset, len): (usize, usize),
        launch: LaunchConfig,
    ) -> Result<()> {
        let kernel = KernelLaunch::chunk(op, &self.device_src, &self.device_dst, offset, len);
        Ok(backend.launch(queue, kernel, launch)?)
    }

    /// Check the host destination against `op` applied to the host source.
    pub fn verify(&self, label: &str, op: ElementOp) -> Result<()> {
        validator::verify_transform(label, &self.host_src.to_vec(), &self.host_dst.to_vec(), op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamprio_runtime::sim::{SimDevice, SimDeviceConfig};

    #[test]
    fn chunked_copy_reproduces_source() {
        let dev = SimDevice::new(SimDeviceConfig { compute_units: 2, ..Default::default() }).unwrap();
        let bufs = WorkloadBuffers::indexed(&dev, 1000).unwrap();
        bufs.upload(&dev).unwrap();
        for chunk in bufs.chunks(300) {
            bufs.launch_chunk(&dev, QueueId::DEFAULT, ElementOp::Copy, chunk, LaunchConfig::new(4, 64)).unwrap();
        }
        dev.synchronize_device().unwrap();
        bufs.download(&dev).unwrap();
        bufs.verify("chunked", ElementOp::Copy).unwrap();
    }

    #[test]
    fn chunks_cover_the_buffer_with_a_short_tail() {
        let dev = SimDevice::new(SimDeviceConfig { compute_units: 1, ..Default::default() }).unwrap();
        let bufs = WorkloadBuffers::indexed(&dev, 1000).unwrap();
        let chunks: Vec<_> = bufs.chunks(300).collect();
        assert_eq!(chunks, vec![(0, 300), (300, 300), (600, 300), (900, 100)]);
    }

    #[test]
    fn upload_clears_a_stale_destination() {
        let dev = SimDevice::new(SimDeviceConfig { compute_units: 1, ..Default::default() }).unwrap();
        let bufs = WorkloadBuffers::indexed(&dev, 4).unwrap();
        bufs.host_dst.fill(7);
        bufs.upload(&dev).unwrap();
        assert_eq!(bufs.host_dst.to_vec(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn unsubmitted_buffers_fail_verification() {
        let dev = SimDevice::new(SimDeviceConfig { compute_units: 1, ..Default::default() }).unwrap();
        let bufs = WorkloadBuffers::filled(&dev, 8, 2).unwrap();
        let err = bufs.verify("idle", ElementOp::Square).unwrap_err();
        assert_eq!(err.to_string(), "idle: element 0 expected 4, got 0");
    }
}

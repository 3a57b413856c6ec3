//! Kernel launch descriptions.

use crate::buffer::{DeviceBuffer, Element};
use crate::error::{Result, RuntimeError};

/// Grid/block dimensions for a 1-D kernel launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    pub grid: u32,
    pub block: u32,
    pub shared_mem_bytes: u32,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self { grid: 1, block: 256, shared_mem_bytes: 0 }
    }
}

impl LaunchConfig {
    /// Fixed grid/block sizing, as used by grid-stride kernels.
    pub fn new(grid: u32, block: u32) -> Self {
        Self { grid, block, ..Default::default() }
    }

    /// Enough blocks of `block_size` threads to cover `n` elements.
    pub fn linear(n: u32, block_size: u32) -> Self {
        let grid = n.div_ceil(block_size.max(1)).max(1);
        Self { grid, block: block_size, ..Default::default() }
    }

    /// Total thread count, `grid * block`.
    pub fn total_threads(&self) -> u64 {
        u64::from(self.grid) * u64::from(self.block)
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid == 0 || self.block == 0 {
            return Err(RuntimeError::InvalidConfiguration(format!(
                "grid ({}) and block ({}) must be non-zero",
                self.grid, self.block
            )));
        }
        if self.block > 1024 {
            return Err(RuntimeError::InvalidConfiguration(format!(
                "block size {} exceeds 1024 threads",
                self.block
            )));
        }
        Ok(())
    }
}

/// Pure per-element transform applied by a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementOp {
    /// `dst[i] = src[i]`
    Copy,
    /// `dst[i] = src[i] * src[i]` (wrapping, so the result is exact mod 2^32)
    Square,
}

impl ElementOp {
    #[inline]
    pub fn apply(self, x: Element) -> Element {
        match self {
            Self::Copy => x,
            Self::Square => x.wrapping_mul(x),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Square => "square",
        }
    }
}

impl std::fmt::Display for ElementOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A kernel mapping `len` elements of `src` (from `src_offset`) into `dst`
/// (from `dst_offset`) through `op`.
#[derive(Debug, Clone)]
pub struct KernelLaunch {
    pub op: ElementOp,
    pub src: DeviceBuffer,
    pub dst: DeviceBuffer,
    pub src_offset: usize,
    pub dst_offset: usize,
    pub len: usize,
}

impl KernelLaunch {
    /// Whole-buffer transform; `len` is taken from `src`.
    pub fn whole(op: ElementOp, src: &DeviceBuffer, dst: &DeviceBuffer) -> Self {
        Self { op, src: src.clone(), dst: dst.clone(), src_offset: 0, dst_offset: 0, len: src.len() }
    }

    /// Transform `len` elements at the same `offset` in both buffers.
    pub fn chunk(op: ElementOp, src: &DeviceBuffer, dst: &DeviceBuffer, offset: usize, len: usize) -> Self {
        Self { op, src: src.clone(), dst: dst.clone(), src_offset: offset, dst_offset: offset, len }
    }

    /// Bounds-check the launch against both buffers.
    pub fn validate(&self) -> Result<()> {
        let in_bounds = |offset: usize, buf: &DeviceBuffer| {
            offset.checked_add(self.len).is_some_and(|end| end <= buf.len())
        };
        if !in_bounds(self.src_offset, &self.src) {
            return Err(RuntimeError::InvalidValue(format!(
                "source range {}+{} exceeds buffer of {} elements",
                self.src_offset,
                self.len,
                self.src.len()
            )));
        }
        if !in_bounds(self.dst_offset, &self.dst) {
            return Err(RuntimeError::InvalidValue(format!(
                "destination range {}+{} exceeds buffer of {} elements",
                self.dst_offset,
                self.len,
                self.dst.len()
            )));
        }
        Ok(())
    }

    /// Element range `[start, end)` (relative to the offsets) covered by
    /// work unit `unit` of `units`.
    pub fn unit_span(&self, unit: u32, units: u32) -> (usize, usize) {
        let units = units.max(1) as usize;
        let per_unit = self.len.div_ceil(units);
        let start = (unit as usize).saturating_mul(per_unit).min(self.len);
        let end = start.saturating_add(per_unit).min(self.len);
        (start, end)
    }

    /// Execute work unit `unit` of `units` on the calling thread.
    pub(crate) fn run_unit(&self, unit: u32, units: u32) {
        let (start, end) = self.unit_span(unit, units);
        if start == end {
            return;
        }
        let op = self.op;
        for k in start..end {
            self.dst.store(self.dst_offset + k, op.apply(self.src.load(self.src_offset + k)));
        }
    }
}

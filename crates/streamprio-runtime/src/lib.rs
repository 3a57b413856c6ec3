//! `streamprio-runtime`: host-side API of a prioritised asynchronous queue
//! runtime, plus an in-process simulated device implementing it.
//!
//! The API mirrors the shape of GPU stream runtimes:
//!
//! | Concern          | Items                                                   |
//! |------------------|---------------------------------------------------------|
//! | Priorities       | [`PriorityRange`], clamping, level enumeration          |
//! | Queues           | [`QueueId`], [`QueueFlags`], create / destroy / query   |
//! | Memory           | [`HostBuffer`], [`DeviceBuffer`], async copies          |
//! | Compute          | [`KernelLaunch`], [`LaunchConfig`], [`ElementOp`]       |
//! | Timing           | [`EventId`], record / synchronize / elapsed time        |
//! | Errors           | [`RuntimeError`], [`ErrorCode`]                         |
//!
//! Every backend implements [`ComputeBackend`]. [`sim::SimDevice`] executes
//! queue commands on host worker threads and picks work from the most urgent
//! ready queue first, so relative priority is observable without hardware.
//!
//! # Usage
//!
//! ```rust
//! use streamprio_runtime::sim::{SimDevice, SimDeviceConfig};
//! use streamprio_runtime::{ComputeBackend, QueueFlags};
//!
//! let device = SimDevice::new(SimDeviceConfig::default()).unwrap();
//! let range = device.priority_range().unwrap();
//! let queue = device.create_queue(QueueFlags::DEFAULT.bits(), range.high).unwrap();
//! assert_eq!(device.queue_priority(queue).unwrap(), range.high);
//! device.destroy_queue(queue).unwrap();
//! ```

pub mod backend;
pub mod buffer;
pub mod device;
pub mod error;
pub mod event;
pub mod kernel;
pub mod priority;
pub mod queue;
pub mod sim;

pub use backend::ComputeBackend;
pub use buffer::{DeviceBuffer, Element, HostBuffer};
pub use device::DeviceProperties;
pub use error::{ErrorCode, Result, RuntimeError};
pub use event::EventId;
pub use kernel::{ElementOp, KernelLaunch, LaunchConfig};
pub use priority::PriorityRange;
pub use queue::{QueueFlags, QueueId};

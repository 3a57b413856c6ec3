//! Behavioural tests for the simulated device through the public
//! [`ComputeBackend`] surface.

use std::thread;

use streamprio_runtime::sim::{SimDevice, SimDeviceConfig};
use streamprio_runtime::{
    ComputeBackend, ElementOp, ErrorCode, HostBuffer, KernelLaunch, LaunchConfig, PriorityRange, QueueFlags,
    QueueId,
};

fn device(compute_units: usize, unit_delay_us: u64) -> SimDevice {
    SimDevice::new(SimDeviceConfig { compute_units, unit_delay_us, ..Default::default() }).unwrap()
}

#[test]
fn reports_configured_range_and_properties() {
    let dev = SimDevice::new(SimDeviceConfig { priority_low: 1, priority_high: -2, ..Default::default() }).unwrap();
    assert_eq!(dev.priority_range().unwrap(), PriorityRange::new(1, -2));
    let props = dev.device_properties().unwrap();
    assert_eq!(props.index, 0);
    assert_eq!(props.priority_range, PriorityRange::new(1, -2));
    assert_eq!(dev.device_count().unwrap(), 1);
}

#[test]
fn out_of_range_priorities_are_clamped() {
    let dev = device(1, 0);
    let range = dev.priority_range().unwrap();
    for (requested, expected) in [(i32::MAX, range.low), (i32::MIN, range.high), (range.high, range.high)] {
        let q = dev.create_queue(QueueFlags::DEFAULT.bits(), requested).unwrap();
        assert_eq!(dev.queue_priority(q).unwrap(), expected, "requested {requested}");
        dev.destroy_queue(q).unwrap();
    }
}

#[test]
fn extremes_bind_by_urgency_when_high_is_numerically_larger() {
    let config = SimDeviceConfig { priority_low: -2, priority_high: 1, compute_units: 1, ..Default::default() };
    let dev = SimDevice::new(config).unwrap();
    for (requested, expected) in [(i32::MAX, -2), (i32::MIN, 1), (0, 0)] {
        let q = dev.create_queue(QueueFlags::DEFAULT.bits(), requested).unwrap();
        assert_eq!(dev.queue_priority(q).unwrap(), expected, "requested {requested}");
        dev.destroy_queue(q).unwrap();
    }
}

#[test]
fn flags_are_reported_back() {
    let dev = device(1, 0);
    let q = dev.create_queue(QueueFlags::NON_BLOCKING.bits(), 0).unwrap();
    assert_eq!(dev.queue_flags(q).unwrap(), QueueFlags::NON_BLOCKING);
    dev.destroy_queue(q).unwrap();
}

#[test]
fn bogus_flags_are_invalid_configuration() {
    let dev = device(1, 0);
    let err = dev.create_queue(0xffff_ffff, 0).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidConfiguration);
    assert_eq!(dev.live_queue_count(), 0);
}

#[test]
fn missing_output_slot_is_invalid_value() {
    let dev = device(1, 0);
    let err = dev.create_queue_into(None, QueueFlags::DEFAULT.bits(), 0).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidValue);
    assert_eq!(dev.live_queue_count(), 0);

    let mut slot = QueueId::DEFAULT;
    dev.create_queue_into(Some(&mut slot), QueueFlags::DEFAULT.bits(), 0).unwrap();
    assert!(!slot.is_default());
    dev.destroy_queue(slot).unwrap();
}

#[test]
fn stale_and_default_handles_are_rejected() {
    let dev = device(1, 0);
    let q = dev.create_queue(QueueFlags::DEFAULT.bits(), 0).unwrap();
    dev.destroy_queue(q).unwrap();
    assert_eq!(dev.destroy_queue(q).unwrap_err().code(), ErrorCode::InvalidHandle);
    assert_eq!(dev.queue_priority(q).unwrap_err().code(), ErrorCode::InvalidHandle);
    assert_eq!(dev.destroy_queue(QueueId::DEFAULT).unwrap_err().code(), ErrorCode::InvalidHandle);
}

#[test]
fn blocking_copies_on_default_queue_see_async_results() {
    let dev = device(2, 0);
    let q = dev.create_queue(QueueFlags::DEFAULT.bits(), -3).unwrap();
    let host = HostBuffer::filled(4096, 3);
    let src = dev.alloc(host.len()).unwrap();
    let dst = dev.alloc(host.len()).unwrap();

    dev.copy_to_device(&src, &host).unwrap();
    dev.launch(q, KernelLaunch::whole(ElementOp::Square, &src, &dst), LaunchConfig::new(16, 256)).unwrap();
    // The default-queue readback is ordered after the blocking queue's kernel.
    let out = HostBuffer::zeroed(host.len());
    dev.copy_to_host(&out, &dst).unwrap();
    assert!(out.to_vec().iter().all(|&v| v == 9));
    dev.destroy_queue(q).unwrap();
}

#[test]
fn concurrent_submitters_share_one_queue() {
    let dev = device(4, 0);
    let q = dev.create_queue(QueueFlags::NON_BLOCKING.bits(), -1).unwrap();
    thread::scope(|s| {
        for t in 0..8 {
            let dev = &dev;
            s.spawn(move || {
                let host = HostBuffer::filled(1024, t);
                let buf = dev.alloc(host.len()).unwrap();
                let out = HostBuffer::zeroed(host.len());
                dev.copy_to_device_async(q, &buf, &host).unwrap();
                dev.launch(q, KernelLaunch::whole(ElementOp::Square, &buf, &buf), LaunchConfig::new(4, 256))
                    .unwrap();
                dev.copy_to_host_async(q, &out, &buf).unwrap();
                dev.synchronize_queue(q).unwrap();
                assert!(out.to_vec().iter().all(|&v| v == t * t));
            });
        }
    });
    dev.destroy_queue(q).unwrap();
}

#[test]
fn urgent_queue_overtakes_earlier_low_priority_work() {
    let dev = device(1, 200);
    let range = dev.priority_range().unwrap();
    let low = dev.create_queue(QueueFlags::NON_BLOCKING.bits(), range.low).unwrap();
    let high = dev.create_queue(QueueFlags::NON_BLOCKING.bits(), range.high).unwrap();
    let buf_low = dev.alloc(64).unwrap();
    let buf_high = dev.alloc(8).unwrap();
    let low_done = dev.create_event().unwrap();
    let high_done = dev.create_event().unwrap();

    dev.launch(low, KernelLaunch::whole(ElementOp::Copy, &buf_low, &buf_low), LaunchConfig::new(64, 1))
        .unwrap();
    dev.record_event(low_done, low).unwrap();
    dev.launch(high, KernelLaunch::whole(ElementOp::Copy, &buf_high, &buf_high), LaunchConfig::new(8, 1))
        .unwrap();
    dev.record_event(high_done, high).unwrap();

    dev.synchronize_device().unwrap();
    // Positive when the high queue finished first.
    let lead = dev.elapsed_ms(high_done, low_done).unwrap();
    assert!(lead > 0.0, "high-priority work finished {lead} ms after low-priority work");

    for e in [low_done, high_done] {
        dev.destroy_event(e).unwrap();
    }
    dev.destroy_queue(low).unwrap();
    dev.destroy_queue(high).unwrap();
}

#[test]
fn elapsed_on_pending_event_is_not_ready() {
    let dev = device(1, 500);
    let q = dev.create_queue(QueueFlags::NON_BLOCKING.bits(), 0).unwrap();
    let start = dev.create_event().unwrap();
    let end = dev.create_event().unwrap();
    let buf = dev.alloc(32).unwrap();

    dev.record_event(start, q).unwrap();
    dev.launch(q, KernelLaunch::whole(ElementOp::Copy, &buf, &buf), LaunchConfig::new(32, 1)).unwrap();
    dev.record_event(end, q).unwrap();
    assert_eq!(dev.elapsed_ms(start, end).unwrap_err().code(), ErrorCode::NotReady);

    dev.synchronize_event(end).unwrap();
    assert!(dev.elapsed_ms(start, end).unwrap() > 0.0);
    dev.destroy_queue(q).unwrap();
}

#[test]
fn destroy_waits_for_outstanding_work() {
    let dev = device(1, 100);
    let q = dev.create_queue(QueueFlags::NON_BLOCKING.bits(), 0).unwrap();
    let host = HostBuffer::filled(64, 5);
    let buf = dev.alloc(64).unwrap();
    let out = HostBuffer::zeroed(64);
    dev.copy_to_device_async(q, &buf, &host).unwrap();
    dev.launch(q, KernelLaunch::whole(ElementOp::Square, &buf, &buf), LaunchConfig::new(16, 4)).unwrap();
    dev.copy_to_host_async(q, &out, &buf).unwrap();
    dev.destroy_queue(q).unwrap();
    assert!(out.to_vec().iter().all(|&v| v == 25));
}

#[test]
fn out_of_bounds_launch_is_rejected_before_queueing() {
    let dev = device(1, 0);
    let a = dev.alloc(8).unwrap();
    let b = dev.alloc(4).unwrap();
    let err = dev
        .launch(QueueId::DEFAULT, KernelLaunch::chunk(ElementOp::Copy, &a, &b, 0, 8), LaunchConfig::default())
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidValue);
    dev.synchronize_device().unwrap();
}

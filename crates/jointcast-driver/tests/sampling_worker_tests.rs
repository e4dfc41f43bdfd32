//! 采样线程集成测试
//!
//! FakeMotor + ChannelPublisher，验证端到端的消息形状、时间戳和停止语义。

use crossbeam_channel::Receiver;
use jointcast_driver::{
    ChannelPublisher, CycleMetrics, DeviceBinding, Ownership, PeriodicWorker, Publisher,
    SampleCycle,
};
use jointcast_hal::{DeviceHandle, FakeMotor, JointType};
use jointcast_protocol::{JointState, StampPolicy, wall_clock_now};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn start(
    motor: FakeMotor,
    depth: usize,
) -> (
    PeriodicWorker,
    Arc<Mutex<DeviceBinding>>,
    Receiver<JointState>,
    Arc<CycleMetrics>,
) {
    let device: DeviceHandle = Arc::new(motor);
    let binding = Arc::new(Mutex::new(
        DeviceBinding::bind(&device, Ownership::Attached).unwrap(),
    ));
    let cycle = SampleCycle::new(StampPolicy::Fused, "world");
    let metrics = Arc::clone(cycle.metrics());
    let (publisher, rx) = ChannelPublisher::bounded("joint_states", depth);
    let publisher: Arc<dyn Publisher> = Arc::new(publisher);

    let worker = PeriodicWorker::sampling(
        "test-sampler",
        Duration::from_millis(5),
        Arc::clone(&binding),
        cycle,
        publisher,
    )
    .unwrap();

    (worker, binding, rx, metrics)
}

#[test]
fn test_messages_have_n_entries_and_ordered_stamps() {
    let motor = FakeMotor::builder()
        .joints(4)
        .joint_types(vec![
            JointType::Revolute,
            JointType::Prismatic,
            JointType::Revolute,
            JointType::Unknown,
        ])
        .build();
    let (mut worker, _binding, rx, _metrics) = start(motor, 256);

    thread::sleep(Duration::from_millis(60));
    worker.stop().unwrap();

    let messages: Vec<_> = rx.try_iter().collect();
    assert!(messages.len() >= 3, "got {} messages", messages.len());

    for (i, msg) in messages.iter().enumerate() {
        assert_eq!(msg.seq, i as u64);
        assert_eq!(msg.name.len(), 4);
        assert_eq!(msg.position.len(), 4);
        assert_eq!(msg.velocity.len(), 4);
        assert_eq!(msg.effort.len(), 4);
        assert_eq!(msg.frame_id, "world");
    }
    for pair in messages.windows(2) {
        assert!(pair[1].stamp >= pair[0].stamp);
    }
}

#[test]
fn test_no_cycle_after_stop() {
    let (mut worker, binding, rx, metrics) = start(FakeMotor::builder().build(), 1024);

    thread::sleep(Duration::from_millis(30));
    worker.stop().unwrap();

    let cycles = metrics.snapshot().cycles_total;
    let received = rx.try_iter().count() as u64;
    assert_eq!(cycles, received);

    thread::sleep(Duration::from_millis(20));
    assert_eq!(metrics.snapshot().cycles_total, cycles);

    // 停止后可以安全地解绑
    let binding = Arc::try_unwrap(binding).ok().unwrap().into_inner();
    let (_device, ownership) = binding.unbind();
    assert_eq!(ownership, Ownership::Attached);
}

#[test]
fn test_slow_consumer_does_not_stall_sampling() {
    let (mut worker, _binding, rx, metrics) = start(FakeMotor::builder().build(), 2);

    thread::sleep(Duration::from_millis(60));
    worker.stop().unwrap();

    let snapshot = metrics.snapshot();
    assert!(snapshot.cycles_total > 2);
    assert_eq!(rx.try_iter().count(), 2);
    assert_eq!(snapshot.published_total, 2);
    assert_eq!(snapshot.publish_failures, snapshot.cycles_total - 2);
}

#[test]
fn test_read_failures_counted_while_running() {
    let motor = FakeMotor::builder().build();
    let faults = motor.faults();
    faults.set_fail_positions(true);
    let started = wall_clock_now();
    let (mut worker, binding, rx, metrics) = start(motor, 1024);

    thread::sleep(Duration::from_millis(30));
    worker.stop().unwrap();

    let snapshot = metrics.snapshot();
    assert!(!snapshot.positions_healthy);
    assert_eq!(snapshot.position_read_failures, snapshot.cycles_total);
    assert!(!binding.lock().has_stamps());

    let messages: Vec<_> = rx.try_iter().collect();
    assert!(!messages.is_empty());
    for msg in &messages {
        assert_eq!(msg.position.len(), 3);
        // 没有成功的编码器读数时使用系统时间，而不是纪元零点
        assert!(msg.stamp >= started, "stamp {} earlier than start {}", msg.stamp, started);
    }
}

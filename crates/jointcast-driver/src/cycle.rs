//! 采样周期
//!
//! 每个周期：读取位置与时间戳、速度、力矩（可选）→ 融合时间戳 →
//! 旋转关节度转弧度 → 组装 [`JointState`] → 交给发布端。
//!
//! 任何读取失败都不会中断周期：对应字段保留上一周期的值，
//! 失败次数记入 [`CycleMetrics`]，每个周期都会产出并发布一条消息。

use crate::binding::DeviceBinding;
use crate::metrics::CycleMetrics;
use crate::publisher::{PublishError, Publisher};
use arc_swap::ArcSwapOption;
use jointcast_hal::HalError;
use jointcast_protocol::units::convert_in_place;
use jointcast_protocol::{JointState, StampPolicy, fuse_timestamps};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info, trace, warn};

/// 采样字段（用于读取失败的日志与计数）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Positions,
    Velocities,
    Torques,
}

impl Field {
    fn as_str(self) -> &'static str {
        match self {
            Field::Positions => "positions",
            Field::Velocities => "velocities",
            Field::Torques => "torques",
        }
    }
}

/// 采样周期
pub struct SampleCycle {
    policy: StampPolicy,
    frame_id: String,
    seq: Arc<AtomicU64>,
    metrics: Arc<CycleMetrics>,
    last_message: Arc<ArcSwapOption<JointState>>,
    publish_healthy: bool,
}

impl SampleCycle {
    pub fn new(policy: StampPolicy, frame_id: impl Into<String>) -> Self {
        Self {
            policy,
            frame_id: frame_id.into(),
            seq: Arc::new(AtomicU64::new(0)),
            metrics: Arc::new(CycleMetrics::new()),
            last_message: Arc::new(ArcSwapOption::empty()),
            publish_healthy: true,
        }
    }

    /// 使用外部共享的指标
    pub fn with_metrics(mut self, metrics: Arc<CycleMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// 使用外部共享的序号计数器
    ///
    /// 同一话题上先后创建的多个周期共用一个计数器时，序号跨绑定持续递增。
    pub fn with_seq(mut self, seq: Arc<AtomicU64>) -> Self {
        self.seq = seq;
        self
    }

    /// 使用外部共享的“最近一条消息”槽位
    pub fn with_last_message(mut self, slot: Arc<ArcSwapOption<JointState>>) -> Self {
        self.last_message = slot;
        self
    }

    pub fn metrics(&self) -> &Arc<CycleMetrics> {
        &self.metrics
    }

    pub fn last_message(&self) -> &Arc<ArcSwapOption<JointState>> {
        &self.last_message
    }

    pub fn policy(&self) -> StampPolicy {
        self.policy
    }

    /// 下一条消息的序号
    pub fn next_seq(&self) -> u64 {
        self.seq.load(Ordering::Relaxed)
    }

    /// 执行一次采样，返回组装好的消息
    pub fn execute(&mut self, binding: &mut DeviceBinding) -> JointState {
        let result = binding.read_positions();
        self.record(Field::Positions, result);

        let result = binding.read_velocities();
        self.record(Field::Velocities, result);

        if binding.has_torque() {
            let result = binding.read_efforts().map(|_| ());
            self.record(Field::Torques, result);
        }

        let samples = binding.samples();
        let metadata = binding.metadata();

        // 位置尚未成功读取过时没有可用的采样时间
        let fused = if binding.has_stamps() {
            fuse_timestamps(&samples.stamps)
        } else {
            None
        };
        let stamp = self.policy.resolve(fused);

        let mut position = samples.positions.clone();
        let mut velocity = samples.velocities.clone();
        convert_in_place(metadata.types(), &mut position);
        convert_in_place(metadata.types(), &mut velocity);

        let message = JointState {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            stamp,
            frame_id: self.frame_id.clone(),
            name: metadata.names().to_vec(),
            position,
            velocity,
            effort: samples.efforts.clone(),
        };

        self.metrics.cycles_total.fetch_add(1, Ordering::Relaxed);
        trace!("Cycle {} assembled ({} joints, stamp {:.6})", message.seq, message.len(), stamp);

        message
    }

    /// 执行一次采样并发布
    ///
    /// 发布失败只计数和记录日志，返回值供调用方观察。
    pub fn run(
        &mut self,
        binding: &mut DeviceBinding,
        publisher: &dyn Publisher,
    ) -> Result<u64, PublishError> {
        let message = self.execute(binding);
        let seq = message.seq;
        self.last_message.store(Some(Arc::new(message.clone())));

        match publisher.publish(message) {
            Ok(()) => {
                self.metrics.published_total.fetch_add(1, Ordering::Relaxed);
                if !self.publish_healthy {
                    info!("Publishing on '{}' recovered at seq {}", publisher.topic(), seq);
                    self.publish_healthy = true;
                }
                Ok(seq)
            },
            Err(e) => {
                self.metrics.publish_failures.fetch_add(1, Ordering::Relaxed);
                if self.publish_healthy {
                    warn!("Failed to publish seq {} on '{}': {}", seq, publisher.topic(), e);
                    self.publish_healthy = false;
                } else {
                    debug!("Publish still failing on '{}': {}", publisher.topic(), e);
                }
                Err(e)
            },
        }
    }

    fn record(&self, field: Field, result: Result<(), HalError>) {
        let (failures, healthy): (&AtomicU64, &AtomicBool) = match field {
            Field::Positions => (
                &self.metrics.position_read_failures,
                &self.metrics.positions_healthy,
            ),
            Field::Velocities => (
                &self.metrics.velocity_read_failures,
                &self.metrics.velocities_healthy,
            ),
            Field::Torques => (
                &self.metrics.torque_read_failures,
                &self.metrics.torques_healthy,
            ),
        };

        match result {
            Ok(()) => {
                if !healthy.swap(true, Ordering::Relaxed) {
                    info!("Reading {} recovered", field.as_str());
                }
            },
            Err(e) => {
                failures.fetch_add(1, Ordering::Relaxed);
                if healthy.swap(false, Ordering::Relaxed) {
                    warn!("Failed to read {}, keeping previous values: {}", field.as_str(), e);
                } else {
                    debug!("Reading {} still failing: {}", field.as_str(), e);
                }
            },
        }
    }
}

impl std::fmt::Debug for SampleCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleCycle")
            .field("policy", &self.policy)
            .field("frame_id", &self.frame_id)
            .field("seq", &self.next_seq())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Ownership;
    use crate::publisher::ChannelPublisher;
    use jointcast_hal::{DeviceHandle, FakeMotor, JointType};
    use std::f64::consts::PI;

    fn bind(motor: FakeMotor) -> DeviceBinding {
        let device: DeviceHandle = Arc::new(motor);
        DeviceBinding::bind(&device, Ownership::Attached).unwrap()
    }

    #[test]
    fn test_message_shape_and_conversion() {
        let mut binding = bind(
            FakeMotor::builder()
                .joints(2)
                .joint_types(vec![JointType::Revolute, JointType::Prismatic])
                .speeds(vec![180.0, 0.25])
                .build(),
        );
        let mut cycle = SampleCycle::new(StampPolicy::Fused, "base_link");

        let msg = cycle.execute(&mut binding);
        assert_eq!(msg.seq, 0);
        assert_eq!(msg.frame_id, "base_link");
        assert_eq!(msg.name, vec!["joint_0".to_string(), "joint_1".to_string()]);
        assert!(msg.is_consistent());
        assert_eq!(msg.effort.len(), 2);

        // 旋转关节 180°/s → π rad/s，平移关节原样
        assert!((msg.velocity[0] - PI).abs() < 1e-12);
        assert_eq!(msg.velocity[1], 0.25);

        let samples = binding.samples();
        assert!((msg.position[0] - samples.positions[0].to_radians()).abs() < 1e-12);
        assert_eq!(msg.position[1], samples.positions[1]);
    }

    #[test]
    fn test_fused_stamp_is_mean() {
        let mut binding = bind(FakeMotor::builder().joints(3).build());
        let mut cycle = SampleCycle::new(StampPolicy::Fused, "");

        let msg = cycle.execute(&mut binding);
        let stamps = &binding.samples().stamps;
        let mean = stamps.iter().sum::<f64>() / 3.0;
        assert!((msg.stamp - mean).abs() < 1e-9);
    }

    #[test]
    fn test_seq_and_stamps_monotonic() {
        let mut binding = bind(FakeMotor::builder().build());
        let mut cycle = SampleCycle::new(StampPolicy::Fused, "");

        let mut last_stamp = f64::NEG_INFINITY;
        for expected in 0..5 {
            let msg = cycle.execute(&mut binding);
            assert_eq!(msg.seq, expected);
            assert!(msg.stamp >= last_stamp);
            last_stamp = msg.stamp;
        }
        assert_eq!(cycle.next_seq(), 5);
        assert_eq!(cycle.metrics().snapshot().cycles_total, 5);
    }

    #[test]
    fn test_shared_seq_continues_across_cycles() {
        let seq = Arc::new(AtomicU64::new(0));

        let mut binding = bind(FakeMotor::builder().build());
        let mut first = SampleCycle::new(StampPolicy::Fused, "").with_seq(Arc::clone(&seq));
        assert_eq!(first.execute(&mut binding).seq, 0);
        assert_eq!(first.execute(&mut binding).seq, 1);
        drop(first);

        let mut binding = bind(FakeMotor::builder().build());
        let mut second = SampleCycle::new(StampPolicy::Fused, "").with_seq(Arc::clone(&seq));
        assert_eq!(second.next_seq(), 2);
        assert_eq!(second.execute(&mut binding).seq, 2);
        assert_eq!(seq.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_fused_falls_back_to_wall_clock_without_stamps() {
        let motor = FakeMotor::builder().build();
        motor.faults().set_fail_positions(true);
        let mut binding = bind(motor);
        let mut cycle = SampleCycle::new(StampPolicy::Fused, "");

        let before = jointcast_protocol::wall_clock_now();
        let msg = cycle.execute(&mut binding);
        assert!(!binding.has_stamps());
        assert!(msg.stamp >= before);
        assert_eq!(cycle.metrics().snapshot().position_read_failures, 1);
    }

    #[test]
    fn test_no_torque_gives_empty_efforts() {
        let mut binding = bind(FakeMotor::builder().with_torque(false).build());
        let mut cycle = SampleCycle::new(StampPolicy::WallClock, "");
        let msg = cycle.execute(&mut binding);
        assert!(msg.effort.is_empty());
        assert!(msg.is_consistent());
        assert!(cycle.metrics().snapshot().torques_healthy);
    }

    #[test]
    fn test_read_failures_are_not_fatal() {
        let motor = FakeMotor::builder().joints(2).build();
        let faults = motor.faults();
        let mut binding = bind(motor);
        let mut cycle = SampleCycle::new(StampPolicy::Fused, "");

        let first = cycle.execute(&mut binding);

        faults.set_fail_velocities(true);
        faults.set_fail_torques(true);
        let second = cycle.execute(&mut binding);
        assert_eq!(second.velocity, first.velocity);
        assert_eq!(second.effort, first.effort);
        assert_eq!(second.len(), 2);

        let snapshot = cycle.metrics().snapshot();
        assert_eq!(snapshot.velocity_read_failures, 1);
        assert_eq!(snapshot.torque_read_failures, 1);
        assert!(!snapshot.velocities_healthy);
        assert!(snapshot.positions_healthy);

        faults.set_fail_velocities(false);
        faults.set_fail_torques(false);
        cycle.execute(&mut binding);
        assert!(cycle.metrics().snapshot().is_healthy());
    }

    #[test]
    fn test_run_publishes_and_counts_failures() {
        let mut binding = bind(FakeMotor::builder().build());
        let mut cycle = SampleCycle::new(StampPolicy::Fused, "");
        let (publisher, rx) = ChannelPublisher::bounded("js", 1);

        assert_eq!(cycle.run(&mut binding, &publisher), Ok(0));
        assert_eq!(cycle.run(&mut binding, &publisher), Err(PublishError::ChannelFull));

        let snapshot = cycle.metrics().snapshot();
        assert_eq!(snapshot.cycles_total, 2);
        assert_eq!(snapshot.published_total, 1);
        assert_eq!(snapshot.publish_failures, 1);

        assert_eq!(rx.try_recv().unwrap().seq, 0);
        let last = cycle.last_message().load_full().unwrap();
        assert_eq!(last.seq, 1);
    }
}

//! 采样周期指标
//!
//! 采样线程写、控制线程读。所有计数器都是原子量，读取不会阻塞采样。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// 采样周期实时指标
///
/// ```rust
/// use jointcast_driver::CycleMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = CycleMetrics::new();
/// metrics.cycles_total.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.cycles_total, 1);
/// assert!(snapshot.positions_healthy);
/// ```
#[derive(Debug)]
pub struct CycleMetrics {
    /// 已执行的采样周期数
    pub cycles_total: AtomicU64,

    /// 成功交给发布通道的消息数
    pub published_total: AtomicU64,

    /// 位置/时间戳读取失败次数
    pub position_read_failures: AtomicU64,

    /// 速度读取失败次数
    pub velocity_read_failures: AtomicU64,

    /// 力矩读取失败次数
    pub torque_read_failures: AtomicU64,

    /// 发布失败次数（通道关闭或订阅方队列已满）
    pub publish_failures: AtomicU64,

    /// 周期超时次数
    ///
    /// 单个周期耗时超过采样周期时，下一个周期会推迟开始。
    pub overruns: AtomicU64,

    /// 最近一次位置读取是否成功
    pub positions_healthy: AtomicBool,

    /// 最近一次速度读取是否成功
    pub velocities_healthy: AtomicBool,

    /// 最近一次力矩读取是否成功（无力矩能力时恒为 true）
    pub torques_healthy: AtomicBool,
}

impl Default for CycleMetrics {
    fn default() -> Self {
        Self {
            cycles_total: AtomicU64::new(0),
            published_total: AtomicU64::new(0),
            position_read_failures: AtomicU64::new(0),
            velocity_read_failures: AtomicU64::new(0),
            torque_read_failures: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
            positions_healthy: AtomicBool::new(true),
            velocities_healthy: AtomicBool::new(true),
            torques_healthy: AtomicBool::new(true),
        }
    }
}

impl CycleMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取指标快照
    pub fn snapshot(&self) -> CycleMetricsSnapshot {
        CycleMetricsSnapshot {
            cycles_total: self.cycles_total.load(Ordering::Relaxed),
            published_total: self.published_total.load(Ordering::Relaxed),
            position_read_failures: self.position_read_failures.load(Ordering::Relaxed),
            velocity_read_failures: self.velocity_read_failures.load(Ordering::Relaxed),
            torque_read_failures: self.torque_read_failures.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            positions_healthy: self.positions_healthy.load(Ordering::Relaxed),
            velocities_healthy: self.velocities_healthy.load(Ordering::Relaxed),
            torques_healthy: self.torques_healthy.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器，健康标志恢复为 true
    pub fn reset(&self) {
        self.cycles_total.store(0, Ordering::Relaxed);
        self.published_total.store(0, Ordering::Relaxed);
        self.position_read_failures.store(0, Ordering::Relaxed);
        self.velocity_read_failures.store(0, Ordering::Relaxed);
        self.torque_read_failures.store(0, Ordering::Relaxed);
        self.publish_failures.store(0, Ordering::Relaxed);
        self.overruns.store(0, Ordering::Relaxed);
        self.positions_healthy.store(true, Ordering::Relaxed);
        self.velocities_healthy.store(true, Ordering::Relaxed);
        self.torques_healthy.store(true, Ordering::Relaxed);
    }
}

/// 指标快照（不可变）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleMetricsSnapshot {
    pub cycles_total: u64,
    pub published_total: u64,
    pub position_read_failures: u64,
    pub velocity_read_failures: u64,
    pub torque_read_failures: u64,
    pub publish_failures: u64,
    pub overruns: u64,
    pub positions_healthy: bool,
    pub velocities_healthy: bool,
    pub torques_healthy: bool,
}

impl CycleMetricsSnapshot {
    /// 读取失败总数
    pub fn read_failures(&self) -> u64 {
        self.position_read_failures + self.velocity_read_failures + self.torque_read_failures
    }

    /// 所有字段最近一次读取均成功
    pub fn is_healthy(&self) -> bool {
        self.positions_healthy && self.velocities_healthy && self.torques_healthy
    }

    /// 发布成功率（百分比）
    pub fn publish_success_rate(&self) -> f64 {
        if self.cycles_total == 0 {
            return 100.0;
        }
        (self.published_total as f64 / self.cycles_total as f64) * 100.0
    }
}

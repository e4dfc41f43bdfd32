//! 仿真电机板（`fake_motor`）
//!
//! 无硬件依赖的仿真设备，用于 CI 和端到端测试：
//! - 每个关节以恒定速度运动（旋转关节单位：度、度/秒）
//! - 编码器时间戳来自单调时钟，按关节有微小偏移（模拟逐个采样）
//! - 可以逐项关闭能力、注入读取失败、统计关闭次数
//!
//! # 示例
//!
//! ```rust
//! use jointcast_hal::{Device, FakeMotor, JointType};
//!
//! let motor = FakeMotor::builder()
//!     .joints(2)
//!     .joint_types(vec![JointType::Revolute, JointType::Prismatic])
//!     .build();
//!
//! let caps = motor.capabilities();
//! assert_eq!(caps.position_control().unwrap().axes().unwrap(), 2);
//! assert!(caps.torque().is_some());
//! ```

use crate::capability::{AxisInfo, Capabilities, EncodersTimed, PositionControl, TorqueSensor};
use crate::{Device, DeviceError, DeviceErrorKind, HalError};
use jointcast_protocol::JointType;
use jointcast_protocol::timestamp::wall_clock_now;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// 注册表中使用的设备类型名
pub const FAKE_MOTOR_TYPE: &str = "fake_motor";

/// 默认关节数
pub const DEFAULT_JOINTS: usize = 3;

/// 相邻关节采样时间戳的偏移（秒）
const JOINT_SAMPLE_SKEW_S: f64 = 10e-6;

/// 故障注入与统计
///
/// 通过 [`FakeMotor::faults`] 获取共享引用，在测试中切换读取失败。
#[derive(Debug, Default)]
pub struct FakeMotorFaults {
    fail_positions: AtomicBool,
    fail_velocities: AtomicBool,
    fail_torques: AtomicBool,
    fail_axes: AtomicBool,
    close_count: AtomicUsize,
    encoder_reads: AtomicU64,
}

impl FakeMotorFaults {
    pub fn set_fail_positions(&self, fail: bool) {
        self.fail_positions.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_velocities(&self, fail: bool) {
        self.fail_velocities.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_torques(&self, fail: bool) {
        self.fail_torques.store(fail, Ordering::Relaxed);
    }

    /// 轴数查询失败
    pub fn set_fail_axes(&self, fail: bool) {
        self.fail_axes.store(fail, Ordering::Relaxed);
    }

    /// `close()` 被调用的次数
    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::Relaxed)
    }

    /// 成功的编码器位置读取次数
    pub fn encoder_reads(&self) -> u64 {
        self.encoder_reads.load(Ordering::Relaxed)
    }
}

/// 运动学状态（积分更新）
struct Kinematics {
    positions: Vec<f64>,
    speeds: Vec<f64>,
    last_update: Instant,
}

impl Kinematics {
    fn advance(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_update).as_secs_f64();
        for (pos, speed) in self.positions.iter_mut().zip(&self.speeds) {
            *pos += speed * dt;
        }
        self.last_update = now;
    }
}

/// 设备内部状态（各能力端点共享）
struct MotorCore {
    reported_axes: i32,
    names: Vec<Option<String>>,
    types: Vec<JointType>,
    torque_gains: Vec<f64>,
    kinematics: Mutex<Kinematics>,
    origin: Instant,
    epoch: f64,
    closed: AtomicBool,
    faults: Arc<FakeMotorFaults>,
}

impl MotorCore {
    fn joints(&self) -> usize {
        self.types.len()
    }

    fn ensure_open(&self) -> Result<(), HalError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(HalError::Closed);
        }
        Ok(())
    }

    fn check_len(&self, actual: usize) -> Result<(), HalError> {
        let expected = self.joints();
        if actual != expected {
            return Err(HalError::BufferLength { expected, actual });
        }
        Ok(())
    }

    fn check_axis(&self, axis: usize) -> Result<(), HalError> {
        if axis >= self.joints() {
            return Err(HalError::AxisOutOfRange {
                axis,
                axes: self.joints(),
            });
        }
        Ok(())
    }

    fn injected(flag: &AtomicBool, what: &str) -> Result<(), HalError> {
        if flag.load(Ordering::Relaxed) {
            return Err(DeviceError::new(
                DeviceErrorKind::Timeout,
                format!("injected {what} read failure"),
            )
            .into());
        }
        Ok(())
    }
}

impl PositionControl for MotorCore {
    fn axes(&self) -> Result<i32, HalError> {
        self.ensure_open()?;
        Self::injected(&self.faults.fail_axes, "axes")?;
        Ok(self.reported_axes)
    }
}

impl EncodersTimed for MotorCore {
    fn encoders_timed(&self, positions: &mut [f64], stamps: &mut [f64]) -> Result<(), HalError> {
        self.ensure_open()?;
        self.check_len(positions.len())?;
        self.check_len(stamps.len())?;
        Self::injected(&self.faults.fail_positions, "position")?;

        let mut kin = self.kinematics.lock();
        kin.advance();
        let base = self.epoch + kin.last_update.duration_since(self.origin).as_secs_f64();
        positions.copy_from_slice(&kin.positions);
        for (i, stamp) in stamps.iter_mut().enumerate() {
            *stamp = base + i as f64 * JOINT_SAMPLE_SKEW_S;
        }
        self.faults.encoder_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn encoder_speeds(&self, speeds: &mut [f64]) -> Result<(), HalError> {
        self.ensure_open()?;
        self.check_len(speeds.len())?;
        Self::injected(&self.faults.fail_velocities, "velocity")?;

        speeds.copy_from_slice(&self.kinematics.lock().speeds);
        Ok(())
    }
}

impl TorqueSensor for MotorCore {
    fn torques(&self, torques: &mut [f64]) -> Result<(), HalError> {
        self.ensure_open()?;
        self.check_len(torques.len())?;
        Self::injected(&self.faults.fail_torques, "torque")?;

        // 简单的粘性摩擦模型：τ = k · v
        let kin = self.kinematics.lock();
        for ((tau, gain), speed) in torques.iter_mut().zip(&self.torque_gains).zip(&kin.speeds) {
            *tau = gain * speed;
        }
        Ok(())
    }
}

impl AxisInfo for MotorCore {
    fn axis_name(&self, axis: usize) -> Result<String, HalError> {
        self.ensure_open()?;
        self.check_axis(axis)?;
        self.names[axis].clone().ok_or_else(|| {
            DeviceError::new(
                DeviceErrorKind::NotFound,
                format!("no name configured for axis {axis}"),
            )
            .into()
        })
    }

    fn joint_type(&self, axis: usize) -> Result<JointType, HalError> {
        self.ensure_open()?;
        self.check_axis(axis)?;
        Ok(self.types[axis])
    }
}

/// 仿真电机板
pub struct FakeMotor {
    name: String,
    core: Arc<MotorCore>,
    capabilities: Capabilities,
}

impl FakeMotor {
    /// 创建 Builder
    pub fn builder() -> FakeMotorBuilder {
        FakeMotorBuilder::new()
    }

    /// 从配置表构造
    ///
    /// 支持的键（均可选）：
    ///
    /// | 键 | 类型 | 默认值 |
    /// |----|------|--------|
    /// | `name` | 字符串 | `"fake_motor"` |
    /// | `joints` | 整数（可为 0 或负数，用于测试） | 3 |
    /// | `joint_types` | 字符串数组 | 全部 `"revolute"` |
    /// | `axis_names` | 字符串数组 | `joint_0` .. |
    /// | `positions` | 数值数组（度） | 全 0 |
    /// | `speeds` | 数值数组（度/秒） | `10 · (i + 1)` |
    /// | `torque` | 布尔 | `true` |
    pub fn from_config(config: &toml::Table) -> Result<Self, HalError> {
        let mut builder = FakeMotorBuilder::new();

        if let Some(value) = config.get("name") {
            let name = value
                .as_str()
                .ok_or_else(|| HalError::invalid_parameter("name", "must be a string"))?;
            builder = builder.name(name);
        }

        if let Some(value) = config.get("joints") {
            let joints = value
                .as_integer()
                .ok_or_else(|| HalError::invalid_parameter("joints", "must be an integer"))?;
            let reported = i32::try_from(joints)
                .map_err(|_| HalError::invalid_parameter("joints", "out of range"))?;
            builder = builder.joints(reported.max(0) as usize).reported_axes(reported);
        }

        if let Some(types) = string_array(config, "joint_types")? {
            let types = types
                .iter()
                .map(|t| {
                    t.parse::<JointType>()
                        .map_err(|e| HalError::invalid_parameter("joint_types", e.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            builder = builder.joint_types(types);
        }

        if let Some(names) = string_array(config, "axis_names")? {
            builder = builder.axis_names(names);
        }

        if let Some(positions) = number_array(config, "positions")? {
            builder = builder.positions(positions);
        }

        if let Some(speeds) = number_array(config, "speeds")? {
            builder = builder.speeds(speeds);
        }

        if let Some(value) = config.get("torque") {
            let torque = value
                .as_bool()
                .ok_or_else(|| HalError::invalid_parameter("torque", "must be a boolean"))?;
            builder = builder.with_torque(torque);
        }

        Ok(builder.build())
    }

    /// 故障注入与统计句柄
    pub fn faults(&self) -> Arc<FakeMotorFaults> {
        Arc::clone(&self.core.faults)
    }

    /// 修改某个关节的速度（度/秒）
    pub fn set_speed(&self, axis: usize, speed: f64) -> Result<(), HalError> {
        self.core.check_axis(axis)?;
        let mut kin = self.core.kinematics.lock();
        kin.advance();
        kin.speeds[axis] = speed;
        Ok(())
    }

    /// 关节数（不受 `reported_axes` 影响）
    pub fn joints(&self) -> usize {
        self.core.joints()
    }
}

impl Device for FakeMotor {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_valid(&self) -> bool {
        !self.core.closed.load(Ordering::Acquire)
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities.clone()
    }

    fn close(&self) -> Result<(), HalError> {
        self.core.faults.close_count.fetch_add(1, Ordering::Relaxed);
        if self.core.closed.swap(true, Ordering::AcqRel) {
            debug!("fake_motor '{}' already closed", self.name);
            return Ok(());
        }
        info!("fake_motor '{}' closed", self.name);
        Ok(())
    }
}

/// FakeMotor Builder（链式构造）
pub struct FakeMotorBuilder {
    name: String,
    joints: usize,
    reported_axes: Option<i32>,
    joint_types: Option<Vec<JointType>>,
    axis_names: Option<Vec<String>>,
    unnamed_axes: Vec<usize>,
    positions: Option<Vec<f64>>,
    speeds: Option<Vec<f64>>,
    position_control: bool,
    encoders: bool,
    torque: bool,
    axis_info: bool,
}

impl Default for FakeMotorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeMotorBuilder {
    pub fn new() -> Self {
        Self {
            name: FAKE_MOTOR_TYPE.to_string(),
            joints: DEFAULT_JOINTS,
            reported_axes: None,
            joint_types: None,
            axis_names: None,
            unnamed_axes: Vec::new(),
            positions: None,
            speeds: None,
            position_control: true,
            encoders: true,
            torque: true,
            axis_info: true,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 关节数（缓冲区大小）
    pub fn joints(mut self, joints: usize) -> Self {
        self.joints = joints;
        self
    }

    /// 覆盖 `axes()` 报告的轴数（可以报告 0 或负数）
    pub fn reported_axes(mut self, axes: i32) -> Self {
        self.reported_axes = Some(axes);
        self
    }

    /// 关节类型（不足部分补 `Revolute`）
    pub fn joint_types(mut self, types: Vec<JointType>) -> Self {
        self.joint_types = Some(types);
        self
    }

    /// 关节名称（不足部分补 `joint_<i>`）
    pub fn axis_names(mut self, names: Vec<String>) -> Self {
        self.axis_names = Some(names);
        self
    }

    /// 让某个轴的名称查询失败
    pub fn unnamed_axis(mut self, axis: usize) -> Self {
        self.unnamed_axes.push(axis);
        self
    }

    /// 初始位置（度）
    pub fn positions(mut self, positions: Vec<f64>) -> Self {
        self.positions = Some(positions);
        self
    }

    /// 关节速度（度/秒）
    pub fn speeds(mut self, speeds: Vec<f64>) -> Self {
        self.speeds = Some(speeds);
        self
    }

    pub fn with_position_control(mut self, enabled: bool) -> Self {
        self.position_control = enabled;
        self
    }

    pub fn with_encoders(mut self, enabled: bool) -> Self {
        self.encoders = enabled;
        self
    }

    pub fn with_torque(mut self, enabled: bool) -> Self {
        self.torque = enabled;
        self
    }

    pub fn with_axis_info(mut self, enabled: bool) -> Self {
        self.axis_info = enabled;
        self
    }

    pub fn build(self) -> FakeMotor {
        let n = self.joints;

        let mut types = self.joint_types.unwrap_or_default();
        types.resize(n, JointType::Revolute);

        let mut names: Vec<Option<String>> =
            self.axis_names.unwrap_or_default().into_iter().map(Some).collect();
        names.truncate(n);
        for i in names.len()..n {
            names.push(Some(format!("joint_{i}")));
        }
        for axis in self.unnamed_axes {
            if let Some(slot) = names.get_mut(axis) {
                *slot = None;
            }
        }

        let mut positions = self.positions.unwrap_or_default();
        positions.resize(n, 0.0);

        let mut speeds = self.speeds.unwrap_or_default();
        for i in speeds.len()..n {
            speeds.push(10.0 * (i + 1) as f64);
        }
        speeds.truncate(n);

        let torque_gains = (0..n).map(|i| 0.01 * (i + 1) as f64).collect();

        let core = Arc::new(MotorCore {
            reported_axes: self.reported_axes.unwrap_or(n as i32),
            names,
            types,
            torque_gains,
            kinematics: Mutex::new(Kinematics {
                positions,
                speeds,
                last_update: Instant::now(),
            }),
            origin: Instant::now(),
            epoch: wall_clock_now(),
            closed: AtomicBool::new(false),
            faults: Arc::new(FakeMotorFaults::default()),
        });

        let mut capabilities = Capabilities::new();
        if self.position_control {
            capabilities = capabilities.with_position_control(core.clone());
        }
        if self.encoders {
            capabilities = capabilities.with_encoders_timed(core.clone());
        }
        if self.torque {
            capabilities = capabilities.with_torque(core.clone());
        }
        if self.axis_info {
            capabilities = capabilities.with_axis_info(core.clone());
        }

        debug!("fake_motor '{}' built with {} joints ({:?})", self.name, n, capabilities);

        FakeMotor {
            name: self.name,
            core,
            capabilities,
        }
    }
}

fn string_array(config: &toml::Table, key: &str) -> Result<Option<Vec<String>>, HalError> {
    let Some(value) = config.get(key) else {
        return Ok(None);
    };
    let array = value
        .as_array()
        .ok_or_else(|| HalError::invalid_parameter(key, "must be an array of strings"))?;
    array
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| HalError::invalid_parameter(key, "must be an array of strings"))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn number_array(config: &toml::Table, key: &str) -> Result<Option<Vec<f64>>, HalError> {
    let Some(value) = config.get(key) else {
        return Ok(None);
    };
    let array = value
        .as_array()
        .ok_or_else(|| HalError::invalid_parameter(key, "must be an array of numbers"))?;
    array
        .iter()
        .map(|v| {
            v.as_float()
                .or_else(|| v.as_integer().map(|i| i as f64))
                .ok_or_else(|| HalError::invalid_parameter(key, "must be an array of numbers"))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

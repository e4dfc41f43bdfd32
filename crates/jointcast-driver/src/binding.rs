//! 设备绑定
//!
//! 把一个 HAL 设备解析为采样周期所需的能力视图、关节元数据和采样缓冲区。
//!
//! 绑定流程：
//!
//! 1. 检查必需能力（位置控制、带时间戳编码器、轴信息），力矩能力可选
//! 2. 查询轴数 N，要求 N > 0
//! 3. 逐轴读取名称（任一失败则整体失败），读取关节类型（失败记为 `Unknown`）
//! 4. 分配 N 长度的采样缓冲区，之后每个周期复用

use crate::error::BindError;
use jointcast_hal::{
    Capability, DeviceHandle, EncodersTimed, HalError, JointType, TorqueSensor,
};
use jointcast_protocol::JointMetadata;
use std::mem;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 设备所有权
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// 桥接器根据配置创建，关闭时负责 `close()`
    Owned,
    /// 外部传入，桥接器永远不会关闭它
    Attached,
}

impl Ownership {
    #[inline]
    pub fn is_owned(self) -> bool {
        self == Ownership::Owned
    }
}

/// 绑定状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindingState {
    #[default]
    Unbound,
    Bound(Ownership),
    Running(Ownership),
}

impl BindingState {
    /// 当前绑定的所有权（未绑定时为 `None`）
    pub fn ownership(self) -> Option<Ownership> {
        match self {
            BindingState::Unbound => None,
            BindingState::Bound(o) | BindingState::Running(o) => Some(o),
        }
    }

    pub fn is_bound(self) -> bool {
        self != BindingState::Unbound
    }

    pub fn is_running(self) -> bool {
        matches!(self, BindingState::Running(_))
    }
}

/// 单个周期的采样数据
///
/// 读取失败时对应字段保留上一周期的值。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSet {
    /// 位置（旋转关节：度）
    pub positions: Vec<f64>,
    /// 速度（旋转关节：度/秒）
    pub velocities: Vec<f64>,
    /// 力矩（无力矩能力时为空）
    pub efforts: Vec<f64>,
    /// 逐关节采样时间戳（秒）
    pub stamps: Vec<f64>,
}

impl SampleSet {
    fn with_joints(joints: usize, has_torque: bool) -> Self {
        Self {
            positions: vec![0.0; joints],
            velocities: vec![0.0; joints],
            efforts: if has_torque { vec![0.0; joints] } else { Vec::new() },
            stamps: vec![0.0; joints],
        }
    }
}

/// 已绑定的设备
pub struct DeviceBinding {
    device: DeviceHandle,
    ownership: Ownership,
    encoders: Arc<dyn EncodersTimed>,
    torque: Option<Arc<dyn TorqueSensor>>,
    metadata: JointMetadata,
    samples: SampleSet,
    // 位置（及时间戳）至少成功读取过一次
    has_stamps: bool,
    // 读取先写入暂存区，成功后再与 samples 交换
    scratch: SampleSet,
}

impl DeviceBinding {
    /// 绑定设备
    pub fn bind(device: &DeviceHandle, ownership: Ownership) -> Result<Self, BindError> {
        let caps = device.capabilities();

        if let Some(missing) = caps.missing_required().into_iter().next() {
            warn!("Device '{}' does not provide {}", device.name(), missing);
            return Err(BindError::CapabilityMissing(missing));
        }

        let (Some(position_control), Some(encoders), Some(axis_info)) = (
            caps.position_control(),
            caps.encoders_timed(),
            caps.axis_info(),
        ) else {
            // missing_required() 已覆盖这三项
            return Err(BindError::CapabilityMissing(Capability::PositionControl));
        };

        let torque = caps.torque().cloned();
        if torque.is_none() {
            warn!(
                "Device '{}' has no torque sensor, efforts will be omitted",
                device.name()
            );
        }

        let axes = position_control.axes().map_err(BindError::AxisCountUnavailable)?;
        if axes <= 0 {
            return Err(BindError::InvalidAxisCount(axes));
        }
        let joints = axes as usize;

        let metadata = (0..joints)
            .map(|axis| {
                let name = axis_info
                    .axis_name(axis)
                    .map_err(|source| BindError::AxisNameUnresolved { axis, source })?;
                let joint_type = axis_info.joint_type(axis).unwrap_or_else(|e| {
                    warn!("Joint type of axis {} ({}) unavailable: {}", axis, name, e);
                    JointType::Unknown
                });
                Ok((name, joint_type))
            })
            .collect::<Result<JointMetadata, BindError>>()?;

        info!(
            "Bound device '{}' ({:?}): {} joints [{}]",
            device.name(),
            ownership,
            joints,
            metadata.names().join(", ")
        );

        let has_torque = torque.is_some();
        Ok(Self {
            device: Arc::clone(device),
            ownership,
            encoders: Arc::clone(encoders),
            torque,
            metadata,
            samples: SampleSet::with_joints(joints, has_torque),
            has_stamps: false,
            scratch: SampleSet::with_joints(joints, has_torque),
        })
    }

    /// 解除绑定，交还设备句柄和所有权
    ///
    /// 是否关闭设备由调用方根据所有权决定。
    pub fn unbind(self) -> (DeviceHandle, Ownership) {
        debug!("Unbinding device '{}'", self.device.name());
        (self.device, self.ownership)
    }

    /// 关节元数据
    pub fn metadata(&self) -> &JointMetadata {
        &self.metadata
    }

    /// 关节数 N
    pub fn joints(&self) -> usize {
        self.metadata.len()
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    pub fn has_torque(&self) -> bool {
        self.torque.is_some()
    }

    /// 是否已有真实的采样时间戳（绑定后位置读取成功过）
    pub fn has_stamps(&self) -> bool {
        self.has_stamps
    }

    /// 当前采样数据
    pub fn samples(&self) -> &SampleSet {
        &self.samples
    }

    /// 读取位置与逐关节时间戳
    pub(crate) fn read_positions(&mut self) -> Result<(), HalError> {
        self.encoders
            .encoders_timed(&mut self.scratch.positions, &mut self.scratch.stamps)?;
        mem::swap(&mut self.samples.positions, &mut self.scratch.positions);
        mem::swap(&mut self.samples.stamps, &mut self.scratch.stamps);
        self.has_stamps = true;
        Ok(())
    }

    /// 读取速度
    pub(crate) fn read_velocities(&mut self) -> Result<(), HalError> {
        self.encoders.encoder_speeds(&mut self.scratch.velocities)?;
        mem::swap(&mut self.samples.velocities, &mut self.scratch.velocities);
        Ok(())
    }

    /// 读取力矩（无力矩能力时返回 `Ok(false)`）
    pub(crate) fn read_efforts(&mut self) -> Result<bool, HalError> {
        let Some(torque) = &self.torque else {
            return Ok(false);
        };
        torque.torques(&mut self.scratch.efforts)?;
        mem::swap(&mut self.samples.efforts, &mut self.scratch.efforts);
        Ok(true)
    }
}

impl std::fmt::Debug for DeviceBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBinding")
            .field("device", &self.device.name())
            .field("ownership", &self.ownership)
            .field("metadata", &self.metadata)
            .field("has_torque", &self.torque.is_some())
            .finish()
    }
}

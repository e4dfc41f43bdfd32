//! # jointcast HAL
//!
//! 硬件抽象层，提供统一的设备能力接口。
//!
//! 设备不通过运行时类型查询暴露能力，而是返回一张类型化的能力表
//! [`Capabilities`]：每一项都是 `Option<Arc<dyn Trait>>`，调用方显式检查
//! 是否存在。
//!
//! ```text
//! Device ──capabilities()──▶ Capabilities
//!                              ├─ position_control : PositionControl   (轴数)
//!                              ├─ encoders_timed   : EncodersTimed     (位置 + 时间戳 + 速度)
//!                              ├─ torque           : TorqueSensor      (可选)
//!                              └─ axis_info        : AxisInfo          (名称 + 关节类型)
//! ```

pub mod capability;
pub mod fake_motor;
pub mod registry;

pub use capability::{
    AxisInfo, Capabilities, Capability, EncodersTimed, PositionControl, TorqueSensor,
};
pub use fake_motor::{FakeMotor, FakeMotorBuilder, FakeMotorFaults};
pub use registry::{DeviceConstructor, DeviceRegistry};

// 重新导出协议层的关节类型
pub use jointcast_protocol::JointType;

use std::sync::Arc;
use thiserror::Error;

/// HAL 统一错误类型
#[derive(Error, Debug)]
pub enum HalError {
    #[error("Device Error: {0}")]
    Device(#[from] DeviceError),
    #[error("Axis {axis} out of range (device has {axes} axes)")]
    AxisOutOfRange { axis: usize, axes: usize },
    #[error("Buffer length mismatch: expected {expected}, got {actual}")]
    BufferLength { expected: usize, actual: usize },
    #[error("Unknown device type: {0:?}")]
    UnknownDevice(String),
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("Device closed")]
    Closed,
}

impl HalError {
    /// 构造参数错误
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// 设备错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorKind {
    Unknown,
    NotFound,
    Busy,
    Timeout,
    InvalidResponse,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct DeviceError {
    pub kind: DeviceErrorKind,
    pub message: String,
}

impl DeviceError {
    pub fn new(kind: DeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<String> for DeviceError {
    fn from(message: String) -> Self {
        Self::new(DeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for DeviceError {
    fn from(message: &str) -> Self {
        Self::new(DeviceErrorKind::Unknown, message)
    }
}

/// 硬件抽象设备
///
/// 设备由谁关闭取决于所有权：
/// - 由桥接器根据配置创建的设备，桥接器负责在关闭时调用 [`Device::close`]
/// - 由外部传入（attach）的设备，桥接器只持有引用，永远不会关闭它
pub trait Device: Send + Sync {
    /// 设备名称（用于日志）
    fn name(&self) -> &str;

    /// 设备当前是否可用
    fn is_valid(&self) -> bool {
        true
    }

    /// 能力表（每次调用返回同一组能力端点的引用）
    fn capabilities(&self) -> Capabilities;

    /// 关闭设备，释放底层资源
    fn close(&self) -> Result<(), HalError>;
}

/// 共享设备句柄
pub type DeviceHandle = Arc<dyn Device>;

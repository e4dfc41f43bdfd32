//! 设备能力接口与类型化能力表

use crate::HalError;
use jointcast_protocol::JointType;
use std::fmt;
use std::sync::Arc;

/// 位置控制能力（只用于查询轴数，桥接器从不发送运动指令）
pub trait PositionControl: Send + Sync {
    /// 轴数
    ///
    /// 返回有符号数：设备可能报告 0 或负数，由调用方判定是否有效。
    fn axes(&self) -> Result<i32, HalError>;
}

/// 带时间戳的编码器能力
///
/// 所有输出缓冲区长度必须等于轴数。位置与速度单位：旋转关节为度、度/秒。
pub trait EncodersTimed: Send + Sync {
    /// 读取全部编码器位置及各自的采样时间戳（秒）
    fn encoders_timed(&self, positions: &mut [f64], stamps: &mut [f64]) -> Result<(), HalError>;

    /// 读取全部编码器速度
    fn encoder_speeds(&self, speeds: &mut [f64]) -> Result<(), HalError>;
}

/// 力矩读取能力（可选）
pub trait TorqueSensor: Send + Sync {
    /// 读取全部关节力矩（N·m）
    fn torques(&self, torques: &mut [f64]) -> Result<(), HalError>;
}

/// 轴信息能力
pub trait AxisInfo: Send + Sync {
    /// 轴名称
    fn axis_name(&self, axis: usize) -> Result<String, HalError>;

    /// 关节类型
    fn joint_type(&self, axis: usize) -> Result<JointType, HalError>;
}

/// 能力标识（用于错误信息与日志）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    PositionControl,
    EncodersTimed,
    Torque,
    AxisInfo,
}

impl Capability {
    /// 绑定设备时必须存在的能力
    pub const REQUIRED: [Capability; 3] = [
        Capability::PositionControl,
        Capability::EncodersTimed,
        Capability::AxisInfo,
    ];

    /// 能力接口名称
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::PositionControl => "PositionControl",
            Capability::EncodersTimed => "EncodersTimed",
            Capability::Torque => "TorqueSensor",
            Capability::AxisInfo => "AxisInfo",
        }
    }

    /// 是否为必需能力
    pub fn is_required(self) -> bool {
        self != Capability::Torque
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 类型化能力表
///
/// 每一项都是可选的能力端点；设备通过 builder 方法声明自己支持的能力。
///
/// ```rust
/// use jointcast_hal::{Capabilities, Capability};
///
/// let caps = Capabilities::new();
/// assert!(!caps.has(Capability::EncodersTimed));
/// assert_eq!(caps.missing_required(), Capability::REQUIRED.to_vec());
/// ```
#[derive(Clone, Default)]
pub struct Capabilities {
    position_control: Option<Arc<dyn PositionControl>>,
    encoders_timed: Option<Arc<dyn EncodersTimed>>,
    torque: Option<Arc<dyn TorqueSensor>>,
    axis_info: Option<Arc<dyn AxisInfo>>,
}

impl Capabilities {
    /// 空能力表
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position_control(mut self, cap: Arc<dyn PositionControl>) -> Self {
        self.position_control = Some(cap);
        self
    }

    pub fn with_encoders_timed(mut self, cap: Arc<dyn EncodersTimed>) -> Self {
        self.encoders_timed = Some(cap);
        self
    }

    pub fn with_torque(mut self, cap: Arc<dyn TorqueSensor>) -> Self {
        self.torque = Some(cap);
        self
    }

    pub fn with_axis_info(mut self, cap: Arc<dyn AxisInfo>) -> Self {
        self.axis_info = Some(cap);
        self
    }

    pub fn position_control(&self) -> Option<&Arc<dyn PositionControl>> {
        self.position_control.as_ref()
    }

    pub fn encoders_timed(&self) -> Option<&Arc<dyn EncodersTimed>> {
        self.encoders_timed.as_ref()
    }

    pub fn torque(&self) -> Option<&Arc<dyn TorqueSensor>> {
        self.torque.as_ref()
    }

    pub fn axis_info(&self) -> Option<&Arc<dyn AxisInfo>> {
        self.axis_info.as_ref()
    }

    /// 是否提供指定能力
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::PositionControl => self.position_control.is_some(),
            Capability::EncodersTimed => self.encoders_timed.is_some(),
            Capability::Torque => self.torque.is_some(),
            Capability::AxisInfo => self.axis_info.is_some(),
        }
    }

    /// 缺失的必需能力（按 [`Capability::REQUIRED`] 顺序）
    pub fn missing_required(&self) -> Vec<Capability> {
        Capability::REQUIRED.into_iter().filter(|c| !self.has(*c)).collect()
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("position_control", &self.position_control.is_some())
            .field("encoders_timed", &self.encoders_timed.is_some())
            .field("torque", &self.torque.is_some())
            .field("axis_info", &self.axis_info.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Axes(i32);

    impl PositionControl for Axes {
        fn axes(&self) -> Result<i32, HalError> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_presence_checks() {
        let caps = Capabilities::new().with_position_control(Arc::new(Axes(2)));
        assert!(caps.has(Capability::PositionControl));
        assert!(!caps.has(Capability::Torque));
        assert_eq!(
            caps.missing_required(),
            vec![Capability::EncodersTimed, Capability::AxisInfo]
        );
        assert_eq!(caps.position_control().unwrap().axes().unwrap(), 2);
    }

    #[test]
    fn test_torque_is_optional() {
        assert!(!Capability::Torque.is_required());
        assert!(!Capability::REQUIRED.contains(&Capability::Torque));
        assert!(Capability::AxisInfo.is_required());
    }

    #[test]
    fn test_debug_shows_presence_only() {
        let caps = Capabilities::new().with_position_control(Arc::new(Axes(1)));
        let text = format!("{:?}", caps);
        assert!(text.contains("position_control: true"));
        assert!(text.contains("torque: false"));
    }
}

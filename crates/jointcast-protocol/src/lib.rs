//! # jointcast Protocol
//!
//! 关节状态数据模型（无硬件依赖）
//!
//! ## 模块
//!
//! - `joint`: 关节类型与关节元数据
//! - `units`: 角度/弧度单位换算
//! - `timestamp`: 时间戳融合与发布时间戳策略
//! - `message`: 对外发布的 `JointState` 消息
//!
//! ## 单位约定
//!
//! 硬件层以 **度** 报告旋转关节的位置与速度，发布层统一使用 **弧度**。
//! 平移关节（以及类型未知的关节）原样透传。

pub mod joint;
pub mod message;
pub mod timestamp;
pub mod units;

// 重新导出常用类型
pub use joint::{JointMetadata, JointType};
pub use message::JointState;
pub use timestamp::{Stamp, StampPolicy, fuse_timestamps, wall_clock_now};
pub use units::{Deg, Rad, convert_for_joint, deg_to_rad, rad_to_deg};

use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 无法识别的关节类型名称
    #[error("Unknown joint type: {0:?}")]
    UnknownJointType(String),

    /// 无法识别的时间戳策略名称
    #[error("Unknown stamp policy: {0:?} (expected \"fused\" or \"wall_clock\")")]
    UnknownStampPolicy(String),
}

//! 驱动层错误类型定义

use jointcast_hal::{Capability, HalError};
use thiserror::Error;

/// 设备绑定错误
///
/// 绑定要么完整成功，要么不留下任何部分状态。
#[derive(Error, Debug)]
pub enum BindError {
    /// 缺少必需能力
    #[error("Device is missing required capability: {0}")]
    CapabilityMissing(Capability),

    /// 轴数查询失败
    #[error("Failed to query axis count: {0}")]
    AxisCountUnavailable(#[source] HalError),

    /// 轴数无效（0 或负数）
    #[error("Invalid axis count: {0}")]
    InvalidAxisCount(i32),

    /// 轴名称查询失败
    #[error("Failed to resolve name of axis {axis}: {source}")]
    AxisNameUnresolved {
        axis: usize,
        #[source]
        source: HalError,
    },
}

/// 驱动层错误类型（采样线程）
///
/// 绑定错误见 [`BindError`]；发布失败只计数，不作为错误向上传递。
#[derive(Error, Debug)]
pub enum DriverError {
    /// 无法创建采样线程
    #[error("Failed to spawn worker thread '{name}': {source}")]
    WorkerSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// 采样线程 panic
    #[error("Worker thread '{0}' panicked")]
    WorkerPanicked(String),
}

//! 桥接器错误类型

use jointcast_driver::{BindError, DriverError};
use jointcast_hal::HalError;
use std::path::PathBuf;
use thiserror::Error;

/// 配置错误
///
/// 配置在创建任何资源之前完成校验，出错时不留下任何状态。
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 缺少必需参数
    #[error("Missing required parameter '{0}'")]
    MissingParameter(&'static str),

    /// 参数值无效
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// TOML 解析失败
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// 读取配置文件失败
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// 生命周期错误（操作被拒绝，状态不变）
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Bridge is not open")]
    NotOpen,

    #[error("Bridge is already open")]
    AlreadyOpen,

    #[error("A device is already bound")]
    AlreadyBound,

    #[error("No device is bound")]
    NotBound,

    #[error("Cannot detach a device opened from configuration; close the bridge instead")]
    CannotDetachOwnedDevice,

    #[error("Cannot attach more than one device")]
    TooManyDevices,

    #[error("No device to attach")]
    NoDevices,

    #[error("Device is not valid")]
    InvalidDevice,
}

/// 桥接器统一错误类型
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Bind error: {0}")]
    Bind(#[from] BindError),

    #[error("Device error: {0}")]
    Hal(#[from] HalError),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),
}

impl BridgeError {
    /// 生命周期错误（若是）
    pub fn lifecycle(&self) -> Option<LifecycleError> {
        match self {
            BridgeError::Lifecycle(e) => Some(*e),
            _ => None,
        }
    }
}

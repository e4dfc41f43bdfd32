//! # jointcast
//!
//! 把运动控制设备的关节状态按固定周期转发到发布话题。
//!
//! # 架构
//!
//! - **协议层** (`jointcast_protocol`): `JointState` 消息、单位换算、时间戳融合
//! - **HAL 层** (`jointcast_hal`): 设备能力接口、设备注册表、`fake_motor` 仿真设备
//! - **驱动层** (`jointcast_driver`): 设备绑定、采样周期、调度线程、共享会话
//! - **桥接层** (本 crate): 配置与生命周期控制
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use jointcast::{BridgeConfig, JointStateBridge};
//!
//! jointcast::init_logging();
//!
//! let config = BridgeConfig::from_toml_str(r#"
//!     node_name = "n1"
//!     topic_name = "c1"
//!     subdevice = "fake_motor"
//! "#).unwrap();
//!
//! let bridge = JointStateBridge::new();
//! bridge.open_with(config).unwrap();
//! let rx = bridge.subscribe().unwrap();
//! let msg = rx.recv().unwrap();
//! println!("{:?} {:?}", msg.name, msg.position);
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod state;

pub use bridge::JointStateBridge;
pub use config::{BridgeConfig, DEFAULT_PERIOD_S};
pub use error::{BridgeError, ConfigError, LifecycleError};
pub use state::{AtomicBridgeState, BridgeState};

// 下层常用类型
pub use jointcast_driver::{
    BindError, BindingState, CycleMetricsSnapshot, DriverError, Ownership, Session,
};
pub use jointcast_hal::{Device, DeviceHandle, DeviceRegistry, FakeMotor, HalError};
pub use jointcast_protocol::{JointState, JointType, StampPolicy};

pub use jointcast_driver as driver;
pub use jointcast_hal as hal;
pub use jointcast_protocol as protocol;

use tracing_subscriber::EnvFilter;

/// 默认日志过滤规则（未设置 `RUST_LOG` 时使用）
pub const DEFAULT_LOG_FILTER: &str = "jointcast=info";

/// 初始化日志（`RUST_LOG` 优先，否则 `jointcast=info`）
///
/// 已经初始化过时返回 `false`。
pub fn init_logging() -> bool {
    init_logging_with(DEFAULT_LOG_FILTER)
}

/// 以指定的默认过滤规则初始化日志
pub fn init_logging_with(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).try_init().is_ok()
}

//! # jointcast Driver
//!
//! 设备绑定、周期采样与发布通道。
//!
//! ## 模块
//!
//! - `binding`: 能力解析、关节元数据、采样缓冲区
//! - `cycle`: 单次采样周期（读取 → 融合时间戳 → 单位换算 → 组装消息 → 发布）
//! - `worker`: 固定周期调度线程
//! - `publisher`: 发布端接口与 crossbeam 通道实现
//! - `session`: 进程内共享会话（节点、话题、订阅）
//! - `metrics`: 采样周期指标
//!
//! ## 线程模型
//!
//! ```text
//! 控制线程                         采样线程（PeriodicWorker）
//!    │ bind / unbind                   │ 每个周期:
//!    ▼                                 ▼
//! Arc<Mutex<DeviceBinding>> ◀──lock── SampleCycle::run ──▶ Publisher
//! ```
//!
//! 采样线程每个周期只持有一次绑定锁；解绑前先停止并 join 采样线程。

pub mod binding;
pub mod cycle;
pub mod error;
pub mod metrics;
pub mod publisher;
pub mod session;
pub mod worker;

pub use binding::{BindingState, DeviceBinding, Ownership, SampleSet};
pub use cycle::SampleCycle;
pub use error::{BindError, DriverError};
pub use metrics::{CycleMetrics, CycleMetricsSnapshot};
pub use publisher::{ChannelPublisher, PublishError, Publisher};
pub use session::{DEFAULT_QUEUE_DEPTH, Node, Session, SessionPublisher};
pub use worker::{PeriodicWorker, Tick};

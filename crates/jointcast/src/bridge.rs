//! 关节状态桥接器（生命周期控制）
//!
//! [`JointStateBridge`] 负责：
//!
//! - 校验配置，获取共享会话并声明话题
//! - 根据配置创建并拥有设备，或等待外部设备接入（attach）
//! - 绑定设备后启动采样线程，解绑前同步停止采样线程
//! - 关闭时只关闭自己创建的设备，并且只关闭一次
//!
//! 所有控制操作在同一把互斥锁下串行执行；状态可以无锁读取。
//!
//! ```rust
//! use jointcast::{BridgeState, JointStateBridge};
//!
//! let config: toml::Table = toml::from_str(r#"
//!     period = 0.01
//!     node_name = "doc_node"
//!     topic_name = "doc_joint_states"
//!     subdevice = "fake_motor"
//! "#).unwrap();
//!
//! let bridge = JointStateBridge::new();
//! bridge.open(&config).unwrap();
//! assert_eq!(bridge.state(), BridgeState::Running);
//! assert_eq!(bridge.joint_names().len(), 3);
//!
//! bridge.close().unwrap();
//! assert_eq!(bridge.state(), BridgeState::Closed);
//! ```

use crate::config::BridgeConfig;
use crate::error::{BridgeError, LifecycleError};
use crate::state::{AtomicBridgeState, BridgeState};
use arc_swap::ArcSwapOption;
use crossbeam_channel::Receiver;
use jointcast_driver::{
    BindingState, CycleMetrics, CycleMetricsSnapshot, DeviceBinding, Node, Ownership,
    PeriodicWorker, Publisher, SampleCycle, Session, SessionPublisher,
};
use jointcast_hal::{DeviceHandle, DeviceRegistry};
use jointcast_protocol::JointState;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

/// 控制状态（仅在控制锁内访问）
#[derive(Default)]
struct Inner {
    config: Option<BridgeConfig>,
    node: Option<Node>,
    publisher: Option<Arc<SessionPublisher>>,
    binding: Option<Arc<Mutex<DeviceBinding>>>,
    binding_state: BindingState,
    worker: Option<PeriodicWorker>,
    joint_names: Vec<String>,
}

/// 关节状态桥接器
pub struct JointStateBridge {
    registry: DeviceRegistry,
    state: AtomicBridgeState,
    inner: Mutex<Inner>,
    metrics: Arc<CycleMetrics>,
    // 话题序号，跨 attach/detach 持续递增，open 时归零
    seq: Arc<AtomicU64>,
    last_message: Arc<ArcSwapOption<JointState>>,
}

impl Default for JointStateBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl JointStateBridge {
    /// 使用内置设备注册表创建
    pub fn new() -> Self {
        Self::with_registry(DeviceRegistry::with_builtins())
    }

    /// 使用自定义设备注册表创建
    pub fn with_registry(registry: DeviceRegistry) -> Self {
        Self {
            registry,
            state: AtomicBridgeState::new(BridgeState::Closed),
            inner: Mutex::new(Inner::default()),
            metrics: Arc::new(CycleMetrics::new()),
            seq: Arc::new(AtomicU64::new(0)),
            last_message: Arc::new(ArcSwapOption::empty()),
        }
    }

    /// 从配置表打开
    pub fn open(&self, table: &toml::Table) -> Result<(), BridgeError> {
        let mut inner = self.inner.lock();
        if self.state.get().is_open() {
            return Err(LifecycleError::AlreadyOpen.into());
        }
        let config = BridgeConfig::from_table(table)?;
        self.open_locked(&mut inner, config)
    }

    /// 以已构造的配置打开
    pub fn open_with(&self, config: BridgeConfig) -> Result<(), BridgeError> {
        let mut inner = self.inner.lock();
        if self.state.get().is_open() {
            return Err(LifecycleError::AlreadyOpen.into());
        }
        config.validate()?;
        self.open_locked(&mut inner, config)
    }

    fn open_locked(&self, inner: &mut Inner, config: BridgeConfig) -> Result<(), BridgeError> {
        self.state.set(BridgeState::Opening);
        info!(
            "Opening bridge: node '{}', topic '{}', period {}s, stamp {}",
            config.node_name, config.topic_name, config.period, config.stamp_policy
        );

        self.metrics.reset();
        self.seq.store(0, Ordering::Relaxed);
        self.last_message.store(None);

        let session = Session::acquire();
        let node = session.node(config.node_name.as_str());
        let publisher = Arc::new(node.advertise(config.topic_name.as_str(), config.queue_depth));

        if let Some(kind) = config.subdevice.clone() {
            match self.start_owned(&config, &kind, &publisher) {
                Ok((binding, worker)) => {
                    inner.joint_names = binding.lock().metadata().names().to_vec();
                    inner.binding = Some(binding);
                    inner.binding_state = BindingState::Running(Ownership::Owned);
                    inner.worker = Some(worker);
                    self.state.set(BridgeState::Running);
                },
                Err(e) => {
                    error!("Failed to open subdevice '{}': {}", kind, e);
                    self.state.set(BridgeState::Closed);
                    return Err(e);
                },
            }
        } else {
            info!("No subdevice configured, waiting for attach");
            self.state.set(BridgeState::WaitingForAttach);
        }

        inner.node = Some(node);
        inner.publisher = Some(publisher);
        inner.config = Some(config);
        Ok(())
    }

    /// 创建、绑定并启动自有设备；任一步失败时关闭已创建的设备
    fn start_owned(
        &self,
        config: &BridgeConfig,
        kind: &str,
        publisher: &Arc<SessionPublisher>,
    ) -> Result<(Arc<Mutex<DeviceBinding>>, PeriodicWorker), BridgeError> {
        let device = self.registry.create(kind, &config.device_config)?;
        info!("Opened subdevice '{}' ({})", device.name(), kind);

        let result = DeviceBinding::bind(&device, Ownership::Owned)
            .map_err(BridgeError::from)
            .and_then(|binding| {
                let binding = Arc::new(Mutex::new(binding));
                self.state.set(BridgeState::Bound);
                let worker = self.spawn_worker(config, &binding, publisher)?;
                Ok((binding, worker))
            });

        if result.is_err() {
            close_device(&device);
        }
        result
    }

    fn spawn_worker(
        &self,
        config: &BridgeConfig,
        binding: &Arc<Mutex<DeviceBinding>>,
        publisher: &Arc<SessionPublisher>,
    ) -> Result<PeriodicWorker, BridgeError> {
        let cycle = SampleCycle::new(config.stamp_policy, config.frame_id.as_str())
            .with_metrics(Arc::clone(&self.metrics))
            .with_seq(Arc::clone(&self.seq))
            .with_last_message(Arc::clone(&self.last_message));
        let publisher: Arc<dyn Publisher> = publisher.clone();

        let worker = PeriodicWorker::sampling(
            format!("jc-{}", config.topic_name),
            config.period_duration(),
            Arc::clone(binding),
            cycle,
            publisher,
        )?;
        Ok(worker)
    }

    /// 接入外部设备
    ///
    /// 只能在 `WaitingForAttach` 状态下调用；设备不会被桥接器关闭。
    pub fn attach(&self, device: DeviceHandle) -> Result<(), BridgeError> {
        let mut inner = self.inner.lock();
        match self.state.get() {
            BridgeState::WaitingForAttach => {},
            BridgeState::Closed => return Err(LifecycleError::NotOpen.into()),
            _ => return Err(LifecycleError::AlreadyBound.into()),
        }

        if !device.is_valid() {
            warn!("Refusing to attach invalid device '{}'", device.name());
            return Err(LifecycleError::InvalidDevice.into());
        }

        let (Some(config), Some(publisher)) = (inner.config.clone(), inner.publisher.clone())
        else {
            return Err(LifecycleError::NotOpen.into());
        };

        let binding = Arc::new(Mutex::new(DeviceBinding::bind(&device, Ownership::Attached)?));
        self.state.set(BridgeState::Bound);

        match self.spawn_worker(&config, &binding, &publisher) {
            Ok(worker) => {
                inner.joint_names = binding.lock().metadata().names().to_vec();
                inner.binding = Some(binding);
                inner.binding_state = BindingState::Running(Ownership::Attached);
                inner.worker = Some(worker);
                self.state.set(BridgeState::Running);
                info!("Attached device '{}'", device.name());
                Ok(())
            },
            Err(e) => {
                self.state.set(BridgeState::WaitingForAttach);
                Err(e)
            },
        }
    }

    /// 接入设备列表（必须恰好一个）
    pub fn attach_all<I>(&self, devices: I) -> Result<(), BridgeError>
    where
        I: IntoIterator<Item = DeviceHandle>,
    {
        let mut devices: Vec<DeviceHandle> = devices.into_iter().collect();
        match devices.len() {
            0 => Err(LifecycleError::NoDevices.into()),
            1 => match devices.pop() {
                Some(device) => self.attach(device),
                None => Err(LifecycleError::NoDevices.into()),
            },
            n => {
                warn!("attach_all called with {} devices, expected exactly one", n);
                Err(LifecycleError::TooManyDevices.into())
            },
        }
    }

    /// 断开外部设备，回到 `WaitingForAttach`
    ///
    /// 设备不会被关闭。
    pub fn detach(&self) -> Result<(), BridgeError> {
        let mut inner = self.inner.lock();
        if !self.state.get().is_open() {
            return Err(LifecycleError::NotOpen.into());
        }
        match inner.binding_state.ownership() {
            None => return Err(LifecycleError::NotBound.into()),
            Some(Ownership::Owned) => return Err(LifecycleError::CannotDetachOwnedDevice.into()),
            Some(Ownership::Attached) => {},
        }

        self.state.set(BridgeState::Stopping);
        self.stop_worker(&mut inner);
        if let Some((device, _)) = unbind(&mut inner) {
            info!("Detached device '{}'", device.name());
        }
        self.state.set(BridgeState::WaitingForAttach);
        Ok(())
    }

    /// 断开全部外部设备（至多一个）
    pub fn detach_all(&self) -> Result<(), BridgeError> {
        self.detach()
    }

    /// 关闭桥接器
    ///
    /// 停止采样线程、解除绑定、关闭自有设备、释放发布端与会话。
    /// 重复调用直接返回 `Ok`。
    pub fn close(&self) -> Result<(), BridgeError> {
        let mut inner = self.inner.lock();
        if !self.state.get().is_open() {
            return Ok(());
        }

        self.state.set(BridgeState::Stopping);
        self.stop_worker(&mut inner);

        let mut result = Ok(());
        if let Some((device, ownership)) = unbind(&mut inner) {
            if ownership.is_owned() {
                info!("Closing owned device '{}'", device.name());
                if let Err(e) = device.close() {
                    error!("Failed to close device '{}': {}", device.name(), e);
                    result = Err(e.into());
                }
            } else {
                debug!("Releasing attached device '{}'", device.name());
            }
        }

        inner.publisher = None;
        inner.node = None;
        inner.config = None;
        self.state.set(BridgeState::Closed);
        info!("Bridge closed");
        result
    }

    fn stop_worker(&self, inner: &mut Inner) {
        if let Some(mut worker) = inner.worker.take()
            && let Err(e) = worker.stop()
        {
            error!("{}", e);
        }
        if let Some(ownership) = inner.binding_state.ownership() {
            inner.binding_state = BindingState::Bound(ownership);
        }
    }

    /// 当前状态（无锁）
    pub fn state(&self) -> BridgeState {
        self.state.get()
    }

    /// 采样线程是否在运行
    pub fn is_running(&self) -> bool {
        self.state.get() == BridgeState::Running
    }

    /// 当前绑定状态
    pub fn binding_state(&self) -> BindingState {
        self.inner.lock().binding_state
    }

    /// 当前绑定的关节名称（未绑定时为空）
    pub fn joint_names(&self) -> Vec<String> {
        self.inner.lock().joint_names.clone()
    }

    /// 当前配置（未打开时为 `None`）
    pub fn config(&self) -> Option<BridgeConfig> {
        self.inner.lock().config.clone()
    }

    /// 采样指标快照
    pub fn metrics(&self) -> CycleMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 最近一条发布的消息
    pub fn last_message(&self) -> Option<Arc<JointState>> {
        self.last_message.load_full()
    }

    /// 订阅本桥接器发布的话题
    pub fn subscribe(&self) -> Result<Receiver<JointState>, BridgeError> {
        let inner = self.inner.lock();
        match (&inner.node, &inner.config) {
            (Some(node), Some(config)) => Ok(node.session().subscribe(&config.topic_name)),
            _ => Err(LifecycleError::NotOpen.into()),
        }
    }
}

impl Drop for JointStateBridge {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("Error while closing bridge on drop: {}", e);
        }
    }
}

/// 解除绑定（采样线程必须已停止）
fn unbind(inner: &mut Inner) -> Option<(DeviceHandle, Ownership)> {
    inner.binding_state = BindingState::Unbound;
    inner.joint_names.clear();
    let binding = inner.binding.take()?;
    match Arc::try_unwrap(binding) {
        Ok(binding) => Some(binding.into_inner().unbind()),
        Err(shared) => {
            // 采样线程已退出，不应再有其他持有者
            error!(
                "Binding still shared at unbind ({} holders), device handle leaked",
                Arc::strong_count(&shared)
            );
            debug_assert_eq!(Arc::strong_count(&shared), 1, "binding leaked at unbind");
            let guard = shared.lock();
            Some((Arc::clone(guard.device()), guard.ownership()))
        },
    }
}

fn close_device(device: &DeviceHandle) {
    if let Err(e) = device.close() {
        error!("Failed to close device '{}': {}", device.name(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jointcast_hal::FakeMotor;
    use serial_test::serial;

    fn config(extra: &str) -> toml::Table {
        toml::from_str(&format!(
            "period = 0.01\nnode_name = \"unit\"\ntopic_name = \"unit_js\"\n{extra}"
        ))
        .unwrap()
    }

    #[test]
    #[serial]
    fn test_open_without_subdevice_waits() {
        let bridge = JointStateBridge::new();
        bridge.open(&config("")).unwrap();
        assert_eq!(bridge.state(), BridgeState::WaitingForAttach);
        assert_eq!(bridge.binding_state(), BindingState::Unbound);
        assert!(bridge.joint_names().is_empty());

        let err = bridge.open(&config("")).unwrap_err();
        assert_eq!(err.lifecycle(), Some(LifecycleError::AlreadyOpen));

        bridge.close().unwrap();
        assert_eq!(bridge.state(), BridgeState::Closed);
        bridge.close().unwrap();
    }

    #[test]
    #[serial]
    fn test_invalid_config_leaves_closed() {
        let bridge = JointStateBridge::new();
        let table: toml::Table = toml::from_str("period = -1\nnode_name = \"a\"").unwrap();
        assert!(matches!(bridge.open(&table), Err(BridgeError::Config(_))));
        assert_eq!(bridge.state(), BridgeState::Closed);
        assert!(bridge.config().is_none());
    }

    #[test]
    #[serial]
    fn test_attach_requires_open() {
        let bridge = JointStateBridge::new();
        let device: DeviceHandle = Arc::new(FakeMotor::builder().build());
        let err = bridge.attach(device).unwrap_err();
        assert_eq!(err.lifecycle(), Some(LifecycleError::NotOpen));
        assert_eq!(bridge.detach().unwrap_err().lifecycle(), Some(LifecycleError::NotOpen));
    }

    #[test]
    #[serial]
    fn test_detach_releases_device_handle() {
        let bridge = JointStateBridge::new();
        bridge.open(&config("")).unwrap();

        let device: DeviceHandle = Arc::new(FakeMotor::builder().build());
        bridge.attach(Arc::clone(&device)).unwrap();
        assert!(Arc::strong_count(&device) > 1);

        bridge.detach().unwrap();
        assert_eq!(Arc::strong_count(&device), 1);
        assert!(bridge.inner.lock().binding.is_none());
        bridge.close().unwrap();
    }

    #[test]
    #[serial]
    fn test_stop_worker_demotes_running_binding() {
        let bridge = JointStateBridge::new();
        bridge.open(&config("subdevice = \"fake_motor\"")).unwrap();
        assert_eq!(bridge.binding_state(), BindingState::Running(Ownership::Owned));

        bridge.stop_worker(&mut bridge.inner.lock());
        assert_eq!(bridge.binding_state(), BindingState::Bound(Ownership::Owned));
        bridge.close().unwrap();
        assert_eq!(bridge.binding_state(), BindingState::Unbound);
    }
}

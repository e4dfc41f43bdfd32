//! 设备注册表
//!
//! 按设备类型名查找构造函数。桥接器在 `open` 时用配置中的 `subdevice`
//! 键查表，把完整配置表交给构造函数。

use crate::fake_motor::{FAKE_MOTOR_TYPE, FakeMotor};
use crate::{DeviceHandle, HalError};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// 设备构造函数：接收完整配置表，返回共享设备句柄
pub type DeviceConstructor =
    Arc<dyn Fn(&toml::Table) -> Result<DeviceHandle, HalError> + Send + Sync>;

/// 设备注册表
#[derive(Clone)]
pub struct DeviceRegistry {
    constructors: BTreeMap<String, DeviceConstructor>,
}

impl DeviceRegistry {
    /// 空注册表
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// 包含内置设备（`fake_motor`）的注册表
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(FAKE_MOTOR_TYPE, |config| {
            Ok(Arc::new(FakeMotor::from_config(config)?) as DeviceHandle)
        });
        registry
    }

    /// 注册设备类型（同名覆盖）
    pub fn register<F>(&mut self, type_name: impl Into<String>, constructor: F)
    where
        F: Fn(&toml::Table) -> Result<DeviceHandle, HalError> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        debug!("Registering device type '{}'", type_name);
        self.constructors.insert(type_name, Arc::new(constructor));
    }

    /// 是否已注册
    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    /// 已注册的类型名（按字母序）
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// 创建设备
    pub fn create(&self, type_name: &str, config: &toml::Table) -> Result<DeviceHandle, HalError> {
        let constructor = self
            .constructors
            .get(type_name)
            .ok_or_else(|| HalError::UnknownDevice(type_name.to_string()))?;
        constructor(config)
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.constructors.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Capability, Device};

    #[test]
    fn test_builtin_fake_motor() {
        let registry = DeviceRegistry::default();
        assert!(registry.contains("fake_motor"));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["fake_motor"]);

        let device = registry.create("fake_motor", &toml::Table::new()).unwrap();
        assert_eq!(device.name(), "fake_motor");
        assert!(device.capabilities().has(Capability::EncodersTimed));
    }

    #[test]
    fn test_unknown_device() {
        let registry = DeviceRegistry::empty();
        assert!(matches!(
            registry.create("canbus_arm", &toml::Table::new()),
            Err(HalError::UnknownDevice(name)) if name == "canbus_arm"
        ));
    }

    #[test]
    fn test_register_custom_constructor() {
        let mut registry = DeviceRegistry::empty();
        registry.register("bare", |_| {
            Ok(Arc::new(FakeMotor::builder().name("bare").with_torque(false).build()) as DeviceHandle)
        });

        let device = registry.create("bare", &toml::Table::new()).unwrap();
        assert_eq!(device.name(), "bare");
        assert!(!device.capabilities().has(Capability::Torque));
    }

    #[test]
    fn test_constructor_error_propagates() {
        let registry = DeviceRegistry::with_builtins();
        let config: toml::Table = toml::from_str("joints = 1.5").unwrap();
        assert!(matches!(
            registry.create("fake_motor", &config),
            Err(HalError::InvalidParameter { .. })
        ));
    }
}

//! check 命令
//!
//! 校验配置文件并打印解析结果；配置了 subdevice 时创建设备并探测关节信息。

use anyhow::{Context, Result};
use clap::Args;
use jointcast::driver::{DeviceBinding, Ownership};
use jointcast::{BridgeConfig, DeviceRegistry};
use std::path::PathBuf;

/// 配置校验命令参数
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 不创建设备，只校验配置
    #[arg(long)]
    pub no_probe: bool,
}

impl CheckCommand {
    pub fn execute(&self) -> Result<()> {
        let table = super::load_table(&self.config)?;
        let config = BridgeConfig::from_table(&table).context("Invalid configuration")?;

        println!("{}", serde_json::to_string_pretty(&config)?);

        if self.no_probe {
            return Ok(());
        }
        let Some(kind) = config.subdevice.as_deref() else {
            println!("no subdevice configured; the bridge will wait for attach");
            return Ok(());
        };

        let device = DeviceRegistry::with_builtins()
            .create(kind, &config.device_config)
            .with_context(|| format!("Failed to create subdevice '{kind}'"))?;
        let bound = DeviceBinding::bind(&device, Ownership::Owned);
        device.close()?;
        let binding = bound.with_context(|| format!("Failed to bind subdevice '{kind}'"))?;

        println!(
            "subdevice '{}': {} joints, torque {}",
            kind,
            binding.joints(),
            if binding.has_torque() { "yes" } else { "no" }
        );
        for (name, joint_type) in binding.metadata().names().iter().zip(binding.metadata().types()) {
            println!("  {:<16} {}", name, joint_type);
        }
        Ok(())
    }
}

//! run 命令
//!
//! 打开桥接器，订阅话题并打印每条消息，直到 Ctrl+C 或达到指定时长。

use anyhow::{Context, Result, bail};
use clap::Args;
use jointcast::{BridgeConfig, BridgeState, FakeMotor, JointState, JointStateBridge};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// 运行命令参数
#[derive(Args, Debug)]
pub struct RunCommand {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 采样周期（秒，覆盖配置）
    #[arg(short, long)]
    pub period: Option<f64>,

    /// 运行时长（秒），缺省时运行到 Ctrl+C
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// 以 JSON 行输出消息
    #[arg(long)]
    pub json: bool,
}

impl RunCommand {
    pub fn execute(&self) -> Result<()> {
        let mut table = super::load_table(&self.config)?;
        if let Some(period) = self.period {
            table.insert("period".to_string(), toml::Value::Float(period));
        }
        let config = BridgeConfig::from_table(&table).context("Invalid configuration")?;

        let deadline = match self.duration {
            Some(d) if !d.is_finite() || d < 0.0 => bail!("--duration must be a non-negative number"),
            Some(d) => Some(Instant::now() + Duration::from_secs_f64(d)),
            None => None,
        };

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        ctrlc::set_handler(move || {
            flag.store(false, Ordering::SeqCst);
        })
        .context("Failed to install Ctrl+C handler")?;

        let bridge = JointStateBridge::new();
        bridge.open_with(config.clone())?;
        let rx = bridge.subscribe()?;

        if bridge.state() == BridgeState::WaitingForAttach {
            warn!("No subdevice configured, attaching a fake_motor built from the same config");
            let motor = FakeMotor::from_config(&table)?;
            bridge.attach(Arc::new(motor))?;
        }

        info!(
            "Publishing {} joints on '{}' every {}s",
            bridge.joint_names().len(),
            config.topic_name,
            config.period
        );

        while running.load(Ordering::SeqCst) {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(msg) => self.print(&msg)?,
                Err(e) if e.is_timeout() => continue,
                Err(_) => break,
            }
        }

        bridge.close()?;

        let metrics = bridge.metrics();
        eprintln!(
            "cycles: {}, published: {}, read failures: {}, publish failures: {}, overruns: {}",
            metrics.cycles_total,
            metrics.published_total,
            metrics.read_failures(),
            metrics.publish_failures,
            metrics.overruns
        );
        Ok(())
    }

    fn print(&self, msg: &JointState) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(msg)?);
            return Ok(());
        }

        let joints = msg
            .name
            .iter()
            .zip(&msg.position)
            .zip(&msg.velocity)
            .map(|((name, p), v)| format!("{name}={p:+.4}/{v:+.4}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!("#{:<6} {:.6} {}", msg.seq, msg.stamp, joints);
        Ok(())
    }
}

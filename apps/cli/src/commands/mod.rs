//! 命令定义和实现

pub mod check;
pub mod run;

pub use check::CheckCommand;
pub use run::RunCommand;

use anyhow::{Context, Result};
use std::path::Path;

/// 读取配置文件为 TOML 表
pub fn load_table(path: &Path) -> Result<toml::Table> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let table: toml::Table = toml::from_str(&text)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(table)
}

//! 桥接器配置
//!
//! 配置来自一张 TOML 表：
//!
//! ```toml
//! period = 0.02             # 采样周期（秒），默认 0.02
//! node_name = "n1"          # 必需，别名 nodeName / nodeIdentifier
//! topic_name = "c1"         # 必需，别名 topicName / channelIdentifier
//! subdevice = "fake_motor"  # 可选：由桥接器创建并拥有的设备类型，别名 subdeviceSpec
//! frame_id = "base_link"    # 可选，默认为空
//! stamp_policy = "fused"    # "fused"（默认）或 "wall_clock"
//! queue_depth = 10          # 发布端历史深度，默认 10
//!
//! # 其余键原样交给设备构造函数
//! joints = 3
//! ```

use crate::error::ConfigError;
use jointcast_driver::DEFAULT_QUEUE_DEPTH;
use jointcast_protocol::StampPolicy;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// 默认采样周期（秒）
pub const DEFAULT_PERIOD_S: f64 = 0.02;

/// 可用多个键名书写的配置项
struct Param {
    /// 缺失时报告的名称
    name: &'static str,
    /// 可接受的键名
    keys: &'static [&'static str],
}

const NODE_NAME: Param = Param {
    name: "nodeIdentifier",
    keys: &["node_name", "nodeName", "nodeIdentifier"],
};

const TOPIC_NAME: Param = Param {
    name: "channelIdentifier",
    keys: &["topic_name", "topicName", "channelIdentifier"],
};

const SUBDEVICE: Param = Param {
    name: "subdeviceSpec",
    keys: &["subdevice", "subdeviceSpec"],
};

/// 桥接器配置（已校验）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeConfig {
    /// 采样周期（秒）
    pub period: f64,
    /// 由桥接器创建的设备类型
    pub subdevice: Option<String>,
    pub node_name: String,
    pub topic_name: String,
    pub frame_id: String,
    pub stamp_policy: StampPolicy,
    pub queue_depth: usize,
    /// 原始配置表（交给设备构造函数）
    #[serde(skip)]
    pub device_config: toml::Table,
}

impl BridgeConfig {
    /// 以默认值创建
    pub fn new(node_name: impl Into<String>, topic_name: impl Into<String>) -> Self {
        Self {
            period: DEFAULT_PERIOD_S,
            subdevice: None,
            node_name: node_name.into(),
            topic_name: topic_name.into(),
            frame_id: String::new(),
            stamp_policy: StampPolicy::default(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            device_config: toml::Table::new(),
        }
    }

    pub fn with_period(mut self, period: f64) -> Self {
        self.period = period;
        self
    }

    pub fn with_subdevice(mut self, subdevice: impl Into<String>) -> Self {
        self.subdevice = Some(subdevice.into());
        self
    }

    pub fn with_frame_id(mut self, frame_id: impl Into<String>) -> Self {
        self.frame_id = frame_id.into();
        self
    }

    pub fn with_stamp_policy(mut self, policy: StampPolicy) -> Self {
        self.stamp_policy = policy;
        self
    }

    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    pub fn with_device_config(mut self, table: toml::Table) -> Self {
        self.device_config = table;
        self
    }

    /// 从 TOML 表解析并校验
    pub fn from_table(table: &toml::Table) -> Result<Self, ConfigError> {
        let period = match table.get("period") {
            None => DEFAULT_PERIOD_S,
            Some(toml::Value::Float(f)) => *f,
            Some(toml::Value::Integer(i)) => *i as f64,
            Some(_) => return Err(ConfigError::invalid("period", "must be a number")),
        };

        let config = Self {
            period,
            subdevice: lookup_string(table, &SUBDEVICE)?,
            node_name: lookup_string(table, &NODE_NAME)?
                .ok_or(ConfigError::MissingParameter(NODE_NAME.name))?,
            topic_name: lookup_string(table, &TOPIC_NAME)?
                .ok_or(ConfigError::MissingParameter(TOPIC_NAME.name))?,
            frame_id: optional_string(table, "frame_id")?.unwrap_or_default(),
            stamp_policy: match optional_string(table, "stamp_policy")? {
                Some(s) => s
                    .parse()
                    .map_err(|e: jointcast_protocol::ProtocolError| {
                        ConfigError::invalid("stamp_policy", e.to_string())
                    })?,
                None => StampPolicy::default(),
            },
            queue_depth: match table.get("queue_depth") {
                None => DEFAULT_QUEUE_DEPTH,
                Some(toml::Value::Integer(i)) if *i > 0 => *i as usize,
                Some(_) => {
                    return Err(ConfigError::invalid("queue_depth", "must be a positive integer"));
                },
            },
            device_config: table.clone(),
        };

        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文本解析
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(text)?;
        Self::from_table(&table)
    }

    /// 从文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// 校验取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.period.is_finite() || self.period <= 0.0 {
            return Err(ConfigError::invalid(
                "period",
                format!("must be a positive number of seconds, got {}", self.period),
            ));
        }
        if self.node_name.trim().is_empty() {
            return Err(ConfigError::invalid("node_name", "must not be empty"));
        }
        if self.topic_name.trim().is_empty() {
            return Err(ConfigError::invalid("topic_name", "must not be empty"));
        }
        if self.subdevice.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(ConfigError::invalid("subdevice", "must not be empty"));
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::invalid("queue_depth", "must be a positive integer"));
        }
        Ok(())
    }

    /// 采样周期
    pub fn period_duration(&self) -> Duration {
        Duration::from_secs_f64(self.period)
    }
}

fn optional_string(table: &toml::Table, key: &'static str) -> Result<Option<String>, ConfigError> {
    match table.get(key) {
        None => Ok(None),
        Some(toml::Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ConfigError::invalid(key, "must be a string")),
    }
}

/// 按别名查找字符串配置项；多个别名同时出现时取值必须一致
fn lookup_string(table: &toml::Table, param: &Param) -> Result<Option<String>, ConfigError> {
    let mut present = Vec::new();
    for &key in param.keys {
        if let Some(value) = optional_string(table, key)? {
            present.push((key, value));
        }
    }

    let mut present = present.into_iter();
    let Some((first, value)) = present.next() else {
        return Ok(None);
    };
    if let Some((key, other)) = present.find(|(_, other)| *other != value) {
        return Err(ConfigError::invalid(
            key,
            format!("conflicts with '{first}' ({other:?} vs {value:?})"),
        ));
    }
    Ok(Some(value))
}

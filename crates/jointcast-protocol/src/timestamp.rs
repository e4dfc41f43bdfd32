//! # 时间戳处理
//!
//! 每个关节的编码器读数都带有独立的采样时间戳（秒）。发布时需要把 N 个
//! 时间戳融合为一个代表性时间：取算术平均值。
//!
//! | 策略 | 消息时间戳 | 说明 |
//! |------|-----------|------|
//! | `Fused` | 各关节采样时间的平均值 | 反映真实采样时刻（默认） |
//! | `WallClock` | 发布时读取的系统时间 | 反映发布时刻，含调度延迟 |

use crate::ProtocolError;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// 融合各关节采样时间戳：算术平均值
///
/// 空切片返回 `None`。
///
/// ```rust
/// use jointcast_protocol::fuse_timestamps;
///
/// assert_eq!(fuse_timestamps(&[1.0, 2.0, 3.0]), Some(2.0));
/// assert_eq!(fuse_timestamps(&[]), None);
/// ```
pub fn fuse_timestamps(stamps: &[f64]) -> Option<f64> {
    if stamps.is_empty() {
        return None;
    }
    Some(stamps.iter().sum::<f64>() / stamps.len() as f64)
}

/// 当前系统时间（自 UNIX 纪元起的秒数）
pub fn wall_clock_now() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

/// 消息时间戳策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StampPolicy {
    /// 使用融合后的采样时间（默认）
    #[default]
    Fused,
    /// 使用发布时刻的系统时间
    WallClock,
}

impl StampPolicy {
    /// 名称（与配置文件中的写法一致）
    pub fn as_str(self) -> &'static str {
        match self {
            StampPolicy::Fused => "fused",
            StampPolicy::WallClock => "wall_clock",
        }
    }

    /// 按策略选出消息时间戳
    ///
    /// `Fused` 策略在没有融合值时（没有关节，或尚无成功的采样）退化为系统时间。
    pub fn resolve(self, fused: Option<f64>) -> f64 {
        match (self, fused) {
            (StampPolicy::Fused, Some(stamp)) => stamp,
            _ => wall_clock_now(),
        }
    }
}

impl fmt::Display for StampPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StampPolicy {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fused" | "average" => Ok(StampPolicy::Fused),
            "wall_clock" | "wallclock" | "now" => Ok(StampPolicy::WallClock),
            _ => Err(ProtocolError::UnknownStampPolicy(s.to_string())),
        }
    }
}

/// 秒 + 纳秒形式的时间戳（传输层消息头常用格式）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stamp {
    /// 整秒
    pub sec: i32,
    /// 纳秒部分（0..1_000_000_000）
    pub nanosec: u32,
}

impl Stamp {
    /// 由浮点秒构造（负值截断为 0）
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Self::default();
        }
        let whole = secs.floor();
        let mut nanosec = ((secs - whole) * 1e9).round() as u32;
        let mut sec = whole as i64;
        if nanosec >= 1_000_000_000 {
            sec += 1;
            nanosec -= 1_000_000_000;
        }
        Self {
            sec: sec.min(i32::MAX as i64) as i32,
            nanosec,
        }
    }

    /// 转换为浮点秒
    pub fn as_secs_f64(self) -> f64 {
        self.sec as f64 + self.nanosec as f64 * 1e-9
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuse_mean() {
        assert_eq!(fuse_timestamps(&[10.0]), Some(10.0));
        assert_eq!(fuse_timestamps(&[1.0, 2.0, 3.0, 4.0]), Some(2.5));
        assert_eq!(fuse_timestamps(&[]), None);
    }

    #[test]
    fn test_stamp_policy_parse() {
        assert_eq!("fused".parse::<StampPolicy>().unwrap(), StampPolicy::Fused);
        assert_eq!("wall_clock".parse::<StampPolicy>().unwrap(), StampPolicy::WallClock);
        assert!("gps".parse::<StampPolicy>().is_err());
        assert_eq!(StampPolicy::default(), StampPolicy::Fused);
    }

    #[test]
    fn test_stamp_policy_resolve() {
        assert_eq!(StampPolicy::Fused.resolve(Some(42.5)), 42.5);

        let before = wall_clock_now();
        let stamp = StampPolicy::WallClock.resolve(Some(42.5));
        assert!(stamp >= before);

        // 无融合值时退化为系统时间
        assert!(StampPolicy::Fused.resolve(None) >= before);
    }

    #[test]
    fn test_stamp_split() {
        let stamp = Stamp::from_secs_f64(12.25);
        assert_eq!(stamp.sec, 12);
        assert_eq!(stamp.nanosec, 250_000_000);
        assert!((stamp.as_secs_f64() - 12.25).abs() < 1e-9);

        assert_eq!(Stamp::from_secs_f64(-1.0), Stamp::default());
        assert_eq!(Stamp::from_secs_f64(f64::NAN), Stamp::default());
    }
}

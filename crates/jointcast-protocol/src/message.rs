//! 对外发布的关节状态消息

use crate::timestamp::Stamp;

/// 关节状态消息
///
/// 每个采样周期新建一条，交给发布通道后采样端不再持有。
///
/// # 不变量
///
/// - `name`、`position`、`velocity` 的长度均为关节数 N
/// - `effort` 长度为 N，或在设备不支持力矩读取时为空
/// - `position` / `velocity` 中旋转关节的值单位为弧度
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JointState {
    /// 单调递增的消息序号（从 0 开始）
    pub seq: u64,
    /// 时间戳（秒）
    pub stamp: f64,
    /// 坐标系 ID（可为空）
    pub frame_id: String,
    /// 关节名称
    pub name: Vec<String>,
    /// 关节位置（旋转关节：rad）
    pub position: Vec<f64>,
    /// 关节速度（旋转关节：rad/s）
    pub velocity: Vec<f64>,
    /// 关节力矩（N·m），设备无力矩能力时为空
    pub effort: Vec<f64>,
}

impl JointState {
    /// 关节数
    #[inline]
    pub fn len(&self) -> usize {
        self.name.len()
    }

    /// 是否不含任何关节
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    /// 是否携带力矩数据
    #[inline]
    pub fn has_effort(&self) -> bool {
        !self.effort.is_empty()
    }

    /// 秒 + 纳秒形式的时间戳
    pub fn header_stamp(&self) -> Stamp {
        Stamp::from_secs_f64(self.stamp)
    }

    /// 检查各数组长度是否与关节数一致
    pub fn is_consistent(&self) -> bool {
        let n = self.name.len();
        self.position.len() == n
            && self.velocity.len() == n
            && (self.effort.is_empty() || self.effort.len() == n)
    }
}

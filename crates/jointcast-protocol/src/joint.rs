//! 关节类型与关节元数据

use crate::ProtocolError;
use std::fmt;
use std::str::FromStr;

/// 关节运动学类型
///
/// 决定发布前是否需要进行单位换算：
/// - `Revolute`: 旋转关节，硬件单位为度，发布时转换为弧度
/// - `Prismatic`: 平移关节，原样透传
/// - `Unknown`: 未知类型，原样透传
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum JointType {
    /// 旋转关节
    Revolute,
    /// 平移关节
    Prismatic,
    /// 未知类型
    #[default]
    Unknown,
}

impl JointType {
    /// 是否为旋转关节
    #[inline]
    pub fn is_revolute(self) -> bool {
        self == Self::Revolute
    }

    /// 名称（小写，与配置文件中的写法一致）
    pub fn as_str(self) -> &'static str {
        match self {
            JointType::Revolute => "revolute",
            JointType::Prismatic => "prismatic",
            JointType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for JointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JointType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "revolute" => Ok(JointType::Revolute),
            "prismatic" => Ok(JointType::Prismatic),
            "unknown" => Ok(JointType::Unknown),
            _ => Err(ProtocolError::UnknownJointType(s.to_string())),
        }
    }
}

/// 关节元数据
///
/// 绑定设备时一次性解析，重新绑定前保持不变。
/// `names` 与 `types` 的长度始终相同（即关节数 N）。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JointMetadata {
    names: Vec<String>,
    types: Vec<JointType>,
}

impl JointMetadata {
    /// 由名称和类型构造
    ///
    /// 返回 `None` 表示两者长度不一致。
    pub fn new(names: Vec<String>, types: Vec<JointType>) -> Option<Self> {
        if names.len() != types.len() {
            return None;
        }
        Some(Self { names, types })
    }

    /// 关节数
    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// 是否为空（未绑定）
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// 关节名称（有序）
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// 关节类型（与名称一一对应）
    pub fn types(&self) -> &[JointType] {
        &self.types
    }

    /// 按索引获取 `(名称, 类型)`
    pub fn joint(&self, index: usize) -> Option<(&str, JointType)> {
        Some((self.names.get(index)?.as_str(), *self.types.get(index)?))
    }

    /// 旋转关节数量
    pub fn revolute_count(&self) -> usize {
        self.types.iter().filter(|t| t.is_revolute()).count()
    }
}

impl FromIterator<(String, JointType)> for JointMetadata {
    fn from_iter<I: IntoIterator<Item = (String, JointType)>>(iter: I) -> Self {
        let (names, types) = iter.into_iter().unzip();
        Self { names, types }
    }
}

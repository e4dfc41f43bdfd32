//! 单位换算
//!
//! 硬件层（编码器）以度报告旋转关节的位置和速度，发布层使用弧度。
//! 使用 NewType 防止在中间代码里把两种单位混用。
//!
//! # 示例
//!
//! ```rust
//! use jointcast_protocol::units::{Deg, Rad};
//!
//! let angle = Deg(180.0).to_rad();
//! assert!((angle.0 - std::f64::consts::PI).abs() < 1e-12);
//! assert!((Rad(std::f64::consts::FRAC_PI_2).to_deg().0 - 90.0).abs() < 1e-12);
//! ```

use crate::joint::JointType;
use std::f64::consts::PI;
use std::fmt;
use std::ops::{Add, Neg, Sub};

/// 度 → 弧度：`degrees / 180 * π`
#[inline]
pub fn deg_to_rad(degrees: f64) -> f64 {
    degrees / 180.0 * PI
}

/// 弧度 → 度：`radians * 180 / π`
#[inline]
pub fn rad_to_deg(radians: f64) -> f64 {
    radians * 180.0 / PI
}

/// 按关节类型换算单个数值
///
/// 仅旋转关节进行 度 → 弧度 换算，其余类型原样返回。
#[inline]
pub fn convert_for_joint(joint_type: JointType, value: f64) -> f64 {
    if joint_type.is_revolute() {
        deg_to_rad(value)
    } else {
        value
    }
}

/// 原地换算一组关节数值
///
/// `types` 与 `values` 按索引对应；多出来的值（长度不一致时）保持不变。
pub fn convert_in_place(types: &[JointType], values: &mut [f64]) {
    for (value, joint_type) in values.iter_mut().zip(types) {
        *value = convert_for_joint(*joint_type, *value);
    }
}

/// 弧度（NewType）
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rad(pub f64);

impl Rad {
    /// 零弧度
    pub const ZERO: Self = Rad(0.0);

    /// 转换为度
    #[inline]
    pub fn to_deg(self) -> Deg {
        Deg(rad_to_deg(self.0))
    }

    /// 原始值
    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Rad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4} rad", self.0)
    }
}

impl Add for Rad {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Rad(self.0 + rhs.0)
    }
}

impl Sub for Rad {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Rad(self.0 - rhs.0)
    }
}

impl Neg for Rad {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Rad(-self.0)
    }
}

/// 度（NewType）
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Deg(pub f64);

impl Deg {
    /// 零度
    pub const ZERO: Self = Deg(0.0);

    /// 转换为弧度
    #[inline]
    pub fn to_rad(self) -> Rad {
        Rad(deg_to_rad(self.0))
    }

    /// 原始值
    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Deg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}°", self.0)
    }
}

impl Add for Deg {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Deg(self.0 + rhs.0)
    }
}

impl Sub for Deg {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Deg(self.0 - rhs.0)
    }
}

impl Neg for Deg {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Deg(-self.0)
    }
}

impl From<Deg> for Rad {
    fn from(deg: Deg) -> Self {
        deg.to_rad()
    }
}

impl From<Rad> for Deg {
    fn from(rad: Rad) -> Self {
        rad.to_deg()
    }
}

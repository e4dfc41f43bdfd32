//! 单位换算与时间戳融合的属性测试
//!
//! 使用 proptest 验证数学属性。

use jointcast_protocol::units::convert_in_place;
use jointcast_protocol::{Deg, JointType, Rad, convert_for_joint, deg_to_rad, fuse_timestamps, rad_to_deg};
use proptest::prelude::*;

proptest! {
    /// 度 → 弧度 → 度 往返换算
    #[test]
    fn deg_rad_roundtrip(deg in -3600.0..3600.0f64) {
        let back = rad_to_deg(deg_to_rad(deg));
        prop_assert!((back - deg).abs() < 1e-9);
    }

    /// NewType 往返换算
    #[test]
    fn newtype_roundtrip(rad in -100.0..100.0f64) {
        let r = Rad(rad);
        let r2 = r.to_deg().to_rad();
        prop_assert!((r.0 - r2.0).abs() < 1e-10);
    }

    /// 非旋转关节原样透传
    #[test]
    fn non_revolute_passthrough(value in -1e6..1e6f64) {
        prop_assert_eq!(convert_for_joint(JointType::Prismatic, value), value);
        prop_assert_eq!(convert_for_joint(JointType::Unknown, value), value);
    }

    /// 旋转关节换算与 NewType 换算一致
    #[test]
    fn revolute_matches_newtype(deg in -720.0..720.0f64) {
        let converted = convert_for_joint(JointType::Revolute, deg);
        prop_assert!((converted - Deg(deg).to_rad().0).abs() < 1e-12);
    }

    /// 原地换算后逐个逆换算可还原（仅旋转关节被修改）
    #[test]
    fn in_place_inverse(values in proptest::collection::vec(-360.0..360.0f64, 1..12)) {
        let types: Vec<JointType> = (0..values.len())
            .map(|i| if i % 2 == 0 { JointType::Revolute } else { JointType::Prismatic })
            .collect();
        let mut converted = values.clone();
        convert_in_place(&types, &mut converted);

        for ((orig, conv), t) in values.iter().zip(&converted).zip(&types) {
            let restored = if t.is_revolute() { rad_to_deg(*conv) } else { *conv };
            prop_assert!((restored - orig).abs() < 1e-9);
        }
    }

    /// 融合时间戳位于最小值与最大值之间
    #[test]
    fn fused_within_bounds(stamps in proptest::collection::vec(0.0..1e9f64, 1..32)) {
        let fused = fuse_timestamps(&stamps).unwrap();
        let min = stamps.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = stamps.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(fused >= min - 1e-6 && fused <= max + 1e-6);
    }

    /// 相同时间戳融合后不变
    #[test]
    fn fused_identity(stamp in 0.0..1e9f64, n in 1usize..16) {
        let stamps = vec![stamp; n];
        let fused = fuse_timestamps(&stamps).unwrap();
        prop_assert!((fused - stamp).abs() <= stamp.abs() * 1e-12 + 1e-9);
    }
}

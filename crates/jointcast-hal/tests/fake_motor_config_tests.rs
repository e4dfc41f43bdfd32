//! 通过注册表和配置表构造 fake_motor

use jointcast_hal::{Capability, DeviceRegistry, HalError, JointType};

fn table(text: &str) -> toml::Table {
    toml::from_str(text).unwrap()
}

#[test]
fn test_bridge_style_config_is_accepted() {
    // 桥接器会把完整配置表交给设备构造函数，未知键应被忽略
    let config = table(
        r#"
        period = 0.02
        node_name = "n1"
        topic_name = "c1"
        subdevice = "fake_motor"
        "#,
    );

    let device = DeviceRegistry::default().create("fake_motor", &config).unwrap();
    let caps = device.capabilities();
    assert!(caps.missing_required().is_empty());
    assert_eq!(caps.position_control().unwrap().axes().unwrap(), 3);
    assert!(caps.has(Capability::Torque));
}

#[test]
fn test_mixed_joint_types_from_config() {
    let config = table(
        r#"
        joints = 3
        joint_types = ["revolute", "prismatic"]
        positions = [90.0, 0.1]
        "#,
    );

    let device = DeviceRegistry::default().create("fake_motor", &config).unwrap();
    let caps = device.capabilities();
    let info = caps.axis_info().unwrap();
    assert_eq!(info.joint_type(0).unwrap(), JointType::Revolute);
    assert_eq!(info.joint_type(1).unwrap(), JointType::Prismatic);
    // 未配置的关节默认旋转
    assert_eq!(info.joint_type(2).unwrap(), JointType::Revolute);

    let mut positions = [0.0; 3];
    let mut stamps = [0.0; 3];
    caps.encoders_timed()
        .unwrap()
        .encoders_timed(&mut positions, &mut stamps)
        .unwrap();
    assert!(positions[0] >= 90.0);
    assert!(stamps.iter().all(|s| *s > 0.0));
}

#[test]
fn test_close_is_observable_through_handle() {
    let device = DeviceRegistry::default()
        .create("fake_motor", &toml::Table::new())
        .unwrap();
    assert!(device.is_valid());
    device.close().unwrap();
    assert!(!device.is_valid());

    let mut speeds = [0.0; 3];
    let result = device
        .capabilities()
        .encoders_timed()
        .unwrap()
        .encoder_speeds(&mut speeds);
    assert!(matches!(result, Err(HalError::Closed)));
}

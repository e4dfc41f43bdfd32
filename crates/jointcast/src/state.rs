//! 桥接器生命周期状态
//!
//! ```text
//!            open(subdevice)            start
//! Closed ──▶ Opening ──▶ Bound ──────────────▶ Running
//!              │                                 │  ▲
//!              │ open(无 subdevice)       detach  │  │ attach
//!              ▼                                 ▼  │
//!        WaitingForAttach ◀────────────────── Stopping
//!                                                │
//!                                          close │
//!                                                ▼
//!                                              Closed
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// 生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum BridgeState {
    #[default]
    Closed = 0,
    Opening = 1,
    /// 已绑定设备，采样线程尚未启动
    Bound = 2,
    /// 已打开，等待外部设备接入
    WaitingForAttach = 3,
    Running = 4,
    Stopping = 5,
}

impl BridgeState {
    /// 从 u8 转换，无效值视为 Closed
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Opening,
            2 => Self::Bound,
            3 => Self::WaitingForAttach,
            4 => Self::Running,
            5 => Self::Stopping,
            _ => Self::Closed,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Bound => "bound",
            Self::WaitingForAttach => "waiting_for_attach",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }

    /// 是否处于打开状态（非 Closed）
    pub fn is_open(self) -> bool {
        self != Self::Closed
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 生命周期状态（原子版本，无锁读取）
#[derive(Debug, Default)]
pub struct AtomicBridgeState {
    inner: AtomicU8,
}

impl AtomicBridgeState {
    pub fn new(state: BridgeState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    pub fn get(&self) -> BridgeState {
        BridgeState::from_u8(self.inner.load(Ordering::Acquire))
    }

    pub fn set(&self, state: BridgeState) {
        self.inner.store(state.as_u8(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u8_roundtrip() {
        for state in [
            BridgeState::Closed,
            BridgeState::Opening,
            BridgeState::Bound,
            BridgeState::WaitingForAttach,
            BridgeState::Running,
            BridgeState::Stopping,
        ] {
            assert_eq!(BridgeState::from_u8(state.as_u8()), state);
        }
        assert_eq!(BridgeState::from_u8(42), BridgeState::Closed);
    }

    #[test]
    fn test_atomic_state() {
        let state = AtomicBridgeState::default();
        assert_eq!(state.get(), BridgeState::Closed);
        assert!(!state.get().is_open());

        state.set(BridgeState::WaitingForAttach);
        assert_eq!(state.get(), BridgeState::WaitingForAttach);
        assert_eq!(state.get().to_string(), "waiting_for_attach");
    }
}

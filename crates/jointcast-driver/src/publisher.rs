//! 发布通道
//!
//! 采样周期把组装好的消息交给 [`Publisher`]，发送是否成功不影响采样。

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use jointcast_protocol::JointState;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// 发布错误
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    /// 接收端已全部断开
    #[error("Publish channel closed")]
    ChannelClosed,

    /// 接收端队列已满，消息被丢弃
    #[error("Publish channel full, message dropped")]
    ChannelFull,
}

/// 消息发布端
pub trait Publisher: Send + Sync {
    /// 话题名
    fn topic(&self) -> &str;

    /// 发布一条消息（不阻塞）
    fn publish(&self, message: JointState) -> Result<(), PublishError>;
}

/// 基于有界 crossbeam 通道的发布端
///
/// 接收端处理不过来时丢弃新消息，而不是阻塞采样线程。
///
/// ```rust
/// use jointcast_driver::{ChannelPublisher, Publisher};
/// use jointcast_protocol::JointState;
///
/// let (publisher, rx) = ChannelPublisher::bounded("joint_states", 4);
/// publisher.publish(JointState::default()).unwrap();
/// assert_eq!(rx.try_recv().unwrap().seq, 0);
/// ```
pub struct ChannelPublisher {
    topic: String,
    tx: Sender<JointState>,
    dropped: AtomicU64,
}

impl ChannelPublisher {
    /// 创建发布端与对应的接收端
    pub fn bounded(topic: impl Into<String>, depth: usize) -> (Self, Receiver<JointState>) {
        let (tx, rx) = bounded(depth.max(1));
        let publisher = Self {
            topic: topic.into(),
            tx,
            dropped: AtomicU64::new(0),
        };
        (publisher, rx)
    }

    /// 因队列已满被丢弃的消息数
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Publisher for ChannelPublisher {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn publish(&self, message: JointState) -> Result<(), PublishError> {
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(PublishError::ChannelFull)
            },
            Err(TrySendError::Disconnected(_)) => Err(PublishError::ChannelClosed),
        }
    }
}

//! 进程内共享会话
//!
//! 整个进程共用一个 [`Session`]：第一次 [`Session::acquire`] 时创建，
//! 最后一个句柄（包括节点和发布端持有的句柄）释放时关闭。
//!
//! ```text
//! Session ──node("n1")──▶ Node ──advertise("c1", 10)──▶ SessionPublisher
//!    └──subscribe("c1")──▶ Receiver<JointState>
//! ```
//!
//! 订阅端各自拥有一条有界队列；队列满时该订阅端的这条消息被丢弃，发布端从不阻塞。
//! 只有所有订阅端都没收到时，发布才算失败。

use crate::publisher::{PublishError, Publisher};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use jointcast_protocol::JointState;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace};

/// 默认队列深度（发布端历史深度 / 订阅端队列容量）
pub const DEFAULT_QUEUE_DEPTH: usize = 10;

static SESSION: Mutex<Weak<Session>> = Mutex::new(Weak::new());
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// 一次投递的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Delivery {
    delivered: usize,
    dropped: usize,
}

struct Topic {
    depth: usize,
    publishers: usize,
    subscribers: Vec<Sender<JointState>>,
}

impl Topic {
    fn new(depth: usize) -> Self {
        Self {
            depth,
            publishers: 0,
            subscribers: Vec::new(),
        }
    }
}

/// 进程内共享会话
pub struct Session {
    id: u64,
    nodes: Mutex<BTreeMap<String, usize>>,
    topics: Mutex<HashMap<String, Topic>>,
}

impl Session {
    /// 获取共享会话（不存在时创建）
    pub fn acquire() -> Arc<Session> {
        let mut slot = SESSION.lock();
        if let Some(session) = slot.upgrade() {
            return session;
        }

        let session = Arc::new(Session {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            nodes: Mutex::new(BTreeMap::new()),
            topics: Mutex::new(HashMap::new()),
        });
        *slot = Arc::downgrade(&session);
        info!("Session {} started", session.id);
        session
    }

    /// 共享会话当前是否存在
    pub fn is_active() -> bool {
        SESSION.lock().strong_count() > 0
    }

    /// 会话 ID（每次重新创建递增）
    pub fn id(&self) -> u64 {
        self.id
    }

    /// 创建节点
    pub fn node(self: &Arc<Self>, name: impl Into<String>) -> Node {
        let name = name.into();
        *self.nodes.lock().entry(name.clone()).or_insert(0) += 1;
        debug!("Session {}: node '{}' created", self.id, name);
        Node {
            session: Arc::clone(self),
            name,
        }
    }

    /// 当前存在的节点名
    pub fn nodes(&self) -> Vec<String> {
        self.nodes.lock().keys().cloned().collect()
    }

    /// 当前存在的话题名（按字母序）
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.topics.lock().keys().cloned().collect();
        topics.sort();
        topics
    }

    /// 话题的发布端数量
    pub fn publisher_count(&self, topic: &str) -> usize {
        self.topics.lock().get(topic).map_or(0, |t| t.publishers)
    }

    /// 话题的订阅端数量
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.lock().get(topic).map_or(0, |t| t.subscribers.len())
    }

    /// 订阅话题，队列容量取话题的历史深度
    pub fn subscribe(&self, topic: &str) -> Receiver<JointState> {
        self.subscribe_inner(topic, None)
    }

    /// 以指定队列容量订阅话题
    pub fn subscribe_with_depth(&self, topic: &str, depth: usize) -> Receiver<JointState> {
        self.subscribe_inner(topic, Some(depth))
    }

    fn subscribe_inner(&self, topic: &str, depth: Option<usize>) -> Receiver<JointState> {
        let mut topics = self.topics.lock();
        let entry = topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(DEFAULT_QUEUE_DEPTH));
        let (tx, rx) = bounded(depth.unwrap_or(entry.depth).max(1));
        entry.subscribers.push(tx);
        debug!("Session {}: new subscriber on '{}'", self.id, topic);
        rx
    }

    fn register_publisher(&self, topic: &str, depth: usize) {
        let mut topics = self.topics.lock();
        let entry = topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(depth));
        entry.depth = depth;
        entry.publishers += 1;
    }

    fn release_publisher(&self, topic: &str) {
        let mut topics = self.topics.lock();
        if let Some(entry) = topics.get_mut(topic) {
            entry.publishers = entry.publishers.saturating_sub(1);
            if entry.publishers == 0 && entry.subscribers.is_empty() {
                topics.remove(topic);
            }
        }
    }

    fn release_node(&self, name: &str) {
        let mut nodes = self.nodes.lock();
        if let Some(count) = nodes.get_mut(name) {
            *count -= 1;
            if *count == 0 {
                nodes.remove(name);
            }
        }
    }

    /// 投递到话题的全部订阅端
    ///
    /// 断开的订阅端被移除；队列已满的订阅端记为丢弃。
    fn deliver(&self, topic: &str, message: JointState) -> Delivery {
        let mut topics = self.topics.lock();
        let Some(entry) = topics.get_mut(topic) else {
            return Delivery::default();
        };

        let mut delivery = Delivery::default();
        entry.subscribers.retain(|tx| match tx.try_send(message.clone()) {
            Ok(()) => {
                delivery.delivered += 1;
                true
            },
            Err(TrySendError::Full(_)) => {
                delivery.dropped += 1;
                true
            },
            Err(TrySendError::Disconnected(_)) => false,
        });
        trace!(
            "Session {}: '{}' seq {} -> {} delivered, {} dropped",
            self.id,
            topic,
            message.seq,
            delivery.delivered,
            delivery.dropped
        );
        delivery
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        info!("Session {} shut down", self.id);
    }
}

/// 会话中的节点
pub struct Node {
    session: Arc<Session>,
    name: String,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// 声明话题并创建发布端
    pub fn advertise(&self, topic: impl Into<String>, depth: usize) -> SessionPublisher {
        let topic = topic.into();
        let depth = depth.max(1);
        self.session.register_publisher(&topic, depth);
        info!(
            "Node '{}' advertising '{}' (depth {})",
            self.name, topic, depth
        );
        SessionPublisher {
            session: Arc::clone(&self.session),
            node: self.name.clone(),
            topic,
            dropped: AtomicU64::new(0),
        }
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.session.release_node(&self.name);
        debug!("Session {}: node '{}' dropped", self.session.id, self.name);
    }
}

/// 会话话题上的发布端
pub struct SessionPublisher {
    session: Arc<Session>,
    node: String,
    topic: String,
    dropped: AtomicU64,
}

impl SessionPublisher {
    /// 所属节点名
    pub fn node(&self) -> &str {
        &self.node
    }

    /// 因订阅端队列已满被丢弃的消息份数（按订阅端计）
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Publisher for SessionPublisher {
    fn topic(&self) -> &str {
        &self.topic
    }

    /// 至少一个订阅端收到（或没有订阅端）即成功；所有订阅端队列都满时返回 `ChannelFull`
    fn publish(&self, message: JointState) -> Result<(), PublishError> {
        let delivery = self.session.deliver(&self.topic, message);
        if delivery.dropped > 0 {
            self.dropped.fetch_add(delivery.dropped as u64, Ordering::Relaxed);
        }
        if delivery.delivered == 0 && delivery.dropped > 0 {
            return Err(PublishError::ChannelFull);
        }
        Ok(())
    }
}

impl Drop for SessionPublisher {
    fn drop(&mut self) {
        self.session.release_publisher(&self.topic);
    }
}

//! 周期调度线程
//!
//! 单个专用线程按固定周期执行任务：
//!
//! - 第 k 次任务计划在 `start + k · period` 开始
//! - 任务超时后，下一次任务在其结束后立即开始（记为 overrun），任务从不并发执行
//! - 等待阶段通过停止通道的 `recv_timeout` 睡眠，最后 2ms 用 `spin_sleep` 补齐精度
//! - [`PeriodicWorker::stop`] 是同步的：返回时正在执行的任务已经结束

use crate::binding::DeviceBinding;
use crate::cycle::SampleCycle;
use crate::error::DriverError;
use crate::publisher::Publisher;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace};

/// 小于该值的剩余等待时间用 spin_sleep 完成
const SPIN_THRESHOLD: Duration = Duration::from_millis(2);

/// 单次调度信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// 任务序号（从 0 开始）
    pub index: u64,
    /// 本次任务是否因上一次超时而推迟
    pub overrun: bool,
}

/// 周期调度线程
pub struct PeriodicWorker {
    name: String,
    period: Duration,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    ticks: Arc<AtomicU64>,
}

impl PeriodicWorker {
    /// 启动调度线程
    ///
    /// 第一次任务在线程启动后立即执行。
    pub fn spawn<F>(name: impl Into<String>, period: Duration, mut task: F) -> Result<Self, DriverError>
    where
        F: FnMut(Tick) + Send + 'static,
    {
        let name = name.into();
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ticks = Arc::new(AtomicU64::new(0));
        let thread_ticks = Arc::clone(&ticks);
        let thread_name = name.clone();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                raise_priority(&thread_name);
                run_loop(&stop_rx, period, &thread_ticks, &mut task);
                debug!("Worker '{}' exited", thread_name);
            })
            .map_err(|source| DriverError::WorkerSpawn {
                name: name.clone(),
                source,
            })?;

        info!("Worker '{}' started (period {:?})", name, period);

        Ok(Self {
            name,
            period,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
            ticks,
        })
    }

    /// 启动采样线程：每个周期锁住绑定，执行一次采样并发布
    pub fn sampling(
        name: impl Into<String>,
        period: Duration,
        binding: Arc<Mutex<DeviceBinding>>,
        mut cycle: SampleCycle,
        publisher: Arc<dyn Publisher>,
    ) -> Result<Self, DriverError> {
        Self::spawn(name, period, move |tick| {
            if tick.overrun {
                cycle.metrics().overruns.fetch_add(1, Ordering::Relaxed);
            }
            let mut binding = binding.lock();
            // 发布失败已在周期内计数并记录
            let _ = cycle.run(&mut binding, publisher.as_ref());
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// 已执行的任务次数
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// 线程是否仍在运行
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 停止线程并等待其退出
    ///
    /// 可重复调用，第二次起直接返回。
    pub fn stop(&mut self) -> Result<(), DriverError> {
        // 关闭通道即发出停止信号
        self.stop_tx.take();

        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        if handle.join().is_err() {
            error!("Worker '{}' panicked", self.name);
            return Err(DriverError::WorkerPanicked(self.name.clone()));
        }
        info!("Worker '{}' stopped after {} ticks", self.name, self.ticks());
        Ok(())
    }
}

impl Drop for PeriodicWorker {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl std::fmt::Debug for PeriodicWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicWorker")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("running", &self.is_running())
            .finish()
    }
}

fn run_loop<F>(stop_rx: &Receiver<()>, period: Duration, ticks: &AtomicU64, task: &mut F)
where
    F: FnMut(Tick),
{
    let mut next = Instant::now();
    let mut index = 0u64;
    let mut overrun = false;

    loop {
        if wait_until(stop_rx, next) {
            break;
        }

        task(Tick { index, overrun });
        ticks.fetch_add(1, Ordering::Relaxed);
        index += 1;

        next += period;
        let now = Instant::now();
        overrun = now > next;
        if overrun {
            trace!("Tick {} overran by {:?}", index - 1, now - next);
            next = now;
        }
    }
}

/// 等待到 `deadline`，返回 true 表示收到停止信号
fn wait_until(stop_rx: &Receiver<()>, deadline: Instant) -> bool {
    loop {
        let now = Instant::now();
        if now >= deadline {
            return !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty));
        }

        let remaining = deadline - now;
        if remaining > SPIN_THRESHOLD {
            match stop_rx.recv_timeout(remaining - SPIN_THRESHOLD) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return true,
            }
        }

        spin_sleep::sleep(remaining);
    }
}

#[cfg(feature = "realtime")]
fn raise_priority(name: &str) {
    use thread_priority::*;
    use tracing::warn;

    match set_current_thread_priority(ThreadPriority::Max) {
        Ok(_) => info!("Worker '{}' priority set to MAX (realtime)", name),
        Err(e) => warn!(
            "Failed to set worker '{}' priority: {}. \
            On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
            name, e
        ),
    }
}

#[cfg(not(feature = "realtime"))]
fn raise_priority(_name: &str) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_ticks_at_fixed_period() {
        let count = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&count);
        let period = Duration::from_millis(5);
        let started = Instant::now();
        let mut worker = PeriodicWorker::spawn("test-tick", period, move |_| {
            c.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();

        thread::sleep(Duration::from_millis(100));
        worker.stop().unwrap();
        let elapsed = started.elapsed();

        let n = count.load(Ordering::Relaxed);
        let max = (elapsed.as_secs_f64() / period.as_secs_f64()).floor() as u64 + 1;
        assert!(n >= 5, "expected at least 5 ticks, got {n}");
        assert!(n <= max, "expected at most {max} ticks, got {n}");
        assert_eq!(worker.ticks(), n);
        assert!(!worker.is_running());
    }

    #[test]
    fn test_stop_waits_for_in_flight_task() {
        let in_task = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicU64::new(0));
        let (flag, done) = (Arc::clone(&in_task), Arc::clone(&finished));

        let mut worker = PeriodicWorker::spawn("test-inflight", Duration::from_millis(1), move |_| {
            flag.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            done.fetch_add(1, Ordering::SeqCst);
            flag.store(false, Ordering::SeqCst);
        })
        .unwrap();

        while !in_task.load(Ordering::SeqCst) {
            thread::yield_now();
        }
        worker.stop().unwrap();

        assert!(!in_task.load(Ordering::SeqCst));
        let after_stop = finished.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(finished.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_overrun_is_flagged() {
        let overruns = Arc::new(AtomicU64::new(0));
        let o = Arc::clone(&overruns);
        let mut worker = PeriodicWorker::spawn("test-overrun", Duration::from_millis(2), move |tick| {
            if tick.overrun {
                o.fetch_add(1, Ordering::Relaxed);
            }
            thread::sleep(Duration::from_millis(5));
        })
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        worker.stop().unwrap();
        assert!(overruns.load(Ordering::Relaxed) >= 1);
    }

    #[test]
    fn test_stop_is_idempotent_and_drop_stops() {
        let mut worker = PeriodicWorker::spawn("test-idem", Duration::from_millis(10), |_| {}).unwrap();
        worker.stop().unwrap();
        worker.stop().unwrap();

        let count = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&count);
        let worker = PeriodicWorker::spawn("test-drop", Duration::from_millis(1), move |_| {
            c.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
        thread::sleep(Duration::from_millis(10));
        drop(worker);

        let after_drop = count.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(count.load(Ordering::Relaxed), after_drop);
    }

    #[test]
    fn test_panicking_task_reported() {
        let mut worker = PeriodicWorker::spawn("test-panic", Duration::from_millis(1), |_| {
            panic!("boom");
        })
        .unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(matches!(worker.stop(), Err(DriverError::WorkerPanicked(name)) if name == "test-panic"));
    }
}

//! 进度事件总线
//!
//! 每个订阅者一个无界 mpsc 通道，事件按发送顺序到达。
//! 订阅句柄 drop 时自动取消订阅（包括流程出错提前返回的情况）。

use crate::models::InstallationProgress;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

#[derive(Default)]
struct BusInner {
    subscribers: Mutex<HashMap<u64, UnboundedSender<InstallationProgress>>>,
    next_id: AtomicU64,
}

impl BusInner {
    fn remove(&self, id: u64) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

#[derive(Clone, Default)]
pub struct ProgressBus {
    inner: Arc<BusInner>,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> ProgressSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);

        tracing::trace!(id, "新增进度订阅");
        ProgressSubscription {
            receiver: rx,
            guard: Unsubscribe {
                id,
                bus: Arc::downgrade(&self.inner),
            },
        }
    }

    /// 在独立任务中把事件交给 handler
    ///
    /// 需要在 tokio 运行时内调用。
    pub fn subscribe_with<F>(&self, mut handler: F) -> ProgressListener
    where
        F: FnMut(InstallationProgress) + Send + 'static,
    {
        let ProgressSubscription {
            mut receiver,
            guard,
        } = self.subscribe();

        let task = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                handler(event);
            }
        });

        ProgressListener {
            guard: Some(guard),
            task: Some(task),
        }
    }

    pub fn emit(&self, event: InstallationProgress) {
        tracing::debug!(
            stage = ?event.stage,
            progress = event.progress_percentage,
            message = %event.message,
            "进度"
        );
        let mut subscribers = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // 接收端已关闭的订阅者顺便移除
        subscribers.retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

struct Unsubscribe {
    id: u64,
    bus: Weak<BusInner>,
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
            tracing::trace!(id = self.id, "取消进度订阅");
        }
    }
}

/// 订阅句柄，drop 即取消订阅
pub struct ProgressSubscription {
    receiver: UnboundedReceiver<InstallationProgress>,
    guard: Unsubscribe,
}

impl ProgressSubscription {
    pub async fn recv(&mut self) -> Option<InstallationProgress> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<InstallationProgress> {
        self.receiver.try_recv().ok()
    }

    /// 取出已经到达的全部事件
    pub fn drain(&mut self) -> Vec<InstallationProgress> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    pub fn id(&self) -> u64 {
        self.guard.id
    }
}

/// `subscribe_with` 返回的监听器，drop 即取消订阅
pub struct ProgressListener {
    guard: Option<Unsubscribe>,
    task: Option<JoinHandle<()>>,
}

impl ProgressListener {
    /// 取消订阅并等待已到达的事件处理完
    pub async fn finish(mut self) {
        drop(self.guard.take());
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "进度处理任务异常退出");
            }
        }
    }
}

impl Drop for ProgressListener {
    fn drop(&mut self) {
        // 取消订阅后通道关闭，任务处理完剩余事件自行退出
        drop(self.guard.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InstallationStage;

    fn event(stage: InstallationStage) -> InstallationProgress {
        InstallationProgress::new(stage, stage.description())
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let bus = ProgressBus::new();
        let mut sub = bus.subscribe();

        bus.emit(event(InstallationStage::Initializing));
        bus.emit(event(InstallationStage::SelectingDirectory));
        bus.emit(event(InstallationStage::CreatingStructure));

        let stages: Vec<_> = sub.drain().into_iter().map(|e| e.stage).collect();
        assert_eq!(
            stages,
            vec![
                InstallationStage::Initializing,
                InstallationStage::SelectingDirectory,
                InstallationStage::CreatingStructure
            ]
        );
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let bus = ProgressBus::new();
        let first = bus.subscribe();
        let second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
        assert_ne!(first.id(), second.id());

        drop(first);
        assert_eq!(bus.subscriber_count(), 1);
        drop(second);
        assert_eq!(bus.subscriber_count(), 0);

        // 没有订阅者时发送不会出错
        bus.emit(event(InstallationStage::Complete));
    }

    #[tokio::test]
    async fn test_subscribe_with_handler_on_other_task() {
        let bus = ProgressBus::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let listener = bus.subscribe_with(move |e| sink.lock().unwrap().push(e.stage));

        bus.emit(event(InstallationStage::Installing));
        bus.emit(event(InstallationStage::Finalizing));
        listener.finish().await;

        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(
            *received.lock().unwrap(),
            vec![InstallationStage::Installing, InstallationStage::Finalizing]
        );
    }

    #[tokio::test]
    async fn test_unsubscribe_when_operation_fails() {
        let bus = ProgressBus::new();

        fn failing_operation(bus: &ProgressBus) -> Result<(), String> {
            let _sub = bus.subscribe();
            bus.emit(event(InstallationStage::Error));
            Err("失败".to_string())
        }

        assert!(failing_operation(&bus).is_err());
        assert_eq!(bus.subscriber_count(), 0);
    }
}

//! 事件（Event）
//!
//! 一个事件持有一张订阅表，支持三种消费方式：
//! - 回调订阅：`subscribe` / `subscribe_once` / `unsubscribe`；
//! - 单次拉取：`pull` 返回下一次派发参数的 Future；
//! - 异步迭代：`stream` 返回可关闭的事件流。
//!
//! 派发语义：
//! - 按插入顺序逐个调用监听器，等待前一个完成后再调用下一个；
//! - `once` 监听器在调用之前即从订阅表移除，其自身触发的嵌套派发不会再次调用它；
//! - 每次派发只覆盖开始时已订阅的监听器，派发期间新增的订阅（包括 `pull` / `stream`）从下一次派发生效；
//! - 监听器失败（返回 `Err` 或 panic）只记录日志，继续后续监听器，且不向调用方传播；
//! - 多个派发可同时进行（包括监听器内部的重入派发），彼此独立，不做串行化。
//!
//! 注意：监听器若捕获 `Event` 的克隆，会经订阅表形成 `Arc` 循环，事件永远不会释放，
//! 依赖释放的行为（`pull` 返回 `Closed`、`stream` 自然结束）也就不会发生。
//! 需要在监听器里访问所属事件时，捕获 `Event::downgrade` 得到的 `WeakEvent`。
//!
use crate::config::EventConfig;
use crate::error::EventError;
use crate::listener::{Listener, ListenerId, ListenerOutput};
use crate::pull::Pull;
use crate::registry::SubscriptionTable;
use crate::stream::EventStream;
use futures_util::FutureExt;
use std::any::Any;
use std::borrow::Borrow;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// 一次派发的结果汇总
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// 被调用的监听器数量（含失败）
    pub invoked: usize,
    /// 失败的监听器数量
    pub failed: usize,
}

pub(crate) struct EventCore<T> {
    table: Mutex<SubscriptionTable<T>>,
    config: EventConfig,
}

impl<T> EventCore<T> {
    fn table(&self) -> MutexGuard<'_, SubscriptionTable<T>> {
        // 订阅表的锁从不跨越监听器调用，中毒时直接取回内部数据
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        self.table().remove(id)
    }

    fn watermark(&self) -> u64 {
        self.table().watermark()
    }

    fn take_next(&self, after: Option<u64>, upper: u64) -> Option<(u64, Listener<T>)> {
        self.table().take_next(after, upper)
    }
}

/// 可订阅的事件，克隆得到指向同一订阅表的句柄
pub struct Event<T> {
    core: Arc<EventCore<T>>,
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<T> Default for Event<T> {
    fn default() -> Self {
        Self::with_config(EventConfig::default())
    }
}

impl<T> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.core.config.label())
            .field("listeners", &self.core.table().len())
            .finish()
    }
}

impl<T> Event<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EventConfig) -> Self {
        Self {
            core: Arc::new(EventCore {
                table: Mutex::new(SubscriptionTable::default()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &EventConfig {
        &self.core.config
    }

    /// 订阅（重复订阅会把 `once` 重置为 false）
    pub fn subscribe<I>(&self, listeners: I) -> &Self
    where
        I: IntoIterator,
        I::Item: Borrow<Listener<T>>,
    {
        self.insert_all(listeners, false)
    }

    /// 单次订阅：首次被派发前即自动移除
    pub fn subscribe_once<I>(&self, listeners: I) -> &Self
    where
        I: IntoIterator,
        I::Item: Borrow<Listener<T>>,
    {
        self.insert_all(listeners, true)
    }

    /// 取消订阅，未订阅的监听器忽略
    pub fn unsubscribe<I>(&self, listeners: I) -> &Self
    where
        I: IntoIterator,
        I::Item: Borrow<Listener<T>>,
    {
        let mut table = self.core.table();
        for listener in listeners {
            let listener = listener.borrow();
            if table.remove(listener.id()) {
                tracing::debug!(
                    event = %self.core.config.label(),
                    listener = %listener,
                    "unsubscribed"
                );
            }
        }
        drop(table);
        self
    }

    fn insert_all<I>(&self, listeners: I, once: bool) -> &Self
    where
        I: IntoIterator,
        I::Item: Borrow<Listener<T>>,
    {
        let mut table = self.core.table();
        for listener in listeners {
            let listener = listener.borrow();
            let added = table.insert(listener, once);
            tracing::debug!(
                event = %self.core.config.label(),
                listener = %listener,
                once,
                added,
                "subscribed"
            );
        }
        drop(table);
        self
    }

    pub fn contains(&self, listener: &Listener<T>) -> bool {
        self.core.table().contains(listener.id())
    }

    /// 返回监听器的 `once` 标记；未订阅时为 `None`
    pub fn is_once(&self, listener: &Listener<T>) -> Option<bool> {
        self.core.table().is_once(listener.id())
    }

    pub fn listener_count(&self) -> usize {
        self.core.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listener_count() == 0
    }

    /// 移除全部监听器（包括 `pull` 与 `stream` 的内部监听器）
    pub fn clear(&self) {
        self.core.table().clear();
    }

    /// 获取不持有事件的弱句柄，供监听器回指所属事件
    pub fn downgrade(&self) -> WeakEvent<T> {
        WeakEvent {
            core: Arc::downgrade(&self.core),
        }
    }

    pub(crate) fn downgrade_core(&self) -> Weak<EventCore<T>> {
        Arc::downgrade(&self.core)
    }
}

/// 事件的弱句柄，不阻止事件释放
pub struct WeakEvent<T> {
    core: Weak<EventCore<T>>,
}

impl<T> WeakEvent<T> {
    /// 事件仍存活时返回强句柄
    pub fn upgrade(&self) -> Option<Event<T>> {
        self.core.upgrade().map(|core| Event { core })
    }
}

impl<T> Clone for WeakEvent<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<T> fmt::Debug for WeakEvent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakEvent")
            .field("alive", &(self.core.strong_count() > 0))
            .finish()
    }
}

impl<T> Event<T>
where
    T: Clone + Send + 'static,
{
    /// 以异步闭包订阅，返回监听器句柄以便之后取消
    ///
    /// 闭包需要访问本事件时请捕获 `downgrade()` 的弱句柄，捕获 `Event` 克隆会使事件无法释放。
    pub fn listen<F, Fut>(&self, f: F) -> Listener<T>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: ListenerOutput,
    {
        let listener = Listener::new(f);
        self.subscribe([&listener]);
        listener
    }

    /// 以异步闭包单次订阅
    pub fn listen_once<F, Fut>(&self, f: F) -> Listener<T>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: ListenerOutput,
    {
        let listener = Listener::new(f);
        self.subscribe_once([&listener]);
        listener
    }

    /// 派发事件：按插入顺序逐个调用并等待监听器完成
    pub async fn dispatch(&self, args: T) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        // 只覆盖派发开始前已订阅的监听器，派发期间新增（含 once 监听器自行重新订阅）的留给下一次
        let upper = self.core.watermark();
        let mut cursor = None;

        while let Some((seq, listener)) = self.core.take_next(cursor, upper) {
            cursor = Some(seq);
            summary.invoked += 1;

            if let Err(err) = self.invoke(&listener, args.clone()).await {
                summary.failed += 1;
                tracing::error!(
                    event = %self.core.config.label(),
                    listener = %listener,
                    error = %err,
                    "listener failed during dispatch"
                );
            }
        }

        tracing::trace!(
            event = %self.core.config.label(),
            invoked = summary.invoked,
            failed = summary.failed,
            "dispatched"
        );
        summary
    }

    async fn invoke(&self, listener: &Listener<T>, args: T) -> Result<(), EventError> {
        let result = if self.core.config.catch_panics {
            match panic::catch_unwind(AssertUnwindSafe(|| listener.call(args))) {
                Ok(fut) => AssertUnwindSafe(fut)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| Err(panicked(payload))),
                Err(payload) => Err(panicked(payload)),
            }
        } else {
            listener.call(args).await
        };

        result.map_err(|source| EventError::listener_failure(listener.to_string(), source))
    }

    /// 拉取下一次派发的参数
    pub fn pull(&self) -> Pull<T> {
        Pull::new(self)
    }

    /// 获取异步迭代句柄，每次推进产出后续一次派发的参数
    pub fn stream(&self) -> EventStream<T> {
        EventStream::new(self)
    }
}

fn panicked(payload: Box<dyn Any + Send>) -> anyhow::Error {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    };
    anyhow::anyhow!("listener panicked: {message}")
}

//! 事件流（EventStream）
//!
//! 基于 `tokio::sync::mpsc` 无界队列的异步迭代句柄：
//! - 内部监听器把每次派发的参数写入队列，派发方永不因消费方缓慢而阻塞，也不丢失事件；
//! - 推进（`StreamExt::next`）在队列为空时挂起，直到下一次派发或句柄关闭；
//! - `close` 幂等，撤销内部监听器并丢弃已缓冲的参数，之后推进返回 `None`；
//! - 句柄被丢弃时自动关闭；事件的全部句柄被释放后流自然结束。
//!
use crate::event::{Event, EventCore};
use crate::listener::{Listener, ListenerId};
use futures_core::Stream;
use futures_core::stream::FusedStream;
use std::fmt;
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// 可关闭的事件流
#[must_use = "streams do nothing unless polled"]
pub struct EventStream<T> {
    rx: mpsc::UnboundedReceiver<T>,
    listener: ListenerId,
    event: Weak<EventCore<T>>,
    closed: bool,
}

impl<T> EventStream<T>
where
    T: Send + 'static,
{
    pub(crate) fn new(event: &Event<T>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = Listener::from_fn(move |args: T| {
            // 句柄已关闭时发送失败，忽略即可
            let _ = tx.send(args);
        })
        .with_name("stream");

        event.subscribe([&listener]);

        Self {
            rx,
            listener: listener.id(),
            event: event.downgrade_core(),
            closed: false,
        }
    }
}

impl<T> EventStream<T> {
    /// 关闭句柄：撤销内部监听器并释放缓冲
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(core) = self.event.upgrade() {
            core.remove(self.listener);
        }
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
        tracing::trace!(listener = %self.listener, "event stream closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// 当前已缓冲、尚未被消费的参数数量
    pub fn pending_len(&self) -> usize {
        self.rx.len()
    }
}

impl<T> Stream for EventStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        if this.closed {
            return Poll::Ready(None);
        }

        match this.rx.poll_recv(cx) {
            Poll::Ready(None) => {
                this.closed = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl<T> FusedStream for EventStream<T> {
    fn is_terminated(&self) -> bool {
        self.closed
    }
}

impl<T> Drop for EventStream<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> fmt::Debug for EventStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("listener", &self.listener)
            .field("closed", &self.closed)
            .finish()
    }
}

//! 单次拉取（Pull）
//!
//! `Event::pull` 以单次订阅注册一个内部监听器，返回的 Future 在下一次派发时
//! 以该次派发的参数完成，且只完成一次。
//!
//! 未完成即被丢弃时会撤销内部监听器；事件的全部句柄被释放后返回 `EventError::Closed`。
//!
use crate::error::{EventError, EventResult};
use crate::event::{Event, EventCore};
use crate::listener::{Listener, ListenerId};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError, Weak};
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// 下一次派发参数的 Future
#[must_use = "futures do nothing unless polled"]
pub struct Pull<T> {
    rx: oneshot::Receiver<T>,
    // 只保存身份：发送端由订阅表中的监听器独占，事件释放时随之关闭
    listener: ListenerId,
    event: Weak<EventCore<T>>,
    done: bool,
}

impl<T> Pull<T>
where
    T: Send + 'static,
{
    pub(crate) fn new(event: &Event<T>) -> Self {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let listener = Listener::from_fn(move |args: T| {
            let sender = tx.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(sender) = sender {
                // 接收端已丢弃时忽略
                let _ = sender.send(args);
            }
        })
        .with_name("pull");

        event.subscribe_once([&listener]);

        Self {
            rx,
            listener: listener.id(),
            event: event.downgrade_core(),
            done: false,
        }
    }
}

impl<T> Future for Pull<T> {
    type Output = EventResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(result) => {
                this.done = true;
                Poll::Ready(
                    result.map_err(|_| EventError::closed("event dropped before next dispatch")),
                )
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for Pull<T> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Some(core) = self.event.upgrade() {
            core.remove(self.listener);
        }
    }
}

impl<T> fmt::Debug for Pull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pull")
            .field("listener", &self.listener)
            .field("done", &self.done)
            .finish()
    }
}

//! 监听器（Listener）
//!
//! 监听器是一个接收事件参数 `T` 的函数值，可以同步返回，也可以返回 Future：
//! - `Listener::new`：异步闭包；
//! - `Listener::from_fn`：同步闭包；
//! - `Listener::from_handler`：实现了 `EventListener` 的结构体处理器。
//!
//! 监听器的身份由构造时分配的 `ListenerId` 决定，克隆共享同一身份，
//! 因此同一个句柄可以在 `subscribe` 之后通过 `unsubscribe` 移除。
//!
use async_trait::async_trait;
use futures_core::future::BoxFuture;
use futures_util::FutureExt;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// 监听器返回的 Future
pub type ListenerFuture = BoxFuture<'static, anyhow::Result<()>>;

type ListenerFn<T> = dyn Fn(T) -> ListenerFuture + Send + Sync;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// 监听器身份标识（进程内唯一）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// 监听器返回值：`()` 视为成功，`Result<(), E>` 按结果处理
pub trait ListenerOutput {
    fn into_result(self) -> anyhow::Result<()>;
}

impl ListenerOutput for () {
    fn into_result(self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<E> ListenerOutput for Result<(), E>
where
    E: Into<anyhow::Error>,
{
    fn into_result(self) -> anyhow::Result<()> {
        self.map_err(Into::into)
    }
}

/// 结构体形式的事件处理器
#[async_trait]
pub trait EventListener<T>: Send + Sync
where
    T: Send + 'static,
{
    /// 处理器名称（用于日志）
    fn listener_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// 处理一次派发
    async fn on_event(&self, args: T) -> anyhow::Result<()>;
}

/// 可订阅的监听器句柄
pub struct Listener<T> {
    id: ListenerId,
    name: Option<Arc<str>>,
    f: Arc<ListenerFn<T>>,
}

impl<T> Listener<T>
where
    T: Send + 'static,
{
    /// 由异步闭包创建
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: ListenerOutput,
    {
        Self::from_boxed(Arc::new(move |args: T| -> ListenerFuture {
            let fut = f(args);
            async move { fut.await.into_result() }.boxed()
        }))
    }

    /// 由同步闭包创建
    pub fn from_fn<F, O>(f: F) -> Self
    where
        F: Fn(T) -> O + Send + Sync + 'static,
        O: ListenerOutput,
    {
        Self::from_boxed(Arc::new(move |args: T| -> ListenerFuture {
            let result = f(args).into_result();
            futures_util::future::ready(result).boxed()
        }))
    }

    /// 由 `EventListener` 处理器创建，名称取自 `listener_name`
    pub fn from_handler<H>(handler: Arc<H>) -> Self
    where
        H: EventListener<T> + 'static,
    {
        let name = handler.listener_name().to_string();
        Self::from_boxed(Arc::new(move |args: T| -> ListenerFuture {
            let handler = handler.clone();
            async move { handler.on_event(args).await }.boxed()
        }))
        .with_name(name)
    }

    fn from_boxed(f: Arc<ListenerFn<T>>) -> Self {
        Self {
            id: ListenerId::next(),
            name: None,
            f,
        }
    }
}

impl<T> Listener<T> {
    /// 附加日志名称（保持原身份）
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(Arc::from(name.into()));
        self
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn call(&self, args: T) -> ListenerFuture {
        (self.f)(args)
    }
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            f: self.f.clone(),
        }
    }
}

impl<T> PartialEq for Listener<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Listener<T> {}

impl<T> Hash for Listener<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

impl<T> fmt::Display for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}({})", self.id),
            None => fmt::Display::fmt(&self.id, f),
        }
    }
}

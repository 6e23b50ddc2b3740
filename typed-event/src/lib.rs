//! 类型化事件（typed-event）
//!
//! 提供一个进程内、泛型化的发布/订阅原语 `Event<T>`：
//! - `T` 是派发参数的类型（通常为元组），在事件创建时固定；
//! - 监听器（`listener`）按插入顺序串行调用，失败只记录日志不中断派发；
//! - 三种消费方式：回调订阅、单次拉取（`pull`）、异步迭代（`stream`）。
//!
//! 本 crate 不安装日志订阅者，失败通过 `tracing` 记录，由宿主决定输出方式。
//!
//! 典型用法：
//! 1. 创建 `Event<T>`，需要日志标注时通过 `EventConfig` 命名；
//! 2. 构造 `Listener` 并 `subscribe` / `subscribe_once`，或直接 `listen`；
//! 3. `dispatch(args).await` 派发；
//! 4. 需要等待时使用 `pull().await`，持续消费时使用 `stream()`。
//!
pub mod config;
pub mod error;
pub mod event;
pub mod listener;
pub mod pull;
pub mod stream;

mod registry;

pub use config::EventConfig;
pub use error::{EventError, EventResult};
pub use event::{DispatchSummary, Event, WeakEvent};
pub use listener::{EventListener, Listener, ListenerFuture, ListenerId, ListenerOutput};
pub use pull::Pull;
pub use stream::EventStream;

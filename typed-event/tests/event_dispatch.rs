use anyhow::Result as AnyResult;
use futures_util::StreamExt;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use typed_event::{DispatchSummary, Event, EventConfig, EventListener, Listener};

type Calls = Arc<Mutex<Vec<(&'static str, (i32, i32))>>>;

fn tracked(calls: &Calls, tag: &'static str) -> Listener<(i32, i32)> {
    let calls = calls.clone();
    Listener::new(move |args: (i32, i32)| {
        let calls = calls.clone();
        async move {
            tokio::task::yield_now().await;
            calls.lock().unwrap().push((tag, args));
        }
    })
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn listeners_run_in_subscription_order() {
    let calls = Calls::default();
    let (a, b, c) = (
        tracked(&calls, "A"),
        tracked(&calls, "B"),
        tracked(&calls, "C"),
    );
    let event = Event::<(i32, i32)>::new();
    event.subscribe([&a, &b, &c]);

    event.dispatch((1, 2)).await;

    assert_eq!(
        *calls.lock().unwrap(),
        vec![("A", (1, 2)), ("B", (1, 2)), ("C", (1, 2))]
    );
}

#[tokio::test]
async fn each_dispatch_reaches_persistent_listener() {
    let calls = Calls::default();
    let a = tracked(&calls, "A");
    let event = Event::<(i32, i32)>::new();
    event.subscribe([&a]);

    for n in 0..4 {
        event.dispatch((n, -n)).await;
    }

    let seen: Vec<_> = calls.lock().unwrap().iter().map(|(_, args)| *args).collect();
    assert_eq!(seen, vec![(0, 0), (1, -1), (2, -2), (3, -3)]);
}

#[tokio::test]
async fn once_listener_fires_on_first_dispatch_only() {
    let calls = Calls::default();
    let a = tracked(&calls, "A");
    let event = Event::<(i32, i32)>::new();
    event.subscribe_once([&a]);

    event.dispatch((7, 0)).await;
    event.dispatch((8, 0)).await;

    assert_eq!(*calls.lock().unwrap(), vec![("A", (7, 0))]);
    assert!(!event.contains(&a));
}

#[tokio::test]
async fn unsubscribed_listener_is_never_invoked() {
    let calls = Calls::default();
    let (a, b) = (tracked(&calls, "A"), tracked(&calls, "B"));
    let event = Event::<(i32, i32)>::new();
    event.subscribe([&a, &b]).unsubscribe([&a]);

    event.dispatch((1, 1)).await;
    event.dispatch((2, 2)).await;

    assert_eq!(
        *calls.lock().unwrap(),
        vec![("B", (1, 1)), ("B", (2, 2))]
    );
}

#[tokio::test]
async fn failing_listener_is_logged_and_later_listeners_still_run() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer({
            let logs = logs.clone();
            move || logs.clone()
        })
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let calls = Calls::default();
    let event = Event::<(i32, i32)>::with_config(EventConfig::builder().name("orders").build());
    let broken = Listener::new(|_: (i32, i32)| async {
        Err::<(), _>(anyhow::anyhow!("payment gateway unreachable"))
    })
    .with_name("broken");
    let after = tracked(&calls, "after");
    event.subscribe([&broken, &after]);

    let summary = event.dispatch((3, 4)).await;

    assert_eq!(summary, DispatchSummary { invoked: 2, failed: 1 });
    assert_eq!(*calls.lock().unwrap(), vec![("after", (3, 4))]);

    let text = logs.contents();
    assert!(text.contains("listener failed during dispatch"));
    assert!(text.contains("payment gateway unreachable"));
    assert!(text.contains("orders"));
    assert!(text.contains("broken"));
}

#[tokio::test]
async fn pull_resolves_once_with_next_dispatch() -> AnyResult<()> {
    let event = Event::<(i32, i32)>::new();
    event.dispatch((0, 0)).await;

    let next = event.pull();
    event.dispatch((5, 6)).await;
    event.dispatch((7, 8)).await;

    assert_eq!(next.await?, (5, 6));
    Ok(())
}

#[tokio::test]
async fn stream_yields_until_closed() {
    let event = Event::<(i32,)>::new();
    let mut stream = event.stream();

    event.dispatch((7,)).await;
    assert_eq!(stream.next().await, Some((7,)));

    stream.close();
    event.dispatch((8,)).await;
    assert_eq!(stream.next().await, None);
    assert!(event.is_empty());
}

#[tokio::test]
async fn stream_and_callbacks_share_dispatch_order() {
    let calls = Calls::default();
    let event = Event::<(i32, i32)>::new();
    let mut stream = event.stream();
    event.subscribe([tracked(&calls, "A")]);

    event.dispatch((1, 0)).await;
    event.dispatch((2, 0)).await;

    assert_eq!(stream.next().await, Some((1, 0)));
    assert_eq!(stream.next().await, Some((2, 0)));
    assert_eq!(calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn reentrant_dispatch_does_not_retrigger_once_listener() {
    let event = Event::<u32>::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let nested = {
        let weak = event.downgrade();
        let hits = hits.clone();
        Listener::new(move |depth: u32| {
            let weak = weak.clone();
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                if depth < 3 {
                    if let Some(event) = weak.upgrade() {
                        event.dispatch(depth + 1).await;
                    }
                }
            }
        })
    };
    event.subscribe_once([&nested]);

    let summary = event.dispatch(0).await;

    assert_eq!(summary.invoked, 1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(event.is_empty());
}

#[tokio::test]
async fn reentrant_dispatch_reaches_persistent_listeners() {
    let event = Event::<u32>::new();
    let depths = Arc::new(Mutex::new(Vec::new()));

    let recurse = {
        let weak = event.downgrade();
        let depths = depths.clone();
        Listener::new(move |depth: u32| {
            let weak = weak.clone();
            let depths = depths.clone();
            async move {
                depths.lock().unwrap().push(depth);
                if depth < 2 {
                    if let Some(event) = weak.upgrade() {
                        event.dispatch(depth + 1).await;
                    }
                }
            }
        })
    };
    event.subscribe([&recurse]);

    event.dispatch(0).await;
    // 内层派发先于外层派发结束
    assert_eq!(*depths.lock().unwrap(), vec![0, 1, 2]);
    assert!(event.contains(&recurse));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_dispatches_deliver_every_value() {
    let event = Event::<usize>::new();
    let total = Arc::new(AtomicUsize::new(0));
    let count = Arc::new(AtomicUsize::new(0));
    {
        let total = total.clone();
        let count = count.clone();
        event.listen(move |n| {
            let total = total.clone();
            let count = count.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                total.fetch_add(n, Ordering::SeqCst);
                count.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    let tasks: Vec<_> = (1..=20)
        .map(|n| {
            let event = event.clone();
            tokio::spawn(async move { event.dispatch(n).await })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().invoked, 1);
    }

    assert_eq!(count.load(Ordering::SeqCst), 20);
    assert_eq!(total.load(Ordering::SeqCst), (1..=20).sum::<usize>());
}

struct Auditor {
    seen: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl EventListener<(String, u64)> for Auditor {
    fn listener_name(&self) -> &str {
        "auditor"
    }

    async fn on_event(&self, args: (String, u64)) -> anyhow::Result<()> {
        let (user, amount) = args;
        anyhow::ensure!(amount > 0, "empty transfer from {user}");
        self.seen.lock().unwrap().push(format!("{user}:{amount}"));
        Ok(())
    }
}

#[tokio::test]
async fn struct_handlers_can_subscribe() {
    let auditor = Arc::new(Auditor {
        seen: Mutex::new(Vec::new()),
    });
    let listener = Listener::from_handler(auditor.clone());
    let event = Event::<(String, u64)>::new();
    event.subscribe([&listener]);

    let ok = event.dispatch(("alice".into(), 10)).await;
    let failed = event.dispatch(("bob".into(), 0)).await;

    assert_eq!(ok, DispatchSummary { invoked: 1, failed: 0 });
    assert_eq!(failed, DispatchSummary { invoked: 1, failed: 1 });
    assert_eq!(*auditor.seen.lock().unwrap(), vec!["alice:10".to_string()]);
    assert!(event.contains(&listener));
}

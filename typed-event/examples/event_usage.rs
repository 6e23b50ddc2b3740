/// 类型化事件示例
/// 展示回调订阅、单次订阅、失败隔离、pull 与 stream 三种消费方式
use anyhow::Result as AnyResult;
use futures_util::StreamExt;
use std::time::Duration;
use typed_event::{Event, EventConfig, Listener};

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let orders: Event<(String, u32)> =
        Event::with_config(EventConfig::builder().name("orders").build());

    // ============================================================================
    // 回调订阅
    // ============================================================================

    let printer = Listener::from_fn(|(sku, qty): (String, u32)| {
        println!("[printer] {sku} x{qty}");
    });
    let welcome = Listener::from_fn(|(sku, _): (String, u32)| {
        println!("[welcome] first order: {sku}");
    });
    let flaky = Listener::new(|(_, qty): (String, u32)| async move {
        anyhow::ensure!(qty < 100, "quantity {qty} exceeds stock");
        Ok::<(), anyhow::Error>(())
    })
    .with_name("stock-check");

    orders
        .subscribe([&printer, &flaky])
        .subscribe_once([&welcome]);

    orders.dispatch(("apple".into(), 3)).await;
    // flaky 失败只记录日志，printer 仍会收到
    let summary = orders.dispatch(("pear".into(), 500)).await;
    println!("second dispatch: {summary:?}");

    orders.unsubscribe([&flaky]);

    // ============================================================================
    // pull：等待下一次派发
    // ============================================================================

    let next = orders.pull();
    let producer = {
        let orders = orders.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            orders.dispatch(("plum".into(), 1)).await;
        })
    };
    let (sku, qty) = next.await?;
    println!("[pull] {sku} x{qty}");
    producer.await?;

    // ============================================================================
    // stream：持续消费，关闭后不再产出
    // ============================================================================

    let mut stream = orders.stream();
    for qty in 1..=3 {
        orders.dispatch(("kiwi".into(), qty)).await;
    }
    while let Some((sku, qty)) = stream.next().await {
        println!("[stream] {sku} x{qty}");
        if qty == 3 {
            stream.close();
        }
    }

    orders.dispatch(("fig".into(), 1)).await;
    println!("listeners left: {}", orders.listener_count());
    Ok(())
}

//! Log lines raised while a log line is being forwarded
//!
//! Needs the process-wide subscriber, so this file holds a single test.

use std::sync::Arc;
use std::time::Duration;

use ws_console::queue::message_cost;
use ws_console::{Console, HubConfig, LoopbackTransport};

#[tokio::test]
async fn overflow_warning_is_not_forwarded_recursively() {
    let max = 128;
    let config = HubConfig::default()
        .max_message_size(max)
        .outbound_capacity(message_cost(max))
        .send_timeout(Duration::from_secs(30));

    let transport = Arc::new(LoopbackTransport::new());
    let mut console = Console::new(config);
    let hub = console.hub();
    let forwarder = ws_console::log::init(hub.clone(), console.config()).unwrap();

    console.start(Arc::clone(&transport)).await.unwrap();
    let _client = transport.connect().await.unwrap();

    // Park the drain task inside a send, then fill the outbound queue
    transport.pause_sends();
    hub.broadcast("held by the transport").unwrap();
    while transport.send_calls() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    hub.broadcast(vec![b'x'; max]).unwrap();

    let before = forwarder.stats();
    for i in 0..10 {
        tracing::warn!(tick = i, "console tick");
    }
    let after = forwarder.stats();

    // Each tick is refused by the full queue; the queue's own warning about
    // it reaches the forwarder while it is still forwarding the tick.
    assert_eq!(after.dropped - before.dropped, 10);
    assert_eq!(after.reentrant - before.reentrant, 10);
    assert_eq!(after.forwarded, before.forwarded);
    assert_eq!(console.stats().await.outbound.dropped, 10);

    transport.resume_sends();
    console.stop().await;
}

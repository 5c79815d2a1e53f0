//! Log forwarding from many threads at once

use std::sync::Arc;
use std::thread;

use ws_console::log::Forward;
use ws_console::{Console, HubConfig, LogForwarder, LoopbackTransport};

const THREADS: usize = 4;
const LINES_PER_THREAD: usize = 250;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_lines_are_never_treated_as_nested() {
    // Large enough that the reader below never misses a line
    let transport = Arc::new(LoopbackTransport::with_peer_buffer(THREADS * LINES_PER_THREAD));
    let mut console = Console::new(HubConfig::default());
    console.start(Arc::clone(&transport)).await.unwrap();
    let mut client = transport.connect().await.unwrap();

    let forwarder = LogForwarder::new(console.hub(), console.config());

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let forwarder = forwarder.clone();
            thread::spawn(move || {
                let mut forwarded: u64 = 0;
                for i in 0..LINES_PER_THREAD {
                    let line = format!("INFO worker{}: line {}", t, i);
                    match forwarder.forward(&line) {
                        Forward::Forwarded => forwarded += 1,
                        Forward::Dropped(e) => assert!(e.is_capacity(), "unexpected {}", e),
                        other => panic!("unexpected outcome {:?}", other),
                    }
                }
                forwarded
            })
        })
        .collect();

    let forwarded: u64 = workers.into_iter().map(|w| w.join().unwrap()).sum();

    let stats = forwarder.stats();
    assert_eq!(stats.reentrant, 0);
    assert_eq!(stats.filtered, 0);
    assert_eq!(stats.forwarded, forwarded);
    assert_eq!(stats.total(), (THREADS * LINES_PER_THREAD) as u64);

    // Lines from one thread arrive in the order that thread produced them
    let mut last = [None::<usize>; THREADS];
    let mut received = 0;
    while received < forwarded {
        let message = client.recv().await.unwrap();
        let text = String::from_utf8(message.to_vec()).unwrap();
        let rest = text.trim_start_matches("INFO worker");
        let (worker, line) = rest.split_once(": line ").unwrap();
        let worker: usize = worker.parse().unwrap();
        let line: usize = line.parse().unwrap();

        if let Some(prev) = last[worker] {
            assert!(line > prev);
        }
        last[worker] = Some(line);
        received += 1;
    }

    console.stop().await;
}

//! Loopback Console - the broadcast hub end to end, without a network
//!
//! Run with: cargo run --example loopback_console -- [seconds]
//!
//! This example demonstrates:
//! - Starting the hub with an in-memory transport
//! - A periodic heartbeat broadcast to every client
//! - Log lines forwarded to clients through the tracing layer
//! - Echoing inbound commands with peek/dequeue
//! - Connection events and a clean stop
//!
//! # Architecture
//!
//! ```text
//!   heartbeat ──┐
//!   tracing  ───┼──► Hub::broadcast ──► outbound ──► drain ──► client A
//!   echo     ───┘                                         └──► client B
//!
//!   client A ──► LoopbackTransport::receive ──► inbound ──► echo task
//! ```

use std::sync::Arc;
use std::time::Duration;

use ws_console::{Console, HubConfig, HubEvent, LoopbackClient, LoopbackTransport};

const HEARTBEAT: &str = "Hello websockets!";

/// Print everything one client receives
fn spawn_viewer(name: &'static str, mut client: LoopbackClient) {
    tokio::spawn(async move {
        while let Some(message) = client.recv().await {
            println!("[{} <- hub] {}", name, String::from_utf8_lossy(&message));
        }
        println!("[{}] connection closed", name);
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let seconds: u64 = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 5,
    };

    let config = HubConfig::default().max_clients(4);
    let transport = Arc::new(LoopbackTransport::new());
    let mut console = Console::new(config);
    let hub = console.hub();

    // Console output plus forwarding of every line to the clients
    let forwarder = ws_console::log::init(hub.clone(), console.config())?;

    let mut events = console.take_events().ok_or("event stream already taken")?;
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                HubEvent::ClientConnected(client) => tracing::info!(%client, "viewer joined"),
                HubEvent::ClientDisconnected(client) => tracing::info!(%client, "viewer left"),
            }
        }
    });

    console.start(Arc::clone(&transport)).await?;

    let alice = transport.connect().await?;
    let bob = transport.connect().await?;
    let bob_handle = bob.handle();
    spawn_viewer("alice", alice);
    spawn_viewer("bob", bob);

    // Heartbeat
    let heartbeat_hub = hub.clone();
    let heartbeat = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            if let Err(e) = heartbeat_hub.broadcast(HEARTBEAT) {
                tracing::warn!(error = %e, "heartbeat not queued");
            }
        }
    });

    // Echo inbound commands back to everyone
    let echo_hub = hub.clone();
    let echo = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(50));
        loop {
            ticker.tick().await;
            while let Some(command) = echo_hub.inbound_peek() {
                let reply = format!("echo: {}", String::from_utf8_lossy(&command));
                let _ = echo_hub.broadcast(reply);
                let _ = echo_hub.inbound_dequeue(&command);
            }
        }
    });

    transport.receive(b"status")?;
    transport.receive_in_place(b"reboot --dry-run")?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
        }
        _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
    }

    transport.disconnect(bob_handle).await?;

    heartbeat.abort();
    echo.abort();

    let stats = console.stats().await;
    console.stop().await;

    println!();
    println!("=== Summary ===");
    println!("clients at stop:   {}", stats.clients);
    println!("messages drained:  {}", stats.delivery.messages);
    println!("sends:             {}", stats.delivery.sends);
    println!("send failures:     {}", stats.delivery.send_failures);
    println!("outbound dropped:  {}", stats.outbound.dropped);
    println!("log lines:         {:?}", forwarder.stats());

    Ok(())
}

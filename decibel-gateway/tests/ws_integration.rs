//! End-to-end tests against a local WebSocket server.

use anyhow::{Context, Result, bail};
use decibel_core::types::Topic;
use decibel_gateway::ws::{ConnectionState, SubscriptionManager, WebSocketConfig};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

#[derive(Debug)]
enum Outbound {
    Text(String),
    Drop,
}

#[derive(Debug)]
enum ServerEvent {
    Connected(mpsc::UnboundedSender<Outbound>),
    Control(Value),
    Closed,
}

/// Accepts connections forever and reports every control frame.
async fn spawn_server() -> Result<(String, mpsc::UnboundedReceiver<ServerEvent>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (events_tx, events) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let Ok(ws) = accept_async(stream).await else {
                continue;
            };
            let (mut writer, mut reader) = ws.split();
            let (out_tx, mut out_rx) = mpsc::unbounded_channel();
            let _ = events_tx.send(ServerEvent::Connected(out_tx));

            loop {
                tokio::select! {
                    frame = reader.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            if let Ok(value) = serde_json::from_str(&text) {
                                let _ = events_tx.send(ServerEvent::Control(value));
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    },
                    out = out_rx.recv() => match out {
                        Some(Outbound::Text(text)) => {
                            if writer.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Some(Outbound::Drop) | None => break,
                    },
                }
            }
            let _ = events_tx.send(ServerEvent::Closed);
        }
    });

    Ok((format!("ws://{addr}"), events))
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Result<ServerEvent> {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .context("timed out waiting for server event")?
        .context("server task ended")
}

async fn expect_connected(
    events: &mut mpsc::UnboundedReceiver<ServerEvent>,
) -> Result<mpsc::UnboundedSender<Outbound>> {
    match next_event(events).await? {
        ServerEvent::Connected(out) => Ok(out),
        _ => bail!("expected a new connection"),
    }
}

async fn expect_control(events: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Result<Value> {
    match next_event(events).await? {
        ServerEvent::Control(value) => Ok(value),
        _ => bail!("expected a control frame"),
    }
}

async fn wait_for_state(manager: &SubscriptionManager, state: ConnectionState) -> Result<()> {
    tokio::time::timeout(Duration::from_secs(5), async {
        while manager.state() != state {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .with_context(|| format!("manager never reached {state}"))
}

fn config(url: &str) -> WebSocketConfig {
    WebSocketConfig::builder()
        .url(url)
        .reconnect_delay(Duration::from_millis(10))
        .max_reconnect_delay(Duration::from_millis(50))
        .idle_close_delay(Duration::from_millis(50))
        .auto_ping(false)
        .build()
}

#[tokio::test]
async fn test_subscribe_deliver_unsubscribe() -> Result<()> {
    let (url, mut events) = spawn_server().await?;
    let manager = SubscriptionManager::new(config(&url));
    let topic = Topic::new("market_price:0x1")?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = manager.subscribe(topic.clone(), move |payload| {
        let _ = tx.send(payload.clone());
    })?;

    let out = expect_connected(&mut events).await?;
    assert_eq!(
        expect_control(&mut events).await?,
        json!({"method": "subscribe", "topic": "market_price:0x1"})
    );
    wait_for_state(&manager, ConnectionState::Connected).await?;

    out.send(Outbound::Text(
        json!({"success": true, "message": "subscribed"}).to_string(),
    ))?;
    out.send(Outbound::Text(
        json!({
            "topic": "market_price:0x1",
            "price": {"mark_px": 101.5, "open_interest": {"$bigint": "18446744073709551615"}}
        })
        .to_string(),
    ))?;

    let payload = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await?
        .context("callback channel closed")?;
    assert_eq!(
        payload,
        json!({"price": {"mark_px": 101.5, "open_interest": u64::MAX}})
    );

    handle.unsubscribe();
    assert_eq!(
        expect_control(&mut events).await?,
        json!({"method": "unsubscribe", "topic": "market_price:0x1"})
    );
    assert!(matches!(next_event(&mut events).await?, ServerEvent::Closed));
    wait_for_state(&manager, ConnectionState::Disconnected).await?;

    manager.close().await;
    assert_eq!(manager.state(), ConnectionState::Closed);
    Ok(())
}

#[tokio::test]
async fn test_reconnect_replays_subscriptions() -> Result<()> {
    let (url, mut events) = spawn_server().await?;
    let manager = SubscriptionManager::new(config(&url));

    let _trades = manager.subscribe(Topic::new("trades:0x2")?, |_| {})?;
    let _prices = manager.subscribe(Topic::new("market_price:0x2")?, |_| {})?;

    let out = expect_connected(&mut events).await?;
    let mut first = vec![
        expect_control(&mut events).await?,
        expect_control(&mut events).await?,
    ];
    first.sort_by_key(|v| v["topic"].as_str().map(str::to_string));
    assert_eq!(first[0]["topic"], "market_price:0x2");
    assert_eq!(first[1]["topic"], "trades:0x2");

    out.send(Outbound::Drop)?;
    assert!(matches!(next_event(&mut events).await?, ServerEvent::Closed));

    let _out = expect_connected(&mut events).await?;
    assert_eq!(
        expect_control(&mut events).await?,
        json!({"method": "subscribe", "topic": "market_price:0x2"})
    );
    assert_eq!(
        expect_control(&mut events).await?,
        json!({"method": "subscribe", "topic": "trades:0x2"})
    );
    wait_for_state(&manager, ConnectionState::Connected).await?;
    assert_eq!(manager.server_topics().len(), 2);

    manager.close().await;
    assert_eq!(manager.state(), ConnectionState::Closed);
    Ok(())
}

//! WebSocket passthrough tests.

use dev_proxy::config::{ProxyConfig, ProxyRuleConfig};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite};

mod common;

fn config_for(target: String) -> ProxyConfig {
    let mut config = ProxyConfig::standard();
    config.proxy = vec![ProxyRuleConfig {
        ws: true,
        ..ProxyRuleConfig::new("/ws", target)
    }];
    config.server.root = None;
    config
}

#[tokio::test]
async fn test_websocket_frames_are_relayed() {
    let backend = common::start_ws_echo_backend().await;
    let (proxy, shutdown) = common::start_proxy(config_for(format!("http://{}", backend))).await;

    let (mut ws, response) = connect_async(format!("ws://{}/ws/chat", proxy))
        .await
        .expect("Tunnel handshake failed");
    assert_eq!(response.status(), 101);

    ws.send(tungstenite::Message::text(String::from("hello"))).await.unwrap();
    let echoed = ws.next().await.unwrap().unwrap();
    assert_eq!(echoed.to_text().unwrap(), "hello");

    ws.send(tungstenite::Message::binary(vec![1u8, 2, 3])).await.unwrap();
    let echoed = ws.next().await.unwrap().unwrap();
    assert_eq!(&echoed.into_data()[..], &[1u8, 2, 3]);

    ws.close(None).await.unwrap();
    shutdown.trigger();
}

#[tokio::test]
async fn test_websocket_to_unreachable_backend_fails_handshake() {
    let dead = common::closed_port().await;
    let (proxy, shutdown) = common::start_proxy(config_for(format!("http://{}", dead))).await;

    match connect_async(format!("ws://{}/ws", proxy)).await {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 502),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("Handshake should fail"),
    }

    shutdown.trigger();
}

#[tokio::test]
async fn test_backend_handshake_refusal_reaches_client() {
    let backend = common::start_refusing_ws_backend("403 Forbidden", "no session").await;
    let (proxy, shutdown) = common::start_proxy(config_for(format!("http://{}", backend))).await;

    match connect_async(format!("ws://{}/ws/stomp", proxy)).await {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), 403);
            assert_eq!(response.headers()["x-backend"], "refused");
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("Handshake should be refused"),
    }

    shutdown.trigger();
}

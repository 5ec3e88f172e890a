//! Integration tests for the SSE events endpoint.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Gateway, LiveDir};
use magnetcast_common::EventPayload;
use magnetcast_content::LocalSwarm;

#[tokio::test]
async fn sse_stream_connects() {
    let live = LiveDir::new();
    let gateway = Gateway::start(&live, Arc::new(LocalSwarm::new(256))).await;

    let resp = reqwest::get(gateway.base_url.join("events").unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let ct = resp
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(ct.contains("text/event-stream"), "expected SSE content-type, got: {ct}");

    drop(resp);
    gateway.stop().await;
}

#[tokio::test]
async fn sse_stream_delivers_bus_events() {
    let live = LiveDir::new();
    let gateway = Gateway::start(&live, Arc::new(LocalSwarm::new(256))).await;

    let mut resp = reqwest::get(gateway.base_url.join("events").unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    gateway
        .events
        .broadcast(EventPayload::CyclePublished { segments: 3 });

    let received = tokio::time::timeout(Duration::from_secs(5), async {
        let mut body = String::new();
        while let Some(chunk) = resp.chunk().await.unwrap() {
            body.push_str(&String::from_utf8_lossy(&chunk));
            if body.contains("cycle_published") {
                return body;
            }
        }
        body
    })
    .await
    .unwrap();

    assert!(received.contains(r#""type":"cycle_published""#), "got: {received}");
    assert!(received.contains(r#""segments":3"#));

    drop(resp);
    gateway.stop().await;
}

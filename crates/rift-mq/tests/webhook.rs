//! Webhook-generated replies against a local HTTP server.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use rift_mq::broker::{InMemoryBroker, InboundMessage};
use rift_mq::config::Config;
use rift_mq::stub::{Destination, StubRecord};
use rift_mq::MqVirtualizer;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

const WAIT: Duration = Duration::from_secs(5);

/// Answers `<stub id>|<order header>|<body>`, or 500 when the body is `FAIL`
async fn hook(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    let stub_id = header("X-Stub-ID");
    let order = header("X-JMS-orderId");
    let body = req
        .into_body()
        .collect()
        .await
        .map(|c| c.to_bytes())
        .unwrap_or_default();
    let body = String::from_utf8_lossy(&body).to_string();

    let response = if body == "FAIL" {
        Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Full::new(Bytes::new()))
    } else {
        Response::builder().body(Full::new(Bytes::from(format!("{stub_id}|{order}|{body}"))))
    };
    Ok(response.unwrap())
}

async fn start_hook_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service_fn(hook))
                    .await;
            });
        }
    });
    addr
}

async fn virtualizer(url: String) -> MqVirtualizer {
    let app = MqVirtualizer::with_broker(InMemoryBroker::default(), &Config::default()).unwrap();
    app.start(vec![StubRecord::new("hooked", Destination::queue("REQUESTS"))
        .with_webhook(url)
        .with_payload("FALLBACK ${message.body}")
        .with_reply_to(Destination::queue("REPLY"))
        .active()])
        .await;
    app
}

#[tokio::test]
async fn test_webhook_body_becomes_reply_payload() {
    let addr = start_hook_server().await;
    let app = virtualizer(format!("http://{addr}/hook")).await;

    app.broker().publish(
        &Destination::queue("REQUESTS"),
        InboundMessage::new("", "order-body").with_property("orderId", "42"),
    );
    let sent = app.broker().wait_for_sent(1, WAIT).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload, "hooked|42|order-body");

    app.shutdown().await;
}

#[tokio::test]
async fn test_failed_webhook_falls_back_to_static_payload() {
    let addr = start_hook_server().await;
    let app = virtualizer(format!("http://{addr}/hook")).await;

    app.broker()
        .publish(&Destination::queue("REQUESTS"), InboundMessage::new("", "FAIL"));
    let sent = app.broker().wait_for_sent(1, WAIT).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload, "FALLBACK FAIL");

    app.shutdown().await;
}

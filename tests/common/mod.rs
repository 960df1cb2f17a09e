//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use gauntlet::observability::metrics::GatewayMetrics;
use gauntlet::{GatewayConfig, GatewayServer, Shutdown};

/// What a programmable backend does with one request.
#[allow(dead_code)]
pub enum MockReply {
    /// Respond with this status and body.
    Respond(u16, String),
    /// Close the socket without writing; the proxy sees a transport error.
    Drop,
}

/// Start a mock backend that returns a fixed 200 response on every path.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move |_path| async move {
        MockReply::Respond(200, response.to_string())
    })
    .await
}

/// Start a mock backend whose reply depends on the request path.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MockReply> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = Arc::clone(&f);
                    tokio::spawn(async move {
                        // One small read is enough for the request line of
                        // the tiny requests these tests send.
                        let mut buf = [0u8; 2048];
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        let head = String::from_utf8_lossy(&buf[..n]).to_string();
                        let path = head
                            .lines()
                            .next()
                            .and_then(|line| line.split_whitespace().nth(1))
                            .unwrap_or("/")
                            .to_string();

                        match f(path).await {
                            MockReply::Respond(status, body) => {
                                let status_text = match status {
                                    200 => "200 OK",
                                    404 => "404 Not Found",
                                    500 => "500 Internal Server Error",
                                    502 => "502 Bad Gateway",
                                    503 => "503 Service Unavailable",
                                    _ => "200 OK",
                                };
                                let response = format!(
                                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                                    status_text,
                                    body.len(),
                                    body
                                );
                                let _ = socket.write_all(response.as_bytes()).await;
                            }
                            MockReply::Drop => {}
                        }
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Spawn a gateway with the given configuration on an ephemeral port.
/// Returns the base URL, the metrics handle and the shutdown trigger.
pub async fn start_gateway(config: GatewayConfig) -> (String, Arc<GatewayMetrics>, Arc<Shutdown>) {
    let shutdown = Arc::new(Shutdown::new());
    let server = GatewayServer::new(config);
    let metrics = server.metrics();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let run_shutdown = Arc::clone(&shutdown);
    tokio::spawn(async move {
        let _ = server.run(listener, &run_shutdown).await;
    });

    // Let the listener and the first health probe settle.
    tokio::time::sleep(Duration::from_millis(300)).await;

    (format!("http://{addr}"), metrics, shutdown)
}

/// Baseline test configuration: the pipeline enabled, health probes slow
/// enough not to interfere mid-test.
pub fn test_config(backend_urls: Vec<String>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.backend.urls = backend_urls;
    config.backend.health_check_interval = Duration::from_secs(60);
    config.backend.health_check_timeout = Duration::from_millis(500);
    config.backend.retry_delay = Duration::from_millis(20);
    config
}

#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

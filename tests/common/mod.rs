//! Shared utilities for integration tests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use lb_gateway::config::GatewayConfig;
use lb_gateway::{GatewayServer, Shutdown};

/// Read the request head and return its request target (path + query).
async fn read_request_target(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&head)
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("")
        .to_string()
}

async fn write_response(socket: &mut TcpStream, status: u16, body: &str) {
    let status_text = match status {
        200 => "200 OK",
        201 => "201 Created",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\n{}",
        status_text,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Start a mock backend that always returns `response` with status 200.
#[allow(dead_code)]
pub async fn start_mock_backend(addr: SocketAddr, response: &'static str) {
    start_programmable_backend(addr, move |_| async move { (200, response.to_string()) }).await;
}

/// Start a mock backend that answers with `name:<request target>`.
#[allow(dead_code)]
pub async fn start_echo_backend(addr: SocketAddr, name: &'static str) {
    start_programmable_backend(addr, move |target| async move {
        (200, format!("{}:{}", name, target))
    })
    .await;
}

/// Start a programmable mock backend; `f` receives the request target.
pub async fn start_programmable_backend<F, Fut>(addr: SocketAddr, f: F)
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let target = read_request_target(&mut socket).await;
                let (status, body) = f(target).await;
                write_response(&mut socket, status, &body).await;
            });
        }
    });
}

/// Start the gateway on `addr` with `upstreams`, returning its shutdown handle.
#[allow(dead_code)]
pub async fn start_gateway(
    addr: SocketAddr,
    upstreams: &[SocketAddr],
    configure: impl FnOnce(&mut GatewayConfig),
) -> Shutdown {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = addr.to_string();
    config.upstreams.addresses = upstreams.iter().map(|a| format!("http://{}", a)).collect();
    configure(&mut config);

    let server = GatewayServer::from_config(config).unwrap();
    let listener = TcpListener::bind(addr).await.unwrap();
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, receiver).await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    shutdown
}

/// Client without connection pooling or proxy settings.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

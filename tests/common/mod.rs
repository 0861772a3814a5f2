//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use forward_proxy::config::ProxyConfig;
use forward_proxy::http::request::read_head;
use forward_proxy::net::{Admission, Listener};
use forward_proxy::{ProxyServer, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Semaphore};

/// A proxy running on an ephemeral loopback port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub admission: Admission,
    pub shutdown: Shutdown,
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a proxy with `max_connections` admission slots.
pub async fn start_proxy(max_connections: usize) -> TestProxy {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1".into();
    config.listener.port = 0;
    config.listener.max_connections = max_connections;
    config.timeouts.connect_secs = Some(5);
    start_proxy_with(config).await
}

pub async fn start_proxy_with(config: ProxyConfig) -> TestProxy {
    let listener = Listener::bind(&config.listener).unwrap();
    let addr = listener.local_addr().unwrap();
    let server = ProxyServer::new(&config);
    let admission = server.admission();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestProxy {
        addr,
        admission,
        shutdown,
    }
}

/// Start an origin that answers every connection with `response` and reports
/// each received request head.
pub async fn start_origin(response: &'static [u8]) -> (SocketAddr, mpsc::UnboundedReceiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Ok(head) = read_head(&mut socket, 8192, None).await {
                    let _ = tx.send(head);
                }
                let _ = socket.write_all(response).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, rx)
}

/// Origin that holds every request until the test adds a permit to `gate`.
pub struct GatedOrigin {
    pub addr: SocketAddr,
    pub gate: Arc<Semaphore>,
    pub accepted: Arc<AtomicUsize>,
}

pub async fn start_gated_origin(response: &'static [u8]) -> GatedOrigin {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let gate = Arc::new(Semaphore::new(0));
    let accepted = Arc::new(AtomicUsize::new(0));

    let (gate_task, accepted_task) = (gate.clone(), accepted.clone());
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            accepted_task.fetch_add(1, Ordering::SeqCst);
            let gate = gate_task.clone();
            tokio::spawn(async move {
                let _ = read_head(&mut socket, 8192, None).await;
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
                let _ = socket.write_all(response).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    GatedOrigin {
        addr,
        gate,
        accepted,
    }
}

/// Origin that sends `prefix`, then resets the connection.
pub async fn start_resetting_origin(prefix: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = read_head(&mut socket, 8192, None).await;
                let _ = socket.write_all(prefix).await;
                tokio::time::sleep(Duration::from_millis(100)).await;
                #[allow(deprecated)]
                let _ = socket.set_linger(Some(Duration::ZERO));
                drop(socket);
            });
        }
    });

    addr
}

/// Origin that reports the peak number of connections it served at once.
pub async fn start_counting_origin(response: &'static [u8]) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let peak_task = peak.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let (active, peak) = (active.clone(), peak_task.clone());
            tokio::spawn(async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                let _ = read_head(&mut socket, 8192, None).await;
                tokio::time::sleep(Duration::from_millis(20)).await;
                let _ = socket.write_all(response).await;
                active.fetch_sub(1, Ordering::SeqCst);
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, peak)
}

/// Connect to `proxy`, write `chunks` with a short pause between them, and
/// read until the proxy closes.
pub async fn send_raw(proxy: SocketAddr, chunks: &[&[u8]]) -> Vec<u8> {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        stream.write_all(chunk).await.unwrap();
    }

    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .expect("proxy did not close the connection")
        .expect("read from proxy failed");
    response
}

/// Wait until every admission slot has been returned.
pub async fn wait_for_idle(admission: &Admission) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while admission.in_use() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("admission slots were not released");
}

/// Poll `counter` until it reaches `expected`.
pub async fn wait_for_count(counter: &AtomicUsize, expected: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while counter.load(Ordering::SeqCst) < expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("counter never reached the expected value");
}

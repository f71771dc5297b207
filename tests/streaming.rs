//! End-to-end: producer -> hub -> HTTP listeners over loopback TCP

use std::sync::Arc;
use std::time::Duration;

use audiocast::pipeline::{PassthroughEncoder, Pipeline, PipelineConfig, ReaderCapture};
use audiocast::{BroadcastHub, Chunk, HubConfig, ServerConfig, StreamServer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct TestServer {
    addr: std::net::SocketAddr,
    stop: CancellationToken,
    task: JoinHandle<audiocast::Result<()>>,
}

async fn start_server(hub: Arc<BroadcastHub>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = StreamServer::new(ServerConfig::with_addr(addr), hub);

    let stop = CancellationToken::new();
    let token = stop.clone();
    let task = tokio::spawn(async move {
        server
            .serve(listener, async move { token.cancelled().await })
            .await
    });

    TestServer { addr, stop, task }
}

/// One HTTP/1.1 GET over a raw socket
struct Listener {
    socket: TcpStream,
    head: String,
    raw: Vec<u8>,
}

impl Listener {
    async fn get(addr: std::net::SocketAddr, path: &str) -> Self {
        let mut socket = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path);
        socket.write_all(request.as_bytes()).await.unwrap();

        let mut listener = Self {
            socket,
            head: String::new(),
            raw: Vec::new(),
        };
        let head_end = loop {
            if let Some(pos) = listener.raw.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            assert!(listener.fill().await, "connection closed before response head");
        };

        listener.head = String::from_utf8(listener.raw[..head_end].to_vec()).unwrap();
        listener.raw.drain(..head_end);
        listener
    }

    fn status_is(&self, code: u16) -> bool {
        self.head.starts_with(&format!("HTTP/1.1 {}", code))
    }

    fn has_header(&self, line: &str) -> bool {
        self.head.to_ascii_lowercase().contains(line)
    }

    async fn fill(&mut self) -> bool {
        let mut buf = [0u8; 1024];
        let n = tokio::time::timeout(Duration::from_secs(2), self.socket.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        self.raw.extend_from_slice(&buf[..n]);
        n > 0
    }

    /// Decode chunked body data until `want` bytes arrived; None once the body ended
    async fn read_body(&mut self, want: usize) -> Option<Vec<u8>> {
        let mut payload = Vec::new();
        loop {
            while let Some(line_end) = self.raw.windows(2).position(|w| w == b"\r\n") {
                let size_line = std::str::from_utf8(&self.raw[..line_end]).unwrap();
                let size = usize::from_str_radix(size_line.trim(), 16).unwrap();
                if size == 0 {
                    return if payload.is_empty() { None } else { Some(payload) };
                }
                let chunk_end = line_end + 2 + size + 2;
                if self.raw.len() < chunk_end {
                    break;
                }
                payload.extend_from_slice(&self.raw[line_end + 2..line_end + 2 + size]);
                self.raw.drain(..chunk_end);
            }

            if payload.len() >= want {
                return Some(payload);
            }
            if !self.fill().await {
                return if payload.is_empty() { None } else { Some(payload) };
            }
        }
    }
}

async fn wait_for_sessions(hub: &BroadcastHub, count: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while hub.session_count() != count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_two_listeners_receive_same_stream() {
    let hub = Arc::new(BroadcastHub::new());
    let server = start_server(Arc::clone(&hub)).await;

    let mut a = Listener::get(server.addr, "/stream").await;
    let mut b = Listener::get(server.addr, "/stream.mp3").await;

    assert!(a.status_is(200));
    assert!(a.has_header("content-type: audio/mpeg"));
    assert!(a.has_header("cache-control: no-cache"));
    assert!(a.has_header("connection: keep-alive"));
    assert!(b.status_is(200));
    wait_for_sessions(&hub, 2).await;

    hub.broadcast(Chunk::from_static(b"A"));
    hub.broadcast(Chunk::from_static(b"B"));
    hub.broadcast(Chunk::from_static(b"C"));

    assert_eq!(a.read_body(3).await.unwrap(), b"ABC");
    assert_eq!(b.read_body(3).await.unwrap(), b"ABC");

    // Shutdown ends both bodies
    hub.shutdown();
    assert!(a.read_body(usize::MAX).await.is_none());
    assert!(b.read_body(usize::MAX).await.is_none());
    assert_eq!(hub.session_count(), 0);

    server.stop.cancel();
    server.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_listener_disconnect_unregisters() {
    let hub = Arc::new(BroadcastHub::new());
    let server = start_server(Arc::clone(&hub)).await;

    let a = Listener::get(server.addr, "/stream").await;
    let mut b = Listener::get(server.addr, "/stream").await;
    wait_for_sessions(&hub, 2).await;

    drop(a);
    // The server notices the hangup on a later write
    let mut sent = 0;
    for _ in 0..50 {
        hub.broadcast(Chunk::from_static(b"x"));
        sent += 1;
        if hub.session_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(hub.session_count(), 1);

    // The remaining listener got every chunk
    let payload = b.read_body(sent).await.unwrap();
    assert_eq!(payload, vec![b'x'; sent]);

    hub.shutdown();
    server.stop.cancel();
    server.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_session_limit_returns_503() {
    let hub = Arc::new(BroadcastHub::with_config(HubConfig::default().max_sessions(1)));
    let server = start_server(Arc::clone(&hub)).await;

    let a = Listener::get(server.addr, "/stream").await;
    assert!(a.status_is(200));
    wait_for_sessions(&hub, 1).await;

    let b = Listener::get(server.addr, "/stream").await;
    assert!(b.status_is(503));

    hub.shutdown();
    server.stop.cancel();
    server.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_pipeline_to_listener() {
    let hub = Arc::new(BroadcastHub::new());
    let server = start_server(Arc::clone(&hub)).await;

    let mut listener = Listener::get(server.addr, "/stream").await;
    assert!(listener.status_is(200));
    wait_for_sessions(&hub, 1).await;

    // The producer runs to the end of its input, then ends every stream
    let capture = ReaderCapture::new(&b"encoded audio bytes"[..], 5);
    let mut pipeline = Pipeline::spawn(
        capture,
        &PassthroughEncoder::default(),
        Arc::clone(&hub),
        PipelineConfig::default(),
    )
    .unwrap();

    let mut payload = Vec::new();
    while let Some(data) = listener.read_body(1).await {
        payload.extend_from_slice(&data);
    }
    pipeline.wait().await.unwrap();

    // Chunks still queued when the hub closed are not delivered
    assert!(b"encoded audio bytes".starts_with(&payload));

    let late = Listener::get(server.addr, "/stream").await;
    assert!(late.status_is(503));

    server.stop.cancel();
    server.task.await.unwrap().unwrap();
}

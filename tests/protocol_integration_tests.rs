//! Integration Tests for the RESP Server
//!
//! Drives a bound server over real TCP connections.

use std::net::SocketAddr;
use std::sync::Arc;

use cache_machine::protocol::{encode_request, ClientError, Reply};
use cache_machine::{PolicyKind, RespClient, RespServer, StringCache};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

// == Helper Functions ==

struct TestServer {
    addr: SocketAddr,
    cache: Arc<StringCache>,
    stop: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start(cache: StringCache) -> Self {
        let cache = Arc::new(cache);
        let server = RespServer::bind("127.0.0.1:0".parse().unwrap(), Arc::clone(&cache))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run(async move {
            let _ = stopped.await;
        }));

        Self {
            addr,
            cache,
            stop: Some(stop),
            handle,
        }
    }

    async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.unwrap()
    }

    async fn client(&self) -> RespClient<TcpStream> {
        RespClient::connect(self.addr).await.unwrap()
    }

    async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.handle.await.unwrap();
    }
}

fn resp(args: &[&str]) -> Vec<u8> {
    encode_request(args)
}

/// Sends raw bytes and reads exactly `expected.len()` bytes back.
async fn exchange(stream: &mut TcpStream, request: &[u8], expected: &str) {
    stream.write_all(request).await.unwrap();
    let mut reply = vec![0u8; expected.len()];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(String::from_utf8(reply).unwrap(), expected);
}

/// Reads one CRLF-terminated reply line.
async fn read_line(stream: &mut TcpStream) -> String {
    let mut line = Vec::new();
    while !line.ends_with(b"\r\n") {
        line.push(stream.read_u8().await.unwrap());
    }
    String::from_utf8(line).unwrap()
}

// == Command Tests ==

#[tokio::test]
async fn test_ping_set_get_del_over_tcp() {
    let server = TestServer::start(StringCache::new(1024, PolicyKind::Lru)).await;
    let mut client = server.client().await;

    client.ping().await.unwrap();
    client.set("greeting", "hello world").await.unwrap();
    assert_eq!(
        client.get("greeting").await.unwrap(),
        Some("hello world".to_string())
    );
    assert_eq!(client.get("missing").await.unwrap(), None);
    assert_eq!(client.del(&["greeting", "missing"]).await.unwrap(), 1);

    let mut stream = server.connect().await;
    exchange(&mut stream, b"GET greeting\r\n", "$-1\r\n").await;

    let stats = server.cache.metrics();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);

    server.stop().await;
}

#[tokio::test]
async fn test_errors_keep_connection_usable() {
    let server = TestServer::start(StringCache::new(16, PolicyKind::Lru)).await;
    let mut stream = server.connect().await;

    exchange(&mut stream, b"*0\r\n", "-ERR no command provided\r\n").await;
    exchange(&mut stream, &resp(&["FLUSHALL"]), "-ERR unknown command 'FLUSHALL'\r\n").await;
    exchange(
        &mut stream,
        &resp(&["SET", "only-key"]),
        "-ERR wrong number of arguments for 'SET'\r\n",
    )
    .await;
    exchange(
        &mut stream,
        b"*x\r\n",
        "-ERR Protocol error: invalid array length 'x'\r\n",
    )
    .await;

    // 9 chars at 2 bytes each exceeds the 16 byte capacity
    stream
        .write_all(&resp(&["SET", "big", "123456789"]))
        .await
        .unwrap();
    let reply = read_line(&mut stream).await;
    assert!(reply.starts_with("-ERR Invalid argument"), "got {}", reply);

    exchange(&mut stream, &resp(&["PING"]), "+PONG\r\n").await;
    assert!(server.cache.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_broken_frame_closes_connection() {
    let server = TestServer::start(StringCache::new(1024, PolicyKind::Lru)).await;
    let mut stream = server.connect().await;

    stream
        .write_all(b"*2\r\n$3\r\nGET\r\n$x\r\nSET smuggled yes\r\n")
        .await
        .unwrap();
    assert_eq!(
        read_line(&mut stream).await,
        "-ERR Protocol error: invalid bulk length 'x'\r\n"
    );

    // Closed by the server: either a clean EOF or a reset
    let mut rest = Vec::new();
    let closed = stream.read_to_end(&mut rest).await;
    assert!(closed.is_err() || rest.is_empty());
    assert!(!server.cache.contains_key(&"smuggled".to_string()));

    server.stop().await;
}

#[tokio::test]
async fn test_clients_share_one_cache() {
    let server = TestServer::start(StringCache::new(1024, PolicyKind::Lfu)).await;
    let mut writer = server.client().await;
    let mut reader = server.client().await;

    writer.set("shared", "yes").await.unwrap();
    assert_eq!(reader.get("shared").await.unwrap(), Some("yes".to_string()));

    assert_eq!(server.cache.frequency(&"shared".to_string()), Some(2));
    server.stop().await;
}

#[tokio::test]
async fn test_eviction_visible_over_protocol() {
    // "v1" costs 4 bytes: room for exactly two entries
    let server = TestServer::start(StringCache::new(8, PolicyKind::Lru)).await;
    let mut client = server.client().await;

    client.set("A", "v1").await.unwrap();
    client.set("B", "v2").await.unwrap();
    assert_eq!(client.get("A").await.unwrap(), Some("v1".to_string()));
    client.set("C", "v3").await.unwrap();
    assert_eq!(client.get("B").await.unwrap(), None);

    assert_eq!(server.cache.metrics().evictions, 1);
    server.stop().await;
}

#[tokio::test]
async fn test_client_sees_error_replies() {
    let server = TestServer::start(StringCache::new(16, PolicyKind::Lru)).await;
    let mut client = server.client().await;

    let err = client.set("big", "123456789").await.unwrap_err();
    assert!(matches!(err, ClientError::Server(ref message) if message.starts_with("ERR Invalid argument")));

    assert_eq!(
        client.command(&["get"]).await.unwrap(),
        Reply::Error("ERR wrong number of arguments for 'GET'".to_string())
    );
    client.ping().await.unwrap();

    server.stop().await;
}

//! RESP Server
//!
//! TCP accept loop with one tokio task per client connection.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::cache::StringCache;
use crate::protocol::{dispatch, read_request, ProtocolError, Reply};

pub struct RespServer {
    listener: TcpListener,
    store: Arc<StringCache>,
}

impl RespServer {
    /// Binds the listening socket. Port 0 picks a free port.
    pub async fn bind(addr: SocketAddr, store: Arc<StringCache>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, store })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        if let Ok(addr) = self.listener.local_addr() {
            info!("RESP server listening on {}", addr);
        }
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            debug!("Client connected: {}", peer);
                            let store = Arc::clone(&self.store);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, store).await {
                                    warn!("Connection {} closed with error: {}", peer, e);
                                }
                                debug!("Client disconnected: {}", peer);
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = &mut shutdown => {
                    info!("RESP server shutting down");
                    break;
                }
            }
        }
    }
}

/// Serves requests on one connection until the client disconnects.
///
/// A malformed request line gets an error reply and the connection stays
/// open. A frame that breaks inside an array gets one error reply and the
/// connection is closed, since the unread remainder of the frame cannot be
/// told apart from the next request. Transport errors end the connection.
pub async fn handle_connection<S>(stream: S, store: Arc<StringCache>) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);

    loop {
        let reply = match read_request(&mut reader).await {
            Ok(Some(args)) => {
                debug!("Received command: {:?}", args.first());
                dispatch(args, &store)
            }
            Ok(None) => return Ok(()),
            Err(ProtocolError::Malformed(message)) => {
                debug!("Malformed request: {}", message);
                Reply::err(format!("Protocol error: {}", message))
            }
            Err(ProtocolError::Desynced(message)) => {
                warn!("Closing connection after broken frame: {}", message);
                let reply = Reply::err(format!("Protocol error: {}", message));
                writer.write_all(&reply.encode()).await?;
                writer.flush().await?;
                return Ok(());
            }
            Err(ProtocolError::Io(e)) => return Err(e),
        };

        writer.write_all(&reply.encode()).await?;
        writer.flush().await?;
    }
}

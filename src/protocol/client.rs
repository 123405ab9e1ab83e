//! RESP Client
//!
//! Small async client for the RESP server, covering the commands the server
//! understands.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use crate::protocol::{encode_request, read_reply, ProtocolError, Reply};

// == Client Error ==
#[derive(Error, Debug)]
pub enum ClientError {
    /// The server answered with an error reply.
    #[error("Server error: {0}")]
    Server(String),

    /// The reply type does not fit the command that was sent.
    #[error("Unexpected reply: {0:?}")]
    UnexpectedReply(Reply),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<io::Error> for ClientError {
    fn from(e: io::Error) -> Self {
        ClientError::Protocol(ProtocolError::Io(e))
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

// == RESP Client ==
pub struct RespClient<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
}

impl RespClient<TcpStream> {
    pub async fn connect(addr: impl ToSocketAddrs) -> ClientResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream))
    }
}

impl<S> RespClient<S>
where
    S: AsyncRead + AsyncWrite,
{
    /// Wraps an already connected stream.
    pub fn new(stream: S) -> Self {
        let (read_half, writer) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(read_half),
            writer,
        }
    }

    /// Sends one request and returns the raw reply, error replies included.
    pub async fn command<A: AsRef<str>>(&mut self, args: &[A]) -> ClientResult<Reply> {
        self.writer.write_all(&encode_request(args)).await?;
        self.writer.flush().await?;
        let reply = read_reply(&mut self.reader).await?;
        debug!("Reply: {:?}", reply);
        Ok(reply)
    }

    pub async fn ping(&mut self) -> ClientResult<()> {
        match self.expect_ok(&["PING"]).await? {
            Reply::Simple(text) if text == "PONG" => Ok(()),
            other => Err(ClientError::UnexpectedReply(other)),
        }
    }

    pub async fn set(&mut self, key: &str, value: &str) -> ClientResult<()> {
        match self.expect_ok(&["SET", key, value]).await? {
            Reply::Simple(text) if text == "OK" => Ok(()),
            other => Err(ClientError::UnexpectedReply(other)),
        }
    }

    pub async fn get(&mut self, key: &str) -> ClientResult<Option<String>> {
        match self.expect_ok(&["GET", key]).await? {
            Reply::Bulk(value) => Ok(value),
            other => Err(ClientError::UnexpectedReply(other)),
        }
    }

    /// Removes `keys`, returning how many existed.
    pub async fn del(&mut self, keys: &[&str]) -> ClientResult<i64> {
        let mut args = Vec::with_capacity(keys.len() + 1);
        args.push("DEL");
        args.extend_from_slice(keys);
        match self.expect_ok(&args).await? {
            Reply::Integer(count) => Ok(count),
            other => Err(ClientError::UnexpectedReply(other)),
        }
    }

    async fn expect_ok(&mut self, args: &[&str]) -> ClientResult<Reply> {
        match self.command(args).await? {
            Reply::Error(message) => Err(ClientError::Server(message)),
            reply => Ok(reply),
        }
    }
}

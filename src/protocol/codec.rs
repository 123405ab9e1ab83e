//! RESP Codec
//!
//! Reads client requests and encodes server replies.
//!
//! A request is either a RESP array of bulk strings
//! (`*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n`) or an inline command, a single
//! whitespace-separated line (`GET key\r\n`). Replies are simple strings,
//! errors, integers and (possibly null) bulk strings.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Upper bound on the element count of one request array.
pub const MAX_ARGS: usize = 1024 * 1024;

/// Upper bound on a single bulk string, in bytes.
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

// Payload buffers start at most this large and grow as bytes arrive.
const INITIAL_BULK_CAPACITY: usize = 64 * 1024;

// == Protocol Error ==
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A request line was framed incorrectly. The connection can continue.
    #[error("Protocol error: {0}")]
    Malformed(String),

    /// Framing broke inside an array. The rest of the frame is still in the
    /// stream, so the connection cannot be resynchronized.
    #[error("Protocol error: {0}")]
    Desynced(String),

    /// The transport failed or closed mid-request.
    #[error(transparent)]
    Io(#[from] io::Error),
}

// == Reply ==
/// A server reply, encoded with [`Reply::encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<String>),
}

impl Reply {
    pub fn ok() -> Self {
        Reply::Simple("OK".to_string())
    }

    /// Generic `ERR` reply carrying `message`.
    pub fn err(message: impl std::fmt::Display) -> Self {
        Reply::Error(format!("ERR {}", message))
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Reply::Simple(text) => format!("+{}\r\n", text).into_bytes(),
            Reply::Error(text) => format!("-{}\r\n", text).into_bytes(),
            Reply::Integer(n) => format!(":{}\r\n", n).into_bytes(),
            Reply::Bulk(None) => b"$-1\r\n".to_vec(),
            Reply::Bulk(Some(data)) => {
                let mut out = format!("${}\r\n", data.len()).into_bytes();
                out.extend_from_slice(data.as_bytes());
                out.extend_from_slice(b"\r\n");
                out
            }
        }
    }
}

// == Request Reading ==
/// Reads the next request as a list of arguments.
///
/// Returns `Ok(None)` on a clean end of stream between requests. Blank
/// inline lines are skipped.
pub async fn read_request<R>(reader: &mut R) -> Result<Option<Vec<String>>, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let Some(line) = read_line(reader).await? else {
            return Ok(None);
        };

        if let Some(count) = line.strip_prefix('*') {
            let count = parse_length(count, "array length")?.unwrap_or(0);
            if count > MAX_ARGS {
                return Err(ProtocolError::Desynced(format!(
                    "array length {} exceeds limit",
                    count
                )));
            }
            let mut args = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                let arg = read_bulk(reader).await.map_err(|e| match e {
                    ProtocolError::Malformed(message) => ProtocolError::Desynced(message),
                    other => other,
                })?;
                args.push(arg);
            }
            return Ok(Some(args));
        }

        let args: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        if !args.is_empty() {
            return Ok(Some(args));
        }
    }
}

/// Encodes a request as a RESP array of bulk strings.
pub fn encode_request<S: AsRef<str>>(args: &[S]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", args.len()).into_bytes();
    for arg in args {
        let arg = arg.as_ref();
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out
}

// == Reply Reading ==
/// Reads one server reply. Used by the client side.
pub async fn read_reply<R>(reader: &mut R) -> Result<Reply, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let line = read_line(reader)
        .await?
        .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;
    let mut chars = line.chars();
    let kind = chars.next();
    let rest = chars.as_str();

    match kind {
        Some('+') => Ok(Reply::Simple(rest.to_string())),
        Some('-') => Ok(Reply::Error(rest.to_string())),
        Some(':') => rest
            .trim()
            .parse()
            .map(Reply::Integer)
            .map_err(|_| ProtocolError::Malformed(format!("invalid integer reply '{}'", rest))),
        Some('$') => match parse_length(rest, "bulk length")? {
            None => Ok(Reply::Bulk(None)),
            Some(len) if len > MAX_BULK_LEN => Err(ProtocolError::Desynced(format!(
                "bulk length {} exceeds limit",
                len
            ))),
            Some(len) => read_payload(reader, len)
                .await
                .map(|data| Reply::Bulk(Some(data)))
                .map_err(|e| match e {
                    ProtocolError::Malformed(message) => ProtocolError::Desynced(message),
                    other => other,
                }),
        },
        _ => Err(ProtocolError::Malformed(format!(
            "unexpected reply line '{}'",
            line
        ))),
    }
}

/// Reads one `$len` header plus payload.
async fn read_bulk<R>(reader: &mut R) -> Result<String, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let header = read_line(reader)
        .await?
        .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;
    let Some(len) = header.strip_prefix('$') else {
        return Err(ProtocolError::Malformed(format!(
            "expected '$', got '{}'",
            header
        )));
    };
    let Some(len) = parse_length(len, "bulk length")? else {
        return Err(ProtocolError::Malformed(
            "null bulk string in request".to_string(),
        ));
    };
    if len > MAX_BULK_LEN {
        return Err(ProtocolError::Malformed(format!(
            "bulk length {} exceeds limit",
            len
        )));
    }
    read_payload(reader, len).await
}

/// Reads `len` payload bytes and the trailing CRLF.
async fn read_payload<R>(reader: &mut R, len: usize) -> Result<String, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let expected = len + 2;
    let mut payload = Vec::with_capacity(expected.min(INITIAL_BULK_CAPACITY));
    let received = (&mut *reader)
        .take(expected as u64)
        .read_to_end(&mut payload)
        .await?;
    if received < expected {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    if !payload.ends_with(b"\r\n") {
        return Err(ProtocolError::Malformed(
            "bulk string not terminated by CRLF".to_string(),
        ));
    }
    payload.truncate(len);

    String::from_utf8(payload)
        .map_err(|_| ProtocolError::Malformed("bulk string is not valid UTF-8".to_string()))
}

/// Parses a RESP length. Negative lengths are RESP nulls.
fn parse_length(text: &str, what: &str) -> Result<Option<usize>, ProtocolError> {
    let value: i64 = text
        .trim()
        .parse()
        .map_err(|_| ProtocolError::Malformed(format!("invalid {} '{}'", what, text)))?;
    if value < 0 {
        return Ok(None);
    }
    Ok(Some(value as usize))
}

/// Reads one line without its terminator. `None` at end of stream.
async fn read_line<R>(reader: &mut R) -> Result<Option<String>, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut raw = Vec::new();
    if reader.read_until(b'\n', &mut raw).await? == 0 {
        return Ok(None);
    }
    while matches!(raw.last(), Some(b'\n' | b'\r')) {
        raw.pop();
    }
    String::from_utf8(raw)
        .map(Some)
        .map_err(|_| ProtocolError::Malformed("request line is not valid UTF-8".to_string()))
}

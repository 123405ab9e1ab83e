//! Protocol Module
//!
//! RESP-style wire protocol in front of a [`StringCache`](crate::cache::StringCache).
//!
//! # Commands
//! - `PING` - Liveness check, replies `+PONG`
//! - `SET key value` - Store a value
//! - `GET key` - Fetch a value, `$-1` when absent
//! - `DEL key [key ...]` - Remove keys, replies with the removed count

mod client;
mod codec;
mod command;
mod server;

pub use client::{ClientError, ClientResult, RespClient};
pub use codec::{
    encode_request, read_reply, read_request, ProtocolError, Reply, MAX_ARGS, MAX_BULK_LEN,
};
pub use command::{dispatch, Command, CommandError};
pub use server::{handle_connection, RespServer};

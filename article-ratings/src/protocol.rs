//! JSON-lines protocol between [`RemoteStore`](crate::store::remote::RemoteStore)
//! and [`StoreServer`](crate::server::StoreServer).
//!
//! Every request and every response is one JSON object on one line. The server
//! answers each request with exactly one response, in order.

use std::io::{self, BufRead, Write};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::store::{ScoredMember, WatchToken, WriteOp};

const LINE_ENDINGS: &[char] = &['\n', '\r'];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum Request {
    Ping,
    HSet {
        namespace: String,
        field: String,
        value: Vec<u8>,
    },
    HGet {
        namespace: String,
        field: String,
    },
    SAdd {
        key: String,
        member: String,
    },
    SIsMember {
        key: String,
        member: String,
    },
    SCard {
        key: String,
    },
    ZAdd {
        key: String,
        member: String,
        score: f64,
    },
    ZScore {
        key: String,
        member: String,
    },
    ZRevRange {
        key: String,
        start: i64,
        stop: i64,
    },
    Watch {
        keys: Vec<String>,
    },
    Exec {
        token: WatchToken,
        ops: Vec<WriteOp>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pong,
    Done,
    Count { value: u64 },
    Flag { value: bool },
    Bytes { value: Option<Vec<u8>> },
    Score { value: Option<f64> },
    Range { entries: Vec<ScoredMember> },
    Watching { token: WatchToken },
    Committed { value: bool },
    WrongType { key: String },
    Error { message: String },
}

pub async fn read_message<R, T>(reader: &mut R) -> io::Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    loop {
        line.clear();
        let bytes = reader.read_line(&mut line).await?;
        if bytes == 0 {
            return Ok(None);
        }
        if let Some(message) = parse_line(&line)? {
            return Ok(Some(message));
        }
    }
}

pub async fn write_message<W, T>(writer: &mut W, message: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let encoded = encode_line(message)?;
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

/// Blocking counterpart of [`read_message`].
pub fn read_message_blocking<R, T>(reader: &mut R) -> io::Result<Option<T>>
where
    R: BufRead,
    T: DeserializeOwned,
{
    let mut line = String::new();
    loop {
        line.clear();
        let bytes = reader.read_line(&mut line)?;
        if bytes == 0 {
            return Ok(None);
        }
        if let Some(message) = parse_line(&line)? {
            return Ok(Some(message));
        }
    }
}

/// Blocking counterpart of [`write_message`].
pub fn write_message_blocking<W, T>(writer: &mut W, message: &T) -> io::Result<()>
where
    W: Write,
    T: Serialize,
{
    let encoded = encode_line(message)?;
    writer.write_all(&encoded)?;
    writer.flush()
}

/// Blank lines are skipped so the server can be poked with netcat.
fn parse_line<T: DeserializeOwned>(line: &str) -> io::Result<Option<T>> {
    let trimmed = line.trim_end_matches(LINE_ENDINGS);
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(trimmed).map(Some).map_err(to_io_error)
}

fn encode_line<T: Serialize>(message: &T) -> io::Result<Vec<u8>> {
    let mut encoded = serde_json::to_vec(message).map_err(to_io_error)?;
    encoded.push(b'\n');
    Ok(encoded)
}

fn to_io_error(err: serde_json::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

//! Blocking client for a [`StoreServer`](crate::server::StoreServer).

use std::io::{self, BufReader};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{ScoredMember, Store, StoreError, WatchToken, WriteOp};
use crate::protocol::{read_message_blocking, write_message_blocking, Request, Response};

pub struct RemoteStore {
    /// `None` once a request failed halfway; a late reply could otherwise be
    /// taken as the answer to the next request.
    connection: Mutex<Option<Connection>>,
}

struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Connection {
    fn exchange(&mut self, request: &Request) -> Result<Response, StoreError> {
        write_message_blocking(&mut self.writer, request)?;
        read_message_blocking::<_, Response>(&mut self.reader)
            .map_err(read_error)?
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::UnexpectedEof, "store closed the connection").into()
            })
    }
}

impl RemoteStore {
    /// Connects to `addr` and checks that a store answers there.
    ///
    /// `timeout` bounds connecting and every read and write on the
    /// connection; `None` waits forever.
    pub fn connect(addr: &str, timeout: Option<Duration>) -> Result<Self, StoreError> {
        let stream = open(addr, timeout)?;
        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)?;
        stream.set_nodelay(true)?;

        let reader = BufReader::new(stream.try_clone()?);
        let store = Self {
            connection: Mutex::new(Some(Connection {
                reader,
                writer: stream,
            })),
        };

        match store.call(Request::Ping)? {
            Response::Pong => {
                debug!(addr, "connected to store");
                Ok(store)
            }
            other => Err(unexpected(other)),
        }
    }

    fn call(&self, request: Request) -> Result<Response, StoreError> {
        let mut guard = self.connection.lock();
        let Some(connection) = guard.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection to store was dropped after an earlier failure",
            )
            .into());
        };

        let response = match connection.exchange(&request) {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "dropping store connection");
                *guard = None;
                return Err(err);
            }
        };

        match response {
            Response::WrongType { key } => Err(StoreError::WrongType { key }),
            Response::Error { message } => Err(StoreError::Server(message)),
            response => Ok(response),
        }
    }
}

/// Connects to the first address `addr` resolves to that accepts.
fn open(addr: &str, timeout: Option<Duration>) -> io::Result<TcpStream> {
    let Some(timeout) = timeout else {
        return TcpStream::connect(addr);
    };

    let mut last_err = None;
    for resolved in addr.to_socket_addrs()? {
        match TcpStream::connect_timeout(&resolved, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{addr} did not resolve to any address"),
        )
    }))
}

fn read_error(err: io::Error) -> StoreError {
    match err.kind() {
        io::ErrorKind::InvalidData => StoreError::Protocol(err.to_string()),
        _ => StoreError::Unavailable(err),
    }
}

fn unexpected(response: Response) -> StoreError {
    StoreError::Protocol(format!("unexpected response {response:?}"))
}

impl Store for RemoteStore {
    fn hset(&self, namespace: &str, field: &str, value: &[u8]) -> Result<(), StoreError> {
        match self.call(Request::HSet {
            namespace: namespace.to_string(),
            field: field.to_string(),
            value: value.to_vec(),
        })? {
            Response::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    fn hget(&self, namespace: &str, field: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self.call(Request::HGet {
            namespace: namespace.to_string(),
            field: field.to_string(),
        })? {
            Response::Bytes { value } => Ok(value),
            other => Err(unexpected(other)),
        }
    }

    fn sadd(&self, key: &str, member: &str) -> Result<u64, StoreError> {
        match self.call(Request::SAdd {
            key: key.to_string(),
            member: member.to_string(),
        })? {
            Response::Count { value } => Ok(value),
            other => Err(unexpected(other)),
        }
    }

    fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        match self.call(Request::SIsMember {
            key: key.to_string(),
            member: member.to_string(),
        })? {
            Response::Flag { value } => Ok(value),
            other => Err(unexpected(other)),
        }
    }

    fn scard(&self, key: &str) -> Result<u64, StoreError> {
        match self.call(Request::SCard {
            key: key.to_string(),
        })? {
            Response::Count { value } => Ok(value),
            other => Err(unexpected(other)),
        }
    }

    fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        match self.call(Request::ZAdd {
            key: key.to_string(),
            member: member.to_string(),
            score,
        })? {
            Response::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, StoreError> {
        match self.call(Request::ZScore {
            key: key.to_string(),
            member: member.to_string(),
        })? {
            Response::Score { value } => Ok(value),
            other => Err(unexpected(other)),
        }
    }

    fn zrevrange_with_scores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<ScoredMember>, StoreError> {
        match self.call(Request::ZRevRange {
            key: key.to_string(),
            start,
            stop,
        })? {
            Response::Range { entries } => Ok(entries),
            other => Err(unexpected(other)),
        }
    }

    fn watch(&self, keys: &[String]) -> Result<WatchToken, StoreError> {
        match self.call(Request::Watch {
            keys: keys.to_vec(),
        })? {
            Response::Watching { token } => Ok(token),
            other => Err(unexpected(other)),
        }
    }

    fn exec(&self, token: &WatchToken, ops: &[WriteOp]) -> Result<bool, StoreError> {
        match self.call(Request::Exec {
            token: token.clone(),
            ops: ops.to_vec(),
        })? {
            Response::Committed { value } => Ok(value),
            other => Err(unexpected(other)),
        }
    }
}

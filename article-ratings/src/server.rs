//! TCP front end for a [`MemoryStore`].
//!
//! Each accepted connection gets its own task that answers requests in the
//! order they arrive. All connections share one store, so concurrent clients
//! coordinate only through the store's optimistic transactions.

use std::{future::Future, io::ErrorKind, net::SocketAddr, sync::Arc};

use anyhow::Result;
use tokio::{
    io::BufReader,
    net::{TcpListener, TcpStream},
    select,
};
use tracing::{debug, info, warn};

use crate::protocol::{read_message, write_message, Request, Response};
use crate::store::{memory::MemoryStore, Store, StoreError};

pub struct StoreServer {
    listener: TcpListener,
    store: Arc<MemoryStore>,
}

impl StoreServer {
    pub fn new(listener: TcpListener, store: Arc<MemoryStore>) -> Self {
        Self { listener, store }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let StoreServer { listener, store } = self;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    info!("store server shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    handle_accept_result(accept_result, &store);
                }
            }
        }

        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

fn handle_accept_result(
    result: std::io::Result<(TcpStream, SocketAddr)>,
    store: &Arc<MemoryStore>,
) {
    match result {
        Ok((stream, peer)) => spawn_connection_handler(stream, peer, store),
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

fn spawn_connection_handler(stream: TcpStream, peer: SocketAddr, store: &Arc<MemoryStore>) {
    let store = Arc::clone(store);
    tokio::spawn(async move {
        debug!(%peer, "client connected");
        match handle_connection(stream, &store).await {
            Ok(()) => debug!(%peer, "client disconnected"),
            Err(err) => warn!(%peer, error = ?err, "client connection closed with error"),
        }
    });
}

async fn handle_connection(stream: TcpStream, store: &MemoryStore) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    loop {
        let response = match read_message::<_, Request>(&mut reader).await {
            Ok(Some(request)) => respond(store, request),
            Ok(None) => return Ok(()),
            // The offending line is consumed, so the next one can still be served.
            Err(err) if err.kind() == ErrorKind::InvalidData => {
                debug!(error = %err, "malformed request");
                Response::Error {
                    message: format!("malformed request: {err}"),
                }
            }
            Err(err) => return Err(err.into()),
        };
        write_message(&mut writer, &response).await?;
    }
}

/// Executes one request against the store.
pub fn respond<S: Store + ?Sized>(store: &S, request: Request) -> Response {
    let outcome = match request {
        Request::Ping => Ok(Response::Pong),
        Request::HSet {
            namespace,
            field,
            value,
        } => store
            .hset(&namespace, &field, &value)
            .map(|()| Response::Done),
        Request::HGet { namespace, field } => store
            .hget(&namespace, &field)
            .map(|value| Response::Bytes { value }),
        Request::SAdd { key, member } => store
            .sadd(&key, &member)
            .map(|value| Response::Count { value }),
        Request::SIsMember { key, member } => store
            .sismember(&key, &member)
            .map(|value| Response::Flag { value }),
        Request::SCard { key } => store.scard(&key).map(|value| Response::Count { value }),
        Request::ZAdd { key, member, score } => {
            store.zadd(&key, &member, score).map(|()| Response::Done)
        }
        Request::ZScore { key, member } => store
            .zscore(&key, &member)
            .map(|value| Response::Score { value }),
        Request::ZRevRange { key, start, stop } => store
            .zrevrange_with_scores(&key, start, stop)
            .map(|entries| Response::Range { entries }),
        Request::Watch { keys } => store.watch(&keys).map(|token| Response::Watching { token }),
        Request::Exec { token, ops } => store
            .exec(&token, &ops)
            .map(|value| Response::Committed { value }),
    };

    outcome.unwrap_or_else(|err| match err {
        StoreError::WrongType { key } => Response::WrongType { key },
        other => Response::Error {
            message: other.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;

    use super::*;

    #[test]
    fn type_errors_become_wrong_type_replies() {
        let store = MemoryStore::new();
        store.sadd("scores", "x").unwrap();

        let response = respond(
            &store,
            Request::ZScore {
                key: "scores".into(),
                member: "x".into(),
            },
        );
        assert_eq!(
            response,
            Response::WrongType {
                key: "scores".into()
            }
        );
    }

    #[test]
    fn exec_reports_conflicts() {
        let store = MemoryStore::new();
        let token = match respond(
            &store,
            Request::Watch {
                keys: vec!["scores".into()],
            },
        ) {
            Response::Watching { token } => token,
            other => panic!("unexpected response {other:?}"),
        };
        store.zadd("scores", "x", 1.0).unwrap();

        let response = respond(
            &store,
            Request::Exec {
                token,
                ops: Vec::new(),
            },
        );
        assert_eq!(response, Response::Committed { value: false });
    }

    #[tokio::test]
    async fn serves_requests_over_tcp() -> Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = StoreServer::new(listener, Arc::new(MemoryStore::new()));

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(server.run_until(async move {
            let _ = shutdown_rx.await;
        }));

        let stream = TcpStream::connect(addr).await?;
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        write_message(
            &mut writer,
            &Request::SAdd {
                key: "ratings:R694".into(),
                member: "alice".into(),
            },
        )
        .await?;
        let reply = read_message::<_, Response>(&mut reader).await?;
        assert_eq!(reply, Some(Response::Count { value: 1 }));

        write_message(
            &mut writer,
            &Request::SCard {
                key: "ratings:R694".into(),
            },
        )
        .await?;
        let reply = read_message::<_, Response>(&mut reader).await?;
        assert_eq!(reply, Some(Response::Count { value: 1 }));

        let _ = shutdown_tx.send(());
        handle.await??;
        Ok(())
    }

    #[tokio::test]
    async fn malformed_line_gets_an_error_reply_and_the_connection_survives() -> Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = StoreServer::new(listener, Arc::new(MemoryStore::new()));

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(server.run_until(async move {
            let _ = shutdown_rx.await;
        }));

        let stream = TcpStream::connect(addr).await?;
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        writer.write_all(b"{not json\n").await?;
        let reply = read_message::<_, Response>(&mut reader).await?;
        assert!(matches!(
            reply,
            Some(Response::Error { message }) if message.starts_with("malformed request")
        ));

        write_message(&mut writer, &Request::Ping).await?;
        let reply = read_message::<_, Response>(&mut reader).await?;
        assert_eq!(reply, Some(Response::Pong));

        let _ = shutdown_tx.send(());
        handle.await??;
        Ok(())
    }
}

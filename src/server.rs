// The accept loop: one listening socket, one spawned task per robot
// connection, no state shared across connections beyond the read-only key
// table.
use crate::ServerResult;
use crate::builder::{Bundle, ReaderKind, ServerBuilder};
use crate::config::{KeysPair, ServerConfig};
use crate::session::Session;
use crate::transport::{RecordReader, RecordWriter};
use futures::FutureExt;
use log::{error, info};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

/// The assembled server. Built via [`Server::builder`].
pub struct Server {
    config: ServerConfig,
    bundle: Bundle,
    keys: Arc<Vec<KeysPair>>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub(crate) fn new(config: ServerConfig, bundle: Bundle) -> Self {
        let keys = Arc::new(config.keys.clone());
        Self {
            config,
            bundle,
            keys,
        }
    }

    /// Binds the configured address and serves until the listener fails.
    pub async fn run(self) -> ServerResult<()> {
        info!("starting with {}", self.config);
        let listener =
            TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        self.serve(listener).await
    }

    /// Serves connections from an already bound listener. Sessions run as
    /// detached tasks; a session failing, timing out or outright panicking
    /// never disturbs the accept loop.
    pub async fn serve(self, listener: TcpListener) -> ServerResult<()> {
        info!("listening on {}", listener.local_addr()?);
        let mut next_id = 0u64;
        loop {
            let (stream, peer) = listener.accept().await?;
            let id = next_id;
            next_id += 1;
            info!("session {}: connection from {}", id, peer);

            // The protocol is strict request/response; batching hurts.
            if let Err(e) = stream.set_nodelay(true) {
                info!("session {}: could not disable nagle: {}", id, e);
            }

            let session = self.session(id, stream);
            tokio::spawn(async move {
                if let Err(panic) = AssertUnwindSafe(session.run()).catch_unwind().await {
                    error!("session {}: crashed: {}", id, panic_message(&panic));
                }
            });
        }
    }

    fn session(&self, id: u64, stream: TcpStream) -> Session<OwnedReadHalf, OwnedWriteHalf> {
        let (rx, tx) = stream.into_split();
        let reader = match self.bundle.reader {
            ReaderKind::Plain => RecordReader::plain(rx),
            ReaderKind::Recharging => {
                RecordReader::recharging(rx, self.config.recharge_timeout())
            }
        };
        Session::new(
            id,
            reader,
            RecordWriter::new(tx),
            self.keys.clone(),
            self.bundle.planner,
            self.config.read_timeout(),
        )
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "opaque panic payload"
    }
}

// Per-connection supervision: one `Session` owns the transport pair for a
// single robot and walks it through authentication, navigation and the
// secret pickup, translating failures into their wire replies.
use crate::codec::ServerRecord;
use crate::config::{KeysPair, Planner};
use crate::session::auth::Authenticator;
use crate::session::nav::Navigator;
use crate::session::secret::SecretReceiver;
use crate::transport::{RecordReader, RecordWriter};
use crate::{Error, ServerResult};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

pub mod auth;
pub mod nav;
pub mod secret;

/// Protocol position of a session. Mostly diagnostic: control flow lives
/// in the phase services, but every log line and error report names the
/// state the connection died in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum SessionState {
    ReadingUsername,
    ReadingKeyId,
    SendingChallenge,
    AwaitingClientConfirmation,
    Orienting,
    Navigating,
    AwaitingSecret,
    Closed,
}

/// One robot connection, from accept to close.
pub struct Session<R, W> {
    id: u64,
    reader: RecordReader<R>,
    writer: RecordWriter<W>,
    keys: Arc<Vec<KeysPair>>,
    planner: Planner,
    read_timeout: Duration,
    state: SessionState,
}

impl<R: AsyncRead + Unpin, W: AsyncWrite + Unpin> Session<R, W> {
    pub fn new(
        id: u64,
        reader: RecordReader<R>,
        writer: RecordWriter<W>,
        keys: Arc<Vec<KeysPair>>,
        planner: Planner,
        read_timeout: Duration,
    ) -> Self {
        Self {
            id,
            reader,
            writer,
            keys,
            planner,
            read_timeout,
            state: SessionState::ReadingUsername,
        }
    }

    /// Runs the session to completion. Always closes the transport; never
    /// returns an error — by this point every failure is either reported
    /// to the peer or not worth reporting (the peer is gone).
    pub async fn run(mut self) {
        info!("session {}: opened", self.id);
        match self.drive().await {
            Ok(secret) => info!("session {}: secret delivered: {:?}", self.id, secret),
            Err(err) => self.report(&err).await,
        }
        self.state = SessionState::Closed;
        self.writer.close().await;
        info!("session {}: closed", self.id);
    }

    // The three phases, in protocol order. The first error wins.
    async fn drive(&mut self) -> ServerResult<String> {
        Authenticator::new(
            &mut self.reader,
            &mut self.writer,
            &self.keys,
            self.read_timeout,
            &mut self.state,
            self.id,
        )
        .authenticate()
        .await?;

        Navigator::new(
            &mut self.reader,
            &mut self.writer,
            self.planner,
            self.read_timeout,
            &mut self.state,
            self.id,
        )
        .guide_home()
        .await?;

        SecretReceiver::new(
            &mut self.reader,
            &mut self.writer,
            self.read_timeout,
            &mut self.state,
            self.id,
        )
        .receive()
        .await
    }

    // Wire-level error reporting. Timeouts and transport failures get no
    // reply; the peer is presumed gone.
    async fn report(&mut self, err: &Error) {
        warn!("session {}: failed in state {}: {}", self.id, self.state, err);
        let reply = match err {
            Error::Syntax(_) => Some(ServerRecord::SyntaxError),
            Error::Logic(_) => Some(ServerRecord::LogicError),
            Error::LoginFailed(_) => Some(ServerRecord::LoginFailed),
            Error::KeyOutOfRange(_) => Some(ServerRecord::KeyOutOfRange),
            Error::Timeout(_) | Error::Io(_) => None,
            // Re-mapped by the authenticator before it can get here.
            Error::NumberFormat(_) | Error::Config(_) => {
                error!("session {}: unmapped error kind: {}", self.id, err);
                None
            }
        };
        if let Some(record) = reply {
            if let Err(e) = self.writer.write(record).await {
                debug!("session {}: error reply not deliverable: {}", self.id, e);
            }
        }
    }
}

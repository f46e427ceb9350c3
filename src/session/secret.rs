// Final phase: the robot stands on the origin, the server asks for the
// secret it carries and logs it out.
use crate::codec::{self, ClientRecord, ServerRecord};
use crate::session::SessionState;
use crate::transport::{RecordReader, RecordWriter};
use crate::ServerResult;
use log::info;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

pub struct SecretReceiver<'a, R, W> {
    reader: &'a mut RecordReader<R>,
    writer: &'a mut RecordWriter<W>,
    read_timeout: Duration,
    state: &'a mut SessionState,
    id: u64,
}

impl<'a, R: AsyncRead + Unpin, W: AsyncWrite + Unpin> SecretReceiver<'a, R, W> {
    pub fn new(
        reader: &'a mut RecordReader<R>,
        writer: &'a mut RecordWriter<W>,
        read_timeout: Duration,
        state: &'a mut SessionState,
        id: u64,
    ) -> Self {
        Self {
            reader,
            writer,
            read_timeout,
            state,
            id,
        }
    }

    /// One pickup/logout exchange. Read or parse failures surface to the
    /// session controller, which owns the wire-level reporting.
    pub async fn receive(&mut self) -> ServerResult<String> {
        *self.state = SessionState::AwaitingSecret;
        self.writer.write(ServerRecord::PickUp).await?;
        let record = self
            .reader
            .read(ClientRecord::Message.max_len(), self.read_timeout)
            .await?;
        let secret = codec::decode_message(&record)?;
        self.writer.write(ServerRecord::Logout).await?;
        info!("session {}: received a {} byte secret", self.id, secret.len());
        Ok(secret)
    }
}

// Outbound half of the transport: renders a record, appends the sentinel
// and flushes before the caller issues its next read.
use crate::ServerResult;
use crate::codec::{SENTINEL, ServerRecord};
use log::debug;
use std::io::ErrorKind;
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub struct RecordWriter<W> {
    stream: W,
}

impl<W: AsyncWrite + Unpin> RecordWriter<W> {
    pub fn new(stream: W) -> Self {
        Self { stream }
    }

    /// Sends one record. The flush keeps the per-connection ordering
    /// guarantee: the record is on the wire before the next read starts.
    pub async fn write(&mut self, record: ServerRecord) -> ServerResult<()> {
        let mut buffer = record.encode();
        buffer.extend_from_slice(&SENTINEL);
        debug!("sending {:?}", record);
        self.stream.write_all(&buffer).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Half-closes the transport. A peer that already hung up is routine
    /// at this point and not worth surfacing.
    pub async fn close(&mut self) {
        match self.stream.shutdown().await {
            Ok(()) => {}
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::ConnectionReset | ErrorKind::BrokenPipe | ErrorKind::NotConnected
                ) =>
            {
                debug!("peer closed first: {}", e);
            }
            Err(e) => debug!("shutdown failed: {}", e),
        }
    }
}

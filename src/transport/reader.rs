// Inbound half of the transport. `FrameReader` extracts single sentinel
// terminated records from the arbitrarily chunked byte stream;
// `RecordReader` layers the RECHARGING / FULL POWER pause protocol on top.
use crate::codec::{self, CONTROL_MAX_LEN, SENTINEL};
use crate::transport::CHUNK_SIZE;
use crate::{Error, ServerResult};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use log::{debug, trace};
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;

/// Pulls delimited records out of a byte stream.
///
/// The reader is stateful: bytes that arrive in the same chunk as a
/// sentinel but belong to the next record wait in `leftover` for the next
/// call. The sentinel matcher also survives chunk and call boundaries, so
/// a record may end with its sentinel split across two TCP segments (or
/// with one sentinel byte parked in `leftover`).
pub struct FrameReader<R> {
    stream: R,
    leftover: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(stream: R) -> Self {
        Self {
            stream,
            leftover: BytesMut::new(),
        }
    }

    /// Reads one record of at most `max_len` payload bytes, returned with
    /// its sentinel. Each chunk read gets `read_timeout`; an elapsed
    /// deadline, an empty read, and a connection reset all mean the peer is
    /// gone and map to [`Error::Timeout`].
    pub async fn read(&mut self, max_len: usize, read_timeout: Duration) -> ServerResult<Bytes> {
        let mut record = BytesMut::with_capacity(max_len + SENTINEL.len());
        // How much of the sentinel the tail of `record` currently matches.
        let mut matched = 0usize;

        loop {
            // Drain buffered bytes before touching the socket.
            while self.leftover.has_remaining() {
                let byte = self.leftover.get_u8();
                record.put_u8(byte);

                if byte == SENTINEL[matched] {
                    matched += 1;
                } else if byte == SENTINEL[0] {
                    // Mismatch mid-sentinel: this byte may still open a
                    // fresh match, so recheck it from state zero.
                    matched = 1;
                } else {
                    matched = 0;
                }

                if matched == SENTINEL.len() {
                    trace!("framed {} byte record", record.len());
                    return Ok(record.freeze());
                }
                if record.len() - matched > max_len {
                    return Err(Error::Syntax("missing message separator".to_string()));
                }
            }

            let mut chunk = [0u8; CHUNK_SIZE];
            let count = match timeout(read_timeout, self.stream.read(&mut chunk)).await {
                Err(_) => return Err(Error::Timeout("no data before deadline".to_string())),
                Ok(Ok(0)) => return Err(Error::Timeout("peer closed".to_string())),
                Ok(Ok(count)) => count,
                Ok(Err(e)) if e.kind() == ErrorKind::ConnectionReset => {
                    return Err(Error::Timeout("peer reset".to_string()));
                }
                Ok(Err(e)) => return Err(Error::Io(e)),
            };
            trace!("{} byte chunk in", count);
            self.leftover.extend_from_slice(&chunk[..count]);
        }
    }
}

// What a record's payload means to the pause protocol.
enum Control {
    Recharging,
    FullPower,
}

fn control(record: &[u8]) -> Option<Control> {
    match codec::payload(record) {
        Some(payload) if payload == codec::RECHARGING.as_bytes() => Some(Control::Recharging),
        Some(payload) if payload == codec::FULL_POWER.as_bytes() => Some(Control::FullPower),
        _ => None,
    }
}

// A payload longer than the caller's cap only got through because the cap
// was raised to recognize control literals. Cutting it back below the
// sentinel makes the codec report the missing separator.
fn clip(record: Bytes, max_len: usize) -> Bytes {
    if record.len() > max_len + SENTINEL.len() {
        record.slice(..max_len)
    } else {
        record
    }
}

/// The per-role reader seam: one variant per reference bundle.
///
/// Both variants widen the framing cap to `max(max_len, 10)` so that the
/// control literals are recognized even where a shorter record was
/// expected, and both truncate oversized non-control records so the codec
/// rejects them as syntax errors. They differ in what a control record means:
/// the plain reader treats any of them as a protocol violation, the
/// recharging reader absorbs whole RECHARGING .. FULL POWER pauses and
/// transparently retries the read the caller asked for.
pub enum RecordReader<R> {
    Plain(FrameReader<R>),
    Recharging {
        inner: FrameReader<R>,
        pause_timeout: Duration,
    },
}

impl<R: AsyncRead + Unpin> RecordReader<R> {
    pub fn plain(stream: R) -> Self {
        RecordReader::Plain(FrameReader::new(stream))
    }

    pub fn recharging(stream: R, pause_timeout: Duration) -> Self {
        RecordReader::Recharging {
            inner: FrameReader::new(stream),
            pause_timeout,
        }
    }

    /// Reads the next record for the caller, handling control records per
    /// the variant's policy. Framing errors and timeouts pass through
    /// unchanged.
    pub async fn read(&mut self, max_len: usize, read_timeout: Duration) -> ServerResult<Bytes> {
        let framing_cap = max_len.max(CONTROL_MAX_LEN);
        match self {
            RecordReader::Plain(inner) => {
                let record = inner.read(framing_cap, read_timeout).await?;
                match control(&record) {
                    Some(_) => Err(Error::Logic("unexpected control record".to_string())),
                    None => Ok(clip(record, max_len)),
                }
            }
            RecordReader::Recharging {
                inner,
                pause_timeout,
            } => {
                loop {
                    let record = inner.read(framing_cap, read_timeout).await?;
                    match control(&record) {
                        Some(Control::Recharging) => {
                            debug!("client recharging");
                            let ack = inner.read(CONTROL_MAX_LEN, *pause_timeout).await?;
                            if !matches!(control(&ack), Some(Control::FullPower)) {
                                return Err(Error::Logic(
                                    "expected FULL POWER to end recharging".to_string(),
                                ));
                            }
                            debug!("client back at full power");
                            // Retry the read the caller actually wanted.
                        }
                        Some(Control::FullPower) => {
                            return Err(Error::Logic(
                                "FULL POWER without a preceding RECHARGING".to_string(),
                            ));
                        }
                        None => return Ok(clip(record, max_len)),
                    }
                }
            }
        }
    }
}

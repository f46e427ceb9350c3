// Challenge-response authentication phase. Both sides prove they hold the
// key pair the client picked from the shared table; the proof is a hash of
// the username offset by the respective key, modulo 2^16.
use crate::codec::{self, ClientRecord, ServerRecord};
use crate::config::KeysPair;
use crate::session::SessionState;
use crate::transport::{RecordReader, RecordWriter};
use crate::{Error, ServerResult};
use log::info;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

/// Runs the authentication sub-protocol for one session.
pub struct Authenticator<'a, R, W> {
    reader: &'a mut RecordReader<R>,
    writer: &'a mut RecordWriter<W>,
    keys: &'a [KeysPair],
    read_timeout: Duration,
    state: &'a mut SessionState,
    id: u64,
}

impl<'a, R: AsyncRead + Unpin, W: AsyncWrite + Unpin> Authenticator<'a, R, W> {
    pub fn new(
        reader: &'a mut RecordReader<R>,
        writer: &'a mut RecordWriter<W>,
        keys: &'a [KeysPair],
        read_timeout: Duration,
        state: &'a mut SessionState,
        id: u64,
    ) -> Self {
        Self {
            reader,
            writer,
            keys,
            read_timeout,
            state,
            id,
        }
    }

    /// The full exchange: username, key request, challenge, confirmation,
    /// OK. Strictly ordered; the first failure aborts the session.
    pub async fn authenticate(&mut self) -> ServerResult<()> {
        *self.state = SessionState::ReadingUsername;
        let username = self.read_username().await?;
        info!("session {}: authenticating {:?}", self.id, username);

        self.writer.write(ServerRecord::KeyRequest).await?;

        *self.state = SessionState::ReadingKeyId;
        let pair = self.read_key_pair().await?;

        let name_hash = name_hash(&username);

        *self.state = SessionState::SendingChallenge;
        self.writer
            .write(ServerRecord::Confirmation(encode_hash(
                name_hash,
                pair.server_key,
            )))
            .await?;

        *self.state = SessionState::AwaitingClientConfirmation;
        self.check_confirmation(name_hash, pair.client_key).await?;

        self.writer.write(ServerRecord::Ok).await?;
        info!("session {}: authenticated", self.id);
        Ok(())
    }

    async fn read_username(&mut self) -> ServerResult<String> {
        let record = self
            .reader
            .read(ClientRecord::Username.max_len(), self.read_timeout)
            .await?;
        codec::decode_username(&record)
    }

    // A malformed-number KEY_ID deliberately reports as out-of-range, not
    // as a syntax error; genuine syntax errors pass through.
    async fn read_key_pair(&mut self) -> ServerResult<KeysPair> {
        let record = self
            .reader
            .read(ClientRecord::KeyId.max_len(), self.read_timeout)
            .await?;
        let key_id = match codec::decode_key_id(&record) {
            Ok(key_id) => key_id,
            Err(Error::NumberFormat(msg)) => return Err(Error::KeyOutOfRange(msg)),
            Err(e) => return Err(e),
        };
        self.keys
            .get(usize::from(key_id))
            .copied()
            .ok_or_else(|| Error::KeyOutOfRange(format!("no key pair with id {}", key_id)))
    }

    // The counterpart mapping: a malformed confirmation number is a failed
    // login, as is a well-formed one that decodes to the wrong hash.
    async fn check_confirmation(&mut self, name_hash: u16, client_key: u16) -> ServerResult<()> {
        let record = self
            .reader
            .read(ClientRecord::Confirmation.max_len(), self.read_timeout)
            .await?;
        let value = match codec::decode_confirmation(&record) {
            Ok(value) => value,
            Err(Error::NumberFormat(msg)) => return Err(Error::LoginFailed(msg)),
            Err(e) => return Err(e),
        };
        if decode_hash(value, client_key) != name_hash {
            return Err(Error::LoginFailed(format!(
                "confirmation {} does not decode to the username hash",
                value
            )));
        }
        Ok(())
    }
}

/// Hash of a username: byte sum times 1000, modulo 2^16. Public because
/// client implementations need the same arithmetic.
pub fn name_hash(username: &str) -> u16 {
    let sum: u32 = username.bytes().map(u32::from).sum();
    (sum.wrapping_mul(1000) % 0x10000) as u16
}

/// Offsetting a hash by a key is addition modulo 2^16, which is exactly
/// u16 wrapping arithmetic.
pub fn encode_hash(name_hash: u16, key: u16) -> u16 {
    name_hash.wrapping_add(key)
}

/// Inverse of [`encode_hash`].
pub fn decode_hash(value: u16, key: u16) -> u16 {
    value.wrapping_sub(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SENTINEL;
    use crate::config::DEFAULT_KEYS;
    use tokio::io::{AsyncWriteExt, DuplexStream, duplex};

    const TIMEOUT: Duration = Duration::from_millis(200);

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut record = payload.to_vec();
        record.extend_from_slice(&SENTINEL);
        record
    }

    #[test]
    fn hash_of_reference_username() {
        // 'M' + 'n' + 'a' + 'u' = 401; 401000 mod 65536 = 7784.
        assert_eq!(name_hash("Mnau"), 7784);
    }

    #[test]
    fn encode_decode_round_trip() {
        for username in ["a", "Mnau", "Oddjob", "eighteen__chars_18"] {
            let hash = name_hash(username);
            for pair in DEFAULT_KEYS {
                assert_eq!(decode_hash(encode_hash(hash, pair.server_key), pair.server_key), hash);
                assert_eq!(decode_hash(encode_hash(hash, pair.client_key), pair.client_key), hash);
            }
        }
    }

    #[test]
    fn hash_wraps_modulo_16_bits() {
        // 18 'z' bytes: 122 * 18 * 1000 = 2196000, which needs the modulo.
        assert_eq!(
            name_hash("zzzzzzzzzzzzzzzzzz"),
            (2_196_000u32 % 0x10000) as u16
        );
    }

    struct Peer {
        reader: RecordReader<DuplexStream>,
        writer: RecordWriter<DuplexStream>,
        state: SessionState,
    }

    fn peer() -> (Peer, DuplexStream, DuplexStream) {
        let (client_tx, server_rx) = duplex(256);
        let (server_tx, client_rx) = duplex(256);
        (
            Peer {
                reader: RecordReader::recharging(server_rx, Duration::from_millis(500)),
                writer: RecordWriter::new(server_tx),
                state: SessionState::ReadingUsername,
            },
            client_tx,
            client_rx,
        )
    }

    async fn authenticate(peer: &mut Peer) -> ServerResult<()> {
        let keys = DEFAULT_KEYS.to_vec();
        Authenticator::new(
            &mut peer.reader,
            &mut peer.writer,
            &keys,
            TIMEOUT,
            &mut peer.state,
            0,
        )
        .authenticate()
        .await
    }

    #[tokio::test]
    async fn happy_path_with_key_two() {
        let (mut peer, mut client_tx, client_rx) = peer();

        // name_hash("Mnau") = 7784; server key 18789 -> challenge 26573;
        // client key 13603 -> confirmation 21387.
        let script = tokio::spawn(async move {
            client_tx.write_all(&framed(b"Mnau")).await.unwrap();
            client_tx.write_all(&framed(b"2")).await.unwrap();
            client_tx.write_all(&framed(b"21387")).await.unwrap();
            client_rx
        });

        authenticate(&mut peer).await.unwrap();
        assert_eq!(peer.state, SessionState::AwaitingClientConfirmation);

        let mut client_rx = script.await.unwrap();
        peer.writer.close().await;
        let mut sent = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut client_rx, &mut sent)
            .await
            .unwrap();
        assert_eq!(
            sent,
            [
                framed(b"107 KEY REQUEST"),
                framed(b"26573"),
                framed(b"200 OK"),
            ]
            .concat()
        );
    }

    #[tokio::test]
    async fn wrong_confirmation_fails_login() {
        let (mut peer, mut client_tx, _client_rx) = peer();

        let script = tokio::spawn(async move {
            client_tx.write_all(&framed(b"Mnau")).await.unwrap();
            client_tx.write_all(&framed(b"2")).await.unwrap();
            client_tx.write_all(&framed(b"21388")).await.unwrap();
            std::mem::forget(client_tx);
        });

        let err = authenticate(&mut peer).await.unwrap_err();
        assert!(matches!(err, Error::LoginFailed(_)), "{:?}", err);
        script.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_confirmation_number_fails_login() {
        let (mut peer, mut client_tx, _client_rx) = peer();

        let script = tokio::spawn(async move {
            client_tx.write_all(&framed(b"Mnau")).await.unwrap();
            client_tx.write_all(&framed(b"2")).await.unwrap();
            // Numeric but out of the 16-bit range.
            client_tx.write_all(&framed(b"99999")).await.unwrap();
            std::mem::forget(client_tx);
        });

        let err = authenticate(&mut peer).await.unwrap_err();
        assert!(matches!(err, Error::LoginFailed(_)), "{:?}", err);
        script.await.unwrap();
    }

    #[tokio::test]
    async fn key_id_past_the_table_is_out_of_range() {
        let (mut peer, mut client_tx, _client_rx) = peer();

        let script = tokio::spawn(async move {
            client_tx.write_all(&framed(b"Mnau")).await.unwrap();
            client_tx.write_all(&framed(b"7")).await.unwrap();
            std::mem::forget(client_tx);
        });

        let err = authenticate(&mut peer).await.unwrap_err();
        assert!(matches!(err, Error::KeyOutOfRange(_)), "{:?}", err);
        script.await.unwrap();
    }

    #[tokio::test]
    async fn negative_key_id_is_out_of_range_not_syntax() {
        let (mut peer, mut client_tx, _client_rx) = peer();

        let script = tokio::spawn(async move {
            client_tx.write_all(&framed(b"Mnau")).await.unwrap();
            client_tx.write_all(&framed(b"-1")).await.unwrap();
            std::mem::forget(client_tx);
        });

        let err = authenticate(&mut peer).await.unwrap_err();
        assert!(matches!(err, Error::KeyOutOfRange(_)), "{:?}", err);
        script.await.unwrap();
    }

    #[tokio::test]
    async fn garbage_key_id_is_a_syntax_error() {
        let (mut peer, mut client_tx, _client_rx) = peer();

        let script = tokio::spawn(async move {
            client_tx.write_all(&framed(b"Mnau")).await.unwrap();
            client_tx.write_all(&framed(b"abc")).await.unwrap();
            std::mem::forget(client_tx);
        });

        let err = authenticate(&mut peer).await.unwrap_err();
        assert!(matches!(err, Error::Syntax(_)), "{:?}", err);
        script.await.unwrap();
    }

    #[tokio::test]
    async fn recharging_during_login_is_absorbed() {
        let (mut peer, mut client_tx, _client_rx) = peer();

        let script = tokio::spawn(async move {
            client_tx.write_all(&framed(b"RECHARGING")).await.unwrap();
            client_tx.write_all(&framed(b"FULL POWER")).await.unwrap();
            client_tx.write_all(&framed(b"Mnau")).await.unwrap();
            client_tx.write_all(&framed(b"2")).await.unwrap();
            client_tx.write_all(&framed(b"21387")).await.unwrap();
            std::mem::forget(client_tx);
        });

        authenticate(&mut peer).await.unwrap();
        script.await.unwrap();
    }
}

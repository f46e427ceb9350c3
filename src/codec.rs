// Wire grammar of the robot protocol: record types, their length caps, and
// the byte <-> value translation. Pure functions, no I/O; framing is the
// transport layer's job.
use crate::grid::Coord;
use crate::{Error, ServerResult};
use std::fmt::Display;

/// Two-byte end-of-record marker.
pub const SENTINEL: [u8; 2] = [0x07, 0x08];

/// Payload of the pause announcement a client may interject anywhere.
pub const RECHARGING: &str = "RECHARGING";

/// Payload closing a recharging pause.
pub const FULL_POWER: &str = "FULL POWER";

/// Both control literals are 10 bytes; a reader must be willing to accept
/// at least this much payload to recognize them.
pub const CONTROL_MAX_LEN: usize = RECHARGING.len();

/// Record types a client sends, with their maximum payload lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ClientRecord {
    Username,
    KeyId,
    Confirmation,
    Position,
    Message,
    Recharging,
    FullPower,
}

impl ClientRecord {
    /// Maximum payload length, excluding the sentinel. Exceeding this
    /// before a sentinel shows up is a framing error.
    pub fn max_len(self) -> usize {
        match self {
            ClientRecord::Username => 18,
            ClientRecord::KeyId => 3,
            ClientRecord::Confirmation => 5,
            ClientRecord::Position => 10,
            ClientRecord::Message => 98,
            ClientRecord::Recharging => CONTROL_MAX_LEN,
            ClientRecord::FullPower => CONTROL_MAX_LEN,
        }
    }
}

/// Records the server sends. All payloads are fixed literals except the
/// confirmation number, rendered as plain decimal with no padding or sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerRecord {
    Confirmation(u16),
    Move,
    TurnLeft,
    TurnRight,
    PickUp,
    Logout,
    KeyRequest,
    Ok,
    LoginFailed,
    SyntaxError,
    LogicError,
    KeyOutOfRange,
}

impl Display for ServerRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerRecord::Confirmation(value) => write!(f, "{}", value),
            ServerRecord::Move => write!(f, "102 MOVE"),
            ServerRecord::TurnLeft => write!(f, "103 TURN LEFT"),
            ServerRecord::TurnRight => write!(f, "104 TURN RIGHT"),
            ServerRecord::PickUp => write!(f, "105 GET MESSAGE"),
            ServerRecord::Logout => write!(f, "106 LOGOUT"),
            ServerRecord::KeyRequest => write!(f, "107 KEY REQUEST"),
            ServerRecord::Ok => write!(f, "200 OK"),
            ServerRecord::LoginFailed => write!(f, "300 LOGIN FAILED"),
            ServerRecord::SyntaxError => write!(f, "301 SYNTAX ERROR"),
            ServerRecord::LogicError => write!(f, "302 LOGIC ERROR"),
            ServerRecord::KeyOutOfRange => write!(f, "303 KEY OUT OF RANGE"),
        }
    }
}

impl ServerRecord {
    /// Payload bytes for the wire. The writer appends the sentinel.
    pub fn encode(self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

/// The payload of a complete record, or `None` when the sentinel is absent.
pub fn payload(record: &[u8]) -> Option<&[u8]> {
    record.strip_suffix(&SENTINEL)
}

// Sentinel check, ASCII check, then the payload as &str.
fn strip(record: &[u8]) -> ServerResult<&str> {
    let payload =
        payload(record).ok_or_else(|| Error::Syntax("missing message separator".to_string()))?;
    if !payload.is_ascii() {
        return Err(Error::Syntax("payload is not ASCII".to_string()));
    }
    std::str::from_utf8(payload).map_err(|e| Error::Syntax(e.to_string()))
}

// Shared grammar of the two numeric records: an optional sign followed by
// digits, length-capped. Range checks are the caller's, after parsing.
fn parse_int(payload: &str, max_len: usize) -> ServerResult<i64> {
    if payload.is_empty() || payload.len() > max_len {
        return Err(Error::Syntax(format!(
            "numeric payload must be 1..={} characters, got {}",
            max_len,
            payload.len()
        )));
    }
    payload
        .parse::<i64>()
        .map_err(|_| Error::Syntax(format!("not a number: {:?}", payload)))
}

/// USERNAME: any non-empty ASCII payload up to 18 bytes.
pub fn decode_username(record: &[u8]) -> ServerResult<String> {
    let payload = strip(record)?;
    if payload.is_empty() || payload.len() > ClientRecord::Username.max_len() {
        return Err(Error::Syntax(format!("invalid username: {:?}", payload)));
    }
    Ok(payload.to_string())
}

/// KEY_ID: integer in `[0, 999]`. Out-of-range numbers are a number-format
/// error, which the authenticator translates for the wire.
pub fn decode_key_id(record: &[u8]) -> ServerResult<u16> {
    let value = parse_int(strip(record)?, ClientRecord::KeyId.max_len())?;
    if (0..=999).contains(&value) {
        Ok(value as u16)
    } else {
        Err(Error::NumberFormat(format!(
            "key id {} outside [0, 999]",
            value
        )))
    }
}

/// CONFIRMATION: integer in `[0, 65535]`.
pub fn decode_confirmation(record: &[u8]) -> ServerResult<u16> {
    let value = parse_int(strip(record)?, ClientRecord::Confirmation.max_len())?;
    if (0..=0xFFFF).contains(&value) {
        Ok(value as u16)
    } else {
        Err(Error::NumberFormat(format!(
            "confirmation {} is not a 16-bit value",
            value
        )))
    }
}

/// OK_POSITION: `OK <x> <y>` with single spaces and signed integers.
pub fn decode_position(record: &[u8]) -> ServerResult<Coord> {
    let payload = strip(record)?;
    let invalid = || Error::Syntax(format!("invalid position report: {:?}", payload));
    if payload.is_empty() || payload.len() > ClientRecord::Position.max_len() {
        return Err(invalid());
    }
    // Splitting on single spaces makes doubled or trailing separators show
    // up as empty fields, which fail the integer parse below.
    let mut fields = payload.split(' ');
    match (fields.next(), fields.next(), fields.next(), fields.next()) {
        (Some("OK"), Some(x), Some(y), None) => {
            let x = x.parse::<i32>().map_err(|_| invalid())?;
            let y = y.parse::<i32>().map_err(|_| invalid())?;
            Ok(Coord::new(x, y))
        }
        _ => Err(invalid()),
    }
}

/// MESSAGE: any non-empty ASCII payload up to 98 bytes.
pub fn decode_message(record: &[u8]) -> ServerResult<String> {
    let payload = strip(record)?;
    if payload.is_empty() || payload.len() > ClientRecord::Message.max_len() {
        return Err(Error::Syntax(format!(
            "invalid message payload of {} bytes",
            payload.len()
        )));
    }
    Ok(payload.to_string())
}

/// RECHARGING: the exact literal, nothing else.
pub fn decode_recharging(record: &[u8]) -> ServerResult<()> {
    match strip(record)? {
        RECHARGING => Ok(()),
        other => Err(Error::Syntax(format!(
            "expected {:?}, got {:?}",
            RECHARGING, other
        ))),
    }
}

/// FULL_POWER: the exact literal, nothing else.
pub fn decode_full_power(record: &[u8]) -> ServerResult<()> {
    match strip(record)? {
        FULL_POWER => Ok(()),
        other => Err(Error::Syntax(format!(
            "expected {:?}, got {:?}",
            FULL_POWER, other
        ))),
    }
}

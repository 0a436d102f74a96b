//! Text wire protocol between the server and its clients
//!
//! Every message is a single line. Message grammars:
//!
//! | message | direction | grammar |
//! |---|---|---|
//! | join | client → server | `3` (the `GAME` operation code) |
//! | handshake | server → client | `<player_count>,<board_width>,<board_height>` |
//! | move | client → server | `<direction code>` |
//! | snapshot | server → client | `<x>.<y>.<dir>.` once per player, in slot order |
//! | game over | server → client | `end,<crashed_player>,<tick>` |
//! | rejection | server → client | `error,<reason>` |
//!
//! Decoding is strict: fields have bounded widths and any leftover input is
//! an error.

use crate::{Direction, PlayerState, Position, MAX_MESSAGE_SIZE};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Coordinates on the wire never exceed this many decimal digits.
pub const MAX_COORD_DIGITS: usize = 4;
const MAX_COUNTER_DIGITS: usize = 20;

const TRIPLET_SEPARATOR: char = '.';
const FIELD_SEPARATOR: char = ',';
const GAME_OVER_TAG: &str = "end";
const REJECTION_TAG: &str = "error";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty message")]
    Empty,
    #[error("message of {0} bytes exceeds the {limit} byte limit", limit = MAX_MESSAGE_SIZE)]
    MessageTooLong(usize),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("invalid value {value:?} for field `{field}`")]
    InvalidField { field: &'static str, value: String },
    #[error("field `{field}` is wider than {max} digits")]
    FieldTooWide { field: &'static str, max: usize },
    #[error("unknown direction code {0}")]
    UnknownDirection(u64),
    #[error("unknown operation code {0}")]
    UnknownOperation(u64),
    #[error("unexpected trailing data {0:?}")]
    TrailingData(String),
    #[error("rejected by server: {0}")]
    Rejected(String),
}

/// Operation codes a client may open a session with. Only [`Operation::Game`]
/// is accepted as a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Start = 0,
    End = 1,
    Update = 2,
    Game = 3,
}

impl Operation {
    pub const JOIN: Operation = Operation::Game;

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Operation::Start),
            1 => Some(Operation::End),
            2 => Some(Operation::Update),
            3 => Some(Operation::Game),
            _ => None,
        }
    }

    pub fn encode(self) -> String {
        (self as u8).to_string()
    }

    pub fn decode(message: &str) -> Result<Self, ProtocolError> {
        let code = parse_number("operation", message.trim(), MAX_COUNTER_DIGITS)?;
        Self::from_code(code).ok_or(ProtocolError::UnknownOperation(code))
    }
}

impl Direction {
    pub fn encode(self) -> String {
        self.code().to_string()
    }

    pub fn decode(message: &str) -> Result<Self, ProtocolError> {
        parse_direction(message.trim())
    }
}

/// Reply to a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    pub player_count: usize,
    pub width: usize,
    pub height: usize,
}

impl Handshake {
    pub fn encode(&self) -> String {
        format!("{}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}", self.player_count, self.width, self.height)
    }

    pub fn decode(message: &str) -> Result<Self, ProtocolError> {
        check_rejection(message)?;
        let mut fields = message.split(FIELD_SEPARATOR);
        let player_count = next_number(&mut fields, "player_count")?;
        let width = next_number(&mut fields, "board_width")?;
        let height = next_number(&mut fields, "board_height")?;

        let rest: Vec<&str> = fields.collect();
        if !rest.is_empty() {
            return Err(ProtocolError::TrailingData(rest.join(",")));
        }

        Ok(Self {
            player_count,
            width,
            height,
        })
    }
}

/// State of every slot after a tick, in slot order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub players: Vec<PlayerState>,
}

impl Snapshot {
    pub fn new(players: Vec<PlayerState>) -> Self {
        Self { players }
    }

    pub fn encode(&self) -> String {
        let mut message = String::with_capacity(self.players.len() * 12);
        for player in &self.players {
            message.push_str(&format!(
                "{}{TRIPLET_SEPARATOR}{}{TRIPLET_SEPARATOR}{}{TRIPLET_SEPARATOR}",
                player.position.x,
                player.position.y,
                player.direction.code()
            ));
        }
        message
    }

    /// Decodes exactly `player_count` triplets, left to right.
    pub fn decode(message: &str, player_count: usize) -> Result<Self, ProtocolError> {
        check_rejection(message)?;
        let mut rest = message;
        let mut players = Vec::with_capacity(player_count);

        for _ in 0..player_count {
            let x = take_triplet_field(&mut rest, "x", MAX_COORD_DIGITS)?;
            let y = take_triplet_field(&mut rest, "y", MAX_COORD_DIGITS)?;
            let direction = take_triplet_field(&mut rest, "direction", 1)?;
            let direction = Direction::from_code(direction as u8)
                .ok_or(ProtocolError::UnknownDirection(direction))?;

            players.push(PlayerState {
                position: Position::new(x as usize, y as usize),
                direction,
            });
        }

        if !rest.is_empty() {
            return Err(ProtocolError::TrailingData(rest.to_string()));
        }

        Ok(Self { players })
    }
}

/// Anything the server sends once the game is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerUpdate {
    Snapshot(Snapshot),
    GameOver { crashed_player: usize, tick: u64 },
}

impl ServerUpdate {
    pub fn encode(&self) -> String {
        match self {
            ServerUpdate::Snapshot(snapshot) => snapshot.encode(),
            ServerUpdate::GameOver {
                crashed_player,
                tick,
            } => format!("{GAME_OVER_TAG}{FIELD_SEPARATOR}{crashed_player}{FIELD_SEPARATOR}{tick}"),
        }
    }

    pub fn decode(message: &str, player_count: usize) -> Result<Self, ProtocolError> {
        check_rejection(message)?;

        let game_over_prefix = format!("{GAME_OVER_TAG}{FIELD_SEPARATOR}");
        let Some(body) = message.strip_prefix(&game_over_prefix) else {
            return Snapshot::decode(message, player_count).map(ServerUpdate::Snapshot);
        };

        let mut fields = body.split(FIELD_SEPARATOR);
        let crashed_player = next_number(&mut fields, "crashed_player")?;
        let tick = match fields.next() {
            Some(value) => parse_number("tick", value, MAX_COUNTER_DIGITS)?,
            None => return Err(ProtocolError::MissingField("tick")),
        };
        if let Some(extra) = fields.next() {
            return Err(ProtocolError::TrailingData(extra.to_string()));
        }

        Ok(ServerUpdate::GameOver {
            crashed_player,
            tick,
        })
    }
}

/// Builds the line sent before the server drops a misbehaving client.
pub fn encode_rejection(reason: &str) -> String {
    let reason: String = reason
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let mut message = format!("{REJECTION_TAG}{FIELD_SEPARATOR}{reason}");
    if message.len() > MAX_MESSAGE_SIZE {
        let mut cut = MAX_MESSAGE_SIZE;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }
    message
}

fn check_rejection(message: &str) -> Result<(), ProtocolError> {
    if message.is_empty() {
        return Err(ProtocolError::Empty);
    }
    let prefix = format!("{REJECTION_TAG}{FIELD_SEPARATOR}");
    match message.strip_prefix(&prefix) {
        Some(reason) => Err(ProtocolError::Rejected(reason.to_string())),
        None => Ok(()),
    }
}

fn parse_direction(value: &str) -> Result<Direction, ProtocolError> {
    let code = parse_number("direction", value, 1)?;
    Direction::from_code(code as u8).ok_or(ProtocolError::UnknownDirection(code))
}

fn parse_number(field: &'static str, value: &str, max_digits: usize) -> Result<u64, ProtocolError> {
    if value.is_empty() {
        return Err(ProtocolError::MissingField(field));
    }
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProtocolError::InvalidField {
            field,
            value: value.to_string(),
        });
    }
    if value.len() > max_digits {
        return Err(ProtocolError::FieldTooWide {
            field,
            max: max_digits,
        });
    }
    value.parse().map_err(|_| ProtocolError::InvalidField {
        field,
        value: value.to_string(),
    })
}

fn next_number<'a>(
    fields: &mut impl Iterator<Item = &'a str>,
    field: &'static str,
) -> Result<usize, ProtocolError> {
    let value = fields.next().ok_or(ProtocolError::MissingField(field))?;
    Ok(parse_number(field, value, MAX_COORD_DIGITS)? as usize)
}

fn take_triplet_field(
    rest: &mut &str,
    field: &'static str,
    max_digits: usize,
) -> Result<u64, ProtocolError> {
    let Some((value, remainder)) = rest.split_once(TRIPLET_SEPARATOR) else {
        return Err(ProtocolError::MissingField(field));
    };
    let number = parse_number(field, value, max_digits)?;
    *rest = remainder;
    Ok(number)
}

/// Reads one newline-terminated message, without the terminator.
///
/// Returns `Ok(None)` once the peer has closed the stream. Oversized lines
/// fail with `InvalidData` wrapping [`ProtocolError::MessageTooLong`].
pub async fn read_message<R>(reader: &mut R) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    // Room for the message plus "\r\n"
    let limit = (MAX_MESSAGE_SIZE + 2) as u64;
    let read = (&mut *reader).take(limit).read_line(&mut line).await?;
    if read == 0 {
        return Ok(None);
    }

    let len = line.trim_end_matches(&['\r', '\n'][..]).len();
    if len > MAX_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            ProtocolError::MessageTooLong(len),
        ));
    }
    line.truncate(len);
    Ok(Some(line))
}

/// Writes `message` followed by a newline.
pub async fn write_message<W>(writer: &mut W, message: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if message.len() > MAX_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            ProtocolError::MessageTooLong(message.len()),
        ));
    }
    if message.contains('\n') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "message contains a line break",
        ));
    }

    let mut framed = String::with_capacity(message.len() + 1);
    framed.push_str(message);
    framed.push('\n');
    writer.write_all(framed.as_bytes()).await?;
    writer.flush().await
}

use std::fmt::Display;

use crate::utils::checksum::CheckSum;
use crate::utils::errors::ProtocolError;

/// Size of a serialized header, delimiter included.
pub const HEADER_LENGTH: usize = 6;

/// Largest payload the two length bytes can announce.
pub const MAX_PAYLOAD_LENGTH: usize = u16::MAX as usize;

const DELIMITER: u8 = 0x0A;

/// Represents the type of message in a protocol packet.
///
/// Each variant maps to the `u8` sent as the first header byte.
///
/// ### Session (0x00–0x03)
/// - `Disconnect`, `Connect`, `Ping`, `Connected`.
///
/// ### Requests (0x10–0x24)
/// - Room requests in 0x1_, card requests in 0x2_.
///
/// ### Responses (0x40–0x44)
/// - `CardCompleted` is broadcast to every connection.
///
/// ### Errors (0xF0–0xFE)
/// - `Rejected` carries an `ErrorView`; the others carry text or nothing.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderType {
    Disconnect = 0x00,
    Connect = 0x01,
    Ping = 0x02,
    Connected = 0x03,

    CreateGame = 0x10,
    ListGames = 0x11,
    GetGame = 0x12,
    UpdateGame = 0x13,
    CompleteGame = 0x14,

    GenerateCard = 0x20,
    GetCards = 0x21,
    MarkCell = 0x22,
    MarkNumber = 0x23,
    UpdateGoals = 0x24,

    Game = 0x40,
    GameList = 0x41,
    Card = 0x42,
    CardList = 0x43,
    CardCompleted = 0x44,

    NotConnected = 0xF0,
    InvalidPacketPayload = 0xF1,
    Rejected = 0xF2,
    InvalidHeader = 0xFA,
    AlreadyConnected = 0xFB,
    InvalidPlayerData = 0xFC,
    InvalidChecksum = 0xFD,
    ERROR = 0xFE,
}

impl Display for HeaderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            HeaderType::Disconnect => "DISCONNECT",
            HeaderType::Connect => "CONNECT",
            HeaderType::Ping => "PING",
            HeaderType::Connected => "CONNECTED",

            HeaderType::CreateGame => "CREATE_GAME",
            HeaderType::ListGames => "LIST_GAMES",
            HeaderType::GetGame => "GET_GAME",
            HeaderType::UpdateGame => "UPDATE_GAME",
            HeaderType::CompleteGame => "COMPLETE_GAME",

            HeaderType::GenerateCard => "GENERATE_CARD",
            HeaderType::GetCards => "GET_CARDS",
            HeaderType::MarkCell => "MARK_CELL",
            HeaderType::MarkNumber => "MARK_NUMBER",
            HeaderType::UpdateGoals => "UPDATE_GOALS",

            HeaderType::Game => "GAME",
            HeaderType::GameList => "GAME_LIST",
            HeaderType::Card => "CARD",
            HeaderType::CardList => "CARD_LIST",
            HeaderType::CardCompleted => "CARD_COMPLETED",

            HeaderType::NotConnected => "NOT_CONNECTED",
            HeaderType::InvalidPacketPayload => "INVALID_PACKET_PAYLOAD",
            HeaderType::Rejected => "REJECTED",
            HeaderType::InvalidHeader => "INVALID_HEADER",
            HeaderType::AlreadyConnected => "ALREADY_CONNECTED",
            HeaderType::InvalidPlayerData => "INVALID_PLAYER_DATA",
            HeaderType::InvalidChecksum => "INVALID_CHECKSUM",
            HeaderType::ERROR => "ERROR",
        };

        write!(f, "{}", str)
    }
}

impl TryFrom<u8> for HeaderType {
    type Error = ();

    /// Returns `Err(())` if the byte does not correspond to any defined message type.
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(HeaderType::Disconnect),
            0x01 => Ok(HeaderType::Connect),
            0x02 => Ok(HeaderType::Ping),
            0x03 => Ok(HeaderType::Connected),

            0x10 => Ok(HeaderType::CreateGame),
            0x11 => Ok(HeaderType::ListGames),
            0x12 => Ok(HeaderType::GetGame),
            0x13 => Ok(HeaderType::UpdateGame),
            0x14 => Ok(HeaderType::CompleteGame),

            0x20 => Ok(HeaderType::GenerateCard),
            0x21 => Ok(HeaderType::GetCards),
            0x22 => Ok(HeaderType::MarkCell),
            0x23 => Ok(HeaderType::MarkNumber),
            0x24 => Ok(HeaderType::UpdateGoals),

            0x40 => Ok(HeaderType::Game),
            0x41 => Ok(HeaderType::GameList),
            0x42 => Ok(HeaderType::Card),
            0x43 => Ok(HeaderType::CardList),
            0x44 => Ok(HeaderType::CardCompleted),

            0xF0 => Ok(HeaderType::NotConnected),
            0xF1 => Ok(HeaderType::InvalidPacketPayload),
            0xF2 => Ok(HeaderType::Rejected),
            0xFA => Ok(HeaderType::InvalidHeader),
            0xFB => Ok(HeaderType::AlreadyConnected),
            0xFC => Ok(HeaderType::InvalidPlayerData),
            0xFD => Ok(HeaderType::InvalidChecksum),
            0xFE => Ok(HeaderType::ERROR),
            _ => Err(()),
        }
    }
}

/// Fixed-size header preceding every payload.
///
/// Layout: `[type, payload_len (2 bytes BE), checksum (2 bytes BE), 0x0A]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub checksum: u16,
    pub payload_length: u16,
    pub header_type: HeaderType,
}

impl Header {
    /// Creates a header for `payload`, computing its length and checksum.
    ///
    /// # Arguments
    ///
    /// * `header_type` - The message type written as the first byte.
    /// * `payload` - The bytes that will follow the header.
    ///
    /// # Returns
    ///
    /// `Err(ProtocolError::PayloadTooLarge)` if `payload` is longer than
    /// `MAX_PAYLOAD_LENGTH`, since its length would not fit the header.
    pub fn new(header_type: HeaderType, payload: &[u8]) -> Result<Self, ProtocolError> {
        let payload_length = u16::try_from(payload.len())
            .map_err(|_| ProtocolError::PayloadTooLarge(payload.len(), MAX_PAYLOAD_LENGTH))?;

        Ok(Self {
            checksum: CheckSum::new(payload),
            payload_length,
            header_type,
        })
    }

    pub fn wrap_header(&self) -> [u8; HEADER_LENGTH] {
        let [length_high, length_low] = self.payload_length.to_be_bytes();
        let [checksum_high, checksum_low] = self.checksum.to_be_bytes();

        [
            self.header_type as u8,
            length_high,
            length_low,
            checksum_high,
            checksum_low,
            DELIMITER,
        ]
    }

    /// Parses a header from exactly `HEADER_LENGTH` bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() != HEADER_LENGTH || bytes[5] != DELIMITER {
            return Err(ProtocolError::InvalidHeaderError(format!(
                "Format invalid: {:?}",
                bytes
            )));
        }

        let header_type = HeaderType::try_from(bytes[0]).map_err(|_| {
            ProtocolError::InvalidHeaderError(format!("Invalid message type: {:#04X}", bytes[0]))
        })?;

        Ok(Self {
            header_type,
            payload_length: u16::from_be_bytes([bytes[1], bytes[2]]),
            checksum: u16::from_be_bytes([bytes[3], bytes[4]]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_header_layout() {
        let header = Header::new(HeaderType::MarkCell, &[0x01, 0x02, 0x04]).unwrap();
        assert_eq!(header.wrap_header(), [0x22, 0x00, 0x03, 0x00, 0x07, 0x0A]);
        assert_eq!(Header::from_bytes(&header.wrap_header()).unwrap(), header);
    }

    #[test]
    fn test_length_must_fit_two_bytes() {
        let largest = vec![0u8; MAX_PAYLOAD_LENGTH];
        let header = Header::new(HeaderType::GameList, &largest).unwrap();
        assert_eq!(header.payload_length, u16::MAX);

        let oversized = vec![0u8; MAX_PAYLOAD_LENGTH + 1];
        assert!(matches!(
            Header::new(HeaderType::GameList, &oversized),
            Err(ProtocolError::PayloadTooLarge(65536, 65535))
        ));
    }

    #[test]
    fn test_from_bytes_rejects_malformed_headers() {
        assert!(Header::from_bytes(&[0x22, 0x00, 0x00, 0x00, 0x00]).is_err());
        assert!(Header::from_bytes(&[0x22, 0x00, 0x00, 0x00, 0x00, 0x0B]).is_err());
        assert!(Header::from_bytes(&[0x99, 0x00, 0x00, 0x00, 0x00, 0x0A]).is_err());
    }

    #[test]
    fn test_every_type_byte_round_trips() {
        for byte in 0..=u8::MAX {
            if let Ok(header_type) = HeaderType::try_from(byte) {
                assert_eq!(header_type as u8, byte, "{header_type}");
            }
        }
    }
}

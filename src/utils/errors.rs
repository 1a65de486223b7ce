use thiserror::Error;

/// Rejections raised at the card and room mutation boundary.
///
/// These are sent back to the requester as a `REJECTED` packet and never
/// reach the completion evaluator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BingoError {
    #[error("Cell ({row}, {col}) is outside the 5x5 grid")]
    InvalidCoordinate { row: i32, col: i32 },
    #[error("The free space cannot be marked or unmarked")]
    FreeSpaceMutation,
    #[error("Game `{0}` was not found")]
    GameNotFound(String),
    #[error("Game `{0}` no longer accepts cards")]
    GameClosed(String),
    #[error("Card `{0}` was not found")]
    CardNotFound(String),
    #[error("User `{0}` already has a card for this game")]
    DuplicateCard(String),
    #[error("Game `{0}` has no room for another card")]
    RoomFull(String),
    #[error("Not authorized to change this card")]
    NotCardOwner,
    #[error("Only the game creator can change this game")]
    NotGameCreator,
    #[error("Goal grid must be 5x5, got {0}")]
    InvalidGoalGrid(String),
    #[error("Number {0} is not on this card")]
    NumberNotOnCard(u8),
    #[error("Operation requires a {0} card")]
    WrongCardVariant(&'static str),
    #[error("`{field}` is longer than {max} bytes")]
    TextTooLong { field: &'static str, max: usize },
    #[error("Game `{0}` is closed and cannot be reopened")]
    CannotReopen(String),
}

impl BingoError {
    /// Stable identifier sent to clients alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            BingoError::InvalidCoordinate { .. } => "InvalidCoordinate",
            BingoError::FreeSpaceMutation => "FreeSpaceMutation",
            BingoError::GameNotFound(_) => "GameNotFound",
            BingoError::GameClosed(_) => "GameClosed",
            BingoError::CardNotFound(_) => "CardNotFound",
            BingoError::DuplicateCard(_) => "DuplicateCard",
            BingoError::RoomFull(_) => "RoomFull",
            BingoError::NotCardOwner => "NotCardOwner",
            BingoError::NotGameCreator => "NotGameCreator",
            BingoError::InvalidGoalGrid(_) => "InvalidGoalGrid",
            BingoError::NumberNotOnCard(_) => "NumberNotOnCard",
            BingoError::WrongCardVariant(_) => "WrongCardVariant",
            BingoError::TextTooLong { .. } => "TextTooLong",
            BingoError::CannotReopen(_) => "CannotReopen",
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid protocol header: {0}")]
    InvalidHeaderError(String),
    #[error("Invalid packet payload: {0}")]
    InvalidPayloadError(String),
    #[error("Payload of {0} bytes exceeds the {1} byte limit")]
    PayloadTooLarge(usize, usize),
    #[error("Connection closed by peer")]
    ConnectionClosed,
    #[error("Network error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum PlayerConnectionError {
    #[error("Invalid player payload: {0}")]
    InvalidPlayerPayload(String),
    #[error("User `{0}` is already connected")]
    AlreadyConnected(String),
}

/// Why a single request could not be answered with its normal response.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Rejected(#[from] BingoError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Snapshot is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
}

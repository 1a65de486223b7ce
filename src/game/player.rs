use crate::models::client_requests::ConnectRequest;
use crate::utils::errors::PlayerConnectionError;

/// Longest accepted user id or username, in bytes.
pub const MAX_NAME_LENGTH: usize = 64;

/// The identity a connection acts as. Set once by the CONNECT packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub user_id: String,
    pub username: String,
}

impl Player {
    /// Builds a player from a CBOR encoded `ConnectRequest`.
    ///
    /// # Returns
    /// * `Err(PlayerConnectionError::InvalidPlayerPayload)` if the payload does not decode,
    ///   carries a blank user id, or a name longer than `MAX_NAME_LENGTH`.
    pub fn new_connection(payload: &[u8]) -> Result<Self, PlayerConnectionError> {
        let request = serde_cbor::from_slice::<ConnectRequest>(payload)
            .map_err(|e| PlayerConnectionError::InvalidPlayerPayload(e.to_string()))?;

        let user_id = request.user_id.trim().to_string();
        if user_id.is_empty() {
            return Err(PlayerConnectionError::InvalidPlayerPayload(
                "user_id is empty".to_string(),
            ));
        }

        let username = match request.username.trim() {
            "" => user_id.clone(),
            name => name.to_string(),
        };
        if user_id.len() > MAX_NAME_LENGTH || username.len() > MAX_NAME_LENGTH {
            return Err(PlayerConnectionError::InvalidPlayerPayload(format!(
                "names are limited to {MAX_NAME_LENGTH} bytes"
            )));
        }

        Ok(Self { user_id, username })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(user_id: &str, username: &str) -> Vec<u8> {
        serde_cbor::to_vec(&ConnectRequest {
            user_id: user_id.to_string(),
            username: username.to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_new_connection() {
        let player = Player::new_connection(&payload(" 42 ", "ana")).unwrap();
        assert_eq!(player.user_id, "42");
        assert_eq!(player.username, "ana");

        let unnamed = Player::new_connection(&payload("42", "")).unwrap();
        assert_eq!(unnamed.username, "42");
    }

    #[test]
    fn test_new_connection_rejects_bad_payloads() {
        assert!(Player::new_connection(&payload("  ", "ana")).is_err());
        assert!(Player::new_connection(&[0xFF, 0x00]).is_err());
        assert!(Player::new_connection(&serde_cbor::to_vec(&"ana").unwrap()).is_err());

        let long = "a".repeat(MAX_NAME_LENGTH + 1);
        assert!(Player::new_connection(&payload(&long, "ana")).is_err());
        assert!(Player::new_connection(&payload("42", &long)).is_err());
    }
}

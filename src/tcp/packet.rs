use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::tcp::header::{Header, HeaderType, HEADER_LENGTH, MAX_PAYLOAD_LENGTH};
use crate::utils::checksum::CheckSum;
use crate::utils::errors::ProtocolError;

/// Represents a complete network packet with a protocol header and payload.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Type, payload length and checksum.
    pub header: Header,
    /// CBOR body, plain text for some error packets, or empty.
    pub payload: Box<[u8]>,
}

impl Packet {
    /// Creates a packet for a short server-made payload: an echo, an error text
    /// or nothing.
    ///
    /// Bytes past `MAX_PAYLOAD_LENGTH` are dropped so the header always
    /// announces exactly what is sent. Use `try_new` or `with_body` when the
    /// whole payload must arrive.
    pub fn new(header_type: HeaderType, payload: &[u8]) -> Self {
        let payload = &payload[..payload.len().min(MAX_PAYLOAD_LENGTH)];
        let header = Header {
            checksum: CheckSum::new(payload),
            payload_length: payload.len() as u16,
            header_type,
        };
        Self {
            header,
            payload: payload.into(),
        }
    }

    /// Creates a new `Packet`, building its header from `payload`.
    ///
    /// # Returns
    ///
    /// `Err(ProtocolError::PayloadTooLarge)` if the payload cannot be framed.
    pub fn try_new(header_type: HeaderType, payload: &[u8]) -> Result<Self, ProtocolError> {
        let header = Header::new(header_type, payload)?;
        Ok(Self {
            header,
            payload: payload.into(),
        })
    }

    /// Creates a packet whose payload is `body` encoded as CBOR.
    ///
    /// # Arguments
    ///
    /// * `header_type` - The message type of the packet.
    /// * `body` - Any serializable request, view or event.
    ///
    /// # Returns
    ///
    /// * `Err(ProtocolError::InvalidPayloadError)` if `body` does not encode.
    /// * `Err(ProtocolError::PayloadTooLarge)` if the encoded body does not fit one frame.
    pub fn with_body<T: Serialize>(header_type: HeaderType, body: &T) -> Result<Self, ProtocolError> {
        let payload = serde_cbor::to_vec(body)
            .map_err(|e| ProtocolError::InvalidPayloadError(e.to_string()))?;
        Self::try_new(header_type, &payload)
    }

    /// Decodes the CBOR payload into `T`.
    pub fn body<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        serde_cbor::from_slice(&self.payload)
            .map_err(|e| ProtocolError::InvalidPayloadError(e.to_string()))
    }

    pub fn header_type(&self) -> HeaderType {
        self.header.header_type
    }

    /// Reads exactly one packet: the fixed header, then `payload_length` bytes.
    ///
    /// # Returns
    /// - `Err(ProtocolError::ConnectionClosed)` if the stream ends before a full packet.
    /// - `Err(ProtocolError::PayloadTooLarge)` if the header announces more than `max_payload` bytes.
    ///
    /// The checksum is not verified here.
    pub async fn read_from<R>(reader: &mut R, max_payload: usize) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin,
    {
        let mut header_bytes = [0u8; HEADER_LENGTH];
        read_exact_or_closed(reader, &mut header_bytes).await?;
        let header = Header::from_bytes(&header_bytes)?;

        let length = header.payload_length as usize;
        if length > max_payload {
            return Err(ProtocolError::PayloadTooLarge(length, max_payload));
        }

        let mut payload = vec![0u8; length];
        read_exact_or_closed(reader, &mut payload).await?;

        Ok(Self {
            header,
            payload: payload.into_boxed_slice(),
        })
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), ProtocolError>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.wrap_packet()).await?;
        Ok(())
    }

    /// Serializes the header and payload into one buffer.
    pub fn wrap_packet(&self) -> Box<[u8]> {
        let header = self.header.wrap_header();
        let mut packet = Vec::with_capacity(header.len() + self.payload.len());

        packet.extend_from_slice(&header);
        packet.extend_from_slice(&self.payload);

        packet.into_boxed_slice()
    }
}

async fn read_exact_or_closed<R>(reader: &mut R, buffer: &mut [u8]) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buffer).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(ProtocolError::ConnectionClosed),
        Err(e) => Err(ProtocolError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::client_requests::MarkCellRequest;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_read_from_splits_back_to_back_packets() {
        let card_id = Uuid::new_v4();
        let first = Packet::with_body(
            HeaderType::MarkCell,
            &MarkCellRequest {
                card_id,
                row: 3,
                col: 1,
            },
        )
        .unwrap();
        let second = Packet::new(HeaderType::Ping, b"hi");

        let mut bytes = first.wrap_packet().to_vec();
        bytes.extend_from_slice(&second.wrap_packet());
        let mut reader = bytes.as_slice();

        let read = Packet::read_from(&mut reader, 1024).await.unwrap();
        assert_eq!(read.header, first.header);
        let request: MarkCellRequest = read.body().unwrap();
        assert_eq!((request.card_id, request.row, request.col), (card_id, 3, 1));

        let read = Packet::read_from(&mut reader, 1024).await.unwrap();
        assert_eq!(read.header_type(), HeaderType::Ping);
        assert_eq!(&*read.payload, b"hi");

        assert!(matches!(
            Packet::read_from(&mut reader, 1024).await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_read_from_enforces_payload_limit() {
        let packet = Packet::new(HeaderType::Ping, &[0u8; 64]);
        let bytes = packet.wrap_packet();
        let mut reader = &bytes[..];

        assert!(matches!(
            Packet::read_from(&mut reader, 16).await,
            Err(ProtocolError::PayloadTooLarge(64, 16))
        ));
    }

    #[test]
    fn test_oversized_body_is_refused() {
        let rooms: Vec<String> = (0..100).map(|i| format!("{i:0>1000}")).collect();
        assert!(matches!(
            Packet::with_body(HeaderType::GameList, &rooms),
            Err(ProtocolError::PayloadTooLarge(_, MAX_PAYLOAD_LENGTH))
        ));
    }

    #[tokio::test]
    async fn test_long_error_text_stays_framed() {
        let text = "x".repeat(MAX_PAYLOAD_LENGTH + 500);
        let packet = Packet::new(HeaderType::ERROR, text.as_bytes());
        assert_eq!(packet.header.payload_length as usize, packet.payload.len());

        let mut bytes = packet.wrap_packet().to_vec();
        bytes.extend_from_slice(&Packet::new(HeaderType::Ping, b"next").wrap_packet());
        let mut reader = bytes.as_slice();

        let read = Packet::read_from(&mut reader, MAX_PAYLOAD_LENGTH).await.unwrap();
        assert_eq!(read.payload.len(), MAX_PAYLOAD_LENGTH);
        assert!(CheckSum::check(read.header.checksum, &read.payload));

        let next = Packet::read_from(&mut reader, MAX_PAYLOAD_LENGTH).await.unwrap();
        assert_eq!(&*next.payload, b"next");
    }

    #[tokio::test]
    async fn test_truncated_payload_is_closed_connection() {
        let packet = Packet::new(HeaderType::Ping, b"hello");
        let bytes = packet.wrap_packet();
        let mut reader = &bytes[..bytes.len() - 2];

        assert!(matches!(
            Packet::read_from(&mut reader, 1024).await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }
}

use crate::core::errors::ExchangeError;
use tokio_tungstenite::tungstenite::Message;

/// Codec trait for turning raw WebSocket frames into exchange-specific messages
///
/// Implementations must be stateless across frames: the stream driver calls
/// `decode_message` once per data frame, in arrival order.
pub trait WsCodec: Send + Sync + 'static {
    /// The type representing parsed messages from this stream
    type Message: Send;

    /// Decode a raw WebSocket message into a typed message
    ///
    /// Control frames (ping, pong, close) are handled by the transport and
    /// never reach the codec.
    ///
    /// # Returns
    /// - `Ok(Some(message))` - Successfully decoded message
    /// - `Ok(None)` - Frame carries nothing for the handler
    /// - `Err(error)` - The frame could not be decoded; the stream continues
    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, ExchangeError>;
}

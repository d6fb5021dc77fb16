/// Kernel - exchange-agnostic transport layer
///
/// The kernel holds transport logic and the generic interfaces that exchange
/// modules plug into. It knows nothing about any particular wire format.
///
/// ## Transport
/// - `RestClient` / `ReqwestRest`: signed HTTP requests with retry
/// - `WsSession` / `TungsteniteWs`: one WebSocket connection, optional proxy and keep-alive
/// - `ReconnectWs`: reconnection wrapper with exponential backoff
///
/// ## Message handling
/// - `WsCodec`: turns data frames into typed messages
/// - `serve`: runs a session on a background task and pushes decoded messages
///   to a handler, returning a `DoneSignal` and a `StopHandle`
///
/// ## Authentication
/// - `Signer`: pluggable request signing
///
/// ```rust,no_run
/// use pmargin::core::kernel::*;
/// use pmargin::exchanges::binance_pm::UserDataCodec;
///
/// # async fn example() -> Result<(), pmargin::ExchangeError> {
/// let mut ws = TungsteniteWs::new(
///     "wss://fstream.binance.com/pm/ws/<listen-key>".to_string(),
///     "binance_pm_user_data".to_string(),
///     WsConfig::default(),
/// );
/// ws.connect().await?;
///
/// let (mut done, stop) = serve(
///     ws,
///     UserDataCodec,
///     |event| println!("{:?}", event.event_type),
///     |err| eprintln!("{}", err),
/// );
/// stop.stop();
/// done.wait().await;
/// # Ok(())
/// # }
/// ```
pub mod codec;
pub mod rest;
pub mod signer;
pub mod stream;
pub mod ws;

pub use codec::WsCodec;
pub use rest::{ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
pub use signer::{SignatureResult, Signer};
pub use stream::{serve, DoneSignal, StopHandle};
pub use ws::{ReconnectWs, TungsteniteWs, WsConfig, WsSession};

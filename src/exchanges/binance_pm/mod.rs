// Portfolio margin user-data stream
pub mod builder; // ExchangeConfig → listen-key client
pub mod codec; // impl WsCodec (event demultiplexer)
pub mod rest; // listen-key lifecycle over RestClient
pub mod signer; // HMAC-SHA256 authentication
pub mod stream; // subscription entry points
pub mod types; // serde structs ← raw JSON

pub use builder::{build_listen_key_client, user_data_base_url, BINANCE_PM_REST_URL};
pub use codec::{decode_user_data, UserDataCodec};
pub use rest::{ListenKeyClient, ListenKeyService};
pub use signer::BinancePmSigner;
pub use stream::{
    subscribe_user_data, subscribe_user_data_at, subscribe_user_data_with_session,
    user_data_endpoint, BINANCE_PM_WS_URL,
};
pub use types::*;

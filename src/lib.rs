//! Portfolio margin user-data stream client
//!
//! Manages the listen key that authorizes the stream and turns every frame
//! into a typed [`UserDataEvent`], delivered to a caller-supplied handler.

pub mod core;
pub mod exchanges;

pub use core::config::ExchangeConfig;
pub use core::errors::ExchangeError;
pub use core::kernel::{DoneSignal, StopHandle, WsConfig};
pub use exchanges::binance_pm::{
    subscribe_user_data, UserDataEvent, UserDataEventType, UserDataPayload,
};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// User-data event discriminator (`e`)
///
/// Values the exchange adds later decode as `Unknown` and keep their raw tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UserDataEventType {
    StreamExpired,
    RiskLevelChange,
    MarginAccountUpdate,
    MarginBalanceUpdate,
    MarginLiabilityUpdate,
    MarginOpenOrderLoss,
    MarginOrderUpdate,
    FuturesAccountUpdate,
    FuturesLeverageUpdate,
    FuturesOrderUpdate,
    FuturesConditionalOrderUpdate,
    Unknown(String),
}

impl UserDataEventType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::StreamExpired => "listenKeyExpired",
            Self::RiskLevelChange => "riskLevelChange",
            Self::MarginAccountUpdate => "outboundAccountPosition",
            Self::MarginBalanceUpdate => "balanceUpdate",
            Self::MarginLiabilityUpdate => "liabilityChange",
            Self::MarginOpenOrderLoss => "openOrderLoss",
            Self::MarginOrderUpdate => "executionReport",
            Self::FuturesAccountUpdate => "ACCOUNT_UPDATE",
            Self::FuturesLeverageUpdate => "ACCOUNT_CONFIG_UPDATE",
            Self::FuturesOrderUpdate => "ORDER_TRADE_UPDATE",
            Self::FuturesConditionalOrderUpdate => "CONDITIONAL_ORDER_TRADE_UPDATE",
            Self::Unknown(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<&str> for UserDataEventType {
    fn from(value: &str) -> Self {
        match value {
            "listenKeyExpired" => Self::StreamExpired,
            "riskLevelChange" => Self::RiskLevelChange,
            "outboundAccountPosition" => Self::MarginAccountUpdate,
            "balanceUpdate" => Self::MarginBalanceUpdate,
            "liabilityChange" => Self::MarginLiabilityUpdate,
            "openOrderLoss" => Self::MarginOpenOrderLoss,
            "executionReport" => Self::MarginOrderUpdate,
            "ACCOUNT_UPDATE" => Self::FuturesAccountUpdate,
            "ACCOUNT_CONFIG_UPDATE" => Self::FuturesLeverageUpdate,
            "ORDER_TRADE_UPDATE" => Self::FuturesOrderUpdate,
            "CONDITIONAL_ORDER_TRADE_UPDATE" => Self::FuturesConditionalOrderUpdate,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl From<String> for UserDataEventType {
    fn from(value: String) -> Self {
        match Self::from(value.as_str()) {
            Self::Unknown(_) => Self::Unknown(value),
            known => known,
        }
    }
}

impl From<UserDataEventType> for String {
    fn from(value: UserDataEventType) -> Self {
        match value {
            UserDataEventType::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for UserDataEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields present on every user-data frame
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserDataEnvelope {
    #[serde(rename = "e")]
    pub event_type: UserDataEventType,
    #[serde(rename = "E")]
    pub event_time: u64,
}

/// One decoded user-data frame
///
/// `payload` is `None` for `listenKeyExpired` and for discriminators this
/// crate does not know. Match on `event_type`, not on `payload`.
#[derive(Debug, Clone, Serialize)]
pub struct UserDataEvent {
    pub event_type: UserDataEventType,
    pub event_time: u64,
    pub payload: Option<UserDataPayload>,
}

impl UserDataEvent {
    pub fn event_datetime(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.event_time)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
    }

    /// The listen key expired; the owner has to obtain a new one and resubscribe
    pub fn is_stream_expired(&self) -> bool {
        self.event_type == UserDataEventType::StreamExpired
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum UserDataPayload {
    RiskLevelChange(RiskLevelChangeEvent),
    MarginAccountUpdate(MarginAccountUpdateEvent),
    MarginBalanceUpdate(MarginBalanceUpdateEvent),
    MarginLiabilityUpdate(MarginLiabilityUpdateEvent),
    MarginOpenOrderLoss(MarginOpenOrderLossEvent),
    MarginOrderUpdate(Box<MarginOrderUpdateEvent>),
    FuturesAccountUpdate(FuturesAccountUpdateEvent),
    FuturesLeverageUpdate(FuturesLeverageUpdateEvent),
    FuturesOrderUpdate(Box<FuturesOrderUpdateEvent>),
    FuturesConditionalOrderUpdate(Box<FuturesConditionalOrderUpdateEvent>),
}

impl UserDataPayload {
    /// Discriminator this payload belongs to
    pub fn event_type(&self) -> UserDataEventType {
        match self {
            Self::RiskLevelChange(_) => UserDataEventType::RiskLevelChange,
            Self::MarginAccountUpdate(_) => UserDataEventType::MarginAccountUpdate,
            Self::MarginBalanceUpdate(_) => UserDataEventType::MarginBalanceUpdate,
            Self::MarginLiabilityUpdate(_) => UserDataEventType::MarginLiabilityUpdate,
            Self::MarginOpenOrderLoss(_) => UserDataEventType::MarginOpenOrderLoss,
            Self::MarginOrderUpdate(_) => UserDataEventType::MarginOrderUpdate,
            Self::FuturesAccountUpdate(_) => UserDataEventType::FuturesAccountUpdate,
            Self::FuturesLeverageUpdate(_) => UserDataEventType::FuturesLeverageUpdate,
            Self::FuturesOrderUpdate(_) => UserDataEventType::FuturesOrderUpdate,
            Self::FuturesConditionalOrderUpdate(_) => {
                UserDataEventType::FuturesConditionalOrderUpdate
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSide {
    Both,
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    #[serde(rename = "GTC")]
    Gtc,
    #[serde(rename = "IOC")]
    Ioc,
    #[serde(rename = "FOK")]
    Fok,
    #[serde(rename = "GTX")]
    Gtx,
    #[serde(rename = "GTD")]
    Gtd,
    #[serde(other)]
    Unknown,
}

/// Futures sub-account the event belongs to (`fs`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusinessUnit {
    /// USD-margined futures
    #[serde(rename = "UM")]
    Um,
    /// Coin-margined futures
    #[serde(rename = "CM")]
    Cm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Normal,
    MarginCall,
    SupplyMargin,
    ReduceOnly,
    ActiveLiquidation,
    ForceLiquidation,
    Bankrupted,
    #[serde(other)]
    Unknown,
}

// GTD cancel time is pushed as 0 for every other time-in-force
fn zero_as_none<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.filter(|v| *v != 0))
}

/// `riskLevelChange`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskLevelChangeEvent {
    #[serde(rename = "u")]
    pub uni_mmr: Decimal,
    #[serde(rename = "s")]
    pub risk_level: RiskLevel,
    #[serde(rename = "eq")]
    pub account_equity: Decimal,
    #[serde(rename = "ae")]
    pub actual_equity: Decimal,
    #[serde(rename = "m")]
    pub maintenance_margin: Decimal,
}

/// `outboundAccountPosition`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginAccountUpdateEvent {
    #[serde(rename = "u")]
    pub last_update_time: u64,
    #[serde(rename = "U")]
    pub update_id: Option<i64>,
    #[serde(rename = "B")]
    pub balances: Vec<MarginBalance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginBalance {
    #[serde(rename = "a")]
    pub asset: String,
    #[serde(rename = "f")]
    pub free: Decimal,
    #[serde(rename = "l")]
    pub locked: Decimal,
}

/// `balanceUpdate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginBalanceUpdateEvent {
    #[serde(rename = "a")]
    pub asset: String,
    #[serde(rename = "d")]
    pub balance_delta: Decimal,
    #[serde(rename = "U")]
    pub update_id: Option<i64>,
    #[serde(rename = "T")]
    pub transaction_time: u64,
}

/// `liabilityChange`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginLiabilityUpdateEvent {
    #[serde(rename = "a")]
    pub asset: String,
    #[serde(rename = "t")]
    pub liability_type: String,
    #[serde(rename = "T", alias = "tx")]
    pub transaction_id: i64,
    #[serde(rename = "p")]
    pub principal: Decimal,
    #[serde(rename = "i")]
    pub interest: Decimal,
    #[serde(rename = "l")]
    pub total_liability: Decimal,
}

/// `openOrderLoss`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginOpenOrderLossEvent {
    #[serde(rename = "O")]
    pub updates: Vec<OpenOrderLoss>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenOrderLoss {
    #[serde(rename = "a")]
    pub asset: String,
    #[serde(rename = "o")]
    pub amount: Decimal,
}

/// `executionReport` for the margin account
///
/// The trailing block only appears when the order used the matching feature
/// (trailing stop, strategy ids, STP expiry, working on the book).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginOrderUpdateEvent {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "c")]
    pub client_order_id: String,
    #[serde(rename = "S")]
    pub side: OrderSide,
    #[serde(rename = "o")]
    pub order_type: String,
    #[serde(rename = "f")]
    pub time_in_force: TimeInForce,
    #[serde(rename = "q")]
    pub quantity: Decimal,
    #[serde(rename = "p")]
    pub price: Decimal,
    #[serde(rename = "P")]
    pub stop_price: Decimal,
    #[serde(rename = "F")]
    pub iceberg_quantity: Decimal,
    #[serde(rename = "g")]
    pub order_list_id: i64,
    /// Id of the order being canceled
    #[serde(rename = "C")]
    pub original_client_order_id: String,
    #[serde(rename = "x")]
    pub execution_type: String,
    #[serde(rename = "X")]
    pub order_status: String,
    #[serde(rename = "r")]
    pub reject_reason: String,
    #[serde(rename = "i")]
    pub order_id: i64,
    #[serde(rename = "l")]
    pub last_filled_quantity: Decimal,
    #[serde(rename = "z")]
    pub cumulative_filled_quantity: Decimal,
    #[serde(rename = "L")]
    pub last_filled_price: Decimal,
    #[serde(rename = "n")]
    pub commission: Decimal,
    #[serde(rename = "N")]
    pub commission_asset: Option<String>,
    #[serde(rename = "T")]
    pub transaction_time: u64,
    #[serde(rename = "t")]
    pub trade_id: i64,
    #[serde(rename = "w")]
    pub is_on_book: bool,
    #[serde(rename = "m")]
    pub is_maker: bool,
    #[serde(rename = "O")]
    pub creation_time: u64,
    #[serde(rename = "Z")]
    pub cumulative_quote_quantity: Decimal,
    #[serde(rename = "Y")]
    pub last_quote_quantity: Decimal,
    #[serde(rename = "Q")]
    pub quote_order_quantity: Decimal,
    #[serde(rename = "V", default)]
    pub self_trade_prevention_mode: String,

    #[serde(rename = "d")]
    pub trailing_delta: Option<i64>,
    #[serde(rename = "D")]
    pub trailing_time: Option<u64>,
    #[serde(rename = "j")]
    pub strategy_id: Option<i64>,
    #[serde(rename = "J")]
    pub strategy_type: Option<i64>,
    #[serde(rename = "v")]
    pub prevented_match_id: Option<i64>,
    #[serde(rename = "A")]
    pub prevented_quantity: Option<Decimal>,
    #[serde(rename = "B")]
    pub last_prevented_quantity: Option<Decimal>,
    #[serde(rename = "W")]
    pub working_time: Option<u64>,
    #[serde(rename = "u")]
    pub trade_group_id: Option<i64>,
    #[serde(rename = "U")]
    pub counter_order_id: Option<i64>,
}

/// `ACCOUNT_UPDATE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuturesAccountUpdateEvent {
    #[serde(rename = "T")]
    pub transaction_time: u64,
    #[serde(rename = "fs")]
    pub business_unit: BusinessUnit,
    #[serde(rename = "i", default)]
    pub account_alias: String,
    #[serde(rename = "a")]
    pub update: FuturesAccountUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuturesAccountUpdate {
    /// Reason type, e.g. `ORDER`, `FUNDING_FEE`
    #[serde(rename = "m")]
    pub reason: String,
    #[serde(rename = "B", default)]
    pub balances: Vec<FuturesBalance>,
    #[serde(rename = "P", default)]
    pub positions: Vec<FuturesPosition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuturesBalance {
    #[serde(rename = "a")]
    pub asset: String,
    #[serde(rename = "wb")]
    pub wallet_balance: Decimal,
    #[serde(rename = "cw")]
    pub cross_wallet_balance: Decimal,
    #[serde(rename = "bc")]
    pub balance_change: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuturesPosition {
    #[serde(rename = "s")]
    pub symbol: String,
    /// Signed; negative for short positions
    #[serde(rename = "pa")]
    pub position_amount: Decimal,
    #[serde(rename = "ep")]
    pub entry_price: Decimal,
    #[serde(rename = "cr")]
    pub accumulated_realized: Decimal,
    #[serde(rename = "up")]
    pub unrealized_pnl: Decimal,
    #[serde(rename = "ps")]
    pub position_side: PositionSide,
    #[serde(rename = "bep")]
    pub breakeven_price: Option<Decimal>,
}

/// `ACCOUNT_CONFIG_UPDATE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuturesLeverageUpdateEvent {
    #[serde(rename = "T")]
    pub transaction_time: u64,
    #[serde(rename = "fs")]
    pub business_unit: BusinessUnit,
    #[serde(rename = "ac")]
    pub leverage_update: LeverageUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeverageUpdate {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "l")]
    pub leverage: u32,
}

/// `ORDER_TRADE_UPDATE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuturesOrderUpdateEvent {
    #[serde(rename = "T")]
    pub transaction_time: u64,
    #[serde(rename = "fs")]
    pub business_unit: BusinessUnit,
    #[serde(rename = "i", default)]
    pub account_alias: String,
    #[serde(rename = "o")]
    pub order: FuturesOrderUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuturesOrderUpdate {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "c")]
    pub client_order_id: String,
    #[serde(rename = "S")]
    pub side: OrderSide,
    #[serde(rename = "o")]
    pub order_type: String,
    #[serde(rename = "f")]
    pub time_in_force: TimeInForce,
    #[serde(rename = "q")]
    pub original_quantity: Decimal,
    #[serde(rename = "p")]
    pub original_price: Decimal,
    #[serde(rename = "ap")]
    pub average_price: Decimal,
    /// Ignore for `TRAILING_STOP_MARKET`
    #[serde(rename = "sp")]
    pub stop_price: Decimal,
    #[serde(rename = "x")]
    pub execution_type: String,
    #[serde(rename = "X")]
    pub order_status: String,
    #[serde(rename = "i")]
    pub order_id: i64,
    #[serde(rename = "l")]
    pub last_filled_quantity: Decimal,
    #[serde(rename = "z")]
    pub cumulative_filled_quantity: Decimal,
    #[serde(rename = "L")]
    pub last_filled_price: Decimal,
    /// Not pushed when there is no commission
    #[serde(rename = "N")]
    pub commission_asset: Option<String>,
    #[serde(rename = "n")]
    pub commission: Option<Decimal>,
    #[serde(rename = "T")]
    pub trade_time: u64,
    #[serde(rename = "t")]
    pub trade_id: i64,
    #[serde(rename = "b")]
    pub bids_notional: Decimal,
    #[serde(rename = "a")]
    pub asks_notional: Decimal,
    #[serde(rename = "m")]
    pub is_maker: bool,
    #[serde(rename = "R")]
    pub is_reduce_only: bool,
    #[serde(rename = "ps")]
    pub position_side: PositionSide,
    #[serde(rename = "rp")]
    pub realized_profit: Decimal,
    /// Only pushed when a conditional order triggered this one
    #[serde(rename = "st")]
    pub strategy_type: Option<String>,
    #[serde(rename = "si")]
    pub strategy_id: Option<i64>,
    #[serde(rename = "V", default)]
    pub self_trade_prevention_mode: String,
    #[serde(rename = "gtd", default, deserialize_with = "zero_as_none")]
    pub good_till_date: Option<u64>,
}

/// `CONDITIONAL_ORDER_TRADE_UPDATE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuturesConditionalOrderUpdateEvent {
    #[serde(rename = "T")]
    pub transaction_time: u64,
    #[serde(rename = "fs")]
    pub business_unit: BusinessUnit,
    #[serde(rename = "so")]
    pub strategy_order: ConditionalOrderUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalOrderUpdate {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "c")]
    pub client_strategy_id: String,
    #[serde(rename = "si")]
    pub strategy_id: i64,
    #[serde(rename = "S")]
    pub side: OrderSide,
    #[serde(rename = "st")]
    pub strategy_type: String,
    #[serde(rename = "f")]
    pub time_in_force: TimeInForce,
    #[serde(rename = "q")]
    pub quantity: Decimal,
    #[serde(rename = "p")]
    pub price: Decimal,
    #[serde(rename = "sp")]
    pub stop_price: Decimal,
    #[serde(rename = "os")]
    pub strategy_status: String,
    #[serde(rename = "T")]
    pub book_time: u64,
    #[serde(rename = "ut")]
    pub update_time: u64,
    #[serde(rename = "R")]
    pub is_reduce_only: bool,
    #[serde(rename = "wt")]
    pub working_type: String,
    #[serde(rename = "ps")]
    pub position_side: PositionSide,
    #[serde(rename = "cp")]
    pub close_position: bool,
    /// Trailing stop only
    #[serde(rename = "AP")]
    pub activation_price: Option<Decimal>,
    #[serde(rename = "cr")]
    pub callback_rate: Option<Decimal>,
    /// Id of the order placed once the strategy triggered
    #[serde(rename = "i")]
    pub triggered_order_id: Option<i64>,
    #[serde(rename = "V", default)]
    pub self_trade_prevention_mode: String,
    #[serde(rename = "gtd", default, deserialize_with = "zero_as_none")]
    pub good_till_date: Option<u64>,
}

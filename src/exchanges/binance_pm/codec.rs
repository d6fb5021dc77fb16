use crate::core::errors::ExchangeError;
use crate::core::kernel::WsCodec;
use crate::exchanges::binance_pm::types::{
    UserDataEnvelope, UserDataEvent, UserDataEventType, UserDataPayload,
};
use serde::de::DeserializeOwned;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

/// Demultiplexer for the portfolio-margin user-data stream
///
/// Stateless: each frame is decoded on its own, first the `e`/`E` envelope,
/// then the payload schema selected by `e`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserDataCodec;

impl WsCodec for UserDataCodec {
    type Message = UserDataEvent;

    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, ExchangeError> {
        let text = match message {
            Message::Text(text) => text,
            Message::Binary(data) => String::from_utf8(data).map_err(|e| {
                let raw = String::from_utf8_lossy(e.as_bytes()).into_owned();
                ExchangeError::envelope_decode(
                    format!("Invalid UTF-8 in binary message: {}", e.utf8_error()),
                    raw,
                )
            })?,
            _ => return Ok(None),
        };

        decode_user_data(&text).map(Some)
    }
}

/// Decode one raw user-data frame
pub fn decode_user_data(text: &str) -> Result<UserDataEvent, ExchangeError> {
    let envelope: UserDataEnvelope =
        serde_json::from_str(text).map_err(|e| ExchangeError::envelope_decode(e, text))?;

    let event_type = envelope.event_type;
    let payload = match &event_type {
        UserDataEventType::StreamExpired => None,
        UserDataEventType::RiskLevelChange => {
            Some(UserDataPayload::RiskLevelChange(decode_payload(&event_type, text)?))
        }
        UserDataEventType::MarginAccountUpdate => {
            Some(UserDataPayload::MarginAccountUpdate(decode_payload(&event_type, text)?))
        }
        UserDataEventType::MarginBalanceUpdate => {
            Some(UserDataPayload::MarginBalanceUpdate(decode_payload(&event_type, text)?))
        }
        UserDataEventType::MarginLiabilityUpdate => {
            Some(UserDataPayload::MarginLiabilityUpdate(decode_payload(&event_type, text)?))
        }
        UserDataEventType::MarginOpenOrderLoss => {
            Some(UserDataPayload::MarginOpenOrderLoss(decode_payload(&event_type, text)?))
        }
        UserDataEventType::MarginOrderUpdate => Some(UserDataPayload::MarginOrderUpdate(
            Box::new(decode_payload(&event_type, text)?),
        )),
        UserDataEventType::FuturesAccountUpdate => {
            Some(UserDataPayload::FuturesAccountUpdate(decode_payload(&event_type, text)?))
        }
        UserDataEventType::FuturesLeverageUpdate => {
            Some(UserDataPayload::FuturesLeverageUpdate(decode_payload(&event_type, text)?))
        }
        UserDataEventType::FuturesOrderUpdate => Some(UserDataPayload::FuturesOrderUpdate(
            Box::new(decode_payload(&event_type, text)?),
        )),
        UserDataEventType::FuturesConditionalOrderUpdate => {
            Some(UserDataPayload::FuturesConditionalOrderUpdate(Box::new(
                decode_payload(&event_type, text)?,
            )))
        }
        UserDataEventType::Unknown(raw) => {
            debug!("Passing through unknown user data event: {}", raw);
            None
        }
    };

    Ok(UserDataEvent {
        event_type,
        event_time: envelope.event_time,
        payload,
    })
}

fn decode_payload<T: DeserializeOwned>(
    event_type: &UserDataEventType,
    text: &str,
) -> Result<T, ExchangeError> {
    serde_json::from_str(text)
        .map_err(|e| ExchangeError::payload_decode(event_type.as_str(), e, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchanges::binance_pm::types::{
        BusinessUnit, OrderSide, PositionSide, RiskLevel, TimeInForce,
    };
    use rust_decimal_macros::dec;

    fn decode(text: &str) -> UserDataEvent {
        UserDataCodec
            .decode_message(Message::Text(text.to_string()))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_risk_level_change() {
        let event = decode(
            r#"{"e":"riskLevelChange","E":1587727187525,"u":"1.99999999","s":"MARGIN_CALL","eq":"30.23416728","ae":"30.23416728","m":"15.11708371"}"#,
        );
        assert_eq!(event.event_type, UserDataEventType::RiskLevelChange);
        assert_eq!(event.event_time, 1_587_727_187_525);
        match event.payload {
            Some(UserDataPayload::RiskLevelChange(p)) => {
                assert_eq!(p.uni_mmr, dec!(1.99999999));
                assert_eq!(p.risk_level, RiskLevel::MarginCall);
                assert_eq!(p.account_equity, dec!(30.23416728));
                assert_eq!(p.maintenance_margin, dec!(15.11708371));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_margin_account_update() {
        let event = decode(
            r#"{"e":"outboundAccountPosition","E":1564034571105,"u":1564034571073,"U":1027053479517,"B":[{"a":"ETH","f":"10000.000000","l":"0.000000"}]}"#,
        );
        match event.payload {
            Some(UserDataPayload::MarginAccountUpdate(p)) => {
                assert_eq!(p.last_update_time, 1_564_034_571_073);
                assert_eq!(p.update_id, Some(1_027_053_479_517));
                assert_eq!(p.balances.len(), 1);
                assert_eq!(p.balances[0].asset, "ETH");
                assert_eq!(p.balances[0].free, dec!(10000));
                assert_eq!(p.balances[0].locked, dec!(0));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_margin_balance_update() {
        let event = decode(
            r#"{"e":"balanceUpdate","E":1573200697110,"a":"BTC","d":"100.00000000","U":1027053479517,"T":1573200697068}"#,
        );
        match event.payload {
            Some(UserDataPayload::MarginBalanceUpdate(p)) => {
                assert_eq!(p.asset, "BTC");
                assert_eq!(p.balance_delta, dec!(100));
                assert_eq!(p.transaction_time, 1_573_200_697_068);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_margin_liability_update() {
        let event = decode(
            r#"{"e":"liabilityChange","E":1573200697110,"a":"BTC","t":"BORROW","T":1352286576452864727,"p":"1.03453430","i":"0","l":"1.03476851"}"#,
        );
        match event.payload {
            Some(UserDataPayload::MarginLiabilityUpdate(p)) => {
                assert_eq!(p.liability_type, "BORROW");
                assert_eq!(p.transaction_id, 1_352_286_576_452_864_727);
                assert_eq!(p.principal, dec!(1.03453430));
                assert_eq!(p.interest, dec!(0));
                assert_eq!(p.total_liability, dec!(1.03476851));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_margin_liability_update_accepts_tx_key() {
        let event = decode(
            r#"{"e":"liabilityChange","E":1573200697110,"a":"BTC","t":"BORROW","tx":42,"p":"1","i":"0","l":"1"}"#,
        );
        match event.payload {
            Some(UserDataPayload::MarginLiabilityUpdate(p)) => assert_eq!(p.transaction_id, 42),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_margin_open_order_loss() {
        let event = decode(
            r#"{"e":"openOrderLoss","E":1678710578788,"O":[{"a":"BUSD","o":"-0.1232313"},{"a":"BNB","o":"-12.1232313"}]}"#,
        );
        match event.payload {
            Some(UserDataPayload::MarginOpenOrderLoss(p)) => {
                assert_eq!(p.updates.len(), 2);
                assert_eq!(p.updates[1].asset, "BNB");
                assert_eq!(p.updates[1].amount, dec!(-12.1232313));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_margin_order_update() {
        let event = decode(
            r#"{"e":"executionReport","E":1499405658658,"s":"ETHBTC","c":"mUvoqJxFIILMdfAW5iGSOW","S":"BUY","o":"LIMIT","f":"GTC","q":"1.00000000","p":"0.10264410","P":"0.00000000","d":4,"F":"0.00000000","g":-1,"C":"","x":"NEW","X":"NEW","r":"NONE","i":4293153,"l":"0.00000000","z":"0.00000000","L":"0.00000000","n":"0","N":null,"T":1499405658657,"t":-1,"v":3,"I":8641984,"w":true,"m":false,"M":false,"O":1499405658657,"Z":"0.00000000","Y":"0.00000000","Q":"0.00000000","W":1499405658657,"V":"NONE"}"#,
        );
        let Some(UserDataPayload::MarginOrderUpdate(p)) = event.payload else {
            panic!("expected margin order update");
        };
        assert_eq!(p.symbol, "ETHBTC");
        assert_eq!(p.side, OrderSide::Buy);
        assert_eq!(p.time_in_force, TimeInForce::Gtc);
        assert_eq!(p.price, dec!(0.10264410));
        assert_eq!(p.order_list_id, -1);
        assert_eq!(p.order_id, 4_293_153);
        assert_eq!(p.commission_asset, None);
        assert_eq!(p.trade_id, -1);
        assert!(p.is_on_book);
        assert_eq!(p.self_trade_prevention_mode, "NONE");
        assert_eq!(p.trailing_delta, Some(4));
        assert_eq!(p.prevented_match_id, Some(3));
        assert_eq!(p.working_time, Some(1_499_405_658_657));
        assert_eq!(p.strategy_id, None);
        assert_eq!(p.prevented_quantity, None);
        assert_eq!(p.counter_order_id, None);
    }

    #[test]
    fn test_margin_order_update_without_conditional_fields() {
        let event = decode(
            r#"{"e":"executionReport","E":1499405658658,"s":"ETHBTC","c":"abc","S":"SELL","o":"MARKET","f":"GTC","q":"1","p":"0","P":"0","F":"0","g":-1,"C":"","x":"TRADE","X":"FILLED","r":"NONE","i":1,"l":"1","z":"1","L":"0.1","n":"0.001","N":"BNB","T":1499405658657,"t":7,"I":1,"w":false,"m":true,"M":true,"O":1499405658657,"Z":"0.1","Y":"0.1","Q":"0"}"#,
        );
        let Some(UserDataPayload::MarginOrderUpdate(p)) = event.payload else {
            panic!("expected margin order update");
        };
        assert_eq!(p.side, OrderSide::Sell);
        assert_eq!(p.commission_asset.as_deref(), Some("BNB"));
        assert!(p.is_maker);
        assert_eq!(p.trailing_delta, None);
        assert_eq!(p.trailing_time, None);
        assert_eq!(p.working_time, None);
        assert_eq!(p.prevented_match_id, None);
        assert!(p.self_trade_prevention_mode.is_empty());
    }

    #[test]
    fn test_futures_account_update() {
        let event = decode(
            r#"{"e":"ACCOUNT_UPDATE","fs":"UM","E":1564745798939,"T":1564745798938,"i":"","a":{"m":"ORDER","B":[{"a":"USDT","wb":"122624.12345678","cw":"100.12345678","bc":"50.12345678"}],"P":[{"s":"BTCUSDT","pa":"0","ep":"0.00000","cr":"200","up":"0","ps":"BOTH","bep":"0.0"}]}}"#,
        );
        match event.payload {
            Some(UserDataPayload::FuturesAccountUpdate(p)) => {
                assert_eq!(p.business_unit, BusinessUnit::Um);
                assert_eq!(p.transaction_time, 1_564_745_798_938);
                assert_eq!(p.update.reason, "ORDER");
                assert_eq!(p.update.balances[0].wallet_balance, dec!(122624.12345678));
                assert_eq!(p.update.balances[0].balance_change, dec!(50.12345678));
                let position = &p.update.positions[0];
                assert_eq!(position.symbol, "BTCUSDT");
                assert_eq!(position.accumulated_realized, dec!(200));
                assert_eq!(position.position_side, PositionSide::Both);
                assert_eq!(position.breakeven_price, Some(dec!(0)));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_futures_leverage_update() {
        let event = decode(
            r#"{"e":"ACCOUNT_CONFIG_UPDATE","fs":"UM","E":1611646737479,"T":1611646737476,"ac":{"s":"BTCUSDT","l":25}}"#,
        );
        match event.payload {
            Some(UserDataPayload::FuturesLeverageUpdate(p)) => {
                assert_eq!(p.leverage_update.symbol, "BTCUSDT");
                assert_eq!(p.leverage_update.leverage, 25);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_futures_order_update() {
        let event = decode(
            r#"{"e":"ORDER_TRADE_UPDATE","fs":"UM","E":1568879465651,"T":1568879465650,"i":"","o":{"s":"BTCUSDT","c":"TEST","S":"SELL","o":"TRAILING_STOP_MARKET","f":"GTC","q":"0.001","p":"0","ap":"0","sp":"7103.04","x":"NEW","X":"NEW","i":8886774,"l":"0","z":"0","L":"0","N":"USDT","n":"0","T":1568879465650,"t":0,"b":"0","a":"9.91","m":false,"R":false,"ps":"LONG","rp":"0","st":"C_TAKE_PROFIT","si":12893,"V":"EXPIRE_TAKER","gtd":0}}"#,
        );
        let Some(UserDataPayload::FuturesOrderUpdate(p)) = event.payload else {
            panic!("expected futures order update");
        };
        let order = &p.order;
        assert_eq!(order.order_type, "TRAILING_STOP_MARKET");
        assert_eq!(order.stop_price, dec!(7103.04));
        assert_eq!(order.asks_notional, dec!(9.91));
        assert_eq!(order.position_side, PositionSide::Long);
        assert_eq!(order.commission_asset.as_deref(), Some("USDT"));
        assert_eq!(order.strategy_type.as_deref(), Some("C_TAKE_PROFIT"));
        assert_eq!(order.strategy_id, Some(12_893));
        assert_eq!(order.self_trade_prevention_mode, "EXPIRE_TAKER");
        assert_eq!(order.good_till_date, None);
    }

    #[test]
    fn test_futures_order_update_without_conditional_fields() {
        let event = decode(
            r#"{"e":"ORDER_TRADE_UPDATE","fs":"CM","E":1568879465651,"T":1568879465650,"o":{"s":"BTCUSD_PERP","c":"x","S":"BUY","o":"LIMIT","f":"GTD","q":"1","p":"100","ap":"0","sp":"0","x":"NEW","X":"NEW","i":1,"l":"0","z":"0","L":"0","T":1568879465650,"t":0,"b":"100","a":"0","m":false,"R":true,"ps":"BOTH","rp":"0","gtd":1693207680000}}"#,
        );
        let Some(UserDataPayload::FuturesOrderUpdate(p)) = event.payload else {
            panic!("expected futures order update");
        };
        assert_eq!(p.business_unit, BusinessUnit::Cm);
        assert!(p.account_alias.is_empty());
        assert_eq!(p.order.time_in_force, TimeInForce::Gtd);
        assert_eq!(p.order.commission_asset, None);
        assert_eq!(p.order.commission, None);
        assert_eq!(p.order.strategy_type, None);
        assert_eq!(p.order.strategy_id, None);
        assert_eq!(p.order.good_till_date, Some(1_693_207_680_000));
    }

    #[test]
    fn test_futures_conditional_order_update() {
        let event = decode(
            r#"{"e":"CONDITIONAL_ORDER_TRADE_UPDATE","T":1669262908216,"E":1669262908218,"fs":"UM","so":{"s":"BTCUSDT","c":"TEST","si":176057039,"S":"SELL","st":"TRAILING_STOP_MARKET","f":"GTC","q":"0.001","p":"0","sp":"7103.04","os":"NEW","T":1568879465650,"ut":1669262908216,"R":false,"wt":"MARK_PRICE","ps":"LONG","cp":false,"AP":"7476.89","cr":"5.0","i":8886774,"V":"EXPIRE_TAKER","gtd":0}}"#,
        );
        assert_eq!(event.event_time, 1_669_262_908_218);
        let Some(UserDataPayload::FuturesConditionalOrderUpdate(p)) = event.payload else {
            panic!("expected conditional order update");
        };
        let order = &p.strategy_order;
        assert_eq!(order.strategy_id, 176_057_039);
        assert_eq!(order.strategy_status, "NEW");
        assert_eq!(order.working_type, "MARK_PRICE");
        assert_eq!(order.activation_price, Some(dec!(7476.89)));
        assert_eq!(order.callback_rate, Some(dec!(5.0)));
        assert_eq!(order.triggered_order_id, Some(8_886_774));
    }

    #[test]
    fn test_futures_conditional_order_update_not_triggered() {
        let event = decode(
            r#"{"e":"CONDITIONAL_ORDER_TRADE_UPDATE","T":1669262908216,"E":1669262908218,"fs":"UM","so":{"s":"BTCUSDT","c":"TEST","si":176057039,"S":"BUY","st":"STOP","f":"GTC","q":"0.001","p":"100","sp":"101","os":"NEW","T":1568879465650,"ut":1669262908216,"R":false,"wt":"CONTRACT_PRICE","ps":"BOTH","cp":false}}"#,
        );
        let Some(UserDataPayload::FuturesConditionalOrderUpdate(p)) = event.payload else {
            panic!("expected conditional order update");
        };
        assert_eq!(p.strategy_order.activation_price, None);
        assert_eq!(p.strategy_order.callback_rate, None);
        assert_eq!(p.strategy_order.triggered_order_id, None);
    }

    #[test]
    fn test_stream_expired_is_envelope_only() {
        let event = decode(
            r#"{"e":"listenKeyExpired","E":1576653824250,"listenKey":"WsCMN0a4KHUPTQuX6IUnqEZfB1inxmv1qR4kbf1LuEjur5VdbzqvyxqG9TSjVVxv"}"#,
        );
        assert!(event.is_stream_expired());
        assert_eq!(event.event_time, 1_576_653_824_250);
        assert!(event.payload.is_none());
    }

    #[test]
    fn test_unknown_event_passes_through() {
        let event = decode(r#"{"e":"strategyUpdate","E":1669262908218,"su":{"si":1}}"#);
        assert_eq!(
            event.event_type,
            UserDataEventType::Unknown("strategyUpdate".to_string())
        );
        assert_eq!(event.event_time, 1_669_262_908_218);
        assert!(event.payload.is_none());
    }

    #[test]
    fn test_payload_matches_event_type() {
        let event = decode(
            r#"{"e":"ACCOUNT_CONFIG_UPDATE","fs":"UM","E":1611646737479,"T":1611646737476,"ac":{"s":"BTCUSDT","l":25}}"#,
        );
        assert_eq!(event.payload.unwrap().event_type(), event.event_type);
    }

    #[test]
    fn test_envelope_errors() {
        for text in [
            "not json",
            r#"{"E":1}"#,
            r#"{"e":"balanceUpdate"}"#,
            r#"{"e":"balanceUpdate","E":"soon"}"#,
        ] {
            let err = UserDataCodec
                .decode_message(Message::Text(text.to_string()))
                .unwrap_err();
            match err {
                ExchangeError::FrameDecode { event_type, raw, .. } => {
                    assert_eq!(event_type, None);
                    assert_eq!(raw, text);
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn test_payload_error_carries_event_type() {
        let text = r#"{"e":"ACCOUNT_CONFIG_UPDATE","fs":"UM","E":1611646737479,"T":1611646737476,"ac":{"s":"BTCUSDT","l":"high"}}"#;
        let err = UserDataCodec
            .decode_message(Message::Text(text.to_string()))
            .unwrap_err();
        match err {
            ExchangeError::FrameDecode {
                event_type, raw, ..
            } => {
                assert_eq!(event_type.as_deref(), Some("ACCOUNT_CONFIG_UPDATE"));
                assert_eq!(raw, text);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_binary_frame() {
        let text = r#"{"e":"listenKeyExpired","E":1576653824250}"#;
        let event = UserDataCodec
            .decode_message(Message::Binary(text.as_bytes().to_vec()))
            .unwrap()
            .unwrap();
        assert!(event.is_stream_expired());

        let err = UserDataCodec
            .decode_message(Message::Binary(b"{\"e\":\xff}".to_vec()))
            .unwrap_err();
        match err {
            ExchangeError::FrameDecode {
                event_type, raw, ..
            } => {
                assert_eq!(event_type, None);
                assert_eq!(raw, "{\"e\":\u{fffd}}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_control_frames_ignored() {
        assert!(UserDataCodec
            .decode_message(Message::Ping(vec![1]))
            .unwrap()
            .is_none());
        assert!(UserDataCodec
            .decode_message(Message::Pong(vec![]))
            .unwrap()
            .is_none());
    }
}

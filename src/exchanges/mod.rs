pub mod binance_pm;

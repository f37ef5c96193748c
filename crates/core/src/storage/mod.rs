pub mod format;
pub mod manager;
pub mod trade_store;

pub mod analytics;
pub mod calendar;
pub mod mapping;
pub mod settings;
pub mod table;
pub mod trade;
pub mod transaction;

pub mod account_service;
pub mod analytics_service;
pub mod calendar_service;
pub mod column_resolver;
pub mod dedup_service;
pub mod matching_service;
pub mod schema_service;

pub mod kv;
pub mod notifications;

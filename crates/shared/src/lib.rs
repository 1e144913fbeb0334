pub mod chat_api;
pub mod error;
pub mod events;
pub mod settings;

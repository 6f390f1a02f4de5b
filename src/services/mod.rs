pub mod conversation_service;
pub mod crypto;
pub mod event_service;
pub mod message_service;

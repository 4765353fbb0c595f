pub mod blasts;
pub mod health;
pub mod notifications;
pub mod payment_intents;
pub mod payment_records;
pub mod payment_requests;
pub mod push;
pub mod webhooks;

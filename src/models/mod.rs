pub mod auth;
pub mod blast_message;
pub mod notification;
pub mod payment_record;
pub mod payment_request;
pub mod push_subscription;
pub mod team;

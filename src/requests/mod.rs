pub mod blast;
pub mod payment_intent;
pub mod payment_request;
pub mod push;

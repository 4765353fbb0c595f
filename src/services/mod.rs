pub mod auth;
pub mod billing;
pub mod blast;
pub mod issuer;
pub mod ledger;
pub mod push;
pub mod stripe;
pub mod webhook;

//! Request handlers

pub mod health;
pub mod intents;
pub mod mandates;
pub mod payments;
pub mod receipts;
pub mod webhooks;

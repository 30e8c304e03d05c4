//! AgentPay Types - Canonical domain types for the agentic payment gateway
//!
//! This crate contains all foundational types for AgentPay with zero
//! dependencies on other agentpay crates. It defines the type system for:
//!
//! - Identity types (AgentId, IntentId, MandateId, etc.)
//! - Minor-unit amounts and ISO-4217 currencies
//! - The three-phase authorization lifecycle (Intent, Mandate, Payment)
//! - Policy envelopes and receipt chain records
//!
//! # Lifecycle Invariants
//!
//! These types encode the core authorization invariants:
//!
//! 1. Every spend enters the system as a PurchaseIntent
//! 2. At most one mandate exists per intent, at most one SETTLED payment
//!    per mandate
//! 3. Receipts are append-only and hash-chained per agent
//!
//! # Flow
//!
//! ```text
//! Intent → Policy Gate → Mandate → Rail → Payment → Receipt
//! ```

pub mod identity;
pub mod amount;
pub mod agent;
pub mod policy;
pub mod intent;
pub mod mandate;
pub mod payment;
pub mod receipt;
pub mod error;

pub use identity::*;
pub use amount::*;
pub use agent::*;
pub use policy::*;
pub use intent::*;
pub use mandate::*;
pub use payment::*;
pub use receipt::*;
pub use error::*;

/// Version of the AgentPay types schema
pub const TYPES_VERSION: &str = "0.1.0";

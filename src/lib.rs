//! Finance Assistant Fulfillment
//!
//! Webhook backend for a conversational finance assistant:
//! - Receives intents already classified by the NLU platform
//! - Carries mobile number and date range across turns in session contexts
//! - Answers from static account and fund datasets
//! - Never surfaces a raw fault to the user
//!
//! TURN:
//! REQUEST → LOAD CONTEXTS → RESOLVE SLOTS → HANDLE → AGE CONTEXTS → RESPONSE

pub mod agent;
pub mod api;
pub mod config;
pub mod dataset;
pub mod error;
pub mod handlers;
pub mod intent;
pub mod models;
pub mod slots;
pub mod state;

pub use error::{FulfillmentError, Result};

// Re-export common types
pub use agent::{FulfillmentAgent, TurnRequest, TurnResponse};
pub use intent::Intent;
pub use models::*;
pub use state::{ContextSet, SessionContext};

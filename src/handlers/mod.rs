//! Intent handler trait and registry
//!
//! Handlers are pure: they read the turn's parameters, the session's context
//! snapshot and the dataset, and return messages plus context writes. They
//! never touch the session store themselves.

use crate::dataset::Dataset;
use crate::intent::Intent;
use crate::state::{ContextSet, SessionContext};
use crate::Result;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub mod account;
pub mod funds;

pub use account::{
    ChangeMobileNumberHandler, GetLastTransactionHandler, GetMobileNumberHandler,
    PortfolioValuationHandler, TransactionHistoryHandler,
};
pub use funds::{ExploreFundsHandler, GetFundDetailsHandler, InvestInFundHandler};

pub const WELCOME_MESSAGE: &str = "Welcome to the finance bot!";

pub const FALLBACK_MESSAGE: &str = "Sorry, I didn't get that.";

/// Everything a handler may read
#[derive(Clone, Copy)]
pub struct Turn<'a> {
    pub parameters: &'a Map<String, Value>,
    pub contexts: &'a ContextSet,
    pub dataset: &'a Dataset,
}

impl<'a> Turn<'a> {
    /// Non-blank string parameter, trimmed
    pub fn str_param(&self, key: &str) -> Option<&'a str> {
        match self.parameters.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim()),
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .find(|s| !s.is_empty()),
            _ => None,
        }
    }
}

/// Handler output: chat messages in order, plus context writes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fulfillment {
    messages: Vec<String>,
    context_writes: Vec<SessionContext>,
}

impl Fulfillment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(text: impl Into<String>) -> Self {
        let mut fulfillment = Self::new();
        fulfillment.add(text);
        fulfillment
    }

    /// Append one chat bubble
    pub fn add(&mut self, text: impl Into<String>) {
        self.messages.push(text.into());
    }

    pub fn set_context(&mut self, context: SessionContext) {
        self.context_writes.push(context);
    }

    pub fn with_context(mut self, context: SessionContext) -> Self {
        self.set_context(context);
        self
    }

    /// Append another fulfillment's messages and writes after this one's
    pub fn extend(&mut self, other: Fulfillment) {
        self.messages.extend(other.messages);
        self.context_writes.extend(other.context_writes);
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn context_writes(&self) -> &[SessionContext] {
        &self.context_writes
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<SessionContext>) {
        (self.messages, self.context_writes)
    }
}

/// Trait for a single intent handler
pub trait IntentHandler: Send + Sync {
    fn intent(&self) -> Intent;
    fn description(&self) -> &'static str;
    fn handle(&self, turn: &Turn<'_>) -> Result<Fulfillment>;
}

/// Handler lookup keyed by intent
pub struct HandlerRegistry {
    handlers: HashMap<Intent, Arc<dyn IntentHandler>>,
    /// Registration order
    order: Vec<Intent>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn register(&mut self, handler: Arc<dyn IntentHandler>) {
        let intent = handler.intent();
        if self.handlers.insert(intent, handler).is_none() {
            self.order.push(intent);
        }
    }

    pub fn get(&self, intent: Intent) -> Option<Arc<dyn IntentHandler>> {
        self.handlers.get(&intent).cloned()
    }

    pub fn list(&self) -> Vec<Intent> {
        self.order.clone()
    }

    /// Descriptions of the task handlers, in registration order.
    /// Welcome and fallback are conversation glue and are left out.
    pub fn descriptions(&self) -> Vec<&'static str> {
        self.order
            .iter()
            .filter(|intent| !matches!(intent, Intent::Welcome | Intent::Fallback))
            .filter_map(|intent| self.handlers.get(intent))
            .map(|handler| handler.description())
            .collect()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub struct WelcomeHandler;

impl IntentHandler for WelcomeHandler {
    fn intent(&self) -> Intent {
        Intent::Welcome
    }

    fn description(&self) -> &'static str {
        "Greet the user"
    }

    fn handle(&self, _turn: &Turn<'_>) -> Result<Fulfillment> {
        Ok(Fulfillment::message(WELCOME_MESSAGE))
    }
}

/// Default answer for intents nothing else claims
pub struct FallbackHandler {
    capabilities: Vec<&'static str>,
}

impl FallbackHandler {
    pub fn new(capabilities: Vec<&'static str>) -> Self {
        Self { capabilities }
    }
}

impl IntentHandler for FallbackHandler {
    fn intent(&self) -> Intent {
        Intent::Fallback
    }

    fn description(&self) -> &'static str {
        "Explain what the assistant can do"
    }

    fn handle(&self, _turn: &Turn<'_>) -> Result<Fulfillment> {
        let mut fulfillment = Fulfillment::message(FALLBACK_MESSAGE);
        if !self.capabilities.is_empty() {
            let items: Vec<String> = self.capabilities.iter().map(|c| format!("• {}", c)).collect();
            fulfillment.add(format!("Here's what I can do:\n{}", items.join("\n")));
        }
        Ok(fulfillment)
    }
}

/// Registry with every built-in handler
pub fn create_default_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();

    registry.register(Arc::new(WelcomeHandler));

    // Account intents
    registry.register(Arc::new(TransactionHistoryHandler));
    registry.register(Arc::new(GetMobileNumberHandler));
    registry.register(Arc::new(PortfolioValuationHandler));
    registry.register(Arc::new(GetLastTransactionHandler));
    registry.register(Arc::new(ChangeMobileNumberHandler));

    // Fund intents
    registry.register(Arc::new(ExploreFundsHandler));
    registry.register(Arc::new(GetFundDetailsHandler));
    registry.register(Arc::new(InvestInFundHandler));

    // Last, so it can list everything above
    let capabilities = registry.descriptions();
    registry.register(Arc::new(FallbackHandler::new(capabilities)));

    registry
}

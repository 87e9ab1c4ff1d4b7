//! Fulfillment agent - runs one conversational turn
//!
//! LOAD CONTEXTS → DISPATCH → APPLY WRITES → AGE → STORE
//!
//! Handler failures never leave this module: dataset problems become an
//! apology, malformed parameters become a clarification request.

use crate::dataset::DatasetProvider;
use crate::error::FulfillmentError;
use crate::handlers::{Fulfillment, HandlerRegistry, Turn};
use crate::intent::Intent;
use crate::state::{ContextSet, SessionContext, SessionStore};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const APOLOGY_MESSAGE: &str =
    "Sorry, something went wrong while fetching your data. Please try again in a moment.";

/// Session key used when the platform sends none
pub const ANONYMOUS_SESSION: &str = "anonymous";

/// One inbound turn
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub session: String,
    pub intent_name: String,
    pub parameters: Map<String, Value>,
}

impl TurnRequest {
    pub fn new(
        session: impl Into<String>,
        intent_name: impl Into<String>,
        parameters: Map<String, Value>,
    ) -> Self {
        Self {
            session: session.into(),
            intent_name: intent_name.into(),
            parameters,
        }
    }
}

/// Result of a turn
#[derive(Debug, Clone)]
pub struct TurnResponse {
    pub turn_id: Uuid,
    pub intent: Intent,
    pub messages: Vec<String>,
    /// Live contexts after the turn has been aged
    pub contexts: Vec<SessionContext>,
}

impl TurnResponse {
    pub fn text(&self) -> String {
        self.messages.join("\n")
    }
}

pub struct FulfillmentAgent {
    registry: HandlerRegistry,
    sessions: Arc<dyn SessionStore>,
    dataset: Arc<dyn DatasetProvider>,
}

impl FulfillmentAgent {
    pub fn new(
        registry: HandlerRegistry,
        sessions: Arc<dyn SessionStore>,
        dataset: Arc<dyn DatasetProvider>,
    ) -> Self {
        Self {
            registry,
            sessions,
            dataset,
        }
    }

    pub async fn handle_turn(&self, request: TurnRequest) -> TurnResponse {
        let turn_id = Uuid::new_v4();
        let intent = Intent::from_display_name(&request.intent_name);
        let span = info_span!(
            "turn",
            %turn_id,
            session = %request.session,
            intent = %intent
        );

        self.run_turn(turn_id, intent, request).instrument(span).await
    }

    async fn run_turn(&self, turn_id: Uuid, intent: Intent, request: TurnRequest) -> TurnResponse {
        let start = Instant::now();

        if intent == Intent::Fallback {
            debug!(display_name = %request.intent_name, "No dedicated handler, using fallback");
        }

        let mut contexts = match self.sessions.load(&request.session).await {
            Ok(contexts) => contexts,
            Err(e) => {
                warn!("Session load failed, continuing without prior context: {}", e);
                ContextSet::new()
            }
        };

        let (messages, writes) = match self.dispatch(intent, &request.parameters, &contexts).await {
            Ok(fulfillment) => fulfillment.into_parts(),
            Err(e) => (recover(&e), Vec::new()),
        };

        debug!(writes = writes.len(), "Applying context writes");
        contexts.apply(writes);
        contexts.end_turn();

        let live: Vec<SessionContext> = contexts.live().cloned().collect();

        if let Err(e) = self.sessions.save(&request.session, contexts).await {
            warn!("Session save failed, reply is still returned: {}", e);
        }

        info!(
            messages = messages.len(),
            live_contexts = live.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Turn completed"
        );

        TurnResponse {
            turn_id,
            intent,
            messages,
            contexts: live,
        }
    }

    async fn dispatch(
        &self,
        intent: Intent,
        parameters: &Map<String, Value>,
        contexts: &ContextSet,
    ) -> crate::Result<Fulfillment> {
        let handler = self
            .registry
            .get(intent)
            .ok_or_else(|| FulfillmentError::HandlerNotFound(intent.to_string()))?;

        let dataset = self.dataset.snapshot().await?;

        let turn = Turn {
            parameters,
            contexts,
            dataset: &dataset,
        };
        handler.handle(&turn)
    }
}

/// User-facing text for a failed turn
fn recover(err: &FulfillmentError) -> Vec<String> {
    match err {
        FulfillmentError::InvalidParameter { name, reason } => {
            info!(parameter = %name, %reason, "Malformed parameter");
            vec![format!(
                "Sorry, I couldn't understand the {} you gave. Could you say it another way?",
                name.replace(['_', '-'], " ")
            )]
        }
        other => {
            error!("Turn failed: {}", other);
            vec![APOLOGY_MESSAGE.to_string()]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dataset, FileDataset, StaticDataset};
    use crate::handlers::create_default_registry;
    use crate::models::{Account, Transaction};
    use crate::state::{InMemorySessionStore, ASK_MOBILE, GOT_MOBILE};
    use chrono::NaiveDate;
    use serde_json::json;

    fn agent_with(dataset: Arc<dyn DatasetProvider>) -> FulfillmentAgent {
        FulfillmentAgent::new(
            create_default_registry(),
            Arc::new(InMemorySessionStore::new()),
            dataset,
        )
    }

    fn agent() -> FulfillmentAgent {
        let date = |m, d| NaiveDate::from_ymd_opt(2025, m, d).unwrap();
        let dataset = Dataset::new(
            vec![Account {
                mobile: "9876543210".to_string(),
                transactions: vec![
                    Transaction { date: date(4, 5), amount: 500.0, fund_name: "FundA".into() },
                    Transaction { date: date(5, 1), amount: 1200.0, fund_name: "FundB".into() },
                ],
            }],
            vec![],
            vec![],
        );
        agent_with(Arc::new(StaticDataset::new(dataset)))
    }

    fn turn(intent: &str, parameters: Value) -> TurnRequest {
        TurnRequest::new(
            "projects/demo/agent/sessions/s1",
            intent,
            parameters.as_object().cloned().unwrap_or_default(),
        )
    }

    fn has_context(response: &TurnResponse, name: &str) -> bool {
        response.contexts.iter().any(|c| c.name == name)
    }

    #[tokio::test]
    async fn test_slot_merge_across_turns() {
        let agent = agent();

        let first = agent
            .handle_turn(turn(
                "TransactionHistory",
                json!({ "date-period": { "startDate": "2025-04-01", "endDate": "2025-04-30" } }),
            ))
            .await;
        assert!(first.text().contains("mobile number"));
        assert!(has_context(&first, ASK_MOBILE));

        let second = agent
            .handle_turn(turn("GetMobileNumber", json!({ "mobile": "+91 98765-43210" })))
            .await;
        assert!(second.text().contains("FundA"));
        assert!(!second.text().contains("FundB"));
        assert!(has_context(&second, GOT_MOBILE));
        assert!(!has_context(&second, ASK_MOBILE));
    }

    #[tokio::test]
    async fn test_pending_range_expires_after_two_turns() {
        let agent = agent();

        agent
            .handle_turn(turn(
                "TransactionHistory",
                json!({ "date-period": { "startDate": "2025-04-01", "endDate": "2025-04-30" } }),
            ))
            .await;
        let second = agent.handle_turn(turn("Default Welcome Intent", json!({}))).await;
        assert!(has_context(&second, ASK_MOBILE));
        let third = agent.handle_turn(turn("Default Welcome Intent", json!({}))).await;
        assert!(!has_context(&third, ASK_MOBILE));

        let late = agent
            .handle_turn(turn("GetMobileNumber", json!({ "mobile": "9876543210" })))
            .await;
        assert!(late.text().contains("saved"));
    }

    #[tokio::test]
    async fn test_change_mobile_forgets_number() {
        let agent = agent();
        agent
            .handle_turn(turn("GetMobileNumber", json!({ "mobile": "9876543210" })))
            .await;
        let changed = agent.handle_turn(turn("ChangeMobileNumber", json!({}))).await;
        assert!(!has_context(&changed, GOT_MOBILE));
        assert!(has_context(&changed, ASK_MOBILE));

        let valuation = agent.handle_turn(turn("PortfolioValuation", json!({}))).await;
        assert!(valuation.text().contains("mobile number"));
    }

    #[tokio::test]
    async fn test_portfolio_total_after_mobile_given() {
        let agent = agent();
        agent
            .handle_turn(turn("GetMobileNumber", json!({ "mobile": "9876543210" })))
            .await;
        let valuation = agent.handle_turn(turn("PortfolioValuation", json!({}))).await;
        assert!(valuation.text().contains("₹1700.00"));
    }

    #[tokio::test]
    async fn test_unknown_intent_gets_fallback() {
        let response = agent().handle_turn(turn("BookFlight", json!({}))).await;
        assert_eq!(response.intent, Intent::Fallback);
        assert!(response.text().contains("didn't get that"));
    }

    #[tokio::test]
    async fn test_malformed_parameter_asks_for_clarification() {
        let response = agent()
            .handle_turn(turn("InvestInFund", json!({ "fund_name": "FundA", "amount": "lots" })))
            .await;
        assert!(response.text().contains("couldn't understand the amount"));
    }

    #[tokio::test]
    async fn test_dataset_failure_becomes_apology() {
        let dir = tempfile::tempdir().unwrap();
        let agent = agent_with(Arc::new(FileDataset::new(dir.path())));

        let response = agent
            .handle_turn(turn("GetMobileNumber", json!({ "mobile": "9876543210" })))
            .await;
        assert_eq!(response.messages, vec![APOLOGY_MESSAGE.to_string()]);
        assert!(response.contexts.is_empty());
    }
}

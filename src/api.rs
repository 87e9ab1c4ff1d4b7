//! Webhook server
//!
//! Accepts Dialogflow v2 style fulfillment requests and answers with text
//! messages plus the session's live contexts.

use axum::{extract::State, routing::get, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::agent::{FulfillmentAgent, TurnRequest, TurnResponse, ANONYMOUS_SESSION};

pub const GREETING: &str = "Finance assistant fulfillment webhook is running.";

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRequest {
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub response_id: Option<String>,
    pub query_result: QueryResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default)]
    pub query_text: Option<String>,
    pub intent: IntentRef,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentRef {
    pub display_name: String,
}

/// =============================
/// Response Models
/// =============================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub fulfillment_text: String,
    pub fulfillment_messages: Vec<FulfillmentMessage>,
    pub output_contexts: Vec<OutputContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentMessage {
    pub text: TextMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextMessage {
    pub text: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputContext {
    pub name: String,
    pub lifespan_count: u32,
    pub parameters: Map<String, Value>,
}

impl WebhookResponse {
    pub fn from_turn(session: &str, turn: TurnResponse) -> Self {
        let fulfillment_text = turn.text();

        let fulfillment_messages = turn
            .messages
            .into_iter()
            .map(|text| FulfillmentMessage {
                text: TextMessage { text: vec![text] },
            })
            .collect();

        let output_contexts = turn
            .contexts
            .into_iter()
            .map(|ctx| OutputContext {
                name: format!("{}/contexts/{}", session, ctx.name),
                lifespan_count: ctx.lifespan,
                parameters: ctx.parameters,
            })
            .collect();

        Self {
            fulfillment_text,
            fulfillment_messages,
            output_contexts,
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<FulfillmentAgent>,
}

/// =============================
/// Endpoints
/// =============================

async fn root() -> &'static str {
    GREETING
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn webhook(
    State(state): State<ApiState>,
    Json(req): Json<WebhookRequest>,
) -> Json<WebhookResponse> {
    let session = req
        .session
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| ANONYMOUS_SESSION.to_string());

    info!(
        intent = %req.query_result.intent.display_name,
        response_id = ?req.response_id,
        "Webhook request"
    );

    let turn = state
        .agent
        .handle_turn(TurnRequest::new(
            session.clone(),
            req.query_result.intent.display_name,
            req.query_result.parameters,
        ))
        .await;

    Json(WebhookResponse::from_turn(&session, turn))
}

/// =============================
/// Router
/// =============================

pub fn create_router(agent: Arc<FulfillmentAgent>) -> Router {
    let state = ApiState { agent };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/webhook", post(webhook))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    agent: Arc<FulfillmentAgent>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(agent);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("Webhook listening on http://0.0.0.0:{}/webhook", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SessionContext;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_request_parses_dialogflow_payload() {
        let req: WebhookRequest = serde_json::from_value(json!({
            "responseId": "r-1",
            "session": "projects/demo/agent/sessions/abc",
            "queryResult": {
                "queryText": "show my transactions for april",
                "intent": { "displayName": "TransactionHistory" },
                "parameters": { "date-period": { "startDate": "2025-04-01", "endDate": "2025-04-30" } },
                "outputContexts": []
            }
        }))
        .unwrap();

        assert_eq!(req.query_result.intent.display_name, "TransactionHistory");
        assert!(req.query_result.parameters.contains_key("date-period"));
    }

    #[test]
    fn test_response_shape() {
        let turn = TurnResponse {
            turn_id: Uuid::new_v4(),
            intent: crate::intent::Intent::Welcome,
            messages: vec!["one".into(), "two".into()],
            contexts: vec![SessionContext::new("got_mobile", 4, Map::new())],
        };

        let value = serde_json::to_value(WebhookResponse::from_turn("sessions/s1", turn)).unwrap();
        assert_eq!(value["fulfillmentText"], "one\ntwo");
        assert_eq!(value["fulfillmentMessages"][1]["text"]["text"][0], "two");
        assert_eq!(value["outputContexts"][0]["name"], "sessions/s1/contexts/got_mobile");
        assert_eq!(value["outputContexts"][0]["lifespanCount"], 4);
    }
}

//! Replays a scripted conversation through the agent.
//!
//! Usage: `replay <turns.json>` where the file holds
//! `[{ "intent": "TransactionHistory", "parameters": { ... } }, ...]`.

use finance_fulfillment::{
    agent::{FulfillmentAgent, TurnRequest},
    config::ServerConfig,
    dataset::open_provider,
    handlers::create_default_registry,
    state::InMemorySessionStore,
    Result,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const REPLAY_SESSION: &str = "replay";

#[derive(Debug, Deserialize)]
struct ScriptedTurn {
    intent: String,
    #[serde(default)]
    parameters: Map<String, Value>,
}

fn load_script(path: &str) -> Result<Vec<ScriptedTurn>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let Some(script_path) = std::env::args().nth(1) else {
        eprintln!("usage: replay <turns.json>");
        std::process::exit(2);
    };

    let script = load_script(&script_path)?;
    let config = ServerConfig::from_env()?;

    info!(turns = script.len(), path = %script_path, "Replaying conversation");

    let agent = FulfillmentAgent::new(
        create_default_registry(),
        Arc::new(InMemorySessionStore::new()),
        open_provider(config.dataset_mode, &config.data_dir).await?,
    );

    for (i, turn) in script.into_iter().enumerate() {
        println!("\n[{}] > {} {}", i + 1, turn.intent, Value::Object(turn.parameters.clone()));

        let response = agent
            .handle_turn(TurnRequest::new(REPLAY_SESSION, turn.intent, turn.parameters))
            .await;

        for message in &response.messages {
            println!("    {}", message.replace('\n', "\n    "));
        }

        let live: Vec<String> = response
            .contexts
            .iter()
            .map(|c| format!("{}({})", c.name, c.lifespan))
            .collect();
        if !live.is_empty() {
            println!("    contexts: {}", live.join(", "));
        }
    }

    Ok(())
}

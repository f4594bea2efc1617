use chat_session_orchestrator::{
    audit::verify_export,
    llm::OpenAiCompatibleClient,
    memory::SessionStore,
    prompts, AppConfig, CallOptions, Result, SessionService, TurnOrchestrator,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

const HELP: &str = "Commands: /summary  /export  /clear  /new [profile]  /quit";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    dotenv::dotenv().ok();

    let config = Arc::new(AppConfig::from_env());
    let profile = std::env::args().nth(1).unwrap_or_else(|| prompts::DEFAULT_PROFILE.to_string());

    let store = Arc::new(SessionStore::new(config.retention_policy()));
    let model = Arc::new(OpenAiCompatibleClient::from_config(&config));
    let orchestrator = TurnOrchestrator::new(store.clone(), model, config.clone());
    let sessions = SessionService::new(store, config.clone());

    let mut session_id = sessions.create_session(&profile).await;
    info!(session_id = %session_id, "Chat session started");

    println!("Chat session {} ({} profile, model {})", session_id, profile, config.model);
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input.split_once(' ').map_or((input, ""), |(cmd, rest)| (cmd, rest.trim())) {
            ("/quit", _) | ("/exit", _) => break,
            ("/help", _) => println!("{}", HELP),
            ("/clear", _) => {
                sessions.clear(&session_id).await;
                println!("Conversation cleared");
            }
            ("/new", rest) => {
                let name = if rest.is_empty() { profile.as_str() } else { rest };
                session_id = sessions.create_session(name).await;
                println!("New session {}", session_id);
            }
            ("/summary", _) => match sessions.summarize(&session_id).await {
                Ok(summary) => println!(
                    "{} messages ({} user, {} assistant), last activity {}",
                    summary.total_messages,
                    summary.user_messages,
                    summary.ai_messages,
                    summary.last_activity.format("%H:%M:%S")
                ),
                Err(e) => eprintln!("Error: {}", e),
            },
            ("/export", _) => match sessions.export(&session_id).await {
                Ok(export) => {
                    println!("{}", serde_json::to_string_pretty(&export)?);
                    println!("checksum verified: {}", verify_export(&export));
                }
                Err(e) => eprintln!("Error: {}", e),
            },
            _ => {
                let result = orchestrator
                    .submit_turn(Some(&session_id), input, CallOptions::default())
                    .await;

                session_id = result.session_id.clone();
                match (result.response, result.error) {
                    (Some(reply), _) => println!(
                        "AI: {}\n   ({:.2}s)",
                        reply,
                        result.response_time.unwrap_or_default()
                    ),
                    (None, Some(error)) => eprintln!("Error: {}", error),
                    (None, None) => {}
                }
            }
        }
    }

    Ok(())
}

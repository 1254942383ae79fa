//! Dialogue Coach demo binary
//!
//! Runs an interactive coaching session on stdin. State is persisted under
//! the configured state directory, so passing the printed session id back in
//! resumes the conversation.
//!
//! Usage: `dialogue-coach [SESSION_ID]`

use std::error::Error;
use std::io::Write;
use std::sync::Arc;

use secrecy::ExposeSecret;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use dialogue_coach::adapters::ai::{
    GenerativePatternEnricher, MockAIProvider, OpenAIConfig, OpenAIProvider,
    ProviderReplyGenerator,
};
use dialogue_coach::adapters::storage::FileStateStorage;
use dialogue_coach::application::{
    CoachingEngine, SendCoachMessageCommand, SendCoachMessageError, SendCoachMessageHandler,
};
use dialogue_coach::config::{AiConfig, AiProvider, AppConfig, LoggingConfig};
use dialogue_coach::domain::coaching::{ChatMessage, InstructionTemplates};
use dialogue_coach::domain::foundation::SessionId;
use dialogue_coach::ports::{AIError, AIProvider};

type BoxError = Box<dyn Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    config.validate()?;
    init_tracing(&config.logging);

    let session_id = match std::env::args().nth(1) {
        Some(raw) => raw.parse::<SessionId>()?,
        None => SessionId::new(),
    };

    // === Dependency Injection ===
    let provider = build_provider(&config.ai)?;
    let generator = Arc::new(
        ProviderReplyGenerator::new(provider)
            .with_parse_retries(config.ai.parse_retries)
            .with_temperature(config.ai.temperature)
            .with_max_tokens(config.ai.max_tokens),
    );

    let mut engine = CoachingEngine::new(generator.clone())
        .with_max_regenerations(config.engine.max_regenerations);
    if config.engine.enrichment_enabled {
        let enricher = GenerativePatternEnricher::new(generator, InstructionTemplates::standard())
            .with_min_history(config.engine.min_history_for_enrichment);
        engine = engine.with_enricher(Arc::new(enricher));
    }

    let storage = Arc::new(FileStateStorage::new(&config.storage.state_dir));
    let handler = SendCoachMessageHandler::new(Arc::new(engine), storage);

    tracing::info!(
        session_id = %session_id,
        model = %config.ai.model(),
        "Starting coaching session"
    );
    println!("Session {}", session_id);

    run_session(&handler, session_id).await
}

fn init_tracing(logging: &LoggingConfig) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.trim().to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_provider(config: &AiConfig) -> Result<Arc<dyn AIProvider>, AIError> {
    let openai = match config.provider {
        AiProvider::Mock => return Ok(Arc::new(MockAIProvider::new())),
        AiProvider::OpenAI => {
            let key = config
                .api_key
                .as_ref()
                .map(|k| k.expose_secret().clone())
                .unwrap_or_default();
            OpenAIConfig::new(key)
        }
        AiProvider::Ollama => OpenAIConfig::ollama(config.model()),
    };

    let mut openai = openai
        .with_model(config.model())
        .with_timeout(config.timeout())
        .with_max_retries(config.max_retries);
    if let Some(url) = &config.base_url {
        openai = openai.with_base_url(url);
    }

    Ok(Arc::new(OpenAIProvider::new(openai)?))
}

async fn run_session(
    handler: &SendCoachMessageHandler,
    session_id: SessionId,
) -> Result<(), BoxError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    prompt("What decision are you facing? ")?;
    let situation = match lines.next_line().await? {
        Some(line) if !line.trim().is_empty() => line.trim().to_string(),
        _ => return Ok(()),
    };

    let mut history: Vec<ChatMessage> = Vec::new();
    println!("Tell me more. An empty line ends the session.");

    loop {
        prompt("> ")?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let content = line.trim();
        if content.is_empty() {
            break;
        }

        let cmd = SendCoachMessageCommand::new(session_id, content, situation.as_str())
            .with_history(history.clone());
        match handler.handle(cmd).await {
            Ok(turn) => {
                println!("\n[{}] {}", turn.state.current_phase.label(), turn.text);
                if let Some(tooltip) = &turn.tooltip {
                    println!("  (why: {})", tooltip);
                }
                if let Some(options) = &turn.suggested_options {
                    for option in options {
                        println!("  - {}", option);
                    }
                }
                println!();
                history.push(ChatMessage::user(content));
                history.push(ChatMessage::assistant(turn.text));
            }
            Err(SendCoachMessageError::Engine(err)) if err.is_retryable() => {
                tracing::warn!(error = %err, "Turn failed, state unchanged");
                println!("Something went wrong generating a reply. Please try again.");
            }
            Err(err) => return Err(err.into()),
        }
    }

    println!("Session {} saved.", session_id);
    Ok(())
}

fn prompt(text: &str) -> std::io::Result<()> {
    print!("{}", text);
    std::io::stdout().flush()
}

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use concierge_core::{Plan, UserId};
use concierge_engine::{
    EngineConfig, LlmPlanner, OpenAiClient, Pipeline, PipelineResponse, validate,
};
use concierge_state::{InMemoryCache, SqliteStore, StateConfig, StateManager};
use concierge_testing::ScriptedLlm;

mod backends;

use backends::demo_catalog;

#[derive(Parser, Debug)]
#[command(name = "concierge", version)]
#[command(about = "Concierge - natural-language assistant over a fixed tool catalog")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive chat against an OpenAI-compatible planner backend
    Chat {
        /// SQLite database path (in-memory when omitted)
        #[arg(long)]
        db: Option<PathBuf>,
        /// Base URL of the chat-completions endpoint
        #[arg(long, default_value = "https://api.openai.com/v1")]
        base_url: String,
        /// Planner model name
        #[arg(long, default_value = "gpt-4o-mini")]
        model: String,
        /// Session lifetime, e.g. "24h" or "90m"
        #[arg(long, default_value = "24h")]
        session_ttl: String,
        /// Maximum concurrently running plan steps
        #[arg(long, default_value_t = 1)]
        max_inflight: usize,
    },
    /// Run a canned conversation with a scripted planner (no network)
    Demo,
    /// List the registered tools and their declared preconditions
    Tools,
    /// Validate a plan JSON file against the standard catalog
    Validate {
        /// Path to a JSON file holding {"steps": [...]}
        file: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let env_filter = match "info".parse() {
        Ok(directive) => env_filter.add_directive(directive),
        Err(_) => env_filter,
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Chat {
            db,
            base_url,
            model,
            session_ttl,
            max_inflight,
        } => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| "OPENAI_API_KEY is not set; use `concierge demo` for offline use")?;
            let ttl = humantime::parse_duration(&session_ttl)?;
            let mut config = EngineConfig::default();
            config.planner_model = model;
            config.max_inflight_steps = max_inflight;

            let planner = Arc::new(LlmPlanner::new(
                OpenAiClient::new(base_url, api_key),
                config.clone(),
            ));
            runtime.block_on(chat(db, planner, config, ttl.as_secs()))
        }
        Commands::Demo => runtime.block_on(demo()),
        Commands::Tools => {
            list_tools();
            Ok(())
        }
        Commands::Validate { file } => validate_file(&file),
    }
}

async fn chat(
    db: Option<PathBuf>,
    planner: Arc<LlmPlanner<OpenAiClient>>,
    config: EngineConfig,
    session_lifetime_secs: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let durable = match db {
        Some(path) => SqliteStore::open(path)?,
        None => SqliteStore::in_memory()?,
    };
    let mut state_config = StateConfig::default();
    state_config.session_lifetime_secs = session_lifetime_secs;
    let state = Arc::new(StateManager::new(
        Arc::new(durable),
        Arc::new(InMemoryCache::new()),
        state_config,
    ));

    let pipeline = Pipeline::new(Arc::new(demo_catalog()), planner, Arc::clone(&state), config);
    let session = state.create_session(UserId::parse("local-user")?).await?;
    let conversation = concierge_core::ConversationId::generate();
    tracing::info!(session_id = %session.id, conversation_id = %conversation, "chat session started");

    println!("Connected. Type a message, or an empty line to quit.");
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let message = line.trim();
        if message.is_empty() {
            break;
        }

        match pipeline.handle(&session.id, &conversation, message).await {
            Ok(response) => print_response(&response),
            Err(error) => tracing::error!(error = %error, "request failed"),
        }
    }
    Ok(())
}

/// Canned three-message conversation over the demo backends, including a
/// bare deletion that gets its lookup step inserted.
async fn demo() -> Result<(), Box<dyn std::error::Error>> {
    let exchanges = [
        (
            "What do I have coming up?",
            serde_json::json!({"plan": {"steps": [
                {"tool": "get_events", "args": {"window": "7d"}}
            ]}})
            .to_string(),
        ),
        (
            "Cancel the standup.",
            serde_json::json!({"plan": {"steps": [
                {"tool": "delete_event", "args": {
                    "event_id": {"$bind": {"step": 0, "field": "id"}}
                }}
            ]}})
            .to_string(),
        ),
        (
            "Thanks!",
            serde_json::json!({"answer": "You're welcome!"}).to_string(),
        ),
    ];

    let mut llm = ScriptedLlm::new();
    for (_, reply) in &exchanges {
        llm = llm.with_completion(reply.clone());
    }

    let config = EngineConfig::default();
    let state = Arc::new(StateManager::new(
        Arc::new(SqliteStore::in_memory()?),
        Arc::new(InMemoryCache::new()),
        StateConfig::default(),
    ));
    let planner = Arc::new(LlmPlanner::new(llm, config.clone()));
    let pipeline = Pipeline::new(Arc::new(demo_catalog()), planner, Arc::clone(&state), config);
    let session = state.create_session(UserId::parse("demo-user")?).await?;
    let conversation = concierge_core::ConversationId::generate();

    for (message, _) in &exchanges {
        println!("> {message}");
        let response = pipeline.handle(&session.id, &conversation, message).await?;
        print_response(&response);
    }
    Ok(())
}

fn print_response(response: &PipelineResponse) {
    for trace in &response.traces {
        println!("  [{:?} {} in {}ms]", trace.status, trace.tool, trace.duration_ms);
    }
    println!("{}", response.answer);
}

fn list_tools() {
    let catalog = demo_catalog();
    for descriptor in catalog.descriptors() {
        println!("{}", descriptor.name);
        println!("  {}", descriptor.description);
        for field in &descriptor.fields {
            let req = if field.required { "required" } else { "optional" };
            println!("  - {} ({:?}, {req})", field.name, field.kind);
        }
        if let Some(pre) = &descriptor.precondition {
            println!(
                "  requires: earlier {} step providing '{}' bound to '{}'",
                pre.requires_tool, pre.provides_field, pre.binds_to
            );
        }
    }
}

fn validate_file(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    let plan: Plan = serde_json::from_str(&raw)?;
    let catalog = demo_catalog();

    match validate(plan, &catalog) {
        Ok(validated) => {
            println!("plan is valid ({} steps after repair):", validated.plan().steps.len());
            println!("{}", serde_json::to_string_pretty(validated.plan())?);
            Ok(())
        }
        Err(violation) => {
            eprintln!("plan rejected: {violation}");
            std::process::exit(1);
        }
    }
}

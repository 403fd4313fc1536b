use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use parley_config::{ConfigLoader, ParleyConfig, WarningSeverity};
use parley_core::ParleyError;
use parley_llm::GeminiClient;
use parley_runtime::{Engine, EngineConfig, TranscriptStore};

mod chat;
mod start;

/// Parley: Gemini tool-calling assistant for the web and Telegram
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to parley.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server and the Telegram bot
    Start {
        /// Don't start the HTTP server
        #[arg(long)]
        no_server: bool,
        /// Don't start the Telegram bot
        #[arg(long)]
        no_telegram: bool,
    },
    /// Interactive chat in the terminal
    Chat {
        /// Session ID to use (a new one is generated if omitted)
        #[arg(short, long)]
        session: Option<String>,
    },
    /// Query the health endpoint of a running server
    Status,
    /// Show version and build info
    Version,
    /// Show current configuration (API keys redacted)
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate the configuration and report problems
    Doctor,
}

impl Cli {
    pub async fn run(self) -> parley_core::Result<()> {
        // Load config first so we can use it for log format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // --verbose > --quiet > --log-level > config
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level
                .as_deref()
                .unwrap_or(config.logging.level.as_str())
        };
        init_tracing(log_level, &config.logging.format);

        match self.command {
            Commands::Start {
                no_server,
                no_telegram,
            } => start::cmd_start(config, no_server, no_telegram).await,
            Commands::Chat { session } => chat::cmd_chat(config, session).await,
            Commands::Status => Self::cmd_status(config).await,
            Commands::Version => Self::cmd_version(),
            Commands::Config { json } => Self::cmd_config(config, json),
            Commands::Doctor => Self::cmd_doctor(config, &config_loader),
        }
    }

    async fn cmd_status(config: ParleyConfig) -> parley_core::Result<()> {
        let listen = config.server.listen.replace("0.0.0.0", "127.0.0.1");
        println!("Checking status at http://{listen}...");

        let client = reqwest::Client::new();
        match client.get(format!("http://{listen}/health")).send().await {
            Ok(resp) => {
                let data: serde_json::Value = resp
                    .json()
                    .await
                    .map_err(|e| ParleyError::Other(e.into()))?;
                println!("{}", serde_json::to_string_pretty(&data)?);
            }
            Err(_) => {
                println!("❌ Parley is not running at {listen}");
            }
        }
        Ok(())
    }

    fn cmd_version() -> parley_core::Result<()> {
        println!("parley {}", env!("CARGO_PKG_VERSION"));
        println!("   Rust edition: 2024");
        println!("   Platform: {}/{}", std::env::consts::OS, std::env::consts::ARCH);
        Ok(())
    }

    fn cmd_config(config: ParleyConfig, json: bool) -> parley_core::Result<()> {
        let config = redact(config);
        if json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config).map_err(|e| ParleyError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    fn cmd_doctor(config: ParleyConfig, loader: &ConfigLoader) -> parley_core::Result<()> {
        println!("🩺 Checking {}", loader.path().display());
        println!();

        let warnings = match config.validate() {
            Ok(w) => w,
            Err(e) => return Err(ParleyError::Config(e)),
        };
        if warnings.is_empty() {
            println!("✅ No problems found.");
            return Ok(());
        }
        for w in &warnings {
            println!("{w}");
        }
        let warned = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Warning)
            .count();
        println!();
        println!("{} warning(s), {} note(s)", warned, warnings.len() - warned);
        Ok(())
    }
}

/// Initialize tracing. `RUST_LOG` wins over `level` when set.
fn init_tracing(level: &str, format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    match format {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .init(),
        "compact" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .with_target(false)
            .init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
    }
}

/// Wire the Gemini client, the built-in tools and a fresh transcript store
/// into an engine.
pub(crate) fn build_engine(config: &ParleyConfig) -> parley_core::Result<Arc<Engine>> {
    let api_key = config
        .services
        .gemini_api_key
        .clone()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            ParleyError::Config(
                "no Gemini API key: set services.gemini_api_key in parley.toml or GEMINI_API_KEY"
                    .into(),
            )
        })?;

    let client = GeminiClient::new(api_key, &config.agent.model)
        .with_base_url(&config.agent.base_url)
        .with_system_prompt(config.agent.system_prompt.clone())
        .with_temperature(config.agent.temperature);
    let registry = parley_tools::default_registry(&config.services)?;

    Ok(Arc::new(Engine::new(
        Arc::new(client),
        Arc::new(registry),
        TranscriptStore::new(),
        EngineConfig::from_config(config),
    )))
}

fn redact(mut config: ParleyConfig) -> ParleyConfig {
    let hide = |v: &mut Option<String>| {
        if v.is_some() {
            *v = Some("********".into());
        }
    };
    let services = &mut config.services;
    hide(&mut services.gemini_api_key);
    hide(&mut services.google_search_api_key);
    hide(&mut services.cloudinary_api_key);
    hide(&mut services.cloudinary_api_secret);
    hide(&mut config.telegram.token);
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_start_flags() {
        let cli = Cli::try_parse_from(["parley", "start", "--no-telegram", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Start {
                no_server: false,
                no_telegram: true
            }
        ));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["parley", "-v", "-q", "version"]).is_err());
    }

    #[test]
    fn test_redact_hides_secrets() {
        let mut config = ParleyConfig::default();
        config.services.gemini_api_key = Some("AIza-secret".into());
        config.telegram.token = Some("123:abc".into());
        let shown = redact(config);
        assert_eq!(shown.services.gemini_api_key.as_deref(), Some("********"));
        assert_eq!(shown.telegram.token.as_deref(), Some("********"));
        assert!(shown.services.google_cse_id.is_none());
    }

    #[test]
    fn test_build_engine_requires_key() {
        let err = build_engine(&ParleyConfig::default()).err().unwrap();
        assert!(matches!(err, ParleyError::Config(_)));
    }

    #[test]
    fn test_build_engine_registers_tools() {
        let mut config = ParleyConfig::default();
        config.services.gemini_api_key = Some("key".into());
        let engine = build_engine(&config).unwrap();
        assert_eq!(engine.registry().len(), 4);
        assert_eq!(engine.config().max_tool_rounds, 5);
    }
}

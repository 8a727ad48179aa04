//! Serve command - starts the Hanji webhook server
//!
//! Loads the bot configuration, resolves the LINE and Gemini credentials,
//! wires the store, AI mode flag, reply generators and LINE platform into a
//! webhook handler, and serves it until Ctrl+C.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use hanji_core::{AiModeFlag, MessageStore, DEFAULT_HISTORY_CAPACITY, DEFAULT_PERSONA_NAME};
use hanji_llm::{GoogleConfig, GoogleProvider};
use hanji_triggers::{
    CannedResponder, CannedResponseTable, LineConfig, LinePlatform, ReplyDispatcher,
    WebhookHandler, WebhookHandlerConfig, WebhookServer, WebhookServerConfig,
    DEFAULT_PERSONA_TAG,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const DEFAULT_LINE_TOKEN_ENV: &str = "LINE_CHANNEL_ACCESS_TOKEN";
const DEFAULT_GEMINI_KEY_ENV: &str = "GEMINI_API_KEY";

/// Bot configuration loaded from YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServeConfig {
    /// API version (hanji.dev/v1)
    #[serde(rename = "apiVersion")]
    pub api_version: Option<String>,

    /// Kind (BotConfig)
    pub kind: Option<String>,

    #[serde(default)]
    pub metadata: ConfigMetadata,

    #[serde(default)]
    pub spec: BotSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigMetadata {
    pub name: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotSpec {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub line: LineSettings,

    #[serde(default)]
    pub gemini: GeminiSettings,

    #[serde(default)]
    pub bot: BotSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_true")]
    pub cors: bool,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum request body in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors: true,
            timeout_secs: default_timeout(),
            max_body_size: default_max_body_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSettings {
    /// Channel access token (or env var name with _env suffix)
    pub channel_access_token: Option<String>,
    #[serde(default = "default_line_token_env")]
    pub channel_access_token_env: String,

    #[serde(default = "default_line_api_base")]
    pub api_base: String,

    #[serde(default = "default_client_timeout")]
    pub timeout_secs: u64,
}

impl Default for LineSettings {
    fn default() -> Self {
        Self {
            channel_access_token: None,
            channel_access_token_env: default_line_token_env(),
            api_base: default_line_api_base(),
            timeout_secs: default_client_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    #[serde(default = "default_gemini_key_env")]
    pub api_key_env: String,

    /// Model name; the provider default when unset
    pub model: Option<String>,

    /// API endpoint; the public Gemini endpoint when unset
    pub endpoint: Option<String>,

    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,

    #[serde(default = "default_client_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_gemini_key_env(),
            model: None,
            endpoint: None,
            temperature: None,
            max_output_tokens: None,
            timeout_secs: default_client_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Name that triggers a reply
    #[serde(default = "default_persona_name")]
    pub persona_name: String,

    /// Prefix of canned replies
    #[serde(default = "default_persona_tag")]
    pub persona_tag: String,

    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Initial AI mode
    #[serde(default)]
    pub use_ai: bool,

    /// YAML file replacing the built-in canned responses
    pub responses_file: Option<PathBuf>,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            persona_name: default_persona_name(),
            persona_tag: default_persona_tag(),
            history_capacity: default_history_capacity(),
            use_ai: false,
            responses_file: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

fn default_max_body_size() -> usize {
    1024 * 1024
}

fn default_client_timeout() -> u64 {
    10
}

fn default_line_token_env() -> String {
    DEFAULT_LINE_TOKEN_ENV.to_string()
}

fn default_line_api_base() -> String {
    LineConfig::default().api_base
}

fn default_gemini_key_env() -> String {
    DEFAULT_GEMINI_KEY_ENV.to_string()
}

fn default_persona_name() -> String {
    DEFAULT_PERSONA_NAME.to_string()
}

fn default_persona_tag() -> String {
    DEFAULT_PERSONA_TAG.to_string()
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

/// Resolve a value that can come from config or environment variable
fn resolve_env_value(direct: Option<&str>, env_name: Option<&str>) -> Option<String> {
    if let Some(val) = direct {
        return Some(val.to_string());
    }

    env_name.and_then(|name| std::env::var(name).ok())
}

/// Parse a YAML configuration, reporting the path of the offending field
pub fn parse_config(content: &str) -> anyhow::Result<ServeConfig> {
    let deserializer = serde_yaml::Deserializer::from_str(content);
    serde_path_to_error::deserialize(deserializer).map_err(|e| {
        let path = e.path().to_string();
        anyhow::anyhow!("Invalid configuration at '{}': {}", path, e.into_inner())
    })
}

/// Load a YAML configuration file
pub fn load_config(path: &Path) -> anyhow::Result<ServeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config(&content)
}

/// Assemble the webhook server from configuration
pub fn build_server(config: &ServeConfig, bind_addr: SocketAddr) -> anyhow::Result<WebhookServer> {
    let spec = &config.spec;

    if spec.bot.persona_name.trim().is_empty() {
        anyhow::bail!("spec.bot.persona_name must not be empty");
    }

    // LINE
    let line_token = resolve_env_value(
        spec.line.channel_access_token.as_deref(),
        Some(spec.line.channel_access_token_env.as_str()),
    );
    if line_token.is_none() {
        warn!(
            "No LINE channel access token ({} unset); replies are disabled",
            spec.line.channel_access_token_env
        );
    }
    let platform = LinePlatform::new(LineConfig {
        channel_access_token: line_token,
        api_base: spec.line.api_base.clone(),
        timeout_secs: spec.line.timeout_secs,
    })?;

    // Gemini
    let mut gemini_config = GoogleConfig {
        api_key: resolve_env_value(
            spec.gemini.api_key.as_deref(),
            Some(spec.gemini.api_key_env.as_str()),
        ),
        max_output_tokens: spec.gemini.max_output_tokens,
        timeout_secs: spec.gemini.timeout_secs,
        ..Default::default()
    };
    if let Some(model) = &spec.gemini.model {
        gemini_config.model = model.clone();
    }
    if let Some(endpoint) = &spec.gemini.endpoint {
        gemini_config.endpoint = endpoint.clone();
    }
    if let Some(temperature) = spec.gemini.temperature {
        gemini_config.temperature = temperature;
    }
    let gemini = GoogleProvider::create(gemini_config)?;

    // Canned responses
    let table = match &spec.bot.responses_file {
        Some(path) => {
            let table = CannedResponseTable::from_file(path).with_context(|| {
                format!("Failed to load canned responses from {}", path.display())
            })?;
            info!("Loaded {} canned categories from {}", table.categories().len(), path.display());
            table
        }
        None => CannedResponseTable::default(),
    };
    let canned = CannedResponder::new(table).with_persona_tag(spec.bot.persona_tag.clone());

    let dispatcher = ReplyDispatcher::new(
        Arc::new(platform),
        Arc::new(gemini),
        Arc::new(canned),
        Arc::new(AiModeFlag::new(spec.bot.use_ai)),
    );
    let handler = WebhookHandler::with_config(
        dispatcher,
        Arc::new(MessageStore::with_capacity(spec.bot.history_capacity)),
        WebhookHandlerConfig {
            persona_name: spec.bot.persona_name.clone(),
        },
    );

    let server_config = WebhookServerConfig {
        bind_addr,
        enable_cors: spec.server.cors,
        timeout_secs: spec.server.timeout_secs,
        max_body_size: spec.server.max_body_size,
    };

    Ok(WebhookServer::with_config(Arc::new(handler), server_config))
}

/// Execute the serve command
pub async fn execute(
    config_file: Option<&str>,
    port: Option<u16>,
    host: Option<&str>,
) -> anyhow::Result<()> {
    let config = match config_file {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            load_config(Path::new(path))?
        }
        None => ServeConfig::default(),
    };

    // Apply CLI overrides
    let server_port = port.unwrap_or(config.spec.server.port);
    let server_host = host.unwrap_or(&config.spec.server.host);

    let bind_addr: SocketAddr = format!("{}:{}", server_host, server_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    let server = build_server(&config, bind_addr)?;

    info!(
        "Starting {} (persona {}, AI mode {})",
        config.metadata.name.as_deref().unwrap_or("hanji"),
        config.spec.bot.persona_name,
        if config.spec.bot.use_ai { "on" } else { "off" }
    );
    info!("  Webhook endpoint: http://{}/api/messages", bind_addr);
    info!("  Health check: http://{}/health", bind_addr);
    info!("Press Ctrl+C to stop");

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server...");
    };

    server
        .serve_with_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("Server stopped gracefully");
    Ok(())
}

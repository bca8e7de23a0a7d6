use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::ai::AiDifficulty;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub server: ServerSettings,
    #[serde(default)]
    pub game: GameSettings,
    #[serde(default)]
    pub ai: AiSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        println!("Loading configuration for RUN_MODE: {}", &run_mode);

        let s = Config::builder()
            // Load environment-specific file (e.g., development.toml, production.toml)
            .add_source(
                File::with_name(&format!("config/{}", run_mode))
                    .format(FileFormat::Toml)
                    .required(true),
            )
            // Add environment variables (e.g., APP_GAME__REVEAL_TIMEOUT_MS=2000)
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind_address: String,
    pub port: u16,
    pub log_level: String,
    pub metrics_auth_token: Option<String>,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_seconds: u64,
}

fn default_heartbeat_interval() -> u64 {
    5
}

fn default_heartbeat_timeout() -> u64 {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub directory: String,
    pub filename: String,
}

/// When arcana become usable in a match.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AscensionTrigger {
    /// On the first capture of the match.
    FirstCapture,
    /// From the opening position.
    Immediate,
    /// Once the match reaches the given ply.
    Ply(u32),
}

/// Per-match rules knobs. Every field has a default so a config file may
/// omit the whole `[game]` table.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GameSettings {
    pub draw_cooldown_plies: u32,
    pub history_capacity: usize,
    pub idempotency_ttl_ms: u64,
    pub idempotency_capacity: usize,
    pub reveal_timeout_ms: u64,
    pub ai_think_timeout_ms: u64,
    pub max_hand_size: usize,
    pub ascension_trigger: AscensionTrigger,
    /// `None` keeps Divine Intervention armed until it fires.
    pub divine_intervention_turns: Option<u32>,
    pub rng_seed: Option<u64>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            draw_cooldown_plies: 3,
            history_capacity: 16,
            idempotency_ttl_ms: 30_000,
            idempotency_capacity: 64,
            reveal_timeout_ms: 4_000,
            ai_think_timeout_ms: 5_000,
            max_hand_size: 6,
            ascension_trigger: AscensionTrigger::FirstCapture,
            divine_intervention_turns: None,
            rng_seed: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AiSettings {
    pub default_difficulty: AiDifficulty,
    /// Added on top of each profile's own think delay.
    pub extra_think_delay_ms: u64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            default_difficulty: AiDifficulty::Normal,
            extra_think_delay_ms: 0,
        }
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Display name used for the local session
    pub user: Option<String>,

    /// Agent backend settings
    pub agent: AgentConfig,

    /// UI preferences
    pub ui: UiConfig,

    /// Share link settings
    pub share: ShareConfig,

    /// chatdeck home directory
    #[serde(skip)]
    pub chatdeck_home: PathBuf,
}

/// OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Seconds the logo and example prompts stay up after launch
    pub onboarding_timeout_secs: u64,
    /// Seconds a toast notification stays visible
    pub notice_ttl_secs: u64,
    pub example_prompts: Vec<ExamplePrompt>,
}

/// Starter prompt offered on an empty conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamplePrompt {
    pub heading: String,
    #[serde(default)]
    pub subheading: String,
    #[serde(default)]
    pub message: String,
}

impl ExamplePrompt {
    fn new(heading: &str) -> Self {
        Self {
            heading: heading.to_string(),
            subheading: String::new(),
            message: String::new(),
        }
    }

    /// Text placed in the composer when the prompt is picked
    pub fn composer_text(&self) -> &str {
        if self.message.trim().is_empty() {
            &self.heading
        } else {
            &self.message
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    /// Public origin prepended to `/share/<id>`
    pub base_url: String,
    /// Where shared snapshots are written; defaults to `<home>/shared`
    pub dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "openai/gpt-4o-mini".to_string(),
            api_key: None,
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            temperature: 0.7,
            max_tokens: 4000,
            system_prompt: "You are a helpful assistant. Answer concisely.".to_string(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            onboarding_timeout_secs: 5,
            notice_ttl_secs: 4,
            example_prompts: vec![
                ExamplePrompt::new("Brainstorm a concept"),
                ExamplePrompt::new("Analyze a dataset"),
                ExamplePrompt::new("Summarise an Article"),
            ],
        }
    }
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            dir: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Config {
            user: None,
            agent: AgentConfig::default(),
            ui: UiConfig::default(),
            share: ShareConfig::default(),
            chatdeck_home: home.join(".chatdeck"),
        }
    }
}

impl Config {
    /// Load configuration from `~/.chatdeck/config.toml`, writing defaults on first run
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Self::load_from(&home.join(".chatdeck"))
    }

    /// Load configuration rooted at an explicit home directory
    pub fn load_from(chatdeck_home: &Path) -> Result<Self> {
        fs::create_dir_all(chatdeck_home)
            .context("Failed to create chatdeck home directory")?;

        let config_path = chatdeck_home.join("config.toml");
        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            let config = Config {
                chatdeck_home: chatdeck_home.to_path_buf(),
                ..Config::default()
            };
            config.save()?;
            config
        };

        config.chatdeck_home = chatdeck_home.to_path_buf();
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = self.chatdeck_home.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Get API key from config or environment
    pub fn api_key(&self) -> Option<String> {
        self.agent
            .api_key
            .clone()
            .or_else(|| std::env::var(&self.agent.api_key_env).ok())
    }

    pub fn share_dir(&self) -> PathBuf {
        self.share
            .dir
            .clone()
            .unwrap_or_else(|| self.chatdeck_home.join("shared"))
    }

    pub fn log_path(&self) -> PathBuf {
        self.chatdeck_home.join("chatdeck.log")
    }

    pub fn onboarding_timeout(&self) -> Duration {
        Duration::from_secs(self.ui.onboarding_timeout_secs)
    }

    pub fn notice_ttl(&self) -> Duration {
        Duration::from_secs(self.ui.notice_ttl_secs)
    }
}

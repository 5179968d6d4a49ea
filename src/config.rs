use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "marginalia")]
#[command(about = "Turns reading-highlight exports into linked vault notes", long_about = None)]
pub struct Cli {
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Process highlight exports into vault notes
    Process {
        /// Process one specific export instead of scanning the exports dir
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Preview without writing notes or ledger records
        #[arg(long)]
        dry_run: bool,
        /// Skip the processed notification
        #[arg(long)]
        skip_email: bool,
        /// Skip task-tracker task creation
        #[arg(long)]
        skip_tasks: bool,
    },
    /// Print summary digests and review reminders
    Digest {
        #[arg(short = 't', long = "type", value_enum, default_value = "weekly")]
        kind: DigestKind,
    },
    /// Show processing statistics and recent books
    Dashboard {
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum DigestKind {
    Weekly,
    Monthly,
    Spaced,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum OutputFormat {
    Table,
    Json,
}

pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".marginalia")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct App {
    exports_dir: String,
    vault_dir: String,
    #[serde(default)]
    profile_path: Option<String>,
    #[serde(default)]
    memory_file: Option<String>,
}

impl App {
    pub fn exports_dir(&self) -> PathBuf {
        return PathBuf::from(&self.exports_dir);
    }

    pub fn vault_dir(&self) -> PathBuf {
        return PathBuf::from(&self.vault_dir);
    }

    /// Processed exports are moved here after a successful run.
    pub fn processed_dir(&self) -> PathBuf {
        self.exports_dir().join("processed")
    }

    pub fn books_dir(&self) -> PathBuf {
        self.vault_dir().join("Books")
    }

    pub fn ideas_dir(&self) -> PathBuf {
        self.vault_dir().join("Ideas")
    }

    pub fn profile_path(&self) -> Option<PathBuf> {
        self.profile_path.as_ref().map(PathBuf::from)
    }

    pub fn memory_file(&self, data_dir: &Path) -> PathBuf {
        match &self.memory_file {
            Some(path) => PathBuf::from(path),
            None => data_dir.join(".memory.json"),
        }
    }
}

/// Task-tracker integration settings. Empty token means unconfigured.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Tasks {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub workspace_gid: String,
    #[serde(default)]
    pub project_gid: String,
}

impl Tasks {
    pub fn is_configured(&self) -> bool {
        !self.access_token.is_empty() && !self.project_gid.is_empty()
    }
}

/// SMTP notification settings. Empty user means unconfigured.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Email {
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default)]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_user: String,
    #[serde(default)]
    pub smtp_password: String,
    #[serde(default)]
    pub to: String,
}

impl Email {
    pub fn is_configured(&self) -> bool {
        !self.smtp_user.is_empty() && !self.to.is_empty()
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub app: App,
    #[serde(default)]
    pub tasks: Tasks,
    #[serde(default)]
    pub email: Email,
}

impl Config {
    pub fn new(path: &str) -> Result<Self> {
        let cfg = Config::load_config(path)?;
        Ok(cfg)
    }

    fn load_config(path: &str) -> Result<Config> {
        let yaml_str = fs::read_to_string(path)?;
        let yaml_with_env = Config::substitute_env_vars(&yaml_str)?;
        let config: Config = serde_yaml::from_str(&yaml_with_env)?;
        Ok(config)
    }

    fn substitute_env_vars(yaml_str: &str) -> Result<String> {
        let mut result = yaml_str.to_string();
        let mut offset = 0;

        while let Some(start) = result[offset..].find("${") {
            let actual_start = offset + start;
            if let Some(end) = result[actual_start..].find("}") {
                let var_name = &result[actual_start + 2..actual_start + end];

                // Handle default values like ${VAR:-default}
                let env_value = if let Some(default_start) = var_name.find(":-") {
                    let actual_var = &var_name[..default_start];
                    let default_val = &var_name[default_start + 2..];
                    env::var(actual_var).unwrap_or_else(|_| default_val.to_string())
                } else {
                    env::var(var_name).unwrap_or_else(|_| {
                        tracing::warn!("environment variable '{}' not found", var_name);
                        String::new()
                    })
                };

                result.replace_range(actual_start..actual_start + end + 1, &env_value);
                offset = actual_start + env_value.len();
            } else {
                break;
            }
        }

        Ok(result)
    }
}

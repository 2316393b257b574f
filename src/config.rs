use serde::Deserialize;

use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub link: LinkConfig,
    pub server: ServerConfig,
    pub trainer: TrainerConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize)]
pub struct LinkConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub ws_host: String,
    pub ws_port: u16,
    pub admin_port: u16,
    pub admin_token: String,
}

#[derive(Debug, Deserialize)]
pub struct TrainerConfig {
    pub id: u16,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    pub capacity: usize,
    pub seed_demo: bool,
    pub outgoing_slot: Option<usize>,
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn from_file(path: &str) -> Result<Self, AppError> {
        let contents = std::fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }
}

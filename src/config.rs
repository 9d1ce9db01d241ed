// src/config.rs
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    // Request bodies are tiny progress reports
    #[serde(default = "default_json_body_limit")]
    pub json_body_limit: usize,
    #[serde(default = "default_video_cache_capacity")]
    pub video_cache_capacity: u64,
    // Bounds how long a deleted or edited video can be served from cache
    #[serde(default = "default_video_cache_ttl_secs")]
    pub video_cache_ttl_secs: u64,
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_json_body_limit() -> usize {
    16 * 1024
}

fn default_video_cache_capacity() -> u64 {
    1000
}

fn default_video_cache_ttl_secs() -> u64 {
    30
}

fn default_run_migrations() -> bool {
    true
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            database_url: "postgres://localhost/watch_history_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            bind_address: default_bind_address(),
            port: default_port(),
            json_body_limit: default_json_body_limit(),
            video_cache_capacity: default_video_cache_capacity(),
            video_cache_ttl_secs: default_video_cache_ttl_secs(),
            run_migrations: false,
        }
    }
}

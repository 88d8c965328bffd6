//! Service configuration, read from the environment.

use algo_transfer_types::MIN_TRANSFER_ALGO;

pub mod env_vars {
    pub const ALGOD_SERVER: &str = "ALGOD_SERVER";
    pub const ALGOD_PORT: &str = "ALGOD_PORT";
    pub const ALGOD_TOKEN: &str = "ALGOD_TOKEN";
    pub const PORT: &str = "ALGO_TRANSFER_PORT";
    pub const DB_PATH: &str = "ALGO_TRANSFER_DB_PATH";
    pub const FRONTEND_URL: &str = "FRONTEND_URL";
    pub const CONFIRMATION_ROUNDS: &str = "ALGO_TRANSFER_CONFIRMATION_ROUNDS";
    pub const MIN_AMOUNT: &str = "ALGO_TRANSFER_MIN_AMOUNT";
}

pub mod defaults {
    pub const ALGOD_SERVER: &str = "https://testnet-api.algonode.cloud";
    pub const ALGOD_PORT: &str = "443";
    pub const PORT: u16 = 5000;
    pub const DB_PATH: &str = "./algo_transfer.db";
    pub const FRONTEND_URL: &str = "http://localhost:5173";
    pub const CONFIRMATION_ROUNDS: u64 = 4;
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlgodConfig {
    pub server: String,
    /// Empty means the server URL already carries the port.
    pub port: String,
    pub token: String,
}

impl AlgodConfig {
    pub fn base_url(&self) -> String {
        let server = self.server.trim_end_matches('/');
        if self.port.is_empty() {
            server.to_string()
        } else {
            format!("{}:{}", server, self.port)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub algod: AlgodConfig,
    pub port: u16,
    pub db_path: String,
    pub frontend_url: String,
    pub confirmation_rounds: u64,
    pub min_amount: f64,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let algod = AlgodConfig {
            server: var(env_vars::ALGOD_SERVER)
                .unwrap_or_else(|| defaults::ALGOD_SERVER.to_string()),
            port: var(env_vars::ALGOD_PORT).unwrap_or_else(|| defaults::ALGOD_PORT.to_string()),
            token: var(env_vars::ALGOD_TOKEN).unwrap_or_default(),
        };

        Self {
            algod,
            port: var(env_vars::PORT)
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::PORT),
            db_path: var(env_vars::DB_PATH).unwrap_or_else(|| defaults::DB_PATH.to_string()),
            frontend_url: var(env_vars::FRONTEND_URL)
                .unwrap_or_else(|| defaults::FRONTEND_URL.to_string()),
            confirmation_rounds: var(env_vars::CONFIRMATION_ROUNDS)
                .and_then(|s| s.parse().ok())
                .filter(|&r| r > 0)
                .unwrap_or(defaults::CONFIRMATION_ROUNDS),
            min_amount: var(env_vars::MIN_AMOUNT)
                .and_then(|s| s.parse().ok())
                .filter(|&a: &f64| a.is_finite() && a > 0.0)
                .unwrap_or(MIN_TRANSFER_ALGO),
        }
    }
}

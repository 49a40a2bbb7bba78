use serde::Deserialize;
use std::{env, time::Duration};

pub const DEFAULT_IN_CHUNK_SIZE: usize = 90;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bind_address: String,
    pub supabase: SupabaseSettings,
    pub store_driver: StoreDriver,
    pub jwt_secret: String,
    pub backend_api_url: String,
    pub learning_path: LearningPathSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseSettings {
    /// Project URL, e.g. `https://xyz.supabase.co` (REST lives under `/rest/v1`).
    pub url: String,
    pub service_role_key: String,
    pub request_timeout_secs: u64,
}

impl SupabaseSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreDriver {
    Postgrest,
    Memory,
}

impl StoreDriver {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgrest" | "supabase" => Some(StoreDriver::Postgrest),
            "memory" => Some(StoreDriver::Memory),
            _ => None,
        }
    }
}

/// Tunables for the progress aggregation and path builder.
#[derive(Debug, Clone, Deserialize)]
pub struct LearningPathSettings {
    /// Maximum number of values sent in a single `in` filter.
    pub in_chunk_size: usize,
}

impl Default for LearningPathSettings {
    fn default() -> Self {
        Self {
            in_chunk_size: DEFAULT_IN_CHUNK_SIZE,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first, then the crate-local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let bind_address = settings
            .get_string("server.bind_address")
            .or_else(|_| env::var("BIND_ADDRESS"))
            .unwrap_or_else(|_| "0.0.0.0:8081".to_string());

        let store_driver = match settings
            .get_string("store.driver")
            .or_else(|_| env::var("STORE_DRIVER"))
        {
            Ok(raw) => StoreDriver::parse(&raw).ok_or_else(|| {
                config::ConfigError::Message(format!("Unknown store driver: {}", raw))
            })?,
            Err(_) => StoreDriver::Postgrest,
        };

        let supabase_url = settings
            .get_string("supabase.url")
            .or_else(|_| env::var("SUPABASE_URL"))
            .unwrap_or_default();
        let service_role_key = settings
            .get_string("supabase.service_role_key")
            .or_else(|_| env::var("SUPABASE_SERVICE_ROLE_KEY"))
            .unwrap_or_default();

        if store_driver == StoreDriver::Postgrest
            && (supabase_url.is_empty() || service_role_key.is_empty())
        {
            return Err(config::ConfigError::Message(
                "SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY must be set for the postgrest store"
                    .to_string(),
            ));
        }

        let request_timeout_secs = settings
            .get_int("supabase.request_timeout_secs")
            .ok()
            .and_then(|value| u64::try_from(value).ok())
            .unwrap_or(10);

        let jwt_secret = match settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("SUPABASE_JWT_SECRET"))
        {
            Ok(secret) => secret,
            Err(_) if env == "prod" => {
                return Err(config::ConfigError::Message(
                    "SUPABASE_JWT_SECRET must be set in production".to_string(),
                ))
            }
            Err(_) => {
                tracing::warn!("Using default JWT secret (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            }
        };

        let backend_api_url = settings
            .get_string("backend_api.url")
            .or_else(|_| env::var("BACKEND_API_URL"))
            .unwrap_or_else(|_| "http://localhost:8080".to_string());

        let in_chunk_size = settings
            .get_int("learning_path.in_chunk_size")
            .ok()
            .and_then(|value| usize::try_from(value).ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_IN_CHUNK_SIZE);

        Ok(Config {
            bind_address,
            supabase: SupabaseSettings {
                url: supabase_url.trim_end_matches('/').to_string(),
                service_role_key,
                request_timeout_secs,
            },
            store_driver,
            jwt_secret,
            backend_api_url: backend_api_url.trim_end_matches('/').to_string(),
            learning_path: LearningPathSettings { in_chunk_size },
        })
    }

    /// Configuration for running against the in-memory store (tests, local demos).
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Config {
            bind_address: "127.0.0.1:0".to_string(),
            supabase: SupabaseSettings {
                url: String::new(),
                service_role_key: String::new(),
                request_timeout_secs: 10,
            },
            store_driver: StoreDriver::Memory,
            jwt_secret: jwt_secret.into(),
            backend_api_url: "http://127.0.0.1:9".to_string(),
            learning_path: LearningPathSettings::default(),
        }
    }
}

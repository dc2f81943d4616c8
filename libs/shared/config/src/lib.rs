use std::env;
use tracing::warn;

pub const DEFAULT_SLOT_GRANULARITY_MINUTES: i64 = 30;
/// One day. Coarser steps would never offer a second slot.
pub const MAX_SLOT_GRANULARITY_MINUTES: i64 = 1440;
pub const DEFAULT_CLINIC_TIMEZONE: &str = "UTC";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub clinic_timezone: String,
    pub slot_granularity_minutes: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            clinic_timezone: env::var("CLINIC_TIMEZONE")
                .unwrap_or_else(|_| {
                    warn!("CLINIC_TIMEZONE not set, using {}", DEFAULT_CLINIC_TIMEZONE);
                    DEFAULT_CLINIC_TIMEZONE.to_string()
                }),
            slot_granularity_minutes: parse_granularity(env::var("SLOT_GRANULARITY_MINUTES").ok()),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            clinic_timezone: DEFAULT_CLINIC_TIMEZONE.to_string(),
            slot_granularity_minutes: DEFAULT_SLOT_GRANULARITY_MINUTES,
        }
    }
}

fn parse_granularity(raw: Option<String>) -> i64 {
    match raw {
        None => DEFAULT_SLOT_GRANULARITY_MINUTES,
        Some(value) => match value.trim().parse::<i64>() {
            Ok(minutes) if (1..=MAX_SLOT_GRANULARITY_MINUTES).contains(&minutes) => minutes,
            _ => {
                warn!(
                    "SLOT_GRANULARITY_MINUTES={:?} is not between 1 and {}, using {}",
                    value, MAX_SLOT_GRANULARITY_MINUTES, DEFAULT_SLOT_GRANULARITY_MINUTES
                );
                DEFAULT_SLOT_GRANULARITY_MINUTES
            }
        },
    }
}

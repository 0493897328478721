/// Secrets loaded from environment variables. Everything else lives in the
/// TOML `FileConfig`.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Process-wide Apify token, used when a row has no token of its own.
    pub apify_token: Option<String>,

    /// Initial OAuth bearer token for the spreadsheet API.
    pub google_access_token: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let config = Self {
            apify_token: non_empty_env("APIFY_TOKEN"),
            google_access_token: non_empty_env("GOOGLE_SHEETS_ACCESS_TOKEN"),
        };

        config.log_keys();
        config
    }

    fn log_keys(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  APIFY_TOKEN: {}", preview_opt(&self.apify_token));
        tracing::info!(
            "  GOOGLE_SHEETS_ACCESS_TOKEN: {}",
            preview_opt(&self.google_access_token)
        );
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Short, log-safe preview of a secret.
pub fn preview(val: &str) -> String {
    let n = val
        .char_indices()
        .nth(5)
        .map(|(i, _)| i)
        .unwrap_or(val.len());
    format!("{}...({} chars)", &val[..n], val.chars().count())
}

fn preview_opt(val: &Option<String>) -> String {
    match val {
        Some(v) if !v.is_empty() => preview(v),
        _ => "<not set>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_shows_only_prefix() {
        assert_eq!(preview("apify_api_abcdef"), "apify...(16 chars)");
        assert_eq!(preview("abc"), "abc...(3 chars)");
        assert_eq!(preview_opt(&None), "<not set>");
    }
}

pub const PRODUCER_URL: &str = "DASHBOARD_PRODUCER_URL";

pub const CONSUMER_URL: &str = "DASHBOARD_CONSUMER_URL";

pub const SCHEMA_REGISTRY_URL: &str = "DASHBOARD_SCHEMA_REGISTRY_URL";

pub const BROKER_UI_URL: &str = "DASHBOARD_BROKER_UI_URL";

/// Read an environment variable, treating empty values as unset
pub fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Join a service base URL and an absolute path without doubling slashes
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

use std::path::PathBuf;

#[must_use]
pub(super) fn read_non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[must_use]
pub(super) fn read_env_path(name: &str, default_value: &str) -> PathBuf {
    read_non_empty_env(name).map_or_else(|| PathBuf::from(default_value), PathBuf::from)
}

#[must_use]
pub(super) fn read_env_usize(name: &str, default_value: usize, min_value: usize) -> usize {
    parse_usize(read_non_empty_env(name).as_deref(), default_value, min_value)
}

#[must_use]
pub(super) fn read_env_u64(name: &str, default_value: u64, min_value: u64) -> u64 {
    parse_u64(read_non_empty_env(name).as_deref(), default_value, min_value)
}

#[must_use]
pub(super) fn read_env_u32(name: &str, default_value: u32) -> u32 {
    read_non_empty_env(name)
        .and_then(|raw| raw.parse::<u32>().ok())
        .unwrap_or(default_value)
}

#[must_use]
pub(super) fn read_env_f64(name: &str, default_value: f64) -> f64 {
    read_non_empty_env(name)
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(default_value)
}

#[must_use]
pub(super) fn parse_usize(raw: Option<&str>, default_value: usize, min_value: usize) -> usize {
    raw.and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|value| *value >= min_value)
        .unwrap_or(default_value)
}

#[must_use]
pub(super) fn parse_u64(raw: Option<&str>, default_value: u64, min_value: u64) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value >= min_value)
        .unwrap_or(default_value)
}

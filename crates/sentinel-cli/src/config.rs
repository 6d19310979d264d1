//! Loads [`sentinel_core::SentinelConfig`] from a TOML file on disk,
//! falling back to in-code defaults on first run so the daemon never
//! refuses to start for want of a config file.

use std::path::Path;

use sentinel_core::SentinelConfig;

/// Reads and parses `path`, validating the result.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid TOML, or
/// fails [`SentinelConfig::validate`].
pub fn load_config(path: &Path) -> anyhow::Result<SentinelConfig> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("reading config at {}: {e}", path.display()))?;
    let config: SentinelConfig = toml::from_str(&text)
        .map_err(|e| anyhow::anyhow!("parsing config at {}: {e}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Falls back to [`SentinelConfig::default`] when `path` does not exist,
/// rather than failing daemon startup on first run.
pub fn load_or_default(path: &Path) -> anyhow::Result<SentinelConfig> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!(path = %path.display(), "no config file found, using defaults");
        Ok(SentinelConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let config = load_or_default(&dir.path().join("nonexistent.toml")).unwrap();
        assert_eq!(config.orchestrator.verdict_cache_size, 1024);
    }

    #[test]
    fn valid_toml_overrides_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sentinel.toml");
        std::fs::write(
            &path,
            r#"
[orchestrator]
verdict_cache_size = 2048
scan_timeout_ms = 2000
max_scan_bytes = 1048576

[rate_limiter]
scan_bucket_capacity = 50.0
scan_refill_per_sec = 5.0
policies_per_minute = 200
rate_window_seconds = 60
max_concurrent_scans_per_client = 4

[policy]
db_path = "policy.db"
match_cache_size = 500
circuit_failure_threshold = 3
circuit_cooldown_secs = 15
threat_retention_days = 14

[quarantine]
root = "quarantine"
retention_days = 60

[global]
fail_open_on_detector_error = false
log_level = "debug"
worker_threads = 8
enable_quarantine = true
enable_threat_index = true
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.orchestrator.verdict_cache_size, 2048);
        assert_eq!(config.policy.circuit_failure_threshold, 3);
    }

    #[test]
    fn invalid_values_fail_validation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sentinel.toml");
        std::fs::write(
            &path,
            r#"
[orchestrator]
verdict_cache_size = 0
scan_timeout_ms = 2000
max_scan_bytes = 1048576

[rate_limiter]
scan_bucket_capacity = 50.0
scan_refill_per_sec = 5.0
policies_per_minute = 200
rate_window_seconds = 60
max_concurrent_scans_per_client = 4

[policy]
db_path = "policy.db"
match_cache_size = 500
circuit_failure_threshold = 3
circuit_cooldown_secs = 15
threat_retention_days = 14

[quarantine]
root = "quarantine"
retention_days = 60

[global]
fail_open_on_detector_error = false
log_level = "debug"
worker_threads = 8
enable_quarantine = true
enable_threat_index = true
"#,
        )
        .unwrap();

        assert!(load_config(&path).is_err());
    }
}

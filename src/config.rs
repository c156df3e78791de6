use anyhow::{Context, Result, anyhow};
use std::{fs, path::Path, time::Duration};

use crate::{
    fetcher::DEFAULT_SOURCE_ORDER,
    upstream::{SourceKind, parse_source_order},
};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/tikembed-env";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_HOST_URL: &str = "http://localhost:8080";
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

/// Values read from the env file (or the process environment). Everything is
/// optional; [`RuntimeConfig`] fills in the defaults.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub host_url: Option<String>,
    pub source_order: Option<Vec<SourceKind>>,
    pub upstream_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub host: String,
    pub port: u16,
    /// Public base URL of this service, used when embeds link back to it.
    pub host_url: String,
    pub source_order: Vec<SourceKind>,
    pub upstream_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            host_url: DEFAULT_HOST_URL.to_string(),
            source_order: DEFAULT_SOURCE_ORDER.to_vec(),
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        }
    }
}

impl EnvConfig {
    /// Applies one `KEY=value` pair. Unknown keys are ignored.
    fn apply(&mut self, key: &str, value: &str, origin: &str) -> Result<()> {
        match key {
            "TIKEMBED_HOST" => {
                if !value.is_empty() {
                    self.host = Some(value.to_string());
                }
            }
            "TIKEMBED_PORT" => {
                let port: u16 = value
                    .parse()
                    .with_context(|| format!("Parsing TIKEMBED_PORT from {origin}"))?;
                self.port = Some(port);
            }
            "HOST_URL" => {
                if !value.is_empty() {
                    self.host_url = Some(value.trim_end_matches('/').to_string());
                }
            }
            "SOURCE_ORDER" => {
                let order = parse_source_order(value)
                    .map_err(|err| anyhow!("Parsing SOURCE_ORDER from {origin}: {err}"))?;
                self.source_order = Some(order);
            }
            "UPSTREAM_TIMEOUT_SECS" => {
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("Parsing UPSTREAM_TIMEOUT_SECS from {origin}"))?;
                self.upstream_timeout_secs = Some(secs);
            }
            _ => {}
        }
        Ok(())
    }

    /// Later values win.
    fn merge(self, other: EnvConfig) -> EnvConfig {
        EnvConfig {
            host: other.host.or(self.host),
            port: other.port.or(self.port),
            host_url: other.host_url.or(self.host_url),
            source_order: other.source_order.or(self.source_order),
            upstream_timeout_secs: other.upstream_timeout_secs.or(self.upstream_timeout_secs),
        }
    }

    fn into_runtime(self) -> RuntimeConfig {
        let defaults = RuntimeConfig::default();
        RuntimeConfig {
            host: self.host.unwrap_or(defaults.host),
            port: self.port.unwrap_or(defaults.port),
            host_url: self.host_url.unwrap_or(defaults.host_url),
            source_order: self.source_order.unwrap_or(defaults.source_order),
            upstream_timeout: self
                .upstream_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.upstream_timeout),
        }
    }
}

pub fn read_env_config(path: &Path) -> Result<Option<EnvConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let origin = path.display().to_string();
    let mut cfg = EnvConfig::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, value_raw)) = trimmed.split_once('=') {
            let value = value_raw.trim().trim_matches('"');
            cfg.apply(key.trim(), value, &origin)?;
        }
    }
    Ok(Some(cfg))
}

/// Reads the recognised keys from `vars`, typically `std::env::vars()`.
pub fn env_overrides<I>(vars: I) -> Result<EnvConfig>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut cfg = EnvConfig::default();
    for (key, value) in vars {
        cfg.apply(&key, value.trim(), "the environment")?;
    }
    Ok(cfg)
}

pub fn load_runtime_config() -> Result<RuntimeConfig> {
    load_runtime_config_from(Path::new(DEFAULT_CONFIG_PATH))
}

/// File values first, then process environment on top. A missing file is not
/// an error; the service runs on defaults.
pub fn load_runtime_config_from(path: impl AsRef<Path>) -> Result<RuntimeConfig> {
    let path = path.as_ref();
    let file = read_env_config(path)?.unwrap_or_default();
    let env = env_overrides(std::env::vars())?;
    Ok(file.merge(env).into_runtime())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn read_env_config_extracts_port() {
        let cfg = make_config("TIKEMBED_HOST=\"0.0.0.0\"\nTIKEMBED_PORT=\"4242\"\n");
        let parsed = read_env_config(cfg.path()).unwrap().unwrap();
        assert_eq!(parsed.port, Some(4242));
        assert_eq!(parsed.host.as_deref(), Some("0.0.0.0"));
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_env_config(&dir.path().join("absent")).unwrap().is_none());
    }

    #[test]
    fn runtime_defaults_fill_gaps() {
        let runtime = EnvConfig::default().into_runtime();
        assert_eq!(runtime.port, DEFAULT_PORT);
        assert_eq!(runtime.host, DEFAULT_HOST);
        assert_eq!(runtime.host_url, DEFAULT_HOST_URL);
        assert_eq!(runtime.source_order, DEFAULT_SOURCE_ORDER.to_vec());
        assert_eq!(
            runtime.upstream_timeout,
            Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS)
        );
    }

    #[test]
    fn source_order_and_host_url_are_parsed() {
        let cfg = make_config(
            "# comment\nSOURCE_ORDER=\"embedded,public\"\nHOST_URL=\"https://tiktxk.example/\"\nUNRELATED=1\n",
        );
        let runtime = read_env_config(cfg.path()).unwrap().unwrap().into_runtime();
        assert_eq!(
            runtime.source_order,
            vec![SourceKind::Embedded, SourceKind::Public]
        );
        assert_eq!(runtime.host_url, "https://tiktxk.example");
    }

    #[test]
    fn bad_values_are_reported() {
        let cfg = make_config("TIKEMBED_PORT=\"lots\"\n");
        assert!(read_env_config(cfg.path()).is_err());
        let cfg = make_config("SOURCE_ORDER=\"cache\"\n");
        assert!(read_env_config(cfg.path()).is_err());
    }

    #[test]
    fn environment_overrides_file() {
        let file = make_config("TIKEMBED_PORT=\"4242\"\nUPSTREAM_TIMEOUT_SECS=\"3\"\n");
        let file = read_env_config(file.path()).unwrap().unwrap();
        let env = env_overrides(vec![
            ("TIKEMBED_PORT".to_string(), "9000".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
        ])
        .unwrap();
        let runtime = file.merge(env).into_runtime();
        assert_eq!(runtime.port, 9000);
        assert_eq!(runtime.upstream_timeout, Duration::from_secs(3));
    }
}

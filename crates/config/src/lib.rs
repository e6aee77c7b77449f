//! Layered configuration for spoor.
//!
//! Layers are merged in order, later layers winning:
//! 1. built-in defaults,
//! 2. `spoor.yaml`,
//! 3. a TOML file with the same stem (`spoor.toml`), if present,
//! 4. `SPOOR_`-prefixed environment variables, with `__` separating nested
//!    keys (e.g. `SPOOR_DATABASE=/var/lib/spoor/tracking.db`).
//!
//! Without an explicit path, `spoor.yaml` is looked for in the working
//! directory first and the platform config directory second.

pub mod error;
mod source;

pub use crate::source::{CrawlConfig, SourceConfig, slugify};
use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "spoor.yaml";
pub const ENV_PREFIX: &str = "SPOOR_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tracking store location.
    pub database: PathBuf,
    /// Root directory for run artifacts.
    pub output: PathBuf,
    /// Pause between sources, in seconds.
    pub delay_between_sources: f64,
    pub sources: Vec<SourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from("data/tracking.db"),
            output: PathBuf::from("data/runs"),
            delay_between_sources: 5.0,
            sources: Vec::new(),
        }
    }
}

impl Config {
    /// Load and validate the configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration without validating it, for commands that only
    /// need the store location.
    ///
    /// An explicit `path` must exist. Without one, a missing file just means
    /// defaults and environment variables only.
    #[tracing::instrument(skip_all)]
    pub fn read(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) if !path.exists() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::locate(),
        };
        match &path {
            Some(path) => tracing::debug!(path = %path.display(), "Loading configuration"),
            None => tracing::debug!("No configuration file found; using defaults"),
        }
        Self::from_figment(Self::figment(path.as_deref()))
    }

    /// The merged layers, without extracting or validating them.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path)).merge(Toml::file(path.with_extension("toml")));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["log"]))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        figment.extract().or_raise(|| ErrorKind::Parse)
    }

    fn locate() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        let dirs = ProjectDirs::from("", "", "spoor")?;
        let global = dirs.config_dir().join(CONFIG_FILE);
        global.exists().then_some(global)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| exn::Exn::from(ErrorKind::Invalid(message));
        if self.sources.is_empty() {
            return Err(invalid("no sources configured".to_string()));
        }
        if !is_duration(self.delay_between_sources) {
            return Err(invalid(format!(
                "delay_between_sources must be a finite, non-negative number of seconds, got {}",
                self.delay_between_sources
            )));
        }
        let mut slugs = HashSet::with_capacity(self.sources.len());
        for source in &self.sources {
            let slug = source.slug();
            if slug.is_empty() {
                return Err(invalid(format!("source {:?} has an empty slug", source.name)));
            }
            if !slugs.insert(slug.clone()) {
                return Err(invalid(format!("duplicate source slug {slug:?}")));
            }
            let crawl = &source.crawl;
            if crawl.concurrency == 0 {
                return Err(invalid(format!("{slug}: concurrency must be at least 1")));
            }
            if crawl.max_pages == 0 {
                return Err(invalid(format!("{slug}: max_pages must be at least 1")));
            }
            if !is_duration(crawl.rate_limit_seconds) {
                return Err(invalid(format!(
                    "{slug}: rate_limit_seconds must be a finite, non-negative number of seconds, got {}",
                    crawl.rate_limit_seconds
                )));
            }
        }
        Ok(())
    }

    /// Panics on values [`validate`](Self::validate) rejects.
    pub fn delay_between_sources(&self) -> Duration {
        Duration::from_secs_f64(self.delay_between_sources)
    }

    /// Look a source up by its slug.
    pub fn source(&self, slug: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|source| source.slug() == slug)
    }
}

/// Rejects NaN, negative, infinite and out-of-range seconds.
fn is_duration(seconds: f64) -> bool {
    Duration::try_from_secs_f64(seconds).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    const YAML: &str = r#"
database: state/tracking.db
sources:
  - name: BMW
    root_url: https://www.bmw.de/de/index.html
    crawl:
      patterns:
        - "*/neufahrzeuge/*/technische-daten.html"
        - "re:.*/modelle/[a-z0-9-]+\\.html$"
      anti_patterns:
        - "contains:/gebrauchtwagen/"
      max_depth: 2
  - name: Kia Deutschland
    slug: kia
    root_url: https://www.kia.com/de/
"#;

    #[test]
    fn test_load_yaml_with_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file("spoor.yaml", YAML)?;
            let config = Config::load(Some(Path::new("spoor.yaml"))).unwrap();
            assert_eq!(config.database, PathBuf::from("state/tracking.db"));
            assert_eq!(config.output, PathBuf::from("data/runs"));
            assert_eq!(config.delay_between_sources(), Duration::from_secs(5));
            assert_eq!(config.sources.len(), 2);

            let bmw = config.source("bmw").unwrap();
            assert_eq!(bmw.crawl.patterns.len(), 2);
            assert_eq!(bmw.crawl.anti_patterns, vec!["contains:/gebrauchtwagen/"]);
            assert_eq!(bmw.crawl.max_depth, 2);
            assert_eq!(bmw.crawl.max_pages, 500);
            assert_eq!(bmw.domain().as_deref(), Some("www.bmw.de"));

            let kia = config.source("kia").unwrap();
            assert_eq!(kia.name, "Kia Deutschland");
            assert_eq!(kia.crawl, CrawlConfig::default());
            assert!(config.source("kia-deutschland").is_none());
            Ok(())
        });
    }

    #[test]
    fn test_toml_and_env_override_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file("spoor.yaml", YAML)?;
            jail.create_file("spoor.toml", "delay_between_sources = 0.5\n")?;
            jail.set_env("SPOOR_OUTPUT", "/tmp/spoor-runs");
            jail.set_env("SPOOR_LOG", "debug");
            let config = Config::load(Some(Path::new("spoor.yaml"))).unwrap();
            assert_eq!(config.delay_between_sources(), Duration::from_millis(500));
            assert_eq!(config.output, PathBuf::from("/tmp/spoor-runs"));
            Ok(())
        });
    }

    #[test]
    fn test_local_file_is_found() {
        Jail::expect_with(|jail| {
            jail.create_file("spoor.yaml", YAML)?;
            let config = Config::load(None).unwrap();
            assert_eq!(config.sources.len(), 2);
            Ok(())
        });
    }

    #[test]
    fn test_no_file_reads_defaults_but_does_not_validate() {
        Jail::expect_with(|jail| {
            jail.set_env("SPOOR_DATABASE", "elsewhere.db");
            let config = Config::read(None).unwrap();
            assert_eq!(config.database, PathBuf::from("elsewhere.db"));
            assert!(config.sources.is_empty());
            let err = Config::load(None).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid(_)));
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        Jail::expect_with(|_| {
            let err = Config::load(Some(Path::new("elsewhere.yaml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::NotFound(path) if path == Path::new("elsewhere.yaml")));
            Ok(())
        });
    }

    #[test]
    fn test_malformed_file() {
        Jail::expect_with(|jail| {
            jail.create_file("spoor.yaml", "sources: 12\n")?;
            let err = Config::load(Some(Path::new("spoor.yaml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Parse));
            Ok(())
        });
    }

    #[test]
    fn test_infinite_rate_limit_is_rejected_on_load() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "spoor.yaml",
                "sources:\n  - name: BMW\n    root_url: https://www.bmw.de/\n    crawl:\n      rate_limit_seconds: .inf\n",
            )?;
            let config = Config::read(Some(Path::new("spoor.yaml"))).unwrap();
            assert!(config.sources[0].crawl.rate_limit_seconds.is_infinite());
            let err = Config::load(Some(Path::new("spoor.yaml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid(message) if message.contains("rate_limit_seconds")));
            Ok(())
        });
    }

    fn valid() -> Config {
        Config {
            sources: vec![
                SourceConfig::new("BMW", "https://www.bmw.de/"),
                SourceConfig::new("Audi", "https://www.audi.de/"),
            ],
            ..Config::default()
        }
    }

    #[test]
    fn test_validation() {
        assert!(valid().validate().is_ok());

        let reasons: Vec<(Config, &str)> = vec![
            (Config::default(), "no sources"),
            (
                {
                    let mut config = valid();
                    config.sources[1].slug = Some("bmw".to_string());
                    config
                },
                "duplicate",
            ),
            (
                {
                    let mut config = valid();
                    config.sources[0].crawl.concurrency = 0;
                    config
                },
                "concurrency",
            ),
            (
                {
                    let mut config = valid();
                    config.sources[0].crawl.max_pages = 0;
                    config
                },
                "max_pages",
            ),
            (
                {
                    let mut config = valid();
                    config.sources[1].crawl.rate_limit_seconds = -1.0;
                    config
                },
                "rate_limit_seconds",
            ),
            (
                {
                    let mut config = valid();
                    config.sources[0].crawl.rate_limit_seconds = f64::INFINITY;
                    config
                },
                "rate_limit_seconds",
            ),
            (
                {
                    let mut config = valid();
                    config.sources[0].crawl.rate_limit_seconds = 1e30;
                    config
                },
                "rate_limit_seconds",
            ),
            (
                {
                    let mut config = valid();
                    config.delay_between_sources = -0.1;
                    config
                },
                "delay_between_sources",
            ),
            (
                {
                    let mut config = valid();
                    config.delay_between_sources = f64::NAN;
                    config
                },
                "delay_between_sources",
            ),
            (
                {
                    let mut config = valid();
                    config.delay_between_sources = 1e30;
                    config
                },
                "delay_between_sources",
            ),
        ];
        for (config, reason) in reasons {
            let err = config.validate().unwrap_err();
            assert!(
                matches!(&*err, ErrorKind::Invalid(message) if message.contains(reason)),
                "expected {reason:?}, got {err:?}"
            );
        }
    }
}

use crate::consts::{DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE, PAGE_SIZES, WILDCARD};
use crate::datetime::{local_timezone, parse_timezone};
use crate::name::RegexMap;
use chrono_tz::Tz;
use eyre::{Result, WrapErr, bail, eyre};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Contents of the optional `config.toml`.
///
/// `patterns` maps a project id (or `*` for every project) to that project's
/// extension -> file-name pattern table.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub url: Option<String>,
    pub timezone: Option<String>,
    pub page_size: Option<usize>,
    #[serde(default)]
    pub patterns: BTreeMap<String, BTreeMap<String, String>>,
}

/// Effective settings after command-line overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub base_url: String,
    pub timezone: Tz,
    pub page_size: usize,
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("au", "APPN", "phenomate")
            .map(|d| d.config_dir().join("config.toml"))
    }

    /// Load `explicit` (which must exist), else the default file if present,
    /// else an empty config.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => {
                if !p.exists() {
                    return Err(eyre!("config file {} does not exist", p.display()));
                }
                p.to_path_buf()
            }
            None => match Self::default_path() {
                Some(p) if p.exists() => p,
                _ => {
                    tracing::debug!("no config file; using defaults");
                    return Ok(Self::default());
                }
            },
        };
        let text =
            fs::read_to_string(&path).wrap_err_with(|| format!("reading {}", path.display()))?;
        let config = Self::parse(&text).wrap_err_with(|| format!("in {}", path.display()))?;
        tracing::debug!(config = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Merge command-line values over the file's; flags win.
    pub fn settings(&self, url: Option<&str>, timezone: Option<&str>) -> Result<Settings> {
        let base_url = url
            .or(self.url.as_deref())
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        let timezone = match timezone.or(self.timezone.as_deref()) {
            Some(name) => parse_timezone(name)?,
            None => local_timezone(),
        };
        let page_size = match self.page_size {
            Some(size) if !PAGE_SIZES.contains(&size) => {
                bail!("page_size = {size} in config; expected one of {PAGE_SIZES:?}")
            }
            Some(size) => size,
            None => DEFAULT_PAGE_SIZE,
        };
        Ok(Settings {
            base_url,
            timezone,
            page_size,
        })
    }

    /// The name patterns for `project_id`: its own table, the `*` table, or the
    /// built-in fallback, in that order.
    pub fn regex_map(&self, project_id: Option<i64>) -> Result<RegexMap> {
        let own = project_id.and_then(|id| self.patterns.get(&id.to_string()));
        match own.or_else(|| self.patterns.get(WILDCARD)) {
            Some(table) => RegexMap::from_patterns(table),
            None => Ok(RegexMap::fallback()),
        }
    }
}

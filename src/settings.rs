//! Runtime settings, read once from the environment at startup.
//!
//! | variable                  | default | meaning                                        |
//! |---------------------------|---------|------------------------------------------------|
//! | `WADARCHIVE_PG_DSN`       | unset   | PostgreSQL connection string                   |
//! | `WADARCHIVE_FIXTURE`      | unset   | JSON catalog fixture, used when no DSN is set  |
//! | `WADARCHIVE_FACETS`       | unset   | JSON file replacing the built-in facet tables  |
//! | `WADARCHIVE_RECENT_DAYS`  | 30      | window of the latest/updated feeds, in days    |
//! | `WADARCHIVE_RECENT_LIMIT` | 20      | maximum entries per feed                       |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::facets::FacetCatalog;
use crate::query::validate::MAX_LIMIT;

pub const ENV_PG_DSN: &str = "WADARCHIVE_PG_DSN";
pub const ENV_FIXTURE: &str = "WADARCHIVE_FIXTURE";
pub const ENV_FACETS: &str = "WADARCHIVE_FACETS";
pub const ENV_RECENT_DAYS: &str = "WADARCHIVE_RECENT_DAYS";
pub const ENV_RECENT_LIMIT: &str = "WADARCHIVE_RECENT_LIMIT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub recent_days: u32,
    pub recent_limit: u32,
}

impl Default for FeedSettings {
    fn default() -> Self { Self { recent_days: 30, recent_limit: 20 } }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub pg_dsn: Option<String>,
    pub fixture: Option<PathBuf>,
    pub facets_file: Option<PathBuf>,
    pub feeds: FeedSettings,
}

fn parse_bounded(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u32, max: u32) -> Result<u32> {
    let Some(raw) = lookup(key) else { return Ok(default) };
    let n: u32 = raw.trim().parse().with_context(|| format!("{}='{}' is not a positive integer", key, raw))?;
    if n == 0 || n > max {
        bail!("{}={} is outside 1..={}", key, n, max);
    }
    Ok(n)
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self> {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        let feeds = FeedSettings {
            recent_days: parse_bounded(&get, ENV_RECENT_DAYS, FeedSettings::default().recent_days, 3650)?,
            recent_limit: parse_bounded(&get, ENV_RECENT_LIMIT, FeedSettings::default().recent_limit, MAX_LIMIT)?,
        };
        Ok(Self {
            pg_dsn: get(ENV_PG_DSN),
            fixture: get(ENV_FIXTURE).map(PathBuf::from),
            facets_file: get(ENV_FACETS).map(PathBuf::from),
            feeds,
        })
    }

    /// The facet catalog to share for the life of the process.
    pub fn load_facets(&self) -> Result<Arc<FacetCatalog>> {
        let catalog = match &self.facets_file {
            Some(path) => {
                let c = FacetCatalog::load(path).with_context(|| format!("loading {}", ENV_FACETS))?;
                info!(target: "wadarchive::facets", "facet catalog loaded from {}", path.display());
                c
            }
            None => FacetCatalog::builtin(),
        };
        Ok(Arc::new(catalog))
    }
}

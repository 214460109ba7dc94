use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde_derive::Deserialize;

use crate::error::Result;
use crate::ingest::IngestPolicy;

pub const DEFAULT_FEED_URL: &str =
    "https://activity.striveandrise.gov.hk/api/activities?targetGroups=SKHWC";

#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    pub db_path: PathBuf,
    pub feed_url: String,
    pub feed_timeout_secs: u64,
    pub ingest_policy: IngestPolicy,
}

impl Settings {
    /// Reads `settings` (any extension `config` understands, optional)
    /// overlaid with `COMMUNITY_CENTER_*` environment variables.
    pub fn load(settings_file: &Path) -> Result<Settings> {
        let settings = Config::builder()
            .set_default("db_path", "community_center.db")?
            .set_default("feed_url", DEFAULT_FEED_URL)?
            .set_default("feed_timeout_secs", 30)?
            .set_default("ingest_policy", "keep-first")?
            .add_source(File::from(settings_file).required(false))
            .add_source(Environment::with_prefix("COMMUNITY_CENTER"))
            .build()?;
        Ok(settings.try_deserialize::<Settings>()?)
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }
}

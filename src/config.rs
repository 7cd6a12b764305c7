use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "crash_scraper.toml";
const ENV_PREFIX: &str = "CRASH";

/// All runtime settings, built once at startup and passed into each stage.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub site: SiteSettings,
    pub paths: DataPaths,
    pub http: HttpSettings,
    pub raw_layout: RawLayout,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    pub base_url: String,
    /// Page listing every year-index page, relative to `base_url`.
    pub index_page: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        SiteSettings {
            base_url: "https://www.planecrashinfo.com".to_string(),
            index_page: "database.htm".to_string(),
        }
    }
}

impl SiteSettings {
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn index_url(&self) -> String {
        format!("{}/{}", self.base(), self.index_page.trim_start_matches('/'))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    pub data_dir: PathBuf,
    pub year_index: String,
    pub crash_pages: String,
    pub crash_pages_clean: String,
    pub crash_urls: String,
    pub raw_table: String,
    pub scrubbed: String,
    pub report: String,
}

impl Default for DataPaths {
    fn default() -> Self {
        DataPaths {
            data_dir: PathBuf::from("data"),
            year_index: "yearindex.txt".to_string(),
            crash_pages: "crashpages.txt".to_string(),
            crash_pages_clean: "crashpages_clean.txt".to_string(),
            crash_urls: "crashurls.txt".to_string(),
            raw_table: "crashtestdummy.csv".to_string(),
            scrubbed: "crashdata_scrubbed.csv".to_string(),
            report: "report.json".to_string(),
        }
    }
}

impl DataPaths {
    fn resolve(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    pub fn year_index(&self) -> PathBuf {
        self.resolve(&self.year_index)
    }

    pub fn crash_pages(&self) -> PathBuf {
        self.resolve(&self.crash_pages)
    }

    pub fn crash_pages_clean(&self) -> PathBuf {
        self.resolve(&self.crash_pages_clean)
    }

    pub fn crash_urls(&self) -> PathBuf {
        self.resolve(&self.crash_urls)
    }

    pub fn raw_table(&self) -> PathBuf {
        self.resolve(&self.raw_table)
    }

    pub fn scrubbed(&self) -> PathBuf {
        self.resolve(&self.scrubbed)
    }

    pub fn report(&self) -> PathBuf {
        self.resolve(&self.report)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub user_agent: String,
    pub accept_language: String,
    pub referer: String,
    pub timeout_secs: u64,
    /// Pause between successive page fetches.
    pub request_delay_ms: u64,
    /// Send the browser identity headers on crash-page fetches too, not only
    /// when collecting links.
    pub browser_identity_on_pages: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        HttpSettings {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            referer: "https://www.google.com".to_string(),
            timeout_secs: 30,
            request_delay_ms: 500,
            browser_identity_on_pages: true,
        }
    }
}

/// How extracted pages are laid out in the raw table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawLayout {
    /// Label row followed by data row for every page, under a numeric header.
    /// Matches accumulations produced by earlier runs.
    #[default]
    Interleaved,
    /// One data row per page under the named column header.
    Records,
}

impl Settings {
    /// Layer defaults, an optional TOML file, then `CRASH_*` environment variables
    /// (`CRASH_HTTP__REQUEST_DELAY_MS=0` sets `http.request_delay_ms`).
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        builder = match config_file {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };
        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        url::Url::parse(&self.site.base_url)
            .with_context(|| format!("site.base_url is not a valid URL: {}", self.site.base_url))?;
        Ok(())
    }
}

//! Source descriptors: the configuration entries naming each ingestion source.
//!
//! Descriptors keep their `type` as a raw string so that an unknown kind is
//! reported by [`SourceKind::parse`] as [`ConfigError::UnsupportedKind`]
//! during reader resolution, before any source is touched.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::Config;
use crate::error::{ConfigError, ReadError};

/// The closed set of supported source kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SourceKind {
    /// JSON array of `{ "content": ..., "metadata": {...} }` records.
    RecordFile,
    /// Delimited file with a header row.
    TabularFile,
    /// PDF.
    PageDocument,
    /// DOCX.
    OfficeDocument,
    PlainText,
    RelationalQuery,
    WebPage,
}

impl SourceKind {
    pub const ALL: [SourceKind; 7] = [
        SourceKind::RecordFile,
        SourceKind::TabularFile,
        SourceKind::PageDocument,
        SourceKind::OfficeDocument,
        SourceKind::PlainText,
        SourceKind::RelationalQuery,
        SourceKind::WebPage,
    ];

    /// The `type` tag used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::RecordFile => "json",
            SourceKind::TabularFile => "csv",
            SourceKind::PageDocument => "pdf",
            SourceKind::OfficeDocument => "docx",
            SourceKind::PlainText => "txt",
            SourceKind::RelationalQuery => "database",
            SourceKind::WebPage => "webscraper",
        }
    }

    pub fn parse(tag: &str) -> Result<Self, ConfigError> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == tag)
            .ok_or_else(|| ConfigError::UnsupportedKind(tag.to_string()))
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured ingestion source. Which fields are required depends on `type`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub text_column: Option<String>,
    #[serde(default)]
    pub metadata_columns: Option<Vec<String>>,
    /// Field delimiter for `csv` sources; defaults to `,`.
    #[serde(default)]
    pub delimiter: Option<char>,
    #[serde(default)]
    pub connection_params: Option<ConnectionParams>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub text_selector: Option<String>,
}

impl SourceDescriptor {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            ..Self::default()
        }
    }

    /// Path or URL, whichever identifies the source, for display.
    pub fn origin(&self) -> String {
        if let Some(ref p) = self.path {
            return p.display().to_string();
        }
        if let Some(ref u) = self.url {
            return u.clone();
        }
        if let Some(ref c) = self.connection_params {
            return c.redacted();
        }
        "-".to_string()
    }
}

/// Credentials for a `database` source.
///
/// Either a full `url` or discrete `host`/`user`/`database` fields. The
/// password may be given inline or, preferably, through `password_env`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionParams {
    #[serde(default)]
    pub url: Option<String>,
    /// `mysql` (default), `postgres`, or `sqlite`.
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_env: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

impl ConnectionParams {
    /// Builds the connection URL, resolving `password_env` at call time.
    pub fn connection_url(&self) -> Result<String, ReadError> {
        if let Some(ref url) = self.url {
            return Ok(url.clone());
        }

        let driver = self.driver.as_deref().unwrap_or("mysql");
        let database = self
            .database
            .as_deref()
            .ok_or_else(|| ReadError::Connection("'database' is required".to_string()))?;

        let (scheme, default_port) = match driver {
            "sqlite" => return Ok(format!("sqlite:{}", database)),
            "mysql" => ("mysql", 3306),
            "postgres" | "postgresql" => ("postgres", 5432),
            other => {
                return Err(ReadError::Connection(format!(
                    "unsupported driver '{}'",
                    other
                )))
            }
        };

        let host = self.host.as_deref().unwrap_or("localhost");
        let mut url = Url::parse(&format!(
            "{}://{}:{}/{}",
            scheme,
            host,
            self.port.unwrap_or(default_port),
            database
        ))
        .map_err(|e| ReadError::Connection(e.to_string()))?;

        if let Some(ref user) = self.user {
            url.set_username(user)
                .map_err(|_| ReadError::Connection("invalid user name".to_string()))?;
        }
        if let Some(password) = self.resolve_password()? {
            url.set_password(Some(&password))
                .map_err(|_| ReadError::Connection("invalid password".to_string()))?;
        }

        Ok(url.to_string())
    }

    fn resolve_password(&self) -> Result<Option<String>, ReadError> {
        if let Some(ref var) = self.password_env {
            return std::env::var(var).map(Some).map_err(|_| {
                ReadError::Connection(format!("environment variable {} is not set", var))
            });
        }
        Ok(self.password.clone())
    }

    /// Connection target without credentials.
    pub fn redacted(&self) -> String {
        if let Some(ref url) = self.url {
            return match Url::parse(url) {
                Ok(mut u) => {
                    let _ = u.set_password(None);
                    u.to_string()
                }
                Err(_) => url.split('?').next().unwrap_or_default().to_string(),
            };
        }
        format!(
            "{}://{}/{}",
            self.driver.as_deref().unwrap_or("mysql"),
            self.host.as_deref().unwrap_or("localhost"),
            self.database.as_deref().unwrap_or("")
        )
    }
}

#[derive(Deserialize)]
struct SourcesFile {
    data_sources: Vec<SourceDescriptor>,
}

/// Reads a JSON sources file of the form `{ "data_sources": [ ... ] }`.
pub fn load_sources_file(path: &Path) -> Result<Vec<SourceDescriptor>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: SourcesFile = serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(file.data_sources)
}

/// Status line for one configured source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub index: usize,
    pub kind: String,
    pub origin: String,
    pub status: String,
}

/// Checks each descriptor's kind and, for file sources, whether the path exists.
pub fn get_sources(sources: &[SourceDescriptor]) -> Vec<SourceStatus> {
    sources
        .iter()
        .enumerate()
        .map(|(index, source)| {
            let status = match SourceKind::parse(&source.kind) {
                Err(_) => "UNSUPPORTED TYPE".to_string(),
                Ok(_) => match source.path {
                    Some(ref p) if !p.exists() => "MISSING PATH".to_string(),
                    _ => "OK".to_string(),
                },
            };
            SourceStatus {
                index,
                kind: source.kind.clone(),
                origin: source.origin(),
                status,
            }
        })
        .collect()
}

pub fn list_sources(config: &Config, extra_file: Option<&Path>) -> anyhow::Result<()> {
    let mut sources = config.all_sources()?;
    if let Some(file) = extra_file {
        sources.extend(load_sources_file(file)?);
    }

    println!("{:<4} {:<12} {:<16} ORIGIN", "#", "TYPE", "STATUS");
    for s in get_sources(&sources) {
        println!("{:<4} {:<12} {:<16} {}", s.index, s.kind, s.status, s.origin);
    }

    if let Some(bad) = sources
        .iter()
        .find(|s| SourceKind::parse(&s.kind).is_err())
    {
        return Err(ConfigError::UnsupportedKind(bad.kind.clone()).into());
    }
    Ok(())
}

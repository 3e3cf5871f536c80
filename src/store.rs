use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::Serialize;

use crate::config::ResolvedConfig;
use crate::error::PathogenError;

const DOWNLOAD_DIR: &str = "download";
const STAGING_DIR: &str = "partial";
const LOGS_DIR: &str = "logs";

/// On-disk layout of one database build.
///
/// ```text
/// <work_dir>/<prefix>download_input.json
/// <work_dir>/<prefix>_summary.json
/// <work_dir>/download/<asset>_genomic.fna.gz
/// <work_dir>/download/partial/<asset>_genomic.fna.gz
/// <work_dir>/logs/<tag>_error_log.txt
/// <work_dir>/pathogen_database_<tag>.fa
/// ```
#[derive(Debug, Clone)]
pub struct Store {
    work_dir: Utf8PathBuf,
    catalog_dir: Utf8PathBuf,
    prefix: String,
    tag: String,
}

impl Store {
    pub fn new(prefix: impl Into<String>, tag: impl Into<String>) -> Result<Self, PathogenError> {
        let cwd = std::env::current_dir().map_err(|err| PathogenError::Filesystem(err.to_string()))?;
        let work_dir = Utf8PathBuf::from_path_buf(cwd)
            .map_err(|_| PathogenError::Filesystem("invalid working directory path".to_string()))?;
        Ok(Self::new_with_paths(
            work_dir,
            default_catalog_dir()?,
            prefix,
            tag,
        ))
    }

    pub fn from_config(config: &ResolvedConfig, tag: impl Into<String>) -> Result<Self, PathogenError> {
        let mut store = Self::new(config.output_prefix.clone(), tag)?;
        if let Some(work_dir) = &config.work_dir {
            store.work_dir = work_dir.clone();
        }
        if let Some(catalog_dir) = &config.catalog_dir {
            store.catalog_dir = catalog_dir.clone();
        }
        Ok(store)
    }

    pub fn new_with_paths(
        work_dir: Utf8PathBuf,
        catalog_dir: Utf8PathBuf,
        prefix: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            work_dir,
            catalog_dir,
            prefix: prefix.into(),
            tag: tag.into(),
        }
    }

    pub fn work_dir(&self) -> &Utf8Path {
        &self.work_dir
    }

    pub fn catalog_dir(&self) -> &Utf8Path {
        &self.catalog_dir
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn catalog_path(&self, file_name: &str) -> Utf8PathBuf {
        self.catalog_dir.join(file_name)
    }

    pub fn manifest_path(&self) -> Utf8PathBuf {
        self.prefixed("download_input.json")
    }

    pub fn summary_path(&self) -> Utf8PathBuf {
        self.prefixed("_summary.json")
    }

    pub fn missing_species_path(&self) -> Utf8PathBuf {
        self.prefixed("missing_species.json")
    }

    pub fn unresolved_species_path(&self) -> Utf8PathBuf {
        self.prefixed("unresolved_species.json")
    }

    pub fn unique_species_path(&self) -> Utf8PathBuf {
        self.prefixed("unique_species.csv")
    }

    pub fn download_dir(&self) -> Utf8PathBuf {
        self.work_dir.join(DOWNLOAD_DIR)
    }

    pub fn asset_path(&self, file_name: &str) -> Utf8PathBuf {
        self.download_dir().join(file_name)
    }

    pub fn staging_path(&self, file_name: &str) -> Utf8PathBuf {
        self.download_dir().join(STAGING_DIR).join(file_name)
    }

    pub fn logs_dir(&self) -> Utf8PathBuf {
        self.work_dir.join(LOGS_DIR)
    }

    pub fn error_log_path(&self) -> Utf8PathBuf {
        self.logs_dir().join(format!("{}_error_log.txt", self.tag))
    }

    pub fn database_path(&self) -> Utf8PathBuf {
        self.work_dir.join(format!("pathogen_database_{}.fa", self.tag))
    }

    pub fn ensure_download_layout(&self) -> Result<(), PathogenError> {
        for dir in [
            self.download_dir().join(STAGING_DIR),
            self.logs_dir(),
        ] {
            fs::create_dir_all(dir.as_std_path())
                .map_err(|err| PathogenError::Filesystem(err.to_string()))?;
        }
        Ok(())
    }

    pub fn ensure_catalog_dir(&self) -> Result<(), PathogenError> {
        fs::create_dir_all(self.catalog_dir.as_std_path())
            .map_err(|err| PathogenError::Filesystem(err.to_string()))
    }

    pub fn exists(path: &Utf8Path) -> bool {
        path.as_std_path().exists()
    }

    pub fn write_json_atomic<T: Serialize + ?Sized>(
        path: &Utf8Path,
        value: &T,
    ) -> Result<(), PathogenError> {
        let mut content = serde_json::to_vec_pretty(value)
            .map_err(|err| PathogenError::Filesystem(err.to_string()))?;
        content.push(b'\n');
        Self::write_bytes_atomic(path, &content)
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), PathogenError> {
        if let Some(parent) = path.parent() {
            if !parent.as_str().is_empty() {
                fs::create_dir_all(parent.as_std_path())
                    .map_err(|err| PathogenError::Filesystem(err.to_string()))?;
            }
        }
        let tmp_path = Utf8PathBuf::from(format!("{path}.tmp"));
        fs::write(tmp_path.as_std_path(), content)
            .map_err(|err| PathogenError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| PathogenError::Filesystem(err.to_string()))?;
        Ok(())
    }

    pub fn promote(from: &Utf8Path, to: &Utf8Path) -> Result<(), PathogenError> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| PathogenError::Filesystem(err.to_string()))?;
        }
        fs::rename(from.as_std_path(), to.as_std_path())
            .map_err(|err| PathogenError::Filesystem(format!("move {from} to {to}: {err}")))
    }

    fn prefixed(&self, suffix: &str) -> Utf8PathBuf {
        self.work_dir.join(format!("{}{suffix}", self.prefix))
    }
}

fn default_catalog_dir() -> Result<Utf8PathBuf, PathogenError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(
                dirs.home_dir()
                    .join(".cache")
                    .join("pathogen-db")
                    .join("catalogs"),
            )
            .ok()
        })
        .ok_or_else(|| PathogenError::Filesystem("unable to resolve cache directory".to_string()))
}

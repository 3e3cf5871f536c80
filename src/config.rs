use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::TaxId;
use crate::error::PathogenError;

pub const DEFAULT_CONFIG_FILE: &str = "pathogen-db.json";
pub const DEFAULT_CATALOG_BASE_URL: &str = "https://ftp.ncbi.nlm.nih.gov/genomes/ASSEMBLY_REPORTS";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub taxdump_dir: Option<String>,
    #[serde(default)]
    pub catalog_dir: Option<String>,
    #[serde(default)]
    pub catalog_base_url: Option<String>,
    #[serde(default)]
    pub excluded_pest_types: Option<Vec<String>>,
    #[serde(default)]
    pub synonyms: BTreeMap<String, TaxId>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub work_dir: Option<String>,
    #[serde(default)]
    pub output_prefix: Option<String>,
    #[serde(default)]
    pub date_tag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub taxdump_dir: Option<Utf8PathBuf>,
    pub catalog_dir: Option<Utf8PathBuf>,
    pub catalog_base_url: String,
    pub excluded_pest_types: Vec<String>,
    pub synonyms: BTreeMap<String, TaxId>,
    pub request_timeout_secs: u64,
    pub work_dir: Option<Utf8PathBuf>,
    pub output_prefix: String,
    pub date_tag: Option<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, PathogenError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| PathogenError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| PathogenError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, PathogenError> {
        let schema_version = config.schema_version.unwrap_or(1);
        if schema_version != 1 {
            return Err(PathogenError::ConfigParse(format!(
                "unsupported schema_version {schema_version}"
            )));
        }

        let timeout = config
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if timeout == 0 {
            return Err(PathogenError::ConfigParse(
                "request_timeout_secs must be positive".to_string(),
            ));
        }

        let synonyms = config
            .synonyms
            .into_iter()
            .map(|(name, taxid)| (crate::taxonomy::normalise_name(&name), taxid))
            .collect();

        Ok(ResolvedConfig {
            schema_version,
            taxdump_dir: config.taxdump_dir.map(Utf8PathBuf::from),
            catalog_dir: config.catalog_dir.map(Utf8PathBuf::from),
            catalog_base_url: config
                .catalog_base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_CATALOG_BASE_URL.to_string()),
            excluded_pest_types: config
                .excluded_pest_types
                .unwrap_or_else(default_excluded_pest_types),
            synonyms,
            request_timeout_secs: timeout,
            work_dir: config.work_dir.map(Utf8PathBuf::from),
            output_prefix: config.output_prefix.unwrap_or_default(),
            date_tag: config
                .date_tag
                .map(|tag| tag.trim().to_string())
                .filter(|tag| !tag.is_empty()),
        })
    }
}

pub fn default_excluded_pest_types() -> Vec<String> {
    vec![
        "Insect".to_string(),
        "Mite".to_string(),
        "Nematode".to_string(),
        "Plant".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.catalog_base_url, DEFAULT_CATALOG_BASE_URL);
        assert_eq!(resolved.excluded_pest_types, default_excluded_pest_types());
        assert_eq!(resolved.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert!(resolved.synonyms.is_empty());
    }

    #[test]
    fn synonym_keys_are_normalised() {
        let config: Config = serde_json::from_str(
            r#"{"synonyms": {"  ‘Candidatus Liberibacter’  asiaticus ": 34021}}"#,
        )
        .unwrap();
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(
            resolved.synonyms.get("Candidatus Liberibacter' asiaticus"),
            Some(&34021)
        );
    }

    #[test]
    fn rejects_unknown_schema() {
        let config = Config {
            schema_version: Some(7),
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, PathogenError::ConfigParse(_));
    }
}

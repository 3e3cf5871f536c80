use assert_matches::assert_matches;

use pathogen_db::config::{Config, ConfigLoader, DEFAULT_CATALOG_BASE_URL};
use pathogen_db::error::PathogenError;

#[test]
fn parse_full_config_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("pathogen-db.json");
    std::fs::write(
        &path,
        r#"{
            "schema_version": 1,
            "taxdump_dir": "/data/taxdump",
            "catalog_base_url": "https://mirror.example/ASSEMBLY_REPORTS/",
            "excluded_pest_types": ["Insect", "Plant"],
            "synonyms": {"Cladosporium fulvum": 5499},
            "request_timeout_secs": 120,
            "output_prefix": "042025_",
            "date_tag": " 042025 "
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.taxdump_dir.as_deref().map(|p| p.as_str()), Some("/data/taxdump"));
    assert_eq!(resolved.catalog_base_url, "https://mirror.example/ASSEMBLY_REPORTS");
    assert_eq!(resolved.excluded_pest_types, vec!["Insect", "Plant"]);
    assert_eq!(resolved.synonyms.get("Cladosporium fulvum"), Some(&5499));
    assert_eq!(resolved.request_timeout_secs, 120);
    assert_eq!(resolved.output_prefix, "042025_");
    assert_eq!(resolved.date_tag.as_deref(), Some("042025"));
}

#[test]
fn defaults_without_config() {
    let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
    assert_eq!(resolved.catalog_base_url, DEFAULT_CATALOG_BASE_URL);
    assert_eq!(resolved.request_timeout_secs, 60);
    assert!(resolved.date_tag.is_none());
    assert!(resolved.taxdump_dir.is_none());
}

#[test]
fn explicit_missing_config_is_an_error() {
    let err = ConfigLoader::resolve(Some("/nonexistent/pathogen-db.json")).unwrap_err();
    assert_matches!(err, PathogenError::ConfigRead(_));
}

#[test]
fn zero_timeout_is_rejected() {
    let config = Config {
        request_timeout_secs: Some(0),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(PathogenError::ConfigParse(_))
    );
}

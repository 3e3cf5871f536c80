use camino::Utf8PathBuf;

use pathogen_db::config::{Config, ConfigLoader};
use pathogen_db::store::Store;

#[test]
fn layout_follows_configuration() {
    let config = ConfigLoader::resolve_config(Config {
        work_dir: Some("/srv/pathogen".to_string()),
        catalog_dir: Some("/srv/catalogs".to_string()),
        output_prefix: Some("run1_".to_string()),
        ..Config::default()
    })
    .unwrap();
    let store = Store::from_config(&config, "102026").unwrap();

    assert_eq!(store.work_dir(), "/srv/pathogen");
    assert_eq!(store.catalog_dir(), "/srv/catalogs");
    assert_eq!(store.tag(), "102026");
    assert_eq!(store.manifest_path(), "/srv/pathogen/run1_download_input.json");
    assert_eq!(store.unique_species_path(), "/srv/pathogen/run1_unique_species.csv");
    assert_eq!(store.database_path(), "/srv/pathogen/pathogen_database_102026.fa");
}

#[test]
fn atomic_writes_leave_no_temporaries() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let path = root.join("nested/summary.json");
    Store::write_json_atomic(&path, &vec!["a", "b"]).unwrap();
    Store::write_json_atomic(&path, &vec!["c"]).unwrap();

    let content = std::fs::read_to_string(path.as_std_path()).unwrap();
    let value: Vec<String> = serde_json::from_str(&content).unwrap();
    assert_eq!(value, vec!["c"]);
    let entries = std::fs::read_dir(root.join("nested").as_std_path()).unwrap().count();
    assert_eq!(entries, 1);
}

#[test]
fn promote_replaces_target() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let from = root.join("partial/a.fna.gz");
    let to = root.join("a.fna.gz");
    std::fs::create_dir_all(root.join("partial").as_std_path()).unwrap();
    std::fs::write(from.as_std_path(), b"new").unwrap();
    std::fs::write(to.as_std_path(), b"old").unwrap();

    Store::promote(&from, &to).unwrap();
    assert!(!Store::exists(&from));
    assert_eq!(std::fs::read(to.as_std_path()).unwrap(), b"new");
}

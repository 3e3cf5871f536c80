//! Selection manifest and the reports written next to it.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use camino::Utf8Path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::AssemblyRecord;
use crate::domain::{AssemblyLevel, SourceDb, Species, TaxId};
use crate::error::PathogenError;
use crate::links;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(default)]
    pub species_name: String,
    #[serde(default)]
    pub species_taxid: Option<TaxId>,
    #[serde(alias = "taxid")]
    pub selected_taxid: TaxId,
    pub organism_name: String,
    pub assembly_accession: String,
    #[serde(default)]
    pub ftp_path: String,
    #[serde(rename = "type")]
    pub assembly_level: AssemblyLevel,
    pub source_db: SourceDb,
    #[serde(rename = "dlLink")]
    pub sequence_url: String,
    #[serde(rename = "dlLinkMD5")]
    pub md5_url: String,
}

impl ManifestEntry {
    pub fn from_selection(species_name: &str, species_taxid: TaxId, record: &AssemblyRecord) -> Self {
        let links = links::build_links(&record.ftp_path);
        Self {
            species_name: species_name.to_string(),
            species_taxid: Some(species_taxid),
            selected_taxid: record.taxid,
            organism_name: record.organism_name.clone(),
            assembly_accession: record.accession.as_str().to_string(),
            ftp_path: record.ftp_path.clone(),
            assembly_level: record.assembly_level.clone(),
            source_db: record.source_db,
            sequence_url: links.sequence,
            md5_url: links.md5,
        }
    }

    pub fn file_name(&self) -> String {
        links::file_name(&self.sequence_url)
    }
}

pub fn read_manifest(path: &Utf8Path) -> Result<Vec<ManifestEntry>, PathogenError> {
    if !path.as_std_path().exists() {
        return Err(PathogenError::MissingInput(path.as_std_path().to_path_buf()));
    }
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| PathogenError::Filesystem(format!("read {path}: {err}")))?;
    serde_json::from_str(&content).map_err(|err| PathogenError::ManifestParse {
        path: path.as_std_path().to_path_buf(),
        message: err.to_string(),
    })
}

pub fn write_manifest(path: &Utf8Path, entries: &[ManifestEntry]) -> Result<(), PathogenError> {
    Store::write_json_atomic(path, entries)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingSpecies {
    pub species_name: String,
    pub species_taxid: TaxId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_species_with_selection: usize,
    pub assembly_level_counts: BTreeMap<String, usize>,
    pub refseq_category_counts: BTreeMap<String, usize>,
    pub missing_species_count: usize,
    pub unresolved_species_count: usize,
    pub generated_at: String,
}

impl Summary {
    pub fn new(
        entries: &[ManifestEntry],
        missing: &[MissingSpecies],
        unresolved: &[String],
        generated_at: DateTime<Utc>,
    ) -> Self {
        let mut assembly_level_counts = BTreeMap::new();
        let mut refseq_category_counts = BTreeMap::new();
        for entry in entries {
            *assembly_level_counts
                .entry(entry.assembly_level.to_string())
                .or_insert(0) += 1;
            *refseq_category_counts
                .entry(entry.source_db.to_string())
                .or_insert(0) += 1;
        }
        Self {
            total_species_with_selection: entries.len(),
            assembly_level_counts,
            refseq_category_counts,
            missing_species_count: missing.len(),
            unresolved_species_count: unresolved.len(),
            generated_at: generated_at.to_rfc3339(),
        }
    }
}

pub fn write_unique_species(path: &Utf8Path, species: &[Species]) -> Result<(), PathogenError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["species_name", "species_taxid"])
        .map_err(|err| PathogenError::Filesystem(err.to_string()))?;
    for entry in species {
        let Some(taxid) = entry.taxon_id else {
            continue;
        };
        writer
            .write_record([entry.name.as_str(), taxid.to_string().as_str()])
            .map_err(|err| PathogenError::Filesystem(err.to_string()))?;
    }
    let content = writer
        .into_inner()
        .map_err(|err| PathogenError::Filesystem(err.to_string()))?;
    Store::write_bytes_atomic(path, &content)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManifestDiff {
    pub only_in_new: Vec<String>,
    pub only_in_old: Vec<String>,
    pub shared: usize,
}

pub fn diff_manifests(old: &[ManifestEntry], new: &[ManifestEntry]) -> ManifestDiff {
    let old_names: BTreeSet<&str> = old.iter().map(|entry| entry.organism_name.as_str()).collect();
    let new_names: BTreeSet<&str> = new.iter().map(|entry| entry.organism_name.as_str()).collect();
    ManifestDiff {
        only_in_new: new_names
            .difference(&old_names)
            .map(|name| name.to_string())
            .collect(),
        only_in_old: old_names
            .difference(&new_names)
            .map(|name| name.to_string())
            .collect(),
        shared: new_names.intersection(&old_names).count(),
    }
}

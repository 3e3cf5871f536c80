use std::collections::HashSet;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{AssemblyCatalog, GENBANK_SUMMARY_FILE, REFSEQ_SUMMARY_FILE};
use crate::checksum::{AssetRef, ChecksumVerifier, Verification};
use crate::config::ResolvedConfig;
use crate::domain::Species;
use crate::error::PathogenError;
use crate::error_log::ErrorLog;
use crate::fasta;
use crate::links;
use crate::manifest::{self, ManifestEntry, MissingSpecies, Summary};
use crate::ncbi::NcbiClient;
use crate::registry::SpeciesRegistry;
use crate::select::AssemblySelector;
use crate::store::Store;
use crate::taxonomy::{NameResolver, TaxonExpander, Taxonomy};

#[derive(Debug, Clone)]
pub struct SelectInputs {
    pub phibase: Utf8PathBuf,
    pub risk_register: Utf8PathBuf,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SelectOptions {
    pub refresh_catalogs: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogResult {
    pub base_url: String,
    pub tables: Vec<CatalogTable>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogTable {
    pub name: String,
    pub path: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectResult {
    pub species_total: usize,
    pub resolved: usize,
    pub unresolved: Vec<String>,
    pub selected: usize,
    pub missing: Vec<MissingSpecies>,
    pub catalog_records: usize,
    pub manifest_path: String,
    pub summary_path: String,
    pub summary: Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetAction {
    Existing,
    Downloaded,
    ChecksumMismatch,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssetResult {
    pub assembly_accession: String,
    pub organism_name: String,
    pub file_name: String,
    pub action: AssetAction,
    pub verification: Option<Verification>,
    pub headers_tagged: Option<usize>,
    pub path: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    pub manifest_path: String,
    pub assets: Vec<AssetResult>,
    pub link_repairs: usize,
    pub database_path: String,
    pub database_assets: usize,
    pub database_bytes: u64,
    pub error_log_path: String,
    pub error_log_records: usize,
}

impl DownloadResult {
    pub fn count(&self, action: AssetAction) -> usize {
        self.assets.iter().filter(|asset| asset.action == action).count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub select: SelectResult,
    pub download: DownloadResult,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

fn emit(sink: &dyn ProgressSink, message: impl Into<String>) {
    sink.event(ProgressEvent {
        message: message.into(),
        elapsed: None,
    });
}

#[derive(Clone)]
pub struct App<N: NcbiClient, T: Taxonomy> {
    store: Store,
    ncbi: N,
    taxonomy: T,
}

impl<N: NcbiClient, T: Taxonomy> App<N, T> {
    pub fn new(store: Store, ncbi: N, taxonomy: T) -> Self {
        Self {
            store,
            ncbi,
            taxonomy,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn refresh_catalogs(
        &self,
        base_url: &str,
        sink: &dyn ProgressSink,
    ) -> Result<CatalogResult, PathogenError> {
        self.store.ensure_catalog_dir()?;
        let base_url = base_url.trim_end_matches('/');
        let mut tables = Vec::new();
        for name in [REFSEQ_SUMMARY_FILE, GENBANK_SUMMARY_FILE] {
            let url = format!("{base_url}/{name}");
            let path = self.store.catalog_path(name);
            emit(sink, format!("phase=Catalog; downloading {name}"));
            let start = Instant::now();
            let bytes = self.ncbi.download(&url, path.as_std_path())?;
            sink.event(ProgressEvent {
                message: format!("ncbi.response {name} bytes={bytes}"),
                elapsed: Some(start.elapsed()),
            });
            info!(bytes, "downloaded {url} to {path}");
            tables.push(CatalogTable {
                name: name.to_string(),
                path: path.to_string(),
                bytes,
            });
        }
        Ok(CatalogResult {
            base_url: base_url.to_string(),
            tables,
        })
    }

    fn load_catalog(
        &self,
        config: &ResolvedConfig,
        options: SelectOptions,
        sink: &dyn ProgressSink,
    ) -> Result<AssemblyCatalog, PathogenError> {
        let refseq = self.store.catalog_path(REFSEQ_SUMMARY_FILE);
        let genbank = self.store.catalog_path(GENBANK_SUMMARY_FILE);
        let cached = Store::exists(&refseq) && Store::exists(&genbank);
        if options.refresh_catalogs || !cached {
            if !cached {
                info!("no cached assembly catalogs in {}", self.store.catalog_dir());
            }
            self.refresh_catalogs(&config.catalog_base_url, sink)?;
        }
        emit(sink, "phase=Catalog; reading assembly summaries");
        let catalog = AssemblyCatalog::load(&refseq, &genbank)?;
        if catalog.is_empty() {
            warn!("assembly catalogs in {} hold no usable records", self.store.catalog_dir());
        }
        Ok(catalog)
    }

    pub fn select(
        &self,
        inputs: &SelectInputs,
        config: &ResolvedConfig,
        options: SelectOptions,
        sink: &dyn ProgressSink,
    ) -> Result<SelectResult, PathogenError> {
        emit(sink, "phase=Registry; reading species registries");
        let registry = SpeciesRegistry::new(config.excluded_pest_types.clone());
        let mut species = registry.load(&inputs.phibase, &inputs.risk_register)?;

        emit(sink, format!("phase=Resolve; resolving {} names", species.len()));
        let resolver = NameResolver::new(&self.taxonomy, &config.synonyms);
        let mut unresolved = Vec::new();
        for entry in &mut species {
            entry.taxon_id = resolver.resolve(&entry.name);
            if entry.taxon_id.is_none() {
                unresolved.push(entry.name.clone());
            }
        }
        if !unresolved.is_empty() {
            warn!("names with no taxid: {}", unresolved.join(", "));
        }
        let resolved: Vec<&Species> = species
            .iter()
            .filter(|entry| entry.taxon_id.is_some())
            .collect();
        info!(resolved = resolved.len(), "finished resolving taxon ids");
        manifest::write_unique_species(&self.store.unique_species_path(), &species)?;

        let catalog = self.load_catalog(config, options, sink)?;

        emit(sink, format!("phase=Select; choosing assemblies for {} species", resolved.len()));
        let expander = TaxonExpander::new(&self.taxonomy);
        let selector = AssemblySelector::new(&self.ncbi);
        let mut entries = Vec::new();
        let mut missing = Vec::new();
        for entry in &resolved {
            let Some(taxid) = entry.taxon_id else {
                continue;
            };
            let taxa = expander.expand(taxid);
            let candidates = catalog.candidates(&taxa);
            info!(
                candidates = candidates.len(),
                "selecting for {} (taxid {taxid})",
                entry.name
            );
            match selector.select(&candidates) {
                Some(record) => {
                    info!(
                        accession = %record.accession,
                        level = %record.assembly_level,
                        "selected assembly for {}",
                        entry.name
                    );
                    entries.push(ManifestEntry::from_selection(&entry.name, taxid, record));
                }
                None => {
                    warn!("no assembly selected for {}", entry.name);
                    missing.push(MissingSpecies {
                        species_name: entry.name.clone(),
                        species_taxid: taxid,
                    });
                }
            }
        }

        emit(sink, "phase=Store; writing manifest and reports");
        let manifest_path = self.store.manifest_path();
        manifest::write_manifest(&manifest_path, &entries)?;
        let summary = Summary::new(&entries, &missing, &unresolved, Utc::now());
        let summary_path = self.store.summary_path();
        Store::write_json_atomic(&summary_path, &summary)?;
        Store::write_json_atomic(&self.store.missing_species_path(), &missing)?;
        Store::write_json_atomic(&self.store.unresolved_species_path(), &unresolved)?;
        info!(
            selected = entries.len(),
            missing = missing.len(),
            "wrote one-genome-per-species download list to {manifest_path}"
        );

        Ok(SelectResult {
            species_total: species.len(),
            resolved: resolved.len(),
            unresolved,
            selected: entries.len(),
            missing,
            catalog_records: catalog.len(),
            manifest_path: manifest_path.to_string(),
            summary_path: summary_path.to_string(),
            summary,
        })
    }

    pub fn download(
        &self,
        manifest_path: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadResult, PathogenError> {
        let entries = manifest::read_manifest(manifest_path)?;
        self.store.ensure_download_layout()?;
        let error_log = ErrorLog::new(self.store.error_log_path());
        let verifier = ChecksumVerifier::new(&self.ncbi, &error_log);

        let mut assets = Vec::with_capacity(entries.len());
        let mut link_repairs = 0usize;
        for (position, entry) in entries.iter().enumerate() {
            emit(
                sink,
                format!(
                    "phase=Download; [{}/{}] {}",
                    position + 1,
                    entries.len(),
                    entry.assembly_accession
                ),
            );
            let (entry, repairs) = repair_entry(entry, &error_log)?;
            link_repairs += repairs;
            assets.push(self.fetch_asset(&entry, &verifier));
        }

        emit(sink, "phase=Assemble; concatenating verified assets");
        let mut included = HashSet::new();
        let database_inputs: Vec<Utf8PathBuf> = assets
            .iter()
            .filter(|asset| matches!(asset.action, AssetAction::Existing | AssetAction::Downloaded))
            .filter(|asset| included.insert(asset.path.clone()))
            .map(|asset| Utf8PathBuf::from(&asset.path))
            .collect();
        let database_path = self.store.database_path();
        let report = fasta::concatenate(&database_inputs, database_path.as_std_path())?;

        let result = DownloadResult {
            manifest_path: manifest_path.to_string(),
            assets,
            link_repairs,
            database_path: database_path.to_string(),
            database_assets: report.assets,
            database_bytes: report.bytes,
            error_log_path: error_log.path().to_string(),
            error_log_records: error_log.len()?,
        };
        let failures = result.count(AssetAction::ChecksumMismatch) + result.count(AssetAction::Failed);
        if failures > 0 {
            warn!(failures, "some assets were left out of {database_path}");
        }
        if !error_log.is_empty()? {
            warn!(
                records = result.error_log_records,
                "assets need attention, see {}",
                error_log.path()
            );
        }
        Ok(result)
    }

    pub fn run(
        &self,
        inputs: &SelectInputs,
        config: &ResolvedConfig,
        options: SelectOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, PathogenError> {
        let select = self.select(inputs, config, options, sink)?;
        let download = self.download(&self.store.manifest_path(), sink)?;
        Ok(RunResult { select, download })
    }

    fn fetch_asset(&self, entry: &ManifestEntry, verifier: &ChecksumVerifier<'_, N>) -> AssetResult {
        let file_name = entry.file_name();
        let final_path = self.store.asset_path(&file_name);
        let mut result = AssetResult {
            assembly_accession: entry.assembly_accession.clone(),
            organism_name: entry.organism_name.clone(),
            file_name: file_name.clone(),
            action: AssetAction::Existing,
            verification: None,
            headers_tagged: None,
            path: final_path.to_string(),
            error: None,
        };
        if Store::exists(&final_path) {
            info!("{file_name} already exists, skipping download");
            return result;
        }

        let staging = self.store.staging_path(&file_name);
        match self.stage_asset(entry, &staging, &final_path, verifier) {
            Ok((Verification::Unmatched, _)) => {
                result.action = AssetAction::ChecksumMismatch;
                result.verification = Some(Verification::Unmatched);
                result.path = staging.to_string();
            }
            Ok((verification, headers)) => {
                result.action = AssetAction::Downloaded;
                result.verification = Some(verification);
                result.headers_tagged = headers;
            }
            Err(err) => {
                warn!("failed to fetch {file_name}: {err}");
                result.action = AssetAction::Failed;
                result.path = staging.to_string();
                result.error = Some(err.to_string());
            }
        }
        result
    }

    fn stage_asset(
        &self,
        entry: &ManifestEntry,
        staging: &Utf8Path,
        final_path: &Utf8Path,
        verifier: &ChecksumVerifier<'_, N>,
    ) -> Result<(Verification, Option<usize>), PathogenError> {
        let start = Instant::now();
        let bytes = self.ncbi.download(&entry.sequence_url, staging.as_std_path())?;
        info!(
            bytes,
            latency_ms = start.elapsed().as_millis() as u64,
            "downloaded {}",
            entry.sequence_url
        );

        let asset = AssetRef {
            organism_name: &entry.organism_name,
            taxid: entry.selected_taxid,
            sequence_url: &entry.sequence_url,
            md5_url: &entry.md5_url,
        };
        let verification = verifier.verify(staging.as_std_path(), asset)?;
        if verification == Verification::Unmatched {
            return Ok((verification, None));
        }

        let headers = fasta::rewrite_headers(
            staging.as_std_path(),
            entry.selected_taxid,
            &entry.organism_name,
        )?;
        Store::promote(staging, final_path)?;
        Ok((verification, Some(headers)))
    }
}

fn repair_entry(
    entry: &ManifestEntry,
    error_log: &ErrorLog,
) -> Result<(ManifestEntry, usize), PathogenError> {
    let mut repaired = entry.clone();
    let mut repairs = 0usize;
    for (field, link) in [
        ("dlLink", &mut repaired.sequence_url),
        ("dlLinkMD5", &mut repaired.md5_url),
    ] {
        let (fixed, changed) = links::repair_link(link);
        if changed {
            warn!(field, "repaired link {link} to {fixed}");
            error_log.record_link_repair(&entry.assembly_accession, field, link, &fixed)?;
            *link = fixed;
            repairs += 1;
        }
    }
    Ok((repaired, repairs))
}

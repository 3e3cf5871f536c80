use std::io::{self, Write};

use serde::Serialize;
use tracing::info;

use crate::app::{
    AssetAction, CatalogResult, DownloadResult, ProgressEvent, ProgressSink, RunResult,
    SelectResult,
};
use crate::manifest::ManifestDiff;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_catalogs(result: &CatalogResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_select(result: &SelectResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_download(result: &DownloadResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_run(result: &RunResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_diff(result: &ManifestDiff) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct TextOutput;

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => info!("{}", event.message),
        }
    }
}

impl TextOutput {
    pub fn print_catalogs(result: &CatalogResult) {
        println!("Assembly catalogs from {}", result.base_url);
        for table in &result.tables {
            println!("  {} ({} bytes) -> {}", table.name, table.bytes, table.path);
        }
    }

    pub fn print_select(result: &SelectResult) {
        println!("Species in registries: {}", result.species_total);
        println!("Resolved to a taxid:   {}", result.resolved);
        println!("Assemblies selected:   {}", result.selected);
        println!("Manifest:              {}", result.manifest_path);
        println!("Summary:               {}", result.summary_path);
        if !result.unresolved.is_empty() {
            println!("Names with no taxid ({}): {}", result.unresolved.len(), result.unresolved.join(", "));
        }
        if result.missing.is_empty() {
            println!("All species had a selected genome");
        } else {
            let names: Vec<&str> = result
                .missing
                .iter()
                .take(10)
                .map(|missing| missing.species_name.as_str())
                .collect();
            let more = if result.missing.len() > 10 { ", ..." } else { "" };
            println!(
                "Species with no selected genome ({}): {}{more}",
                result.missing.len(),
                names.join(", ")
            );
        }
    }

    pub fn print_download(result: &DownloadResult) {
        println!("Assets in manifest:  {}", result.assets.len());
        println!("  downloaded:        {}", result.count(AssetAction::Downloaded));
        println!("  already present:   {}", result.count(AssetAction::Existing));
        println!("  checksum mismatch: {}", result.count(AssetAction::ChecksumMismatch));
        println!("  failed:            {}", result.count(AssetAction::Failed));
        if result.link_repairs > 0 {
            println!("Links repaired:      {}", result.link_repairs);
        }
        for asset in &result.assets {
            if let Some(error) = &asset.error {
                println!("  {} ({}): {error}", asset.assembly_accession, asset.organism_name);
            }
        }
        println!(
            "Database: {} ({} assets, {} bytes)",
            result.database_path, result.database_assets, result.database_bytes
        );
        println!(
            "Error log: {} ({} records)",
            result.error_log_path, result.error_log_records
        );
    }

    pub fn print_run(result: &RunResult) {
        Self::print_select(&result.select);
        Self::print_download(&result.download);
    }

    pub fn print_diff(result: &ManifestDiff) {
        println!("Shared organisms: {}", result.shared);
        println!("Only in new manifest ({}):", result.only_in_new.len());
        for name in &result.only_in_new {
            println!("  + {name}");
        }
        println!("Only in old manifest ({}):", result.only_in_old.len());
        for name in &result.only_in_old {
            println!("  - {name}");
        }
    }
}

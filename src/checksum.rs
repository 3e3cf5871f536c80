use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::domain::TaxId;
use crate::error::PathogenError;
use crate::error_log::ErrorLog;
use crate::ncbi::NcbiClient;

const READ_BLOCK: usize = 4096;
const MAX_REFETCHES: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    Matched,
    Unmatched,
    ManifestEntryAbsent,
}

#[derive(Debug, Clone, Copy)]
pub struct AssetRef<'a> {
    pub organism_name: &'a str,
    pub taxid: TaxId,
    pub sequence_url: &'a str,
    pub md5_url: &'a str,
}

pub fn file_md5(path: &Path) -> Result<String, PathogenError> {
    let mut file = File::open(path)
        .map_err(|err| PathogenError::Filesystem(format!("open {}: {err}", path.display())))?;
    let mut context = md5::Context::new();
    let mut buffer = [0u8; READ_BLOCK];
    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|err| PathogenError::Filesystem(format!("read {}: {err}", path.display())))?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }
    Ok(format!("{:x}", context.compute()))
}

pub fn extract_checksum(manifest: &str, file_name: &str) -> Option<String> {
    manifest.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let digest = fields.next()?;
        let path = fields.next()?;
        let listed = path.rsplit('/').next().unwrap_or(path);
        (listed == file_name).then(|| digest.to_lowercase())
    })
}

pub struct ChecksumVerifier<'a, N: NcbiClient> {
    client: &'a N,
    error_log: &'a ErrorLog,
}

impl<'a, N: NcbiClient> ChecksumVerifier<'a, N> {
    pub fn new(client: &'a N, error_log: &'a ErrorLog) -> Self {
        Self { client, error_log }
    }

    /// Compares `destination` against its manifest entry. A mismatch triggers
    /// one re-download; a mismatch that survives it is written to the error
    /// log and the file is left where it is.
    pub fn verify(
        &self,
        destination: &Path,
        asset: AssetRef<'_>,
    ) -> Result<Verification, PathogenError> {
        let file_name = destination
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let manifest = self.client.fetch_text(asset.md5_url)?;
        let Some(expected) = extract_checksum(&manifest, &file_name) else {
            warn!("{file_name} is not listed in {}", asset.md5_url);
            return Ok(Verification::ManifestEntryAbsent);
        };

        let mut refetches = 0usize;
        loop {
            let actual = file_md5(destination)?;
            if actual == expected {
                info!("checksum for {file_name} matches");
                return Ok(Verification::Matched);
            }
            if refetches == MAX_REFETCHES {
                error!("failed to download {file_name} correctly");
                self.error_log.record_checksum_failure(
                    asset.organism_name,
                    asset.taxid,
                    asset.md5_url,
                    asset.sequence_url,
                )?;
                return Ok(Verification::Unmatched);
            }
            refetches += 1;
            error!("checksum mismatch for {file_name} (expected {expected}, got {actual}), re-downloading");
            if let Err(err) = self.client.download(asset.sequence_url, destination) {
                error!("re-download of {file_name} failed: {err}");
                self.error_log.record_checksum_failure(
                    asset.organism_name,
                    asset.taxid,
                    asset.md5_url,
                    asset.sequence_url,
                )?;
                return Ok(Verification::Unmatched);
            }
        }
    }
}

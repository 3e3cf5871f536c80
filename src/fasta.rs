//! Header tagging for downloaded sequence files and assembly of the final
//! database.

use std::io::{self, BufRead, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::{debug, info};

use crate::domain::TaxId;
use crate::error::PathogenError;
use crate::fs_util;

pub fn header_tag(taxid: TaxId, organism_name: &str) -> String {
    format!(">taxid|{taxid}|{organism_name}|")
}

pub fn rewrite_headers(
    path: &Path,
    taxid: TaxId,
    organism_name: &str,
) -> Result<usize, PathogenError> {
    let tag = header_tag(taxid, organism_name);
    let mut reader = fs_util::open_gz(path)?;
    let mut temp = fs_util::sibling_tempfile(path, ".pathogen-db-rewrite")?;
    let compress_err =
        |err: io::Error| PathogenError::Compression(format!("{}: {err}", path.display()));

    let mut records = 0usize;
    {
        let mut encoder = GzEncoder::new(BufWriter::new(&mut temp), Compression::default());
        let mut line = Vec::new();
        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line).map_err(compress_err)?;
            if read == 0 {
                break;
            }
            match line.strip_prefix(b">") {
                Some(header) => {
                    encoder.write_all(tag.as_bytes()).map_err(compress_err)?;
                    encoder.write_all(header).map_err(compress_err)?;
                    records += 1;
                }
                None => encoder.write_all(&line).map_err(compress_err)?,
            }
        }
        let mut writer = encoder.finish().map_err(compress_err)?;
        writer.flush().map_err(compress_err)?;
    }

    fs_util::persist(temp, path)?;
    info!("modified {records} headers in {}", path.display());
    Ok(records)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssembleReport {
    pub assets: usize,
    pub bytes: u64,
}

pub fn concatenate<P: AsRef<Path>>(
    assets: &[P],
    output: &Path,
) -> Result<AssembleReport, PathogenError> {
    let mut staged = fs_util::sibling_tempfile(output, ".pathogen-db-database")?;
    let mut report = AssembleReport::default();
    {
        let mut writer = BufWriter::new(&mut staged);
        for asset in assets {
            let asset = asset.as_ref();
            let mut transient = fs_util::sibling_tempfile(output, ".pathogen-db-unzipped")?;
            fs_util::gunzip_into(asset, &mut transient)?;
            transient
                .as_file_mut()
                .seek(SeekFrom::Start(0))
                .map_err(|err| PathogenError::Filesystem(err.to_string()))?;
            let copied = io::copy(&mut transient, &mut writer)
                .map_err(|err| PathogenError::Filesystem(format!("append {}: {err}", asset.display())))?;
            debug!("appended {copied} bytes from {}", asset.display());
            report.assets += 1;
            report.bytes += copied;
        }
        writer
            .flush()
            .map_err(|err| PathogenError::Filesystem(err.to_string()))?;
    }
    fs_util::persist(staged, output)?;
    info!(
        assets = report.assets,
        bytes = report.bytes,
        "concatenated files into {}",
        output.display()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use super::*;

    fn write_gz(path: &Path, content: &[u8]) {
        let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        encoder.write_all(content).unwrap();
        encoder.finish().unwrap();
    }

    fn read_gz(path: &Path) -> Vec<u8> {
        let mut out = Vec::new();
        fs_util::gunzip_into(path, &mut out).unwrap();
        out
    }

    #[test]
    fn tags_only_header_lines() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("GCA_1.1_x_genomic.fna.gz");
        write_gz(&path, b">NC_1 chromosome 1\nACGT\nTTGA\n>NC_2 plasmid\nGGCC\n");

        let records = rewrite_headers(&path, 5507, "Fusarium oxysporum").unwrap();
        assert_eq!(records, 2);
        assert_eq!(
            read_gz(&path),
            b">taxid|5507|Fusarium oxysporum|NC_1 chromosome 1\nACGT\nTTGA\n>taxid|5507|Fusarium oxysporum|NC_2 plasmid\nGGCC\n"
        );
    }

    #[test]
    fn concatenates_in_given_order() {
        let temp = tempfile::tempdir().unwrap();
        let a = temp.path().join("a.fna.gz");
        let b = temp.path().join("b.fna.gz");
        write_gz(&a, b">a\nAAAA\n");
        write_gz(&b, b">b\nCCCC\n");
        let output = temp.path().join("db.fa");

        let report = concatenate(&[&b, &a], &output).unwrap();
        assert_eq!(report.assets, 2);
        assert_eq!(std::fs::read(&output).unwrap(), b">b\nCCCC\n>a\nAAAA\n");
        assert_eq!(report.bytes, 16);
    }

    #[test]
    fn empty_asset_list_gives_empty_file() {
        let temp = tempfile::tempdir().unwrap();
        let output = temp.path().join("db.fa");
        let assets: [&Path; 0] = [];
        let report = concatenate(&assets, &output).unwrap();
        assert_eq!(report, AssembleReport::default());
        assert_eq!(std::fs::metadata(&output).unwrap().len(), 0);
        let leftovers = std::fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}

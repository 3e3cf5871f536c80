use std::fs::{self, OpenOptions};
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::TaxId;
use crate::error::PathogenError;

#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: Utf8PathBuf,
}

impl ErrorLog {
    pub fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn record_checksum_failure(
        &self,
        organism: &str,
        taxid: TaxId,
        md5_url: &str,
        sequence_url: &str,
    ) -> Result<(), PathogenError> {
        self.append(&format!(
            "Organism ID: {organism}, TaxID: {taxid}, MD5 URL: {md5_url}, FASTA URL: {sequence_url}"
        ))
    }

    pub fn record_link_repair(
        &self,
        accession: &str,
        field: &str,
        original: &str,
        repaired: &str,
    ) -> Result<(), PathogenError> {
        self.append(&format!(
            "Repaired link: Accession: {accession}, Field: {field}, Original: {original}, Repaired: {repaired}"
        ))
    }

    pub fn len(&self) -> Result<usize, PathogenError> {
        if !self.path.as_std_path().exists() {
            return Ok(0);
        }
        let content = fs::read_to_string(self.path.as_std_path())
            .map_err(|err| PathogenError::Filesystem(format!("read {}: {err}", self.path)))?;
        Ok(content.lines().filter(|line| !line.trim().is_empty()).count())
    }

    pub fn is_empty(&self) -> Result<bool, PathogenError> {
        Ok(self.len()? == 0)
    }

    fn append(&self, record: &str) -> Result<(), PathogenError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| PathogenError::Filesystem(err.to_string()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path.as_std_path())
            .map_err(|err| PathogenError::Filesystem(format!("open {}: {err}", self.path)))?;
        let line = format!("{}\n", record.replace('\n', " "));
        file.write_all(line.as_bytes())
            .map_err(|err| PathogenError::Filesystem(format!("append {}: {err}", self.path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_one_line_per_record() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("logs/error_log.txt")).unwrap();
        let log = ErrorLog::new(path.clone());
        assert!(log.is_empty().unwrap());

        log.record_checksum_failure("Fusarium oxysporum", 5507, "https://h/md5", "https://h/fa")
            .unwrap();
        log.record_link_repair("GCA_1.1", "dlLinkMD5", "https:https://h", "https://h")
            .unwrap();

        let content = std::fs::read_to_string(path.as_std_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "Organism ID: Fusarium oxysporum, TaxID: 5507, MD5 URL: https://h/md5, FASTA URL: https://h/fa"
        );
        assert_eq!(log.len().unwrap(), 2);
    }
}

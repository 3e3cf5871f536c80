use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};

use camino::Utf8Path;
use csv::{ReaderBuilder, StringRecord};
use tracing::{info, warn};

use crate::domain::{AssemblyLevel, GenomeAccession, SourceDb, TaxId};
use crate::error::PathogenError;

pub const REFSEQ_SUMMARY_FILE: &str = "assembly_summary_refseq.txt";
pub const GENBANK_SUMMARY_FILE: &str = "assembly_summary_genbank.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyRecord {
    pub accession: GenomeAccession,
    pub taxid: TaxId,
    pub organism_name: String,
    pub assembly_level: AssemblyLevel,
    pub refseq_category: String,
    pub ftp_path: String,
    pub release_date: String,
    pub paired_accession: Option<String>,
    pub source_db: SourceDb,
}

struct Columns {
    accession: usize,
    taxid: usize,
    organism_name: usize,
    refseq_category: usize,
    assembly_level: usize,
    release_date: usize,
    ftp_path: usize,
    paired_accession: Option<usize>,
}

impl Columns {
    fn from_header(table: &str, header: &StringRecord) -> Result<Self, PathogenError> {
        // Unnamed columns are artifacts of trailing tabs and are ignored.
        let mut index = HashMap::new();
        for (position, name) in header.iter().enumerate() {
            let name = name.trim();
            let name = if position == 0 {
                name.trim_start_matches('#').trim()
            } else {
                name
            };
            if name.is_empty() {
                continue;
            }
            index.entry(name.to_string()).or_insert(position);
        }
        let required = |column: &str| {
            index
                .get(column)
                .copied()
                .ok_or_else(|| PathogenError::MissingColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                })
        };
        Ok(Self {
            accession: required("assembly_accession")?,
            taxid: required("taxid")?,
            organism_name: required("organism_name")?,
            refseq_category: required("refseq_category")?,
            assembly_level: required("assembly_level")?,
            release_date: required("seq_rel_date")?,
            ftp_path: required("ftp_path")?,
            paired_accession: index.get("gbrs_paired_asm").copied(),
        })
    }
}

pub fn read_table<R: Read>(
    table: &str,
    reader: R,
    source_db: SourceDb,
) -> Result<Vec<AssemblyRecord>, PathogenError> {
    let mut csv = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(reader);

    let mut columns: Option<Columns> = None;
    let mut records = Vec::new();
    let mut row = StringRecord::new();
    loop {
        let more = csv.read_record(&mut row).map_err(|err| integrity(table, &row, err))?;
        if !more {
            break;
        }
        let first = row.get(0).unwrap_or_default();
        if first.starts_with("##") {
            continue;
        }
        if columns.is_none() {
            columns = Some(Columns::from_header(table, &row)?);
            continue;
        }
        let Some(cols) = columns.as_ref() else {
            continue;
        };

        let field = |position: usize| row.get(position).unwrap_or_default().trim();
        let ftp_path = field(cols.ftp_path);
        if !ftp_path.contains("://") {
            continue;
        }

        let line = line_of(&row);
        let taxid_raw = field(cols.taxid);
        let taxid = taxid_raw
            .parse::<TaxId>()
            .map_err(|_| PathogenError::CatalogIntegrity {
                table: table.to_string(),
                line,
                message: format!("taxid `{taxid_raw}` is not an integer"),
            })?;
        let accession_raw = field(cols.accession);
        let Ok(accession) = accession_raw.parse::<GenomeAccession>() else {
            warn!("{table} line {line}: skipping row with accession `{accession_raw}`");
            continue;
        };
        let paired_accession = cols
            .paired_accession
            .map(field)
            .filter(|value| !value.is_empty() && *value != "na")
            .map(str::to_string);

        records.push(AssemblyRecord {
            accession,
            taxid,
            organism_name: field(cols.organism_name).to_string(),
            assembly_level: AssemblyLevel::from(field(cols.assembly_level)),
            refseq_category: field(cols.refseq_category).to_string(),
            ftp_path: ftp_path.to_string(),
            release_date: field(cols.release_date).to_string(),
            paired_accession,
            source_db,
        });
    }

    if columns.is_none() {
        return Err(PathogenError::CatalogIntegrity {
            table: table.to_string(),
            line: 0,
            message: "no header line found".to_string(),
        });
    }
    Ok(records)
}

fn line_of(row: &StringRecord) -> u64 {
    row.position().map(|pos| pos.line()).unwrap_or_default()
}

fn integrity(table: &str, row: &StringRecord, err: csv::Error) -> PathogenError {
    PathogenError::CatalogIntegrity {
        table: table.to_string(),
        line: line_of(row),
        message: err.to_string(),
    }
}

#[derive(Debug, Default)]
pub struct AssemblyCatalog {
    records: Vec<AssemblyRecord>,
    by_taxid: HashMap<TaxId, Vec<usize>>,
}

impl AssemblyCatalog {
    pub fn build(primary: Vec<AssemblyRecord>, secondary: Vec<AssemblyRecord>) -> Self {
        let paired: HashSet<String> = primary
            .iter()
            .filter_map(|record| record.paired_accession.clone())
            .collect();
        let secondary_total = secondary.len();
        let kept: Vec<AssemblyRecord> = secondary
            .into_iter()
            .filter(|record| !paired.contains(record.accession.as_str()))
            .collect();
        let mirrored = secondary_total - kept.len();
        let mut records = primary;
        records.extend(kept);
        info!(mirrored, total = records.len(), "merged assembly catalogs");

        let mut by_taxid: HashMap<TaxId, Vec<usize>> = HashMap::new();
        for (position, record) in records.iter().enumerate() {
            by_taxid.entry(record.taxid).or_default().push(position);
        }
        Self { records, by_taxid }
    }

    pub fn from_readers<P: Read, S: Read>(primary: P, secondary: S) -> Result<Self, PathogenError> {
        let primary = read_table(REFSEQ_SUMMARY_FILE, primary, SourceDb::RefSeq)?;
        let secondary = read_table(GENBANK_SUMMARY_FILE, secondary, SourceDb::GenBank)?;
        Ok(Self::build(primary, secondary))
    }

    pub fn load(primary: &Utf8Path, secondary: &Utf8Path) -> Result<Self, PathogenError> {
        let primary = read_table(primary.as_str(), open_table(primary)?, SourceDb::RefSeq)?;
        info!(records = primary.len(), "read RefSeq catalog");
        let secondary = read_table(secondary.as_str(), open_table(secondary)?, SourceDb::GenBank)?;
        info!(records = secondary.len(), "read GenBank catalog");
        Ok(Self::build(primary, secondary))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn candidates(&self, taxa: &BTreeSet<TaxId>) -> Vec<&AssemblyRecord> {
        let mut positions: Vec<usize> = taxa
            .iter()
            .filter_map(|taxid| self.by_taxid.get(taxid))
            .flatten()
            .copied()
            .collect();
        positions.sort_unstable();
        positions.into_iter().map(|pos| &self.records[pos]).collect()
    }
}

fn open_table(path: &Utf8Path) -> Result<BufReader<File>, PathogenError> {
    if !path.as_std_path().exists() {
        return Err(PathogenError::MissingInput(path.as_std_path().to_path_buf()));
    }
    File::open(path.as_std_path())
        .map(BufReader::new)
        .map_err(|err| PathogenError::Filesystem(format!("open {path}: {err}")))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const HEADER: &str = "#assembly_accession\tbioproject\ttaxid\torganism_name\trefseq_category\tassembly_level\tseq_rel_date\tftp_path\tgbrs_paired_asm\t\n";

    fn row(acc: &str, taxid: &str, level: &str, category: &str, ftp: &str, paired: &str) -> String {
        format!("{acc}\tPRJNA1\t{taxid}\tOrganism {taxid}\t{category}\t{level}\t2020/01/01\t{ftp}\t{paired}\t\n")
    }

    #[test]
    fn skips_comment_and_non_network_rows() {
        let text = format!(
            "## See ftp://ftp.ncbi.nlm.nih.gov/genomes/README_assembly_summary.txt\n{HEADER}{}{}",
            row("GCF_000001.1", "5507", "Contig", "na", "https://host/GCF_000001.1_x", "GCA_000001.1"),
            row("GCF_000002.1", "5507", "Contig", "na", "na", "na"),
        );
        let records = read_table("refseq", text.as_bytes(), SourceDb::RefSeq).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].accession.as_str(), "GCF_000001.1");
        assert_eq!(records[0].paired_accession.as_deref(), Some("GCA_000001.1"));
    }

    #[test]
    fn untypeable_taxid_is_fatal() {
        let text = format!(
            "{HEADER}{}",
            row("GCA_000003.1", "abc", "Contig", "na", "https://host/x", "na")
        );
        let err = read_table("genbank", text.as_bytes(), SourceDb::GenBank).unwrap_err();
        assert_matches!(err, PathogenError::CatalogIntegrity { line: 2, .. });
    }

    #[test]
    fn unrecognised_accession_skips_only_that_row() {
        let text = format!(
            "{HEADER}{}{}",
            row("NC_002488.3", "2371", "Complete Genome", "na", "https://host/NC_002488.3_x", "na"),
            row("GCA_000006725.1", "2371", "Complete Genome", "na", "https://host/GCA_000006725.1_y", "na"),
        );
        let records = read_table("genbank", text.as_bytes(), SourceDb::GenBank).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].accession.as_str(), "GCA_000006725.1");
    }

    #[test]
    fn header_only_tables_give_empty_catalog() {
        let catalog = AssemblyCatalog::from_readers(HEADER.as_bytes(), HEADER.as_bytes()).unwrap();
        assert!(catalog.is_empty());
        assert!(catalog.candidates(&BTreeSet::from([5507])).is_empty());
    }

    #[test]
    fn missing_column_is_reported() {
        let text = "#assembly_accession\ttaxid\n";
        let err = read_table("refseq", text.as_bytes(), SourceDb::RefSeq).unwrap_err();
        assert_matches!(err, PathogenError::MissingColumn { .. });
    }

    #[test]
    fn genbank_mirrors_of_refseq_are_dropped() {
        let refseq = format!(
            "{HEADER}{}",
            row("GCF_000001.1", "5507", "Contig", "na", "https://host/GCF_000001.1_x", "GCA_000001.1")
        );
        let genbank = format!(
            "{HEADER}{}{}",
            row("GCA_000001.1", "5507", "Contig", "na", "https://host/GCA_000001.1_x", "GCF_000001.1"),
            row("GCA_000009.1", "61366", "Scaffold", "na", "https://host/GCA_000009.1_y", "na"),
        );
        let catalog = AssemblyCatalog::from_readers(refseq.as_bytes(), genbank.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 2);

        let taxa = BTreeSet::from([5507, 61366]);
        let candidates = catalog.candidates(&taxa);
        let accessions: Vec<&str> = candidates.iter().map(|r| r.accession.as_str()).collect();
        assert_eq!(accessions, vec!["GCF_000001.1", "GCA_000009.1"]);
        assert_eq!(candidates[0].source_db, SourceDb::RefSeq);
        assert_eq!(candidates[1].source_db, SourceDb::GenBank);
    }
}

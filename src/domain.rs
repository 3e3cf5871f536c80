use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PathogenError;

pub type TaxId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenomeAccession(String);

impl GenomeAccession {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GenomeAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GenomeAccession {
    type Err = PathogenError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_string();
        let is_valid = normalized.starts_with("GCF_") || normalized.starts_with("GCA_");
        let parts = normalized.split('.').collect::<Vec<_>>();
        let has_numeric = parts
            .first()
            .map(|prefix| prefix.trim_start_matches("GCF_").trim_start_matches("GCA_"))
            .map(|rest| rest.chars().all(|ch| ch.is_ascii_digit()) && !rest.is_empty())
            .unwrap_or(false);
        if !is_valid || !has_numeric {
            return Err(PathogenError::InvalidGenomeAccession(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AssemblyLevel {
    CompleteGenome,
    Chromosome,
    Scaffold,
    Contig,
    Other(String),
}

impl AssemblyLevel {
    pub fn priority(&self) -> u8 {
        match self {
            AssemblyLevel::CompleteGenome => 1,
            AssemblyLevel::Chromosome => 2,
            AssemblyLevel::Scaffold => 3,
            AssemblyLevel::Contig => 4,
            AssemblyLevel::Other(_) => 5,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AssemblyLevel::CompleteGenome => "Complete Genome",
            AssemblyLevel::Chromosome => "Chromosome",
            AssemblyLevel::Scaffold => "Scaffold",
            AssemblyLevel::Contig => "Contig",
            AssemblyLevel::Other(value) => value,
        }
    }
}

impl From<&str> for AssemblyLevel {
    fn from(value: &str) -> Self {
        match value.trim() {
            "Complete Genome" => AssemblyLevel::CompleteGenome,
            "Chromosome" => AssemblyLevel::Chromosome,
            "Scaffold" => AssemblyLevel::Scaffold,
            "Contig" => AssemblyLevel::Contig,
            other => AssemblyLevel::Other(other.to_string()),
        }
    }
}

impl From<String> for AssemblyLevel {
    fn from(value: String) -> Self {
        AssemblyLevel::from(value.as_str())
    }
}

impl From<AssemblyLevel> for String {
    fn from(value: AssemblyLevel) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for AssemblyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceDb {
    RefSeq,
    GenBank,
}

impl fmt::Display for SourceDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceDb::RefSeq => write!(f, "RefSeq"),
            SourceDb::GenBank => write!(f, "GenBank"),
        }
    }
}

pub fn is_reference_category(refseq_category: &str) -> bool {
    matches!(
        refseq_category.trim(),
        "reference genome" | "representative genome"
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Species {
    pub name: String,
    pub taxon_id: Option<TaxId>,
}

impl Species {
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            taxon_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_genome_accession_valid() {
        let acc: GenomeAccession = "GCF_000005845.2".parse().unwrap();
        assert_eq!(acc.as_str(), "GCF_000005845.2");
    }

    #[test]
    fn parse_genome_accession_invalid() {
        let err = "ABC_123".parse::<GenomeAccession>().unwrap_err();
        assert_matches!(err, PathogenError::InvalidGenomeAccession(_));
    }

    #[test]
    fn unknown_levels_rank_last() {
        assert_eq!(AssemblyLevel::from("Complete Genome").priority(), 1);
        assert_eq!(AssemblyLevel::from("Contig").priority(), 4);
        let other = AssemblyLevel::from("na");
        assert_matches!(other, AssemblyLevel::Other(ref v) if v == "na");
        assert_eq!(other.priority(), 5);
    }

    #[test]
    fn assembly_level_serializes_as_published_text() {
        let json = serde_json::to_string(&AssemblyLevel::CompleteGenome).unwrap();
        assert_eq!(json, "\"Complete Genome\"");
        let back: AssemblyLevel = serde_json::from_str("\"Scaffold\"").unwrap();
        assert_eq!(back, AssemblyLevel::Scaffold);
    }
}

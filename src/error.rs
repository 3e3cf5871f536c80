use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PathogenError {
    #[error("invalid genome accession: {0}")]
    InvalidGenomeAccession(String),

    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("no taxonomy dump configured")]
    #[diagnostic(help("pass --taxdump-dir or set `taxdump_dir` to a directory holding names.dmp and nodes.dmp"))]
    MissingTaxonomy,

    #[error("failed to read species registry {path}: {message}")]
    Registry { path: PathBuf, message: String },

    #[error("{table} is missing required column `{column}`")]
    #[diagnostic(help("the table header must follow the NCBI assembly summary schema"))]
    MissingColumn { table: String, column: String },

    #[error("{table} line {line}: {message}")]
    #[diagnostic(help("the catalog cannot be trusted partially typed; refresh it with `pathogen-db catalogs`"))]
    CatalogIntegrity {
        table: String,
        line: u64,
        message: String,
    },

    #[error("failed to load taxonomy: {0}")]
    TaxonomyLoad(String),

    #[error("taxonomy lookup failed: {0}")]
    TaxonomyLookup(String),

    #[error("NCBI request failed: {0}")]
    NcbiHttp(String),

    #[error("NCBI returned status {status}: {message}")]
    NcbiStatus { status: u16, message: String },

    #[error("assembly stats unreadable: {0}")]
    StatsParse(String),

    #[error("failed to parse manifest {path}: {message}")]
    ManifestParse { path: PathBuf, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("gzip stream error: {0}")]
    Compression(String),
}

//! Species lists from the PHI-base export and the plant health risk register.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;

use camino::Utf8Path;
use csv::{ReaderBuilder, StringRecord};
use tracing::info;

use crate::domain::Species;
use crate::error::PathogenError;

pub const PHIBASE_SPECIES_COLUMN: &str = "Pathogen_species";
pub const RISK_NAME_COLUMN: &str = "Pest Name";
pub const RISK_TYPE_COLUMN: &str = "Type of pest";

pub struct SpeciesRegistry {
    excluded_pest_types: Vec<String>,
}

impl SpeciesRegistry {
    pub fn new(excluded_pest_types: Vec<String>) -> Self {
        Self {
            excluded_pest_types,
        }
    }

    pub fn load(&self, phibase: &Utf8Path, risk_register: &Utf8Path) -> Result<Vec<Species>, PathogenError> {
        info!("reading in {risk_register}");
        let risk = self.read_risk_register(open(risk_register)?, risk_register.as_str())?;
        info!("reading in {phibase}");
        let phi = self.read_phibase(open(phibase)?, phibase.as_str())?;
        let species = merge_species(phi, risk);
        info!("number of unique species before taxon lookup: {}", species.len());
        Ok(species)
    }

    pub fn read_phibase<R: Read>(&self, reader: R, table: &str) -> Result<Vec<String>, PathogenError> {
        let mut reader = csv_reader(reader);
        let header = header(&mut reader, table)?;
        let name_column = column(&header, table, PHIBASE_SPECIES_COLUMN)?;

        let mut names = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|err| registry_error(table, err))?;
            names.push(row.get(name_column).unwrap_or_default().trim().to_string());
        }
        Ok(names)
    }

    pub fn read_risk_register<R: Read>(&self, reader: R, table: &str) -> Result<Vec<String>, PathogenError> {
        let mut reader = csv_reader(reader);
        let header = header(&mut reader, table)?;
        let name_column = column(&header, table, RISK_NAME_COLUMN)?;
        let type_column = column(&header, table, RISK_TYPE_COLUMN)?;

        let mut names = Vec::new();
        let mut excluded = 0usize;
        for row in reader.records() {
            let row = row.map_err(|err| registry_error(table, err))?;
            let pest_type = row.get(type_column).unwrap_or_default().trim();
            if self.excluded_pest_types.iter().any(|kind| kind == pest_type) {
                excluded += 1;
                continue;
            }
            let name = row.get(name_column).unwrap_or_default().replace('\'', "");
            names.push(name.trim().to_string());
        }
        info!(excluded, kept = names.len(), "filtered risk register by pest type");
        Ok(names)
    }
}

pub fn merge_species(phibase: Vec<String>, risk_register: Vec<String>) -> Vec<Species> {
    let mut seen = HashSet::new();
    phibase
        .into_iter()
        .chain(risk_register)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.clone()))
        .map(Species::unresolved)
        .collect()
}

fn open(path: &Utf8Path) -> Result<File, PathogenError> {
    if !path.as_std_path().exists() {
        return Err(PathogenError::MissingInput(path.as_std_path().to_path_buf()));
    }
    File::open(path.as_std_path()).map_err(|err| PathogenError::Registry {
        path: path.as_std_path().to_path_buf(),
        message: err.to_string(),
    })
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader)
}

fn header<R: Read>(reader: &mut csv::Reader<R>, table: &str) -> Result<StringRecord, PathogenError> {
    reader
        .headers()
        .cloned()
        .map_err(|err| registry_error(table, err))
}

fn column(header: &StringRecord, table: &str, name: &str) -> Result<usize, PathogenError> {
    header
        .iter()
        .position(|field| field.trim().trim_start_matches('\u{feff}') == name)
        .ok_or_else(|| PathogenError::MissingColumn {
            table: table.to_string(),
            column: name.to_string(),
        })
}

fn registry_error(table: &str, err: csv::Error) -> PathogenError {
    PathogenError::Registry {
        path: table.into(),
        message: err.to_string(),
    }
}

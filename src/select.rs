use tracing::{debug, info, warn};

use crate::catalog::AssemblyRecord;
use crate::domain::is_reference_category;
use crate::error::PathogenError;
use crate::links;
use crate::ncbi::NcbiClient;

const TOTAL_LENGTH_MARKER: &str = "all\tall\tall\tall\ttotal-length";

pub fn parse_total_length(stats: &str) -> Result<u64, PathogenError> {
    let line = stats
        .lines()
        .find(|line| line.contains(TOTAL_LENGTH_MARKER))
        .ok_or_else(|| PathogenError::StatsParse("no total-length line".to_string()))?;
    let value = line.trim_end().rsplit('\t').next().unwrap_or_default().trim();
    value
        .parse::<u64>()
        .map_err(|_| PathogenError::StatsParse(format!("total-length `{value}` is not a number")))
}

pub struct StatsTiebreaker<'a, N: NcbiClient> {
    client: &'a N,
}

impl<'a, N: NcbiClient> StatsTiebreaker<'a, N> {
    pub fn new(client: &'a N) -> Self {
        Self { client }
    }

    fn total_length(&self, record: &AssemblyRecord) -> Result<u64, PathogenError> {
        let url = links::stats_url(&record.ftp_path);
        let text = self.client.fetch_text(&url)?;
        parse_total_length(&text)
    }

    pub fn rank<'r>(&self, candidates: &[&'r AssemblyRecord]) -> Vec<&'r AssemblyRecord> {
        let mut measured: Vec<(&'r AssemblyRecord, u64)> = Vec::new();
        for record in candidates {
            match self.total_length(record) {
                Ok(length) => {
                    debug!(
                        accession = %record.accession,
                        length,
                        refseq_category = %record.refseq_category,
                        assembly_level = %record.assembly_level,
                        "read assembly stats"
                    );
                    measured.push((*record, length));
                }
                Err(err) => warn!(
                    accession = %record.accession,
                    "could not read assembly stats for {}: {err}",
                    record.ftp_path
                ),
            }
        }

        if measured.is_empty() {
            warn!("no assembly stats available, falling back to first candidate");
            return candidates.to_vec();
        }

        measured.sort_by(|(a, a_len), (b, b_len)| {
            (b_len, &b.release_date).cmp(&(a_len, &a.release_date))
        });
        measured.into_iter().map(|(record, _)| record).collect()
    }
}

pub struct AssemblySelector<'a, N: NcbiClient> {
    tiebreaker: StatsTiebreaker<'a, N>,
}

impl<'a, N: NcbiClient> AssemblySelector<'a, N> {
    pub fn new(client: &'a N) -> Self {
        Self {
            tiebreaker: StatsTiebreaker::new(client),
        }
    }

    pub fn select<'r>(&self, candidates: &[&'r AssemblyRecord]) -> Option<&'r AssemblyRecord> {
        if candidates.is_empty() {
            return None;
        }

        let curated: Vec<&'r AssemblyRecord> = candidates
            .iter()
            .copied()
            .filter(|record| is_reference_category(&record.refseq_category))
            .collect();
        let mut pool = if curated.is_empty() {
            candidates.to_vec()
        } else {
            curated
        };

        pool.sort_by_key(|record| record.assembly_level.priority());
        let best = pool[0].assembly_level.priority();
        pool.retain(|record| record.assembly_level.priority() == best);

        if pool.len() == 1 {
            return pool.first().copied();
        }
        info!(
            tied = pool.len(),
            priority = best,
            "breaking tie by assembly length and release date"
        );
        self.tiebreaker.rank(&pool).first().copied()
    }
}

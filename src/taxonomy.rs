use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};

use camino::Utf8Path;
use tracing::{info, warn};

use crate::domain::TaxId;
use crate::error::PathogenError;

pub trait Taxonomy: Send + Sync {
    fn lookup_name(&self, name: &str) -> Result<Option<TaxId>, PathogenError>;
    fn descendants(&self, taxid: TaxId) -> Result<Vec<TaxId>, PathogenError>;
}

#[derive(Debug, Default)]
pub struct TaxdumpTaxonomy {
    names: HashMap<String, TaxId>,
    folded: HashMap<String, TaxId>,
    children: HashMap<TaxId, Vec<TaxId>>,
    nodes: usize,
}

impl TaxdumpTaxonomy {
    pub fn load(taxdump_dir: &Utf8Path) -> Result<Self, PathogenError> {
        let names_path = taxdump_dir.join("names.dmp");
        let nodes_path = taxdump_dir.join("nodes.dmp");
        if !names_path.as_std_path().exists() {
            return Err(PathogenError::MissingInput(names_path.into_std_path_buf()));
        }
        if !nodes_path.as_std_path().exists() {
            return Err(PathogenError::MissingInput(nodes_path.into_std_path_buf()));
        }
        let names = File::open(names_path.as_std_path())
            .map_err(|err| PathogenError::TaxonomyLoad(format!("{names_path}: {err}")))?;
        let nodes = File::open(nodes_path.as_std_path())
            .map_err(|err| PathogenError::TaxonomyLoad(format!("{nodes_path}: {err}")))?;
        let taxonomy = Self::from_readers(BufReader::new(names), BufReader::new(nodes))?;
        info!(
            names = taxonomy.names.len(),
            nodes = taxonomy.nodes,
            "loaded taxonomy from {taxdump_dir}"
        );
        Ok(taxonomy)
    }

    /// Scientific names take precedence over other name classes sharing the
    /// same text, both exactly and after case folding.
    pub fn from_readers<N: BufRead, D: BufRead>(names: N, nodes: D) -> Result<Self, PathogenError> {
        let mut scientific = HashMap::new();
        let mut other = HashMap::new();
        let mut folded_scientific = HashMap::new();
        let mut folded_other = HashMap::new();
        for line in names.lines() {
            let line = line.map_err(|err| PathogenError::TaxonomyLoad(err.to_string()))?;
            let fields = split_dmp_line(&line);
            if fields.len() < 4 {
                continue;
            }
            let Ok(taxid) = fields[0].parse::<TaxId>() else {
                continue;
            };
            let name = fields[1].to_string();
            let folded = name.to_lowercase();
            if fields[3] == "scientific name" {
                scientific.insert(name, taxid);
                folded_scientific.entry(folded).or_insert(taxid);
            } else {
                other.entry(name).or_insert(taxid);
                folded_other.entry(folded).or_insert(taxid);
            }
        }
        for (name, taxid) in other {
            scientific.entry(name).or_insert(taxid);
        }
        for (name, taxid) in folded_other {
            folded_scientific.entry(name).or_insert(taxid);
        }

        let mut children: HashMap<TaxId, Vec<TaxId>> = HashMap::new();
        let mut count = 0usize;
        for line in nodes.lines() {
            let line = line.map_err(|err| PathogenError::TaxonomyLoad(err.to_string()))?;
            let fields = split_dmp_line(&line);
            if fields.len() < 2 {
                continue;
            }
            let (Ok(taxid), Ok(parent)) = (fields[0].parse::<TaxId>(), fields[1].parse::<TaxId>())
            else {
                continue;
            };
            count += 1;
            // The root is its own parent.
            if taxid != parent {
                children.entry(parent).or_default().push(taxid);
            }
            children.entry(taxid).or_default();
        }

        Ok(Self {
            names: scientific,
            folded: folded_scientific,
            children,
            nodes: count,
        })
    }
}

impl Taxonomy for TaxdumpTaxonomy {
    fn lookup_name(&self, name: &str) -> Result<Option<TaxId>, PathogenError> {
        let exact = self.names.get(name);
        Ok(exact
            .or_else(|| self.folded.get(&name.to_lowercase()))
            .copied())
    }

    fn descendants(&self, taxid: TaxId) -> Result<Vec<TaxId>, PathogenError> {
        if !self.children.contains_key(&taxid) {
            return Err(PathogenError::TaxonomyLookup(format!(
                "taxid {taxid} not found in nodes.dmp"
            )));
        }
        let mut found = Vec::new();
        let mut stack = vec![taxid];
        while let Some(current) = stack.pop() {
            if let Some(kids) = self.children.get(&current) {
                for kid in kids {
                    found.push(*kid);
                    stack.push(*kid);
                }
            }
        }
        Ok(found)
    }
}

fn split_dmp_line(line: &str) -> Vec<&str> {
    line.trim_end_matches("\t|")
        .split("\t|\t")
        .map(str::trim)
        .collect()
}

pub fn normalise_name(name: &str) -> String {
    let unified: String = name
        .chars()
        .map(|ch| match ch {
            '\u{2019}' | '\u{2018}' | '`' => '\'',
            '\u{2013}' | '\u{2014}' => '-',
            other => other,
        })
        .collect();
    let collapsed = unified.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_string()
}

pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut previous_alpha = false;
    for ch in name.chars() {
        if ch.is_alphabetic() {
            if previous_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            previous_alpha = true;
        } else {
            out.push(ch);
            previous_alpha = false;
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    TitleCase,
    LowerCase,
    UpperCase,
    Synonym,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MatchKind::Exact => "exact",
            MatchKind::TitleCase => "title",
            MatchKind::LowerCase => "lower",
            MatchKind::UpperCase => "upper",
            MatchKind::Synonym => "synonym",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub taxid: TaxId,
    pub matched: MatchKind,
    pub variant: String,
}

pub struct NameResolver<'a, T: Taxonomy> {
    taxonomy: &'a T,
    synonyms: &'a BTreeMap<String, TaxId>,
}

impl<'a, T: Taxonomy> NameResolver<'a, T> {
    pub fn new(taxonomy: &'a T, synonyms: &'a BTreeMap<String, TaxId>) -> Self {
        Self { taxonomy, synonyms }
    }

    pub fn resolve(&self, name: &str) -> Option<TaxId> {
        self.resolve_detailed(name).map(|resolution| resolution.taxid)
    }

    pub fn resolve_detailed(&self, name: &str) -> Option<Resolution> {
        let normalised = normalise_name(name);
        if normalised.is_empty() {
            warn!("skipping empty species name");
            return None;
        }

        let candidates = [
            (MatchKind::Exact, normalised.clone()),
            (MatchKind::TitleCase, title_case(&normalised)),
            (MatchKind::LowerCase, normalised.to_lowercase()),
            (MatchKind::UpperCase, normalised.to_uppercase()),
        ];
        let mut tried: Vec<&str> = Vec::new();
        for (matched, variant) in &candidates {
            if tried.contains(&variant.as_str()) {
                continue;
            }
            tried.push(variant);
            match self.taxonomy.lookup_name(variant) {
                Ok(Some(taxid)) => {
                    info!(%matched, "resolved taxid for {normalised} -> {taxid} (via {variant})");
                    return Some(Resolution {
                        taxid,
                        matched: *matched,
                        variant: variant.clone(),
                    });
                }
                Ok(None) => {}
                Err(err) => {
                    warn!("taxonomy lookup for {variant} failed: {err}");
                }
            }
        }

        if let Some(taxid) = self.synonyms.get(&normalised) {
            info!(matched = %MatchKind::Synonym, "resolved taxid for {normalised} -> {taxid} (via synonym table)");
            return Some(Resolution {
                taxid: *taxid,
                matched: MatchKind::Synonym,
                variant: normalised,
            });
        }

        warn!("resolving taxid for {normalised} -> FAILED");
        None
    }
}

pub struct TaxonExpander<'a, T: Taxonomy> {
    taxonomy: &'a T,
}

impl<'a, T: Taxonomy> TaxonExpander<'a, T> {
    pub fn new(taxonomy: &'a T) -> Self {
        Self { taxonomy }
    }

    pub fn expand(&self, taxid: TaxId) -> BTreeSet<TaxId> {
        let mut expanded = BTreeSet::from([taxid]);
        match self.taxonomy.descendants(taxid) {
            Ok(descendants) => expanded.extend(descendants),
            Err(err) => warn!("could not expand descendants for {taxid}: {err}"),
        }
        expanded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: &str = "1\t|\troot\t|\t\t|\tscientific name\t|\n\
5499\t|\tPassalora fulva\t|\t\t|\tscientific name\t|\n\
5499\t|\tCladosporium fulvum\t|\t\t|\tsynonym\t|\n\
5507\t|\tFusarium oxysporum\t|\t\t|\tscientific name\t|\n\
61366\t|\tFusarium oxysporum f. sp. cubense\t|\t\t|\tscientific name\t|\n\
1437180\t|\tFusarium oxysporum f. sp. cubense race 4\t|\t\t|\tscientific name\t|\n\
2370\t|\tXylella\t|\t\t|\tscientific name\t|\n\
2371\t|\tXylella fastidiosa\t|\t\t|\tscientific name\t|\n\
34021\t|\tCandidatus Liberibacter asiaticus\t|\t\t|\tscientific name\t|\n\
34021\t|\tLiberibacter asiaticus\t|\t\t|\tsynonym\t|\n\
2371\t|\tXylella fastidiosa subsp. fastidiosa\t|\t\t|\tsynonym\t|\n\
644356\t|\tXylella fastidiosa subsp. fastidiosa\t|\t\t|\tscientific name\t|\n";

    const NODES: &str = "1\t|\t1\t|\tno rank\t|\n\
5499\t|\t1\t|\tspecies\t|\n\
5507\t|\t1\t|\tspecies\t|\n\
61366\t|\t5507\t|\tforma specialis\t|\n\
1437180\t|\t61366\t|\tno rank\t|\n\
2370\t|\t1\t|\tgenus\t|\n\
2371\t|\t2370\t|\tspecies\t|\n\
644356\t|\t2371\t|\tsubspecies\t|\n\
34021\t|\t1\t|\tspecies\t|\n";

    fn taxonomy() -> TaxdumpTaxonomy {
        TaxdumpTaxonomy::from_readers(NAMES.as_bytes(), NODES.as_bytes()).unwrap()
    }

    #[test]
    fn normalise_unifies_quotes_and_spacing() {
        assert_eq!(
            normalise_name("  \"Xanthomonas   campestris\u{2013}pv\"  "),
            "Xanthomonas campestris-pv"
        );
        assert_eq!(normalise_name("\u{2018}Ralstonia solanacearum\u{2019}"), "Ralstonia solanacearum");
    }

    #[test]
    fn title_case_matches_word_boundaries() {
        assert_eq!(title_case("fusarium OXYSPORUM f. sp."), "Fusarium Oxysporum F. Sp.");
    }

    #[test]
    fn synonyms_resolve_but_scientific_names_win() {
        let tax = taxonomy();
        assert_eq!(tax.lookup_name("Cladosporium fulvum").unwrap(), Some(5499));
        assert_eq!(tax.lookup_name("Passalora fulva").unwrap(), Some(5499));
    }

    #[test]
    fn descendants_include_intermediate_nodes() {
        let tax = taxonomy();
        let mut found = tax.descendants(5507).unwrap();
        found.sort();
        assert_eq!(found, vec![61366, 1437180]);
        assert!(tax.descendants(42).is_err());
    }

    #[test]
    fn lookup_ignores_case_and_prefers_scientific_names() {
        let tax = taxonomy();
        assert_eq!(tax.lookup_name("xylella fastidiosa").unwrap(), Some(2371));
        assert_eq!(tax.lookup_name("Xylella Fastidiosa").unwrap(), Some(2371));
        assert_eq!(tax.lookup_name("liberibacter ASIATICUS").unwrap(), Some(34021));
        assert_eq!(
            tax.lookup_name("XYLELLA FASTIDIOSA SUBSP. FASTIDIOSA").unwrap(),
            Some(644356)
        );
    }

    // Case-sensitive index, so the resolver's own fallbacks are what match.
    struct ExactOnly(HashMap<&'static str, TaxId>);

    impl Taxonomy for ExactOnly {
        fn lookup_name(&self, name: &str) -> Result<Option<TaxId>, PathogenError> {
            Ok(self.0.get(name).copied())
        }

        fn descendants(&self, _taxid: TaxId) -> Result<Vec<TaxId>, PathogenError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn resolver_falls_back_through_case_variants() {
        let tax = ExactOnly(HashMap::from([("Xylella", 2370), ("Passalora fulva", 5499)]));
        let synonyms = BTreeMap::new();
        let resolver = NameResolver::new(&tax, &synonyms);
        let resolution = resolver.resolve_detailed("XYLELLA").unwrap();
        assert_eq!(resolution.taxid, 2370);
        assert_eq!(resolution.matched, MatchKind::TitleCase);
        assert_eq!(resolution.variant, "Xylella");
        assert_eq!(resolver.resolve("'Passalora  fulva'"), Some(5499));
        assert_eq!(resolver.resolve("Passalora fulva"), Some(5499));
    }

    #[test]
    fn case_and_quote_variants_resolve_identically() {
        let tax = taxonomy();
        let synonyms = BTreeMap::new();
        let resolver = NameResolver::new(&tax, &synonyms);
        let cases: [(&[&str], TaxId); 3] = [
            (
                &["Xylella", "xylella", "XYLELLA", "\u{2018}Xylella\u{2019}", "\"xylella\""],
                2370,
            ),
            (
                &[
                    "Xylella fastidiosa",
                    "xylella fastidiosa",
                    "XYLELLA FASTIDIOSA",
                    "Xylella Fastidiosa",
                ],
                2371,
            ),
            (
                &[
                    "Candidatus Liberibacter asiaticus",
                    "candidatus liberibacter asiaticus",
                    "CANDIDATUS LIBERIBACTER ASIATICUS",
                    "Candidatus liberibacter Asiaticus",
                ],
                34021,
            ),
        ];
        for (names, taxid) in cases {
            for name in names {
                assert_eq!(resolver.resolve(name), Some(taxid), "{name}");
            }
        }
        assert_eq!(
            resolver.resolve("Fusarium OXYSPORUM f. sp. CUBENSE race 4"),
            Some(1437180)
        );
    }

    #[test]
    fn resolver_consults_synonym_table_last() {
        let tax = taxonomy();
        let synonyms = BTreeMap::from([("Phytophthora ramorum".to_string(), 164328)]);
        let resolver = NameResolver::new(&tax, &synonyms);
        let resolution = resolver.resolve_detailed("Phytophthora  ramorum").unwrap();
        assert_eq!(resolution.matched, MatchKind::Synonym);
        assert_eq!(resolution.taxid, 164328);
        assert_eq!(resolver.resolve("Unknown blight"), None);
    }

    #[test]
    fn expansion_always_contains_input() {
        let tax = taxonomy();
        let expander = TaxonExpander::new(&tax);
        assert_eq!(expander.expand(5499), BTreeSet::from([5499]));
        assert_eq!(expander.expand(999_999), BTreeSet::from([999_999]));
        assert_eq!(
            expander.expand(5507),
            BTreeSet::from([5507, 61366, 1437180])
        );
    }
}

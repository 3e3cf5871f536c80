use std::sync::LazyLock;

use regex::Regex;

pub const GENOMIC_SUFFIX: &str = "_genomic.fna.gz";
pub const MD5_MANIFEST: &str = "md5checksums.txt";
pub const STATS_SUFFIX: &str = "_assembly_stats.txt";

// Matches one or more stray scheme prefixes glued in front of a real URL,
// e.g. `https:https://` left behind by rewriting an already rewritten link.
static STACKED_SCHEME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:https?|ftp):/{0,2})+?((?:https?|ftp)://)").unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyLinks {
    pub sequence: String,
    pub md5: String,
}

pub fn to_https(url: &str) -> String {
    let url = url.trim();
    match url.strip_prefix("ftp://") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}

pub fn assembly_base(ftp_path: &str) -> String {
    let (repaired, _) = repair_link(ftp_path.trim().trim_end_matches('/'));
    to_https(&repaired)
}

pub fn build_links(ftp_path: &str) -> AssemblyLinks {
    let base = assembly_base(ftp_path);
    let name = base.rsplit('/').next().unwrap_or_default();
    AssemblyLinks {
        sequence: format!("{base}/{name}{GENOMIC_SUFFIX}"),
        md5: format!("{base}/{MD5_MANIFEST}"),
    }
}

pub fn stats_url(ftp_path: &str) -> String {
    let base = assembly_base(ftp_path);
    let name = base.rsplit('/').next().unwrap_or_default();
    format!("{base}/{name}{STATS_SUFFIX}")
}

pub fn link_directory(link: &str) -> String {
    let trimmed = link.trim().trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => trimmed.to_string(),
    }
}

pub fn file_name(link: &str) -> String {
    link.trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Collapses stacked scheme prefixes. Returns the repaired link and whether
/// anything was changed.
pub fn repair_link(link: &str) -> (String, bool) {
    match STACKED_SCHEME.captures(link) {
        Some(caps) => {
            let whole = caps.get(0).map(|m| m.end()).unwrap_or_default();
            let scheme = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            if whole == scheme.len() {
                return (link.to_string(), false);
            }
            (format!("{scheme}{}", &link[whole..]), true)
        }
        None => (link.to_string(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FTP: &str =
        "ftp://ftp.ncbi.nlm.nih.gov/genomes/all/GCF/000/149/955/GCF_000149955.1_ASM14995v2";

    #[test]
    fn builds_sequence_and_manifest_links() {
        let links = build_links(FTP);
        assert_eq!(
            links.sequence,
            "https://ftp.ncbi.nlm.nih.gov/genomes/all/GCF/000/149/955/GCF_000149955.1_ASM14995v2/GCF_000149955.1_ASM14995v2_genomic.fna.gz"
        );
        assert_eq!(
            links.md5,
            "https://ftp.ncbi.nlm.nih.gov/genomes/all/GCF/000/149/955/GCF_000149955.1_ASM14995v2/md5checksums.txt"
        );
        assert_eq!(build_links(&format!("{FTP}/")), links);
    }

    #[test]
    fn rewriting_is_idempotent() {
        let once = to_https(FTP);
        assert_eq!(to_https(&once), once);

        let links = build_links(FTP);
        let again = build_links(&link_directory(&links.sequence));
        assert_eq!(again, links);
        assert_eq!(build_links(&assembly_base(&assembly_base(FTP))), links);
    }

    #[test]
    fn stacked_schemes_are_repaired_and_flagged() {
        let broken = "https:https://ftp.ncbi.nlm.nih.gov/genomes/all/x/md5checksums.txt";
        let (fixed, changed) = repair_link(broken);
        assert!(changed);
        assert_eq!(fixed, "https://ftp.ncbi.nlm.nih.gov/genomes/all/x/md5checksums.txt");

        let (same, changed) = repair_link(&fixed);
        assert!(!changed);
        assert_eq!(same, fixed);

        let (fixed, changed) = repair_link("https://ftp://host/a");
        assert!(changed);
        assert_eq!(fixed, "ftp://host/a");
        assert_eq!(build_links("https:https://host/GCA_1.1_x").sequence, "https://host/GCA_1.1_x/GCA_1.1_x_genomic.fna.gz");
    }

    #[test]
    fn stats_url_uses_assembly_name() {
        assert!(stats_url(FTP).ends_with("/GCF_000149955.1_ASM14995v2/GCF_000149955.1_ASM14995v2_assembly_stats.txt"));
        assert!(stats_url(FTP).starts_with("https://"));
    }
}

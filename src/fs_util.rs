use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use tempfile::NamedTempFile;

use crate::error::PathogenError;

pub fn open_gz(path: &Path) -> Result<BufReader<MultiGzDecoder<File>>, PathogenError> {
    let file = File::open(path)
        .map_err(|err| PathogenError::Filesystem(format!("open {}: {err}", path.display())))?;
    Ok(BufReader::new(MultiGzDecoder::new(file)))
}

pub fn gunzip_into<W: Write>(source: &Path, target: &mut W) -> Result<u64, PathogenError> {
    let mut reader = open_gz(source)?;
    io::copy(&mut reader, target)
        .map_err(|err| PathogenError::Compression(format!("{}: {err}", source.display())))
}

pub fn sibling_tempfile(path: &Path, prefix: &str) -> Result<NamedTempFile, PathogenError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|err| PathogenError::Filesystem(err.to_string()))?;
    tempfile::Builder::new()
        .prefix(prefix)
        .tempfile_in(parent)
        .map_err(|err| PathogenError::Filesystem(err.to_string()))
}

pub fn persist(temp: NamedTempFile, destination: &Path) -> Result<(), PathogenError> {
    temp.persist(destination)
        .map(|_| ())
        .map_err(|err| PathogenError::Filesystem(format!("persist {}: {err}", destination.display())))
}

#[cfg(test)]
mod tests {
    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    #[test]
    fn reads_concatenated_gzip_members() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("multi.gz");
        let mut bytes = Vec::new();
        for part in [b"first\n".as_slice(), b"second\n".as_slice()] {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(part).unwrap();
            bytes.extend(encoder.finish().unwrap());
        }
        std::fs::write(&path, bytes).unwrap();

        let mut out = Vec::new();
        let size = gunzip_into(&path, &mut out).unwrap();
        assert_eq!(out, b"first\nsecond\n");
        assert_eq!(size, 13);
    }
}

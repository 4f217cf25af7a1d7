//! Archive download and extraction.

use crate::error::RetrievalError;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
    Tar,
}

impl ArchiveFormat {
    /// Format named by an `archive=` option.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "zip" => Some(Self::Zip),
            "tar.gz" | "tgz" => Some(Self::TarGz),
            "tar" => Some(Self::Tar),
            _ => None,
        }
    }

    /// Format implied by a URL path's extension.
    pub fn from_path(path: &str) -> Option<Self> {
        if path.ends_with(".zip") {
            Some(Self::Zip)
        } else if path.ends_with(".tar.gz") || path.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if path.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

/// Download `url` with `client` and extract it into `dest`.
pub fn fetch_and_extract(
    client: &reqwest::blocking::Client,
    url: &str,
    format: ArchiveFormat,
    dest: &Path,
) -> Result<(), RetrievalError> {
    let temp_dir = tempfile::tempdir()?;
    let archive_path = temp_dir.path().join("archive");

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| RetrievalError::Network(format!("Request failed: {}", e)))?;
    if !response.status().is_success() {
        return Err(RetrievalError::Http {
            status: response.status().as_u16(),
            url: url.to_string(),
        });
    }

    let mut file = File::create(&archive_path)?;
    response
        .copy_to(&mut file)
        .map_err(|e| RetrievalError::Network(format!("Failed to read response: {}", e)))?;
    drop(file);

    debug!(?format, dest = %dest.display(), "Extracting archive");
    std::fs::create_dir_all(dest)?;
    extract(&archive_path, format, dest)
}

/// Extract an archive file into `dest`.
pub fn extract(archive_path: &Path, format: ArchiveFormat, dest: &Path) -> Result<(), RetrievalError> {
    match format {
        ArchiveFormat::Zip => extract_zip(archive_path, dest),
        ArchiveFormat::TarGz => {
            let gz = flate2::read::GzDecoder::new(File::open(archive_path)?);
            tar::Archive::new(gz)
                .unpack(dest)
                .map_err(|e| RetrievalError::Archive(format!("Failed to extract tar.gz: {}", e)))
        }
        ArchiveFormat::Tar => tar::Archive::new(File::open(archive_path)?)
            .unpack(dest)
            .map_err(|e| RetrievalError::Archive(format!("Failed to extract tar: {}", e))),
    }
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<(), RetrievalError> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| RetrievalError::Archive(format!("Failed to open zip: {}", e)))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| RetrievalError::Archive(format!("Failed to read zip entry: {}", e)))?;

        // Entries escaping the destination are skipped.
        let Some(outpath) = entry.enclosed_name().map(|p| dest.join(p)) else {
            continue;
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&outpath)?;
            std::io::copy(&mut entry, &mut outfile)?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_format_detection() {
        assert_eq!(ArchiveFormat::from_path("/a/b.zip"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::from_path("/a/b.tar.gz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_path("/a/b.tgz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_path("/a/b.tar"), Some(ArchiveFormat::Tar));
        assert_eq!(ArchiveFormat::from_path("/a/b.yaml"), None);
        assert_eq!(ArchiveFormat::from_name("tgz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_name("rar"), None);
    }

    #[test]
    fn test_extract_tar_gz() {
        let temp = TempDir::new().unwrap();
        let archive_path = temp.path().join("charts.tar.gz");

        let gz = flate2::write::GzEncoder::new(
            File::create(&archive_path).unwrap(),
            flate2::Compression::default(),
        );
        let mut builder = tar::Builder::new(gz);
        let body = b"replicas: 2\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "charts/values.yaml", &body[..])
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let dest = temp.path().join("out");
        std::fs::create_dir_all(&dest).unwrap();
        extract(&archive_path, ArchiveFormat::TarGz, &dest).unwrap();

        assert_eq!(
            std::fs::read_to_string(dest.join("charts/values.yaml")).unwrap(),
            "replicas: 2\n"
        );
    }

    #[test]
    fn test_extract_zip() {
        let temp = TempDir::new().unwrap();
        let archive_path = temp.path().join("charts.zip");

        let mut writer = zip::ZipWriter::new(File::create(&archive_path).unwrap());
        writer
            .start_file("base/values.yaml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"image: nginx\n").unwrap();
        writer.finish().unwrap();

        let dest = temp.path().join("out");
        extract(&archive_path, ArchiveFormat::Zip, &dest).unwrap();

        assert_eq!(
            std::fs::read_to_string(dest.join("base/values.yaml")).unwrap(),
            "image: nginx\n"
        );
    }

    #[test]
    fn test_extract_corrupt_archive() {
        let temp = TempDir::new().unwrap();
        let archive_path = temp.path().join("broken.zip");
        std::fs::write(&archive_path, b"not a zip").unwrap();

        let err = extract(&archive_path, ArchiveFormat::Zip, temp.path()).unwrap_err();
        assert!(matches!(err, RetrievalError::Archive(_)));
    }
}

use flate2::read::GzDecoder;
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::common::application::Manifest;
use crate::common::error::{AgentError, AgentResult};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const REQUIREMENTS_FILE: &str = "requirements.txt";

/// A deployment package unpacked into a scratch directory. The directory is
/// removed when this value is dropped.
pub struct ExtractedPackage {
    _scratch: TempDir,
    pub root: PathBuf,
    pub manifest: Manifest,
    pub requirements: Option<PathBuf>,
}

/// Unpacks a tar.gz package and reads its manifest. Nothing outside the
/// scratch directory is touched, so a bad package leaves no trace.
pub async fn open_package(package: &Path) -> AgentResult<ExtractedPackage> {
    let package = package.to_path_buf();
    tokio::task::spawn_blocking(move || open_package_blocking(&package))
        .await
        .map_err(|e| AgentError::Io(std::io::Error::other(e)))?
}

fn open_package_blocking(package: &Path) -> AgentResult<ExtractedPackage> {
    let file = File::open(package).map_err(|e| {
        AgentError::InvalidArgument(format!("cannot open package {}: {}", package.display(), e))
    })?;
    let scratch = tempfile::Builder::new().prefix("terminus-pkg").tempdir()?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive
        .unpack(scratch.path())
        .map_err(|e| AgentError::InvalidManifest(format!("malformed package: {}", e)))?;

    let root = locate_root(scratch.path())?.ok_or(AgentError::MissingManifest)?;
    let raw = std::fs::read_to_string(root.join(MANIFEST_FILE))?;
    let manifest = Manifest::parse(&raw)?;
    let requirements = Some(root.join(REQUIREMENTS_FILE)).filter(|p| p.is_file());
    log::info!(
        "Opened package {} for application {}",
        package.display(),
        manifest.application
    );
    Ok(ExtractedPackage {
        _scratch: scratch,
        root,
        manifest,
        requirements,
    })
}

// The manifest sits at the archive root, or inside its only top-level directory.
fn locate_root(scratch: &Path) -> AgentResult<Option<PathBuf>> {
    if scratch.join(MANIFEST_FILE).is_file() {
        return Ok(Some(scratch.to_path_buf()));
    }
    let entries: Vec<PathBuf> = std::fs::read_dir(scratch)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    match entries.as_slice() {
        [only] if only.is_dir() && only.join(MANIFEST_FILE).is_file() => Ok(Some(only.clone())),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn build_package(dir: &Path, files: &[(&str, &str)]) -> PathBuf {
        let path = dir.join("package.tar.gz");
        let encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, body) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, body.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
        path
    }

    #[tokio::test]
    async fn manifest_at_root() {
        let dir = tempfile::tempdir().unwrap();
        let package = build_package(
            dir.path(),
            &[
                ("manifest.json", r#"{"application":"demo","version":"1.0"}"#),
                ("requirements.txt", "flask\n"),
                ("wsgi.py", "application = None\n"),
            ],
        );
        let extracted = open_package(&package).await.unwrap();
        assert_eq!(extracted.manifest.application, "demo");
        assert!(extracted.requirements.is_some());
        assert!(extracted.root.join("wsgi.py").is_file());
    }

    #[tokio::test]
    async fn manifest_in_single_directory() {
        let dir = tempfile::tempdir().unwrap();
        let package = build_package(
            dir.path(),
            &[("demo-1.0/manifest.json", r#"{"application":"demo"}"#)],
        );
        let extracted = open_package(&package).await.unwrap();
        assert!(extracted.root.ends_with("demo-1.0"));
        assert_eq!(extracted.requirements, None);
    }

    #[tokio::test]
    async fn missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let package = build_package(dir.path(), &[("wsgi.py", "")]);
        assert!(matches!(
            open_package(&package).await,
            Err(AgentError::MissingManifest)
        ));
    }

    #[tokio::test]
    async fn not_a_tarball() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.tar.gz");
        std::fs::write(&path, b"not gzip at all").unwrap();
        assert!(matches!(
            open_package(&path).await,
            Err(AgentError::InvalidManifest(_))
        ));
    }

    #[tokio::test]
    async fn scratch_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let package = build_package(dir.path(), &[("manifest.json", r#"{"application":"demo"}"#)]);
        let extracted = open_package(&package).await.unwrap();
        let root = extracted.root.clone();
        drop(extracted);
        assert!(!root.exists());
    }
}

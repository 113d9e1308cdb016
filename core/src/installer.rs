use std::{
    collections::BTreeSet,
    fs::{self, File},
    io::{self, Cursor},
    path::{Component, Path},
};

use camino::Utf8Path;
use log::debug;
use thiserror::Error;
use zip::{ZipArchive, result::ZipError};

pub type InstallerResult<T> = Result<T, InstallerError>;

#[derive(Debug, Error)]
pub enum InstallerError {
    #[error("Downloaded file is not a zip archive (detected type: {0})")]
    NotAZipArchive(String),

    #[error("Archive entry \"{0}\" would be written outside of the add-on directory")]
    UnsafeEntryPath(String),

    #[error("Unable to read archive: {0}")]
    Archive(#[from] ZipError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Extract a zipped add-on into `target`, returning the top level names the archive wrote to.
///
/// Existing files are overwritten. There is no rollback, so an error part way through leaves whatever was already
/// extracted in place.
pub fn install_zipped_addon(target: &Utf8Path, archive: &[u8]) -> InstallerResult<BTreeSet<String>> {
    if !infer::archive::is_zip(archive) {
        let detected = infer::get(archive).map_or("unknown", |kind| kind.mime_type());
        return Err(InstallerError::NotAZipArchive(detected.to_string()));
    }

    let mut zip = ZipArchive::new(Cursor::new(archive))?;
    let mut top_level_names = BTreeSet::new();

    for i in 0..zip.len() {
        let mut file = zip.by_index(i)?;

        let rel_path = file
            .enclosed_name()
            .ok_or_else(|| InstallerError::UnsafeEntryPath(file.name().to_string()))?;

        if let Some(top_level) = top_level_name(&rel_path) {
            top_level_names.insert(top_level);
        }

        let out_path = target.as_std_path().join(&rel_path);
        if file.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = File::create(&out_path)?;
        io::copy(&mut file, &mut out)?;
        set_mode(&out_path, file.unix_mode())?;
    }

    debug!(
        "Extracted {} entries into {} ({:?})",
        zip.len(),
        target,
        top_level_names
    );

    Ok(top_level_names)
}

fn top_level_name(rel_path: &Path) -> Option<String> {
    rel_path.components().find_map(|component| match component {
        Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
        _ => None,
    })
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: Option<u32>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    // Some archivers record a unix system but no permission bits at all.
    match mode.map(|m| m & 0o777).filter(|m| *m != 0) {
        Some(mode) => fs::set_permissions(path, fs::Permissions::from_mode(mode)),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: Option<u32>) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, fs};

    use camino::Utf8Path;

    use super::{InstallerError, install_zipped_addon};
    use crate::test_utils::zip_archive;

    fn names(v: &[&str]) -> BTreeSet<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn extracts_files_and_reports_top_level_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let target = Utf8Path::from_path(dir.path()).unwrap();

        let archive = zip_archive(&[("Foo/", ""), ("Foo/Bar.lua", "print('hi')")]);
        let installed = install_zipped_addon(target, &archive).unwrap();

        assert_eq!(installed, names(&["Foo"]));
        assert_eq!(
            fs::read_to_string(target.join("Foo").join("Bar.lua")).unwrap(),
            "print('hi')"
        );
    }

    #[test]
    fn creates_missing_parents_and_reports_every_top_level_entry() {
        let dir = tempfile::tempdir().unwrap();
        let target = Utf8Path::from_path(dir.path()).unwrap();

        let archive = zip_archive(&[
            ("Suite/modules/deep/file.lua", "a"),
            ("SuiteLib/SuiteLib.txt", "## Title: SuiteLib"),
            ("README.md", "readme"),
        ]);
        let installed = install_zipped_addon(target, &archive).unwrap();

        assert_eq!(installed, names(&["README.md", "Suite", "SuiteLib"]));
        assert!(target.join("Suite/modules/deep/file.lua").is_file());
        assert!(target.join("SuiteLib/SuiteLib.txt").is_file());
    }

    #[test]
    fn overwrites_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = Utf8Path::from_path(dir.path()).unwrap();
        fs::create_dir(target.join("Foo")).unwrap();
        fs::write(target.join("Foo/Foo.lua"), "old and much longer contents").unwrap();

        install_zipped_addon(target, &zip_archive(&[("Foo/Foo.lua", "new")])).unwrap();

        assert_eq!(fs::read_to_string(target.join("Foo/Foo.lua")).unwrap(), "new");
    }

    #[test]
    fn rejects_things_that_are_not_zips() {
        let dir = tempfile::tempdir().unwrap();
        let target = Utf8Path::from_path(dir.path()).unwrap();

        assert!(matches!(
            install_zipped_addon(target, b"<html>not found</html>"),
            Err(InstallerError::NotAZipArchive(_))
        ));
        assert!(matches!(
            install_zipped_addon(target, &[]),
            Err(InstallerError::NotAZipArchive(_))
        ));
    }

    #[test]
    fn corrupt_zip_is_an_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = Utf8Path::from_path(dir.path()).unwrap();

        let archive = zip_archive(&[("Foo/Foo.lua", "contents")]);
        let truncated = &archive[..archive.len() / 2];

        assert!(matches!(
            install_zipped_addon(target, truncated),
            Err(InstallerError::Archive(_))
        ));
    }

    #[test]
    fn refuses_entries_escaping_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let target_dir = Utf8Path::from_path(dir.path()).unwrap().join("AddOns");
        fs::create_dir(&target_dir).unwrap();

        let archive = zip_archive(&[("../evil.lua", "boom")]);

        assert!(matches!(
            install_zipped_addon(&target_dir, &archive),
            Err(InstallerError::UnsafeEntryPath(name)) if name == "../evil.lua"
        ));
        assert!(!target_dir.parent().unwrap().join("evil.lua").exists());
    }

    #[cfg(unix)]
    #[test]
    fn preserves_file_modes() {
        use std::{
            io::{Cursor, Write},
            os::unix::fs::PermissionsExt,
        };

        use zip::{ZipWriter, write::SimpleFileOptions};

        let dir = tempfile::tempdir().unwrap();
        let target = Utf8Path::from_path(dir.path()).unwrap();

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file(
            "Tool/run.sh",
            SimpleFileOptions::default().unix_permissions(0o755),
        )
        .unwrap();
        zip.write_all(b"#!/bin/sh\n").unwrap();
        let archive = zip.finish().unwrap().into_inner();

        install_zipped_addon(target, &archive).unwrap();

        let mode = fs::metadata(target.join("Tool/run.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}

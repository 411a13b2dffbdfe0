use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::ZipArchive;

use deodex_dex::{dex_payload, DexFile};

use crate::builder::UniverseBuilder;
use crate::error::{HierarchyError, Result};
use crate::universe::ClassUniverse;

/// Splits a `BOOTCLASSPATH`-style value into its entries.
pub fn parse_bootclasspath(value: &str) -> Vec<PathBuf> {
    value
        .split(':')
        .filter(|entry| !entry.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Loads and links the boot class path containers followed by the target
/// container. Boot entries come first so their definitions win over any
/// duplicates in the target.
pub fn load_universe(boot_classpath: &[PathBuf], target: &Path) -> Result<ClassUniverse> {
    let mut builder = UniverseBuilder::new();
    for path in boot_classpath {
        add_container(&mut builder, path)?;
    }
    add_container(&mut builder, target)?;
    let universe = builder.link()?;
    info!(classes = universe.len(), "class hierarchy linked");
    Ok(universe)
}

fn add_container(builder: &mut UniverseBuilder, path: &Path) -> Result<()> {
    let bytes = container_bytes(path)?;
    let payload = dex_payload(&bytes).map_err(|source| HierarchyError::Dex {
        path: path.to_owned(),
        source,
    })?;
    let dex = DexFile::parse(payload).map_err(|source| HierarchyError::Dex {
        path: path.to_owned(),
        source,
    })?;
    debug!(path = %path.display(), classes = dex.classes.len(), "container loaded");
    builder.add_dex(dex);
    Ok(())
}

/// Reads a container off disk. Jar/apk entries contribute their embedded
/// `classes.dex`; everything else is handed over as-is (dex or odex).
fn container_bytes(path: &Path) -> Result<Vec<u8>> {
    let io_err = |source| HierarchyError::Io {
        path: path.to_owned(),
        source,
    };
    let bytes = std::fs::read(path).map_err(io_err)?;
    if !bytes.starts_with(b"PK") {
        return Ok(bytes);
    }

    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|source| HierarchyError::Zip {
        path: path.to_owned(),
        source,
    })?;
    let mut entry = match archive.by_name("classes.dex") {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(HierarchyError::MissingClassesDex {
                path: path.to_owned(),
            })
        }
        Err(source) => {
            return Err(HierarchyError::Zip {
                path: path.to_owned(),
                source,
            })
        }
    };
    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut bytes).map_err(io_err)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use deodex_dex::test_fixture::DexBuilder;
    use std::fs::File;
    use std::io::Write;

    fn boot_dex() -> Vec<u8> {
        DexBuilder::new()
            .class("Ljava/lang/Object;", None, &[], &[], &[], &[])
            .build()
    }

    fn write_tmp(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn parses_colon_separated_entries() {
        assert_eq!(
            parse_bootclasspath("/a/core.jar:/b/framework.jar"),
            vec![PathBuf::from("/a/core.jar"), PathBuf::from("/b/framework.jar")]
        );
        assert_eq!(parse_bootclasspath(""), Vec::<PathBuf>::new());
        assert_eq!(parse_bootclasspath(":/a:"), vec![PathBuf::from("/a")]);
    }

    #[test]
    fn loads_boot_and_target_containers() {
        let dir = tempfile::tempdir().unwrap();
        let boot = write_tmp(&dir, "core.dex", &boot_dex());
        let target_bytes = DexBuilder::new()
            .class("Lcom/app/Main;", Some("Ljava/lang/Object;"), &[], &[], &[], &[])
            .build_odex();
        let target = write_tmp(&dir, "app.odex", &target_bytes);

        let mut universe = load_universe(&[boot], &target).unwrap();
        assert!(universe.resolve_class("Lcom/app/Main;").is_some());
        assert_eq!(universe.root(), universe.resolve_class("Ljava/lang/Object;").unwrap());
    }

    #[test]
    fn loads_classes_dex_from_a_jar() {
        let dir = tempfile::tempdir().unwrap();
        let jar_path = dir.path().join("core.jar");
        let jar = File::create(&jar_path).unwrap();
        let mut writer = zip::ZipWriter::new(jar);
        writer
            .start_file("classes.dex", zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(&boot_dex()).unwrap();
        writer.finish().unwrap();

        let target_bytes = DexBuilder::new()
            .class("Lcom/app/Main;", Some("Ljava/lang/Object;"), &[], &[], &[], &[])
            .build();
        let target = write_tmp(&dir, "app.dex", &target_bytes);

        let mut universe = load_universe(&[jar_path], &target).unwrap();
        assert!(universe.resolve_class("Lcom/app/Main;").is_some());
    }

    #[test]
    fn jar_without_classes_dex_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let jar_path = dir.path().join("empty.jar");
        let jar = File::create(&jar_path).unwrap();
        let mut writer = zip::ZipWriter::new(jar);
        writer
            .start_file("readme.txt", zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(b"nothing here").unwrap();
        writer.finish().unwrap();

        let target = write_tmp(&dir, "app.dex", &boot_dex());
        let err = load_universe(&[jar_path], &target).unwrap_err();
        assert!(matches!(err, HierarchyError::MissingClassesDex { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = write_tmp(&dir, "app.dex", &boot_dex());
        let missing = dir.path().join("nope.dex");
        let err = load_universe(&[missing], &target).unwrap_err();
        assert!(matches!(err, HierarchyError::Io { .. }));
    }
}

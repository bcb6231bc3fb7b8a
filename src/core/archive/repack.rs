use std::fs::{self, File};
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::core::error::{LauncherError, LauncherResult};

/// Unpack a whole archive into `dir`. Returns the number of files written.
pub fn unpack_dir(archive_path: &Path, dir: &Path) -> LauncherResult<usize> {
    let file = File::open(archive_path).map_err(|e| LauncherError::io(archive_path, e))?;
    let mut archive = ZipArchive::new(file)?;
    fs::create_dir_all(dir).map_err(|e| LauncherError::io(dir, e))?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(LauncherError::Extraction {
                archive: archive_path.to_path_buf(),
                reason: format!("unsafe entry name {}", entry.name()),
            });
        };
        let dest = dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&dest).map_err(|e| LauncherError::io(&dest, e))?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let mut out = File::create(&dest).map_err(|e| LauncherError::io(&dest, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| LauncherError::io(&dest, e))?;
        written += 1;
    }

    debug!("Unpacked {} files from {:?}", written, archive_path);
    Ok(written)
}

/// Zip the contents of `dir` (not `dir` itself) into `archive_path`,
/// replacing any existing archive.
pub fn pack_dir(dir: &Path, archive_path: &Path) -> LauncherResult<usize> {
    if let Some(parent) = archive_path.parent() {
        fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
    }
    let out = File::create(archive_path).map_err(|e| LauncherError::io(archive_path, e))?;
    let mut zip = ZipWriter::new(out);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut written = 0;
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let name = relative.to_string_lossy().replace('\\', "/");

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{name}/"), options)?;
            continue;
        }

        zip.start_file(name, options)?;
        let mut source =
            File::open(entry.path()).map_err(|e| LauncherError::io(entry.path(), e))?;
        std::io::copy(&mut source, &mut zip).map_err(|e| LauncherError::io(archive_path, e))?;
        written += 1;
    }

    zip.finish()?;
    debug!("Packed {} files into {:?}", written, archive_path);
    Ok(written)
}

/// Drop every `META-INF/` entry from a jar in place. Returns how many
/// entries were removed.
pub fn strip_meta_inf(jar: &Path) -> LauncherResult<usize> {
    let staged = jar.with_extension("jar.tmp");
    let mut removed = 0;

    {
        let source = File::open(jar).map_err(|e| LauncherError::io(jar, e))?;
        let mut archive = ZipArchive::new(source)?;
        let out = File::create(&staged).map_err(|e| LauncherError::io(&staged, e))?;
        let mut zip = ZipWriter::new(out);

        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i)?;
            if entry.name().starts_with("META-INF/") {
                removed += 1;
                continue;
            }
            zip.raw_copy_file(entry)?;
        }
        zip.finish()?;
    }

    fs::rename(&staged, jar).map_err(|e| LauncherError::io(jar, e))?;
    debug!("Removed {} META-INF entries from {:?}", removed, jar);
    Ok(removed)
}

/// Recursively copy `source` into `target`, overwriting existing files.
/// Returns the number of files copied.
pub fn copy_dir(source: &Path, target: &Path) -> LauncherResult<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let dest = target.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).map_err(|e| LauncherError::io(&dest, e))?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
            }
            fs::copy(entry.path(), &dest).map_err(|e| LauncherError::io(&dest, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;

    fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, body) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body).unwrap();
        }
        zip.finish().unwrap();
    }

    fn entry_names(path: &Path) -> Vec<String> {
        let archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    #[test]
    fn unpack_then_pack_keeps_merged_files() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("minecraft_server.1.7.10.jar");
        write_jar(&jar, &[("a/Main.class", b"main"), ("b.txt", b"b")]);

        let work = dir.path().join("jar");
        assert_eq!(unpack_dir(&jar, &work).unwrap(), 2);

        // A jar mod merged over the unpacked tree.
        fs::write(work.join("a/Main.class"), b"patched").unwrap();
        fs::write(work.join("mod.class"), b"mod").unwrap();

        assert_eq!(pack_dir(&work, &jar).unwrap(), 3);
        let names = entry_names(&jar);
        assert_eq!(names, vec!["a/", "a/Main.class", "b.txt", "mod.class"]);

        let mut archive = ZipArchive::new(File::open(&jar).unwrap()).unwrap();
        let mut body = String::new();
        archive
            .by_name("a/Main.class")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "patched");
    }

    #[test]
    fn meta_inf_is_stripped_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("1.6.4.jar");
        write_jar(
            &jar,
            &[
                ("META-INF/MANIFEST.MF", b"m"),
                ("META-INF/MOJANG_C.SF", b"s"),
                ("net/minecraft/client/Minecraft.class", b"c"),
            ],
        );

        assert_eq!(strip_meta_inf(&jar).unwrap(), 2);
        assert_eq!(entry_names(&jar), vec!["net/minecraft/client/Minecraft.class"]);
        assert!(!dir.path().join("1.6.4.jar.tmp").exists());
    }

    #[test]
    fn copy_dir_overwrites_and_nests() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("common");
        fs::create_dir_all(source.join("config")).unwrap();
        fs::write(source.join("options.txt"), "fov:90").unwrap();
        fs::write(source.join("config/shared.cfg"), "x").unwrap();

        let target = dir.path().join("instance");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("options.txt"), "fov:70").unwrap();

        assert_eq!(copy_dir(&source, &target).unwrap(), 2);
        assert_eq!(fs::read_to_string(target.join("options.txt")).unwrap(), "fov:90");
        assert!(target.join("config/shared.cfg").is_file());
    }

    #[test]
    fn corrupt_archive_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("broken.zip");
        fs::write(&bogus, b"not a zip").unwrap();

        assert!(matches!(
            unpack_dir(&bogus, &dir.path().join("out")),
            Err(LauncherError::Zip(_))
        ));
    }
}

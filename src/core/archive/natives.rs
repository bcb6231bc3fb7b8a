use std::fs::{self, File};
use std::path::Path;

use glob::Pattern;
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};

#[derive(Debug, Clone)]
enum Rule {
    Prefix(String),
    Glob(Pattern),
}

/// Entry names a native archive must not write.
///
/// Plain rules (`META-INF/`) match by prefix; rules containing `*` or `?`
/// are compiled as globs against the full entry name.
#[derive(Debug, Clone, Default)]
pub struct ExclusionRules {
    rules: Vec<Rule>,
}

impl ExclusionRules {
    pub fn new(patterns: &[String]) -> LauncherResult<Self> {
        let rules = patterns
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(|p| {
                if p.contains(['*', '?']) {
                    Ok(Rule::Glob(Pattern::new(p)?))
                } else {
                    Ok(Rule::Prefix(p.to_string()))
                }
            })
            .collect::<LauncherResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn excludes(&self, entry_name: &str) -> bool {
        let name = entry_name.replace('\\', "/");
        self.rules.iter().any(|rule| match rule {
            Rule::Prefix(prefix) => name.starts_with(prefix.as_str()),
            Rule::Glob(pattern) => pattern.matches(&name),
        })
    }
}

/// Extract a native archive into `natives_dir`, dropping excluded entries.
/// Returns the number of files written.
pub fn extract_natives(
    archive_path: &Path,
    natives_dir: &Path,
    exclusions: &ExclusionRules,
) -> LauncherResult<usize> {
    let file = File::open(archive_path).map_err(|e| LauncherError::io(archive_path, e))?;
    let mut archive = zip::ZipArchive::new(file)?;
    fs::create_dir_all(natives_dir).map_err(|e| LauncherError::io(natives_dir, e))?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if exclusions.excludes(entry.name()) {
            debug!("Excluded native entry {}", entry.name());
            continue;
        }

        let Some(relative) = entry.enclosed_name() else {
            return Err(LauncherError::Extraction {
                archive: archive_path.to_path_buf(),
                reason: format!("unsafe entry name {}", entry.name()),
            });
        };
        let dest = natives_dir.join(relative);

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

    Ok(written)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use super::*;

    fn native_jar(path: &Path) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default();
        zip.add_directory("META-INF/", options).unwrap();
        zip.start_file("META-INF/MANIFEST.MF", options).unwrap();
        zip.write_all(b"Manifest-Version: 1.0\n").unwrap();
        zip.start_file("META-INF/LWJGL.SF", options).unwrap();
        zip.write_all(b"sig").unwrap();
        zip.start_file("liblwjgl.so", options).unwrap();
        zip.write_all(b"\x7fELF").unwrap();
        zip.start_file("linux/x64/libglfw.so", options).unwrap();
        zip.write_all(b"\x7fELF").unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn glob_exclusion_drops_meta_inf() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("lwjgl-natives-linux.jar");
        native_jar(&jar);
        let natives = dir.path().join("natives");

        let rules = ExclusionRules::new(&["META-INF/*".to_string()]).unwrap();
        let written = extract_natives(&jar, &natives, &rules).unwrap();

        assert_eq!(written, 2);
        assert!(natives.join("liblwjgl.so").is_file());
        assert!(natives.join("linux/x64/libglfw.so").is_file());
        assert!(!natives.join("META-INF").exists());
    }

    #[test]
    fn prefix_exclusion_matches_directory_rules() {
        let rules = ExclusionRules::new(&["META-INF/".to_string()]).unwrap();
        assert!(rules.excludes("META-INF/MANIFEST.MF"));
        assert!(rules.excludes("META-INF/"));
        assert!(!rules.excludes("liblwjgl.so"));
        assert!(!rules.excludes("meta-inf/x"));
    }

    #[test]
    fn no_rules_extracts_everything() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("natives.jar");
        native_jar(&jar);

        let written =
            extract_natives(&jar, &dir.path().join("out"), &ExclusionRules::default()).unwrap();
        assert_eq!(written, 4);
    }

    #[test]
    fn invalid_glob_is_rejected() {
        assert!(matches!(
            ExclusionRules::new(&["META-INF/[*".to_string()]),
            Err(LauncherError::Pattern(_))
        ));
    }
}

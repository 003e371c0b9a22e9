use percent_encoding::percent_decode_str;
use std::collections::{HashSet, VecDeque};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::IndexError;
use crate::jdk::slash_path;
use crate::types::TypeIndex;

const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";
const CLASS_PATH_ATTRIBUTE: &str = "Class-Path";

/// Lists the top-level types contributed by a set of classpath roots
///
/// Resolution is isolated: only the given roots (and the jars their
/// manifests pull in) are consulted, never the JDK or any ambient
/// classpath. So the result answers "what does *this* classpath add".
pub struct ClasspathScanner {
    roots: Vec<PathBuf>,
}

impl ClasspathScanner {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Shorthand for `ClasspathScanner::new(roots).scan()`
    pub fn scan_roots<I, P>(roots: I) -> Result<TypeIndex, IndexError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::new(roots).scan()
    }

    /// Walks every root; the first root that cannot be opened fails the scan
    pub fn scan(&self) -> Result<TypeIndex, IndexError> {
        info!("Searching for top-level classes in {} classpath locations", self.roots.len());

        let mut index = TypeIndex::new();
        let mut visited = HashSet::new();
        let mut queue: VecDeque<Location> = self
            .roots
            .iter()
            .map(|path| Location {
                path: path.clone(),
                required: true,
            })
            .collect();

        while let Some(location) = queue.pop_front() {
            let key = location.path.canonicalize().unwrap_or_else(|_| location.path.clone());
            if !visited.insert(key) {
                continue;
            }

            if !location.path.exists() {
                if location.required {
                    return Err(IndexError::MissingRoot { path: location.path });
                }
                debug!("Skipping missing manifest Class-Path entry {}", location.path.display());
                continue;
            }

            if location.path.is_dir() {
                scan_directory(&location.path, &mut index)?;
                continue;
            }

            match scan_archive(&location.path, &mut index) {
                Ok(referenced) => queue.extend(referenced.into_iter().map(|path| Location {
                    path,
                    required: false,
                })),
                Err(e) if location.required => return Err(e),
                Err(e) => debug!("Skipping unreadable manifest Class-Path entry: {}", e),
            }
        }

        info!("Found {} classes in classpath", index.len());
        Ok(index)
    }
}

struct Location {
    path: PathBuf,
    /// Caller-supplied roots must open; manifest references may not exist
    required: bool,
}

fn scan_directory(root: &Path, index: &mut TypeIndex) -> Result<(), IndexError> {
    for entry in walkdir::WalkDir::new(root) {
        let entry = entry.map_err(|err| IndexError::Io {
            path: err.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf()),
            source: err.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            index.insert_class_path(&slash_path(relative));
        }
    }
    Ok(())
}

/// Indexes one jar and returns the paths its manifest `Class-Path` names
fn scan_archive(path: &Path, index: &mut TypeIndex) -> Result<Vec<PathBuf>, IndexError> {
    let file = File::open(path).map_err(|source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|source| IndexError::Zip {
        path: path.to_path_buf(),
        source,
    })?;

    for name in archive.file_names() {
        if should_skip_entry(name) {
            continue;
        }
        index.insert_class_path(name);
    }

    let manifest = match archive.by_name(MANIFEST_PATH) {
        Ok(mut entry) => {
            let mut raw = Vec::new();
            entry.read_to_end(&mut raw).map_err(|source| IndexError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            String::from_utf8_lossy(&raw).into_owned()
        }
        Err(ZipError::FileNotFound) => return Ok(Vec::new()),
        Err(source) => {
            return Err(IndexError::Zip {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    Ok(manifest_class_path(&manifest)
        .iter()
        .filter_map(|entry| {
            let resolved = resolve_class_path_entry(base, entry);
            if resolved.is_none() {
                debug!("Skipping non-file manifest Class-Path entry {}", entry);
            }
            resolved
        })
        .collect())
}

/// Turns one `Class-Path` URL into a filesystem path
///
/// Relative URLs resolve against the jar's directory, `file:` URLs are
/// taken as they are, and any other scheme yields `None`.
fn resolve_class_path_entry(base: &Path, entry: &str) -> Option<PathBuf> {
    let path = match url_scheme(entry) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("file") => strip_authority(rest),
        Some(_) => return None,
        None => entry,
    };

    let decoded = percent_decode_str(path).decode_utf8_lossy();
    let decoded: &str = &decoded;

    // file:///C:/lib/dep.jar
    #[cfg(windows)]
    let decoded = match decoded.strip_prefix('/') {
        Some(rest) if rest.as_bytes().get(1) == Some(&b':') => rest,
        _ => decoded,
    };

    Some(base.join(decoded))
}

fn url_scheme(entry: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = entry.split_once(':')?;
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some((scheme, rest))
}

/// `//host/path` and `///path` both become `/path`
fn strip_authority(rest: &str) -> &str {
    match rest.strip_prefix("//") {
        Some(authority_and_path) => authority_and_path
            .find('/')
            .map_or("/", |slash| &authority_and_path[slash..]),
        None => rest,
    }
}

/// Entries that never hold a top-level type of this classpath
///
/// `META-INF/versions/<n>/` holds multi-release variants of classes that
/// are already indexed at their base location.
fn should_skip_entry(name: &str) -> bool {
    name.ends_with('/') || name.starts_with("META-INF/")
}

/// Space-separated URLs of the main section's `Class-Path`
///
/// Manifest lines wrap at 72 bytes; a line starting with a single space
/// continues the previous one.
fn manifest_class_path(manifest: &str) -> Vec<String> {
    let mut logical_lines: Vec<String> = Vec::new();
    for line in manifest.lines() {
        if line.is_empty() {
            // The main section ends at the first blank line
            break;
        }
        match (line.strip_prefix(' '), logical_lines.last_mut()) {
            (Some(continuation), Some(previous)) => previous.push_str(continuation),
            _ => logical_lines.push(line.to_string()),
        }
    }

    logical_lines
        .iter()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case(CLASS_PATH_ATTRIBUTE))
        .map(|(_, value)| {
            value.split_whitespace().map(str::to_string).collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::FileOptions;

    fn write_jar(path: &Path, entries: &[&str], manifest: Option<&str>) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        let options = FileOptions::default();
        if let Some(manifest) = manifest {
            writer.start_file(MANIFEST_PATH, options).unwrap();
            writer.write_all(manifest.as_bytes()).unwrap();
        }
        for entry in entries {
            writer.start_file(*entry, options).unwrap();
            writer.write_all(b"\xCA\xFE\xBA\xBE").unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_scan_directory_root() {
        let dir = tempdir().unwrap();
        let classes = dir.path().join("classes");
        fs::create_dir_all(classes.join("com/example")).unwrap();
        fs::write(classes.join("com/example/App.class"), b"").unwrap();
        fs::write(classes.join("com/example/App$1.class"), b"").unwrap();
        fs::write(classes.join("com/example/App.java"), b"").unwrap();
        fs::write(classes.join("Main.class"), b"").unwrap();

        let index = ClasspathScanner::scan_roots([&classes]).unwrap();
        let expected: TypeIndex = ["com.example.App", "Main"].into_iter().collect();
        assert_eq!(index, expected);
    }

    #[test]
    fn test_scan_jar_root() {
        let dir = tempdir().unwrap();
        let jar = dir.path().join("lib.jar");
        write_jar(
            &jar,
            &[
                "org/lib/Util.class",
                "org/lib/Util$Helper.class",
                "org/lib/package-info.class",
                "module-info.class",
                "META-INF/versions/11/org/lib/Util.class",
                "META-INF/versions/11/org/lib/Java11Only.class",
            ],
            None,
        );

        let index = ClasspathScanner::scan_roots([&jar]).unwrap();
        let expected: TypeIndex = ["org.lib.Util"].into_iter().collect();
        assert_eq!(index, expected);
    }

    #[test]
    fn test_manifest_class_path_is_followed() {
        let dir = tempdir().unwrap();
        let main = dir.path().join("main.jar");
        let dep = dir.path().join("deps").join("dep.jar");
        fs::create_dir_all(dep.parent().unwrap()).unwrap();

        write_jar(
            &main,
            &["app/Main.class"],
            Some("Manifest-Version: 1.0\r\nClass-Path: deps/dep.jar missing.jar \r\n main.jar\r\n\r\n"),
        );
        write_jar(&dep, &["dep/Lib.class"], None);

        let index = ClasspathScanner::scan_roots([&main]).unwrap();
        let expected: TypeIndex = ["app.Main", "dep.Lib"].into_iter().collect();
        assert_eq!(index, expected);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = tempdir().unwrap();
        let result = ClasspathScanner::scan_roots([dir.path().join("nope.jar")]);
        assert!(matches!(result, Err(IndexError::MissingRoot { .. })));
    }

    #[test]
    fn test_unreadable_root_is_fatal() {
        let dir = tempdir().unwrap();
        let bogus = dir.path().join("bogus.jar");
        fs::write(&bogus, b"not a jar").unwrap();

        let result = ClasspathScanner::scan_roots([&bogus]);
        assert!(matches!(result, Err(IndexError::Zip { .. })));
    }

    #[test]
    fn test_no_roots_is_empty() {
        let index = ClasspathScanner::scan_roots(Vec::<PathBuf>::new()).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_manifest_continuation_lines() {
        let manifest = "Manifest-Version: 1.0\nClass-Path: a.jar b\n .jar c%20d.jar\nMain-Class: x.Y\n\nName: other\nClass-Path: ignored.jar\n";
        assert_eq!(
            manifest_class_path(manifest),
            vec!["a.jar".to_string(), "b.jar".to_string(), "c%20d.jar".to_string()]
        );
        assert!(manifest_class_path("Manifest-Version: 1.0\n").is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_class_path_entries_resolve_like_urls() {
        let base = Path::new("/opt/app/lib");
        assert_eq!(
            resolve_class_path_entry(base, "deps/dep.jar"),
            Some(PathBuf::from("/opt/app/lib/deps/dep.jar"))
        );
        assert_eq!(
            resolve_class_path_entry(base, "my%20lib/caf%C3%A9.jar"),
            Some(PathBuf::from("/opt/app/lib/my lib/café.jar"))
        );
        assert_eq!(
            resolve_class_path_entry(base, "file:/srv/shared.jar"),
            Some(PathBuf::from("/srv/shared.jar"))
        );
        assert_eq!(
            resolve_class_path_entry(base, "file:///srv/shared%2Bextra.jar"),
            Some(PathBuf::from("/srv/shared+extra.jar"))
        );
        assert_eq!(
            resolve_class_path_entry(base, "file://localhost/srv/shared.jar"),
            Some(PathBuf::from("/srv/shared.jar"))
        );
        assert_eq!(resolve_class_path_entry(base, "http://repo.example/lib.jar"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_absolute_file_url_in_manifest_is_followed() {
        let dir = tempdir().unwrap();
        let app = dir.path().join("app");
        let shared = dir.path().join("shared dir").join("shared.jar");
        fs::create_dir_all(&app).unwrap();
        fs::create_dir_all(shared.parent().unwrap()).unwrap();

        let shared_url = format!("file:{}", shared.display().to_string().replace(' ', "%20"));
        let main = app.join("main.jar");
        write_jar(
            &main,
            &["app/Main.class"],
            Some(&format!("Manifest-Version: 1.0\nClass-Path: {}\n\n", shared_url)),
        );
        write_jar(&shared, &["shared/Lib.class"], None);

        let index = ClasspathScanner::scan_roots([&main]).unwrap();
        let expected: TypeIndex = ["app.Main", "shared.Lib"].into_iter().collect();
        assert_eq!(index, expected);
    }
}

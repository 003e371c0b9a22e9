use std::ffi::OsStr;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use zip::ZipArchive;

use super::jimage::JImage;
use crate::error::ModuleError;
use crate::types::ModuleId;

/// Prefix of class entries inside a `.jmod` archive
const JMOD_CLASSES_PREFIX: &str = "classes/";

/// Read-only view of a platform runtime image
///
/// Each layout the JDK ships in (packed `lib/modules`, `jmods/`,
/// exploded directories) implements this so the enumerator never
/// needs to know which one it is walking.
pub trait RuntimeImage: fmt::Debug + Send + Sync {
    /// Short, stable description used in logs and the cache fingerprint
    fn describe(&self) -> String;

    /// Size and modification time of the image on disk, so an in-place
    /// JDK upgrade under the same path changes the cache fingerprint
    fn stamp(&self) -> String {
        String::new()
    }

    /// Lists every file of `module`, relative to the module root, using `/`
    /// as separator. `Ok(None)` means the module is not part of this image.
    fn module_entries(&self, module: &ModuleId) -> Result<Option<Vec<String>>, ModuleError>;
}

/// Finds the runtime image under a Java home
///
/// Preference order: `lib/modules`, then `jmods/`, then an exploded
/// `modules/` directory. Without a usable layout every module reads
/// as missing.
pub fn detect_runtime_image(java_home: Option<&Path>) -> Box<dyn RuntimeImage> {
    let Some(java_home) = java_home else {
        return Box::new(NoImage);
    };

    let packed = java_home.join("lib").join("modules");
    if packed.is_file() {
        return Box::new(JImageRuntime::new(packed));
    }

    let jmods = java_home.join("jmods");
    if jmods.is_dir() {
        return Box::new(JmodImage::new(jmods));
    }

    let exploded = java_home.join("modules");
    if exploded.is_dir() {
        return Box::new(ExplodedImage::new(exploded));
    }

    Box::new(NoImage)
}

/// The packed image at `<java_home>/lib/modules`
#[derive(Debug)]
pub struct JImageRuntime {
    jimage: JImage,
}

impl JImageRuntime {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            jimage: JImage::new(path),
        }
    }
}

impl RuntimeImage for JImageRuntime {
    fn describe(&self) -> String {
        format!("jimage:{}", self.jimage.path().display())
    }

    fn stamp(&self) -> String {
        file_stamp(self.jimage.path())
    }

    fn module_entries(&self, module: &ModuleId) -> Result<Option<Vec<String>>, ModuleError> {
        self.jimage.module_entries(module.as_str())
    }
}

/// A directory of `<module>.jmod` archives
#[derive(Debug)]
pub struct JmodImage {
    root: PathBuf,
}

impl JmodImage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl RuntimeImage for JmodImage {
    fn describe(&self) -> String {
        format!("jmods:{}", self.root.display())
    }

    fn stamp(&self) -> String {
        file_stamp(&self.root)
    }

    fn module_entries(&self, module: &ModuleId) -> Result<Option<Vec<String>>, ModuleError> {
        let path = self.root.join(format!("{}.jmod", module));
        if !path.is_file() {
            return Ok(None);
        }

        let file = File::open(&path).map_err(|source| ModuleError::Io {
            path: path.clone(),
            source,
        })?;
        // jmod files carry a 4-byte header before the zip data; the archive
        // reader locates the central directory from the end and skips it.
        let archive = ZipArchive::new(BufReader::new(file)).map_err(|source| ModuleError::Zip {
            path: path.clone(),
            source,
        })?;

        let entries = archive
            .file_names()
            .filter_map(|name| name.strip_prefix(JMOD_CLASSES_PREFIX))
            .filter(|name| !name.is_empty() && !name.ends_with('/'))
            .map(str::to_string)
            .collect();

        Ok(Some(entries))
    }
}

/// One directory per module, as produced by an exploded JDK build
#[derive(Debug)]
pub struct ExplodedImage {
    root: PathBuf,
}

impl ExplodedImage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl RuntimeImage for ExplodedImage {
    fn describe(&self) -> String {
        format!("exploded:{}", self.root.display())
    }

    fn stamp(&self) -> String {
        file_stamp(&self.root)
    }

    fn module_entries(&self, module: &ModuleId) -> Result<Option<Vec<String>>, ModuleError> {
        let module_root = self.root.join(module.as_str());
        if !module_root.is_dir() {
            return Ok(None);
        }

        let mut entries = Vec::new();
        for entry in walkdir::WalkDir::new(&module_root) {
            let entry = entry.map_err(|err| ModuleError::Io {
                path: err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| module_root.clone()),
                source: err.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&module_root) {
                entries.push(slash_path(relative));
            }
        }

        Ok(Some(entries))
    }
}

/// Stand-in when no runtime image could be located
#[derive(Debug)]
pub struct NoImage;

impl RuntimeImage for NoImage {
    fn describe(&self) -> String {
        "none".to_string()
    }

    fn module_entries(&self, _module: &ModuleId) -> Result<Option<Vec<String>>, ModuleError> {
        Ok(None)
    }
}

/// `<len>:<mtime secs>` of `path`, empty when it cannot be read
fn file_stamp(path: &Path) -> String {
    let Ok(metadata) = std::fs::metadata(path) else {
        return String::new();
    };
    let modified_secs = metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |elapsed| elapsed.as_secs());
    format!("{}:{}", metadata.len(), modified_secs)
}

/// Joins path components with `/` regardless of platform
pub(crate) fn slash_path(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str())
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::FileOptions;

    #[test]
    fn test_exploded_image_lists_module_files() {
        let dir = tempdir().unwrap();
        let package = dir.path().join("java.base").join("java").join("lang");
        fs::create_dir_all(&package).unwrap();
        fs::write(package.join("String.class"), b"").unwrap();

        let image = ExplodedImage::new(dir.path());
        let entries = image
            .module_entries(&ModuleId::new("java.base"))
            .unwrap()
            .unwrap();

        assert_eq!(entries, vec!["java/lang/String.class".to_string()]);
        assert!(image.module_entries(&ModuleId::new("java.sql")).unwrap().is_none());
    }

    #[test]
    fn test_jmod_image_strips_classes_prefix() {
        let dir = tempdir().unwrap();
        let jmod_path = dir.path().join("java.sql.jmod");
        {
            let mut file = File::create(&jmod_path).unwrap();
            file.write_all(b"JM\x01\x00").unwrap();
            let mut writer = zip::ZipWriter::new(file);
            let options = FileOptions::default();
            writer.add_directory("classes/java/sql/", options).unwrap();
            writer.start_file("classes/java/sql/Driver.class", options).unwrap();
            writer.write_all(b"\xCA\xFE\xBA\xBE").unwrap();
            writer.start_file("conf/sql.properties", options).unwrap();
            writer.write_all(b"x=1").unwrap();
            writer.finish().unwrap();
        }

        let image = JmodImage::new(dir.path());
        let entries = image
            .module_entries(&ModuleId::new("java.sql"))
            .unwrap()
            .unwrap();

        assert_eq!(entries, vec!["java/sql/Driver.class".to_string()]);
    }

    #[test]
    fn test_corrupt_jmod_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("java.xml.jmod"), b"not a zip").unwrap();

        let image = JmodImage::new(dir.path());
        let result = image.module_entries(&ModuleId::new("java.xml"));
        assert!(matches!(result, Err(ModuleError::Zip { .. })));
    }

    #[test]
    fn test_stamp_follows_file_size() {
        let dir = tempdir().unwrap();
        let packed = dir.path().join("modules");
        fs::write(&packed, b"small").unwrap();
        let image = JImageRuntime::new(&packed);
        let before = image.stamp();
        assert!(before.starts_with("5:"));

        fs::write(&packed, b"a larger image").unwrap();
        assert_ne!(image.stamp(), before);

        assert_eq!(NoImage.stamp(), "");
        assert_eq!(ExplodedImage::new(dir.path().join("absent")).stamp(), "");
    }

    #[test]
    fn test_detect_prefers_packed_image() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("jmods")).unwrap();
        assert!(detect_runtime_image(Some(dir.path())).describe().starts_with("jmods:"));

        fs::create_dir_all(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib").join("modules"), b"").unwrap();
        assert!(detect_runtime_image(Some(dir.path())).describe().starts_with("jimage:"));

        assert_eq!(detect_runtime_image(None).describe(), "none");
    }
}

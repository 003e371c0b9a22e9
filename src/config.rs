use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::types::ModuleId;

/// File name of the cache archive
pub const CACHE_FILE_NAME: &str = "jdkTopLevelClasses.zip";

/// Name of the single entry inside the cache archive
pub const CACHE_ENTRY_NAME: &str = "jdkTopLevelClasses.cache";

/// All exported modules that are present in JDK 10 or 11
///
/// Deliberately a superset: modules removed in later releases (and JavaFX,
/// which only some distributions bundle) are simply reported as missing.
/// Extend this when targeting newer platform releases.
pub const DEFAULT_JDK_MODULES: &[&str] = &[
    "java.activation",
    "java.base",
    "java.compiler",
    "java.corba",
    "java.datatransfer",
    "java.desktop",
    "java.instrument",
    "java.jnlp",
    "java.logging",
    "java.management",
    "java.management.rmi",
    "java.naming",
    "java.net.http",
    "java.prefs",
    "java.rmi",
    "java.scripting",
    "java.se",
    "java.se.ee",
    "java.security.jgss",
    "java.security.sasl",
    "java.smartcardio",
    "java.sql",
    "java.sql.rowset",
    "java.transaction",
    "java.transaction.xa",
    "java.xml",
    "java.xml.bind",
    "java.xml.crypto",
    "java.xml.ws",
    "java.xml.ws.annotation",
    "javafx.base",
    "javafx.controls",
    "javafx.fxml",
    "javafx.graphics",
    "javafx.media",
    "javafx.swing",
    "javafx.web",
    "jdk.accessibility",
    "jdk.aot",
    "jdk.attach",
    "jdk.charsets",
    "jdk.compiler",
    "jdk.crypto.cryptoki",
    "jdk.crypto.ec",
    "jdk.dynalink",
    "jdk.editpad",
    "jdk.hotspot.agent",
    "jdk.httpserver",
    "jdk.incubator.httpclient",
    "jdk.internal.ed",
    "jdk.internal.jvmstat",
    "jdk.internal.le",
    "jdk.internal.opt",
    "jdk.internal.vm.ci",
    "jdk.internal.vm.compiler",
    "jdk.internal.vm.compiler.management",
    "jdk.jartool",
    "jdk.javadoc",
    "jdk.jcmd",
    "jdk.jconsole",
    "jdk.jdeps",
    "jdk.jdi",
    "jdk.jdwp.agent",
    "jdk.jfr",
    "jdk.jlink",
    "jdk.jshell",
    "jdk.jsobject",
    "jdk.jstatd",
    "jdk.localedata",
    "jdk.management",
    "jdk.management.agent",
    "jdk.management.cmm",
    "jdk.management.jfr",
    "jdk.management.resource",
    "jdk.naming.dns",
    "jdk.naming.rmi",
    "jdk.net",
    "jdk.pack",
    "jdk.packager.services",
    "jdk.rmic",
    "jdk.scripting.nashorn",
    "jdk.scripting.nashorn.shell",
    "jdk.sctp",
    "jdk.security.auth",
    "jdk.security.jgss",
    "jdk.snmp",
    "jdk.unsupported",
    "jdk.unsupported.desktop",
    "jdk.xml.dom",
    "jdk.zipfs",
];

/// Everything the indexer needs to know about its host
///
/// Usually built with [`IndexConfig::from_env`], optionally merged with a
/// JSON file, and then overridden by command line flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Platform install directory (`JAVA_HOME`): holds the runtime image
    /// and is the first place the cache is looked for
    pub java_home: Option<PathBuf>,
    /// User home (`HOME`): second place the cache is looked for
    pub home: Option<PathBuf>,
    /// Modules of the runtime image to index
    pub modules: Vec<ModuleId>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            java_home: None,
            home: None,
            modules: DEFAULT_JDK_MODULES.iter().copied().map(ModuleId::from).collect(),
        }
    }
}

impl IndexConfig {
    pub fn from_env() -> Self {
        Self {
            java_home: env_dir("JAVA_HOME"),
            home: env_dir("HOME"),
            ..Self::default()
        }
    }

    /// Reads a JSON config file on top of the environment
    ///
    /// Keys missing from the file keep their environment/default value.
    pub fn from_env_and_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let file: PartialConfig = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file: {:?}", path))?;

        let mut config = Self::from_env();
        if let Some(java_home) = file.java_home {
            config.java_home = Some(java_home);
        }
        if let Some(home) = file.home {
            config.home = Some(home);
        }
        if let Some(modules) = file.modules {
            config.modules = modules;
        }
        Ok(config)
    }

    /// Where the cache may live, in lookup order
    pub fn cache_candidates(&self) -> Vec<PathBuf> {
        [&self.java_home, &self.home]
            .into_iter()
            .flatten()
            .map(|dir| dir.join(CACHE_FILE_NAME))
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    java_home: Option<PathBuf>,
    home: Option<PathBuf>,
    modules: Option<Vec<ModuleId>>,
}

fn env_dir(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_cache_candidates_order() {
        let config = IndexConfig {
            java_home: Some(PathBuf::from("/opt/jdk")),
            home: Some(PathBuf::from("/home/dev")),
            modules: vec![],
        };

        assert_eq!(
            config.cache_candidates(),
            vec![
                PathBuf::from("/opt/jdk/jdkTopLevelClasses.zip"),
                PathBuf::from("/home/dev/jdkTopLevelClasses.zip"),
            ]
        );

        let home_only = IndexConfig {
            java_home: None,
            ..config
        };
        assert_eq!(
            home_only.cache_candidates(),
            vec![PathBuf::from("/home/dev/jdkTopLevelClasses.zip")]
        );
    }

    #[test]
    fn test_default_modules() {
        let config = IndexConfig::default();
        assert_eq!(config.modules.len(), DEFAULT_JDK_MODULES.len());
        assert!(config.modules.contains(&ModuleId::new("java.base")));
    }

    #[test]
    fn test_config_file_overrides_modules() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, r#"{ "java_home": "/jdk", "modules": ["java.base"] }"#).unwrap();

        let config = IndexConfig::from_env_and_file(&path).unwrap();
        assert_eq!(config.java_home, Some(PathBuf::from("/jdk")));
        assert_eq!(config.modules, vec![ModuleId::new("java.base")]);
    }

    #[test]
    fn test_invalid_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(IndexConfig::from_env_and_file(&path).is_err());
    }
}

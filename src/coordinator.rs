use std::convert::Infallible;
use std::path::PathBuf;
use tracing::info;

use crate::cache::ArchiveCacheStore;
use crate::classpath::ClasspathScanner;
use crate::config::IndexConfig;
use crate::error::IndexError;
use crate::jdk::{ModuleEnumeration, RuntimeImage, detect_runtime_image, enumerate_modules_with_report};
use crate::types::TypeIndex;

/// Entry point for both symbol universes
///
/// ```no_run
/// use jdk_type_index::{IndexConfig, IndexCoordinator};
///
/// let coordinator = IndexCoordinator::new(IndexConfig::from_env());
/// let jdk = coordinator.jdk_index();
/// let project = coordinator.classpath_index(["target/classes"]).unwrap();
/// println!("{} JDK types, {} project types", jdk.len(), project.len());
/// ```
pub struct IndexCoordinator {
    config: IndexConfig,
    image: Box<dyn RuntimeImage>,
    cache: ArchiveCacheStore,
}

impl IndexCoordinator {
    /// Locates the runtime image under `config.java_home`
    pub fn new(config: IndexConfig) -> Self {
        let image = detect_runtime_image(config.java_home.as_deref());
        Self::with_image(config, image)
    }

    /// Uses an explicit runtime image instead of the Java home's
    pub fn with_image(config: IndexConfig, image: Box<dyn RuntimeImage>) -> Self {
        let cache = ArchiveCacheStore::new(config.cache_candidates(), fingerprint(&config, image.as_ref()));
        Self { config, image, cache }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn image(&self) -> &dyn RuntimeImage {
        self.image.as_ref()
    }

    pub fn cache(&self) -> &ArchiveCacheStore {
        &self.cache
    }

    /// Top-level types of the configured JDK modules, cache first
    ///
    /// Missing modules make the index smaller, never fail it.
    pub fn jdk_index(&self) -> TypeIndex {
        info!("Searching for top-level classes in the JDK");
        let Ok(index) = self
            .cache
            .load_or_build(|| Ok::<_, Infallible>(self.module_report().index));

        info!("Found {} classes in the java platform", index.len());
        index
    }

    /// Regenerates the JDK index and overwrites the cache
    pub fn refresh_jdk_index(&self) -> TypeIndex {
        let Ok(index) = self
            .cache
            .rebuild(|| Ok::<_, Infallible>(self.module_report().index));
        index
    }

    /// Live per-module account of the runtime image, bypassing the cache
    pub fn module_report(&self) -> ModuleEnumeration {
        enumerate_modules_with_report(self.image.as_ref(), &self.config.modules)
    }

    /// Top-level types of exactly these roots; never cached
    pub fn classpath_index<I, P>(&self, roots: I) -> Result<TypeIndex, IndexError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        ClasspathScanner::new(roots).scan()
    }
}

/// Ties a cache record to the image and module list that produced it
fn fingerprint(config: &IndexConfig, image: &dyn RuntimeImage) -> String {
    let mut input = image.describe();
    input.push('\n');
    input.push_str(&image.stamp());
    for module in &config.modules {
        input.push('\n');
        input.push_str(module.as_str());
    }
    format!("{:x}", md5::compute(input))
}

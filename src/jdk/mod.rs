mod image;
mod jimage;

pub use image::*;
#[cfg(test)]
pub(crate) use jimage::write_test_image;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::types::{ModuleId, TypeIndex, qualified_name_from_class_path};

/// What happened when one module was walked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModuleStatus {
    /// Walked successfully; `types` top-level names were found
    Indexed { types: usize },
    /// Not part of this runtime image (normal for modules of other JDK releases)
    Missing,
    /// Present but could not be read
    Unreadable { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleReport {
    pub module: ModuleId,
    #[serde(flatten)]
    pub status: ModuleStatus,
}

/// Result of walking a list of modules: the index plus a per-module account
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModuleEnumeration {
    pub index: TypeIndex,
    pub modules: Vec<ModuleReport>,
}

impl ModuleEnumeration {
    /// Number of modules that were actually walked
    pub fn indexed_modules(&self) -> usize {
        self.modules
            .iter()
            .filter(|report| matches!(report.status, ModuleStatus::Indexed { .. }))
            .count()
    }

    pub fn missing_modules(&self) -> impl Iterator<Item = &ModuleId> {
        self.modules
            .iter()
            .filter(|report| report.status == ModuleStatus::Missing)
            .map(|report| &report.module)
    }

    pub fn unreadable_modules(&self) -> impl Iterator<Item = (&ModuleId, &str)> {
        self.modules.iter().filter_map(|report| match &report.status {
            ModuleStatus::Unreadable { reason } => Some((&report.module, reason.as_str())),
            _ => None,
        })
    }
}

/// Collects the top-level types of `modules` from `image`
///
/// A module that is missing or unreadable is skipped; the rest still
/// contribute. This never fails.
pub fn enumerate_modules(image: &dyn RuntimeImage, modules: &[ModuleId]) -> TypeIndex {
    enumerate_modules_with_report(image, modules).index
}

pub fn enumerate_modules_with_report(image: &dyn RuntimeImage, modules: &[ModuleId]) -> ModuleEnumeration {
    info!("Generating top-level classes from {}", image.describe());

    let mut enumeration = ModuleEnumeration::default();
    for module in modules {
        let status = match image.module_entries(module) {
            Ok(Some(entries)) => {
                let mut types = 0;
                for entry in &entries {
                    if let Some(name) = qualified_name_from_class_path(entry) {
                        enumeration.index.insert(name);
                        types += 1;
                    }
                }
                debug!(module = %module, types, "Indexed module");
                ModuleStatus::Indexed { types }
            }
            Ok(None) => {
                debug!(module = %module, "Module not present in runtime image");
                ModuleStatus::Missing
            }
            Err(e) => {
                warn!(module = %module, "Failed to index module: {}", e);
                ModuleStatus::Unreadable { reason: e.to_string() }
            }
        };

        enumeration.modules.push(ModuleReport {
            module: module.clone(),
            status,
        });
    }

    info!(
        "Found {} classes in {} of {} modules",
        enumeration.index.len(),
        enumeration.indexed_modules(),
        modules.len()
    );
    enumeration
}

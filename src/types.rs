use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Suffix of a compiled Java type on disk or inside an archive
pub const CLASS_SUFFIX: &str = ".class";

/// Separator `javac` uses for nested types in binary names (`Outer$Inner`)
pub const NESTED_TYPE_SEPARATOR: char = '$';

/// Compiled files that carry metadata rather than a type
const PSEUDO_TYPES: [&str; 2] = ["module-info", "package-info"];

/// One module of the runtime image, like "java.base" or "jdk.compiler"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ModuleId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A set of fully qualified top-level type names
///
/// Think: "every class you could `import` from this place".
/// Nested types (`Map$Entry`) are never part of an index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeIndex {
    names: BTreeSet<String>,
}

impl TypeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a name, returning false if it was already present
    /// or is not a valid top-level name.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if !is_top_level_name(&name) {
            return false;
        }
        self.names.insert(name)
    }

    /// Adds the type stored at `relative` (e.g. `java/util/List.class`),
    /// if that path names a top-level type.
    pub fn insert_class_path(&mut self, relative: &str) -> bool {
        match qualified_name_from_class_path(relative) {
            Some(name) => self.names.insert(name),
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn extend(&mut self, other: TypeIndex) {
        self.names.extend(other.names);
    }

    pub fn is_disjoint(&self, other: &TypeIndex) -> bool {
        self.names.is_disjoint(&other.names)
    }
}

impl FromIterator<String> for TypeIndex {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut index = TypeIndex::new();
        for name in iter {
            index.insert(name);
        }
        index
    }
}

impl<'a> FromIterator<&'a str> for TypeIndex {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().map(str::to_string).collect()
    }
}

impl IntoIterator for TypeIndex {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.into_iter()
    }
}

/// Turns a compiled type path into a qualified name
///
/// `java/util/List.class` becomes `java.util.List`. Both `/` and `\`
/// are accepted as separators so archive entries and Windows paths
/// go through the same rule. Returns `None` for nested types,
/// non-class files, and `module-info` / `package-info`.
pub fn qualified_name_from_class_path(relative: &str) -> Option<String> {
    let trimmed = relative.trim_start_matches(['/', '\\']);
    let stem = trimmed.strip_suffix(CLASS_SUFFIX)?;
    if stem.is_empty() || stem.contains(NESTED_TYPE_SEPARATOR) {
        return None;
    }

    let simple_name = stem.rsplit(['/', '\\']).next().unwrap_or(stem);
    if PSEUDO_TYPES.contains(&simple_name) {
        return None;
    }

    let name = stem.replace(['/', '\\'], ".");
    is_top_level_name(&name).then_some(name)
}

/// True when `name` could appear in a [`TypeIndex`]
pub fn is_top_level_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(NESTED_TYPE_SEPARATOR)
        && name.split('.').all(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_name_from_class_path() {
        assert_eq!(
            qualified_name_from_class_path("java/util/List.class"),
            Some("java.util.List".to_string())
        );
        assert_eq!(
            qualified_name_from_class_path("/a/b/Foo.class"),
            Some("a.b.Foo".to_string())
        );
        assert_eq!(
            qualified_name_from_class_path("a\\b\\Foo.class"),
            Some("a.b.Foo".to_string())
        );
        assert_eq!(qualified_name_from_class_path("Default.class"), Some("Default".to_string()));
    }

    #[test]
    fn test_nested_and_pseudo_types_are_rejected() {
        assert_eq!(qualified_name_from_class_path("a/b/Foo$Inner.class"), None);
        assert_eq!(qualified_name_from_class_path("a/b/Foo$1.class"), None);
        assert_eq!(qualified_name_from_class_path("module-info.class"), None);
        assert_eq!(qualified_name_from_class_path("a/b/package-info.class"), None);
        assert_eq!(qualified_name_from_class_path("a/b/Foo.java"), None);
        assert_eq!(qualified_name_from_class_path(".class"), None);
        assert_eq!(qualified_name_from_class_path("a//Foo.class"), None);
    }

    #[test]
    fn test_type_index_rejects_nested_names() {
        let mut index = TypeIndex::new();
        assert!(index.insert("a.b.Foo"));
        assert!(!index.insert("a.b.Foo"));
        assert!(!index.insert("a.b.Foo$Inner"));
        assert!(!index.insert(""));

        assert_eq!(index.len(), 1);
        assert!(index.contains("a.b.Foo"));
    }

    #[test]
    fn test_type_index_serializes_as_list() {
        let index: TypeIndex = ["b.B", "a.A"].into_iter().collect();
        let json = serde_json::to_string(&index).unwrap();
        assert_eq!(json, r#"["a.A","b.B"]"#);

        let back: TypeIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(back, index);
    }
}

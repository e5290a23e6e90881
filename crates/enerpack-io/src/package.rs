//! Datapackage manifest parsing and resource classification.
//!
//! A package is a directory containing `datapackage.json` plus the CSV
//! resources it points at, conventionally laid out as
//! `data/<category>/<name>.csv`. The category (elements, sequences, hubs,
//! periods, ...) is carried by the resource path, not by the manifest.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::helpers::ImportDiagnostics;

/// Manifest file expected at the package root.
pub const DESCRIPTOR_FILE: &str = "datapackage.json";

/// Descriptor convention major version this reader targets.
pub const SUPPORTED_DESCRIPTOR_MAJOR: u64 = 1;

/// Top-level `datapackage.json` structure.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,
}

/// One resource entry of the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDescriptor {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub schema: Option<ResourceSchema>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceSchema {
    #[serde(default, rename = "primaryKey")]
    pub primary_key: Option<FieldList>,
    #[serde(default, rename = "foreignKeys")]
    pub foreign_keys: Vec<ForeignKey>,
}

/// Foreign-key declaration: a local field referencing a field of another
/// resource.
#[derive(Debug, Clone, Deserialize)]
pub struct ForeignKey {
    pub fields: FieldList,
    pub reference: ForeignKeyReference,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForeignKeyReference {
    pub resource: String,
    #[serde(default)]
    pub fields: Option<FieldList>,
}

/// The descriptor convention allows a single field name or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldList {
    One(String),
    Many(Vec<String>),
}

impl FieldList {
    pub fn first(&self) -> Option<&str> {
        match self {
            FieldList::One(s) => Some(s),
            FieldList::Many(v) => v.first().map(String::as_str),
        }
    }
}

/// Path category of a resource, taken from its parent directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    Elements,
    Sequences,
    Hubs,
    Periods,
    TsaParameters,
    Temporal,
    Constraints,
}

impl ResourceClass {
    /// Classify a resource path by the directory it sits in.
    pub fn from_path(path: &Path) -> Option<Self> {
        let parent = path.parent()?.file_name()?.to_str()?;
        match parent {
            "elements" => Some(ResourceClass::Elements),
            "sequences" => Some(ResourceClass::Sequences),
            "hubs" | "buses" => Some(ResourceClass::Hubs),
            "periods" => Some(ResourceClass::Periods),
            "tsa_parameters" => Some(ResourceClass::TsaParameters),
            "temporal" => Some(ResourceClass::Temporal),
            "constraints" => Some(ResourceClass::Constraints),
            _ => None,
        }
    }
}

/// An opened package: manifest plus its root directory.
#[derive(Debug, Clone)]
pub struct Datapackage {
    pub root: PathBuf,
    pub descriptor: PackageDescriptor,
}

impl Datapackage {
    /// Read and parse `datapackage.json`, checking resource-name
    /// uniqueness.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let manifest = root.join(DESCRIPTOR_FILE);
        let raw = fs::read_to_string(&manifest)
            .with_context(|| format!("reading manifest '{}'", manifest.display()))?;
        let descriptor: PackageDescriptor = serde_json::from_str(&raw)
            .with_context(|| format!("parsing manifest '{}'", manifest.display()))?;

        let mut seen = HashSet::new();
        for resource in &descriptor.resources {
            if !seen.insert(resource.name.as_str()) {
                anyhow::bail!("duplicate resource name '{}' in package", resource.name);
            }
        }

        Ok(Self { root, descriptor })
    }

    /// Absolute path of a resource file.
    pub fn resource_path(&self, resource: &ResourceDescriptor) -> PathBuf {
        self.root.join(&resource.path)
    }

    /// Resources paired with their path category. Unclassifiable resources
    /// are skipped here and reported by the caller.
    pub fn classified_resources(&self) -> Vec<(ResourceClass, &ResourceDescriptor)> {
        self.descriptor
            .resources
            .iter()
            .filter_map(|r| {
                ResourceClass::from_path(Path::new(&r.path)).map(|class| (class, r))
            })
            .collect()
    }

    /// Resources whose path matches no known category.
    pub fn unclassified_resources(&self) -> Vec<&ResourceDescriptor> {
        self.descriptor
            .resources
            .iter()
            .filter(|r| ResourceClass::from_path(Path::new(&r.path)).is_none())
            .collect()
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceDescriptor> {
        self.descriptor.resources.iter().find(|r| r.name == name)
    }

    /// Non-fatal version check: an absent, unparsable, or unsupported
    /// descriptor version is a warning, never an error.
    pub fn check_version(&self, diag: &mut ImportDiagnostics) {
        let Some(version) = &self.descriptor.version else {
            return;
        };
        match semver::Version::parse(version) {
            Ok(parsed) if parsed.major == SUPPORTED_DESCRIPTOR_MAJOR => {}
            Ok(parsed) => diag.add_warning(
                "descriptor",
                &format!(
                    "datapackage version {} is not supported (expected major {}), continuing anyway",
                    parsed, SUPPORTED_DESCRIPTOR_MAJOR
                ),
            ),
            Err(_) => diag.add_warning(
                "descriptor",
                &format!("unparsable datapackage version '{}', continuing anyway", version),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_parent_directory() {
        assert_eq!(
            ResourceClass::from_path(Path::new("data/elements/volatile.csv")),
            Some(ResourceClass::Elements)
        );
        assert_eq!(
            ResourceClass::from_path(Path::new("data/sequences/wind-profiles.csv")),
            Some(ResourceClass::Sequences)
        );
        assert_eq!(
            ResourceClass::from_path(Path::new("data/buses/bus.csv")),
            Some(ResourceClass::Hubs)
        );
        assert_eq!(
            ResourceClass::from_path(Path::new("data/misc/notes.csv")),
            None
        );
    }

    #[test]
    fn test_descriptor_parsing_with_foreign_keys() {
        let raw = r#"{
            "name": "dispatch-example",
            "version": "1.2.0",
            "resources": [
                {
                    "name": "volatile",
                    "path": "data/elements/volatile.csv",
                    "schema": {
                        "primaryKey": "name",
                        "foreignKeys": [
                            {"fields": "bus", "reference": {"resource": "bus", "fields": "name"}},
                            {"fields": "profile", "reference": {"resource": "volatile_profile"}}
                        ]
                    }
                }
            ]
        }"#;
        let descriptor: PackageDescriptor = serde_json::from_str(raw).unwrap();
        let schema = descriptor.resources[0].schema.as_ref().unwrap();
        assert_eq!(schema.foreign_keys.len(), 2);
        assert_eq!(schema.foreign_keys[0].fields.first(), Some("bus"));
        assert_eq!(schema.foreign_keys[1].reference.resource, "volatile_profile");
    }

    #[test]
    fn test_version_check_warns_on_major_mismatch() {
        let descriptor = PackageDescriptor {
            name: None,
            profile: None,
            version: Some("2.0.0".into()),
            resources: Vec::new(),
        };
        let pkg = Datapackage {
            root: PathBuf::from("."),
            descriptor,
        };
        let mut diag = ImportDiagnostics::new();
        pkg.check_version(&mut diag);
        assert_eq!(diag.warning_count(), 1);
    }
}

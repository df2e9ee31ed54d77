//! Manifest document analysis
//!
//! Parses one downloaded `project.json` document and extracts the
//! aggregate facts the report rows are built from: which tracked
//! properties are present, how many frameworks are targeted, dependency
//! counts, and the individual occurrences of interesting properties.

use serde_json::Value;

/// Top-level properties whose presence gets a Yes/No column in the stats
/// report.
pub const TRACKED_PROPERTIES: &[&str] = &[
    "authors",
    "buildOptions",
    "commands",
    "compilationOptions",
    "configurations",
    "dependencies",
    "frameworks",
    "packOptions",
    "publishOptions",
    "runtimes",
    "scripts",
    "testRunner",
    "tools",
    "version",
];

/// Properties whose individual values are collected into the properties
/// report, wherever they occur in the document.
const INTERESTING_PROPERTIES: &[&str] = &[
    "version",
    "emitEntryPoint",
    "outputName",
    "languageVersion",
    "testRunner",
];

/// One occurrence of an interesting property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyOccurrence {
    /// Property name as it appears in the document
    pub name: String,

    /// Slash-joined path from the document root to the property
    pub path: String,

    /// Enclosing framework moniker, empty for framework-independent
    /// occurrences
    pub framework: String,

    /// Scalar value, stringified
    pub value: String,
}

/// Everything the reporter needs to know about one manifest.
#[derive(Debug, Clone, Default)]
pub struct ManifestAnalysis {
    /// Framework monikers targeted by the manifest
    pub frameworks: Vec<String>,

    /// Entries in the top-level dependencies object
    pub top_level_dependencies: usize,

    /// Entries in per-framework dependencies objects, summed
    pub framework_specific_dependencies: usize,

    /// Tracked top-level properties present in the document
    pub properties_defined: Vec<String>,

    /// Collected interesting property occurrences
    pub interesting_values: Vec<PropertyOccurrence>,

    /// Parse failure, if the document was not valid JSON
    pub parsing_error: Option<String>,
}

impl ManifestAnalysis {
    /// Analyzes one manifest document. Never fails: a malformed document
    /// yields an analysis carrying the parse error.
    pub fn analyze(content: &str) -> Self {
        let doc: Value = match serde_json::from_str(content) {
            Ok(doc) => doc,
            Err(e) => {
                return Self {
                    parsing_error: Some(e.to_string()),
                    ..Self::default()
                }
            }
        };

        let mut analysis = Self::default();

        if let Value::Object(root) = &doc {
            analysis.properties_defined = TRACKED_PROPERTIES
                .iter()
                .filter(|p| root.contains_key(**p))
                .map(|p| p.to_string())
                .collect();

            if let Some(Value::Object(deps)) = root.get("dependencies") {
                analysis.top_level_dependencies = deps.len();
            }

            if let Some(Value::Object(frameworks)) = root.get("frameworks") {
                for (moniker, body) in frameworks {
                    analysis.frameworks.push(moniker.clone());
                    if let Some(Value::Object(deps)) = body.get("dependencies") {
                        analysis.framework_specific_dependencies += deps.len();
                    }
                }
            }
        }

        collect_interesting(&doc, "", "", &mut analysis.interesting_values);
        analysis
    }

    /// Whether a tracked property is present in the document.
    pub fn defines(&self, property: &str) -> bool {
        self.properties_defined.iter().any(|p| p == property)
    }
}

/// Walks the document collecting scalar occurrences of interesting
/// properties. The framework context is picked up when descending through
/// the `frameworks` object.
fn collect_interesting(
    value: &Value,
    path: &str,
    framework: &str,
    out: &mut Vec<PropertyOccurrence>,
) {
    let Value::Object(map) = value else { return };

    for (key, child) in map {
        let child_path = if path.is_empty() {
            key.clone()
        } else {
            format!("{path}/{key}")
        };

        if INTERESTING_PROPERTIES.contains(&key.as_str()) {
            if let Some(scalar) = scalar_string(child) {
                out.push(PropertyOccurrence {
                    name: key.clone(),
                    path: child_path.clone(),
                    framework: framework.to_string(),
                    value: scalar,
                });
            }
        }

        if key == "frameworks" && path.is_empty() {
            if let Value::Object(frameworks) = child {
                for (moniker, body) in frameworks {
                    let fw_path = format!("{child_path}/{moniker}");
                    collect_interesting(body, &fw_path, moniker, out);
                }
                continue;
            }
        }

        collect_interesting(child, &child_path, framework, out);
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "version": "1.0.0-*",
        "dependencies": {
            "Newtonsoft.Json": "9.0.1",
            "NETStandard.Library": "1.6.0"
        },
        "buildOptions": {
            "emitEntryPoint": true
        },
        "frameworks": {
            "netcoreapp1.0": {
                "dependencies": {
                    "Microsoft.NETCore.App": "1.0.0"
                }
            },
            "net451": {}
        }
    }"#;

    #[test]
    fn test_analyze_sample() {
        let analysis = ManifestAnalysis::analyze(SAMPLE);

        assert!(analysis.parsing_error.is_none());
        assert_eq!(analysis.frameworks.len(), 2);
        assert!(analysis.frameworks.contains(&"netcoreapp1.0".to_string()));
        assert!(analysis.frameworks.contains(&"net451".to_string()));
        assert_eq!(analysis.top_level_dependencies, 2);
        assert_eq!(analysis.framework_specific_dependencies, 1);
        assert!(analysis.defines("version"));
        assert!(analysis.defines("buildOptions"));
        assert!(analysis.defines("frameworks"));
        assert!(!analysis.defines("scripts"));
    }

    #[test]
    fn test_interesting_values() {
        let analysis = ManifestAnalysis::analyze(SAMPLE);

        let version = analysis
            .interesting_values
            .iter()
            .find(|o| o.name == "version")
            .unwrap();
        assert_eq!(version.value, "1.0.0-*");
        assert_eq!(version.path, "version");
        assert_eq!(version.framework, "");

        let emit = analysis
            .interesting_values
            .iter()
            .find(|o| o.name == "emitEntryPoint")
            .unwrap();
        assert_eq!(emit.value, "true");
        assert_eq!(emit.path, "buildOptions/emitEntryPoint");
    }

    #[test]
    fn test_framework_scoped_occurrence() {
        let content = r#"{
            "frameworks": {
                "netcoreapp1.0": {
                    "buildOptions": { "emitEntryPoint": true }
                }
            }
        }"#;
        let analysis = ManifestAnalysis::analyze(content);

        let emit = analysis
            .interesting_values
            .iter()
            .find(|o| o.name == "emitEntryPoint")
            .unwrap();
        assert_eq!(emit.framework, "netcoreapp1.0");
        assert_eq!(
            emit.path,
            "frameworks/netcoreapp1.0/buildOptions/emitEntryPoint"
        );
    }

    #[test]
    fn test_malformed_document() {
        let analysis = ManifestAnalysis::analyze("{ not json");
        assert!(analysis.parsing_error.is_some());
        assert!(analysis.frameworks.is_empty());
        assert_eq!(analysis.top_level_dependencies, 0);
    }

    #[test]
    fn test_empty_object() {
        let analysis = ManifestAnalysis::analyze("{}");
        assert!(analysis.parsing_error.is_none());
        assert!(analysis.properties_defined.is_empty());
        assert!(analysis.interesting_values.is_empty());
    }

    #[test]
    fn test_non_object_root() {
        let analysis = ManifestAnalysis::analyze("[1, 2, 3]");
        assert!(analysis.parsing_error.is_none());
        assert!(analysis.properties_defined.is_empty());
    }
}

use crate::command::{AllowAbsent, CommandRunner};
use crate::constants::{ALM_EXAMPLES_ANNOTATION, CSV_PHASE_JSONPATH};
use crate::error::{self, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::{OptionExt, ResultExt};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// The name of a `ClusterServiceVersion`, `<bundle prefix>.v<version>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CsvName(String);

impl CsvName {
    pub fn new(bundle_prefix: &str, version: &str) -> Self {
        Self(format!("{}.v{}", bundle_prefix, version))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CsvName {
    /// Wrap a CSV name read from the cluster, e.g. from the install plan listing.
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Display for CsvName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Example custom resources bundled in a CSV, keyed by `kind`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExampleResources(BTreeMap<String, Value>);

impl ExampleResources {
    /// The example manifest for `kind`, e.g. `KafkaTopic`.
    pub fn get(&self, kind: &str) -> Option<&Value> {
        self.0.get(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse the JSON form of a CSV and index the manifests found in its `alm-examples` annotation
    /// by `kind`. If two examples share a kind, the later one wins.
    pub fn from_csv_json(csv: &str) -> Result<Self> {
        let csv: Value = serde_json::from_str(csv).context(error::JsonSnafu {
            action: "parse CSV",
        })?;
        let examples = csv
            .pointer("/metadata/annotations")
            .and_then(|annotations| annotations.get(ALM_EXAMPLES_ANNOTATION))
            .and_then(Value::as_str)
            .context(error::MissingFieldSnafu {
                field: format!("metadata.annotations.{}", ALM_EXAMPLES_ANNOTATION),
                what: "CSV",
            })?;
        let examples: Vec<Value> =
            serde_json::from_str(examples).context(error::JsonSnafu {
                action: "parse CSV example resources",
            })?;

        let mut resources = BTreeMap::new();
        for example in examples {
            let kind = example
                .get("kind")
                .and_then(Value::as_str)
                .context(error::MissingFieldSnafu {
                    field: "kind",
                    what: "CSV example resource",
                })?
                .to_string();
            debug!("Found example resource of kind '{}'", kind);
            resources.insert(kind, example);
        }
        Ok(Self(resources))
    }
}

/// # Example Resource Extractor
///
/// Fetch CSV `csv` from `namespace` and return the example resources it carries.
pub async fn extract_example_resources<R>(
    runner: &R,
    csv: &CsvName,
    namespace: &str,
) -> Result<ExampleResources>
where
    R: CommandRunner,
{
    info!("Reading example resources from CSV '{}'", csv);
    let output = runner
        .exec(namespace, &["get", "csv", csv.as_str(), "-o", "json"])
        .await?;
    ExampleResources::from_csv_json(&output)
}

/// The `status.phase` of CSV `csv`, e.g. `Succeeded`. `None` if the CSV does not exist (yet).
pub async fn csv_phase<R>(runner: &R, csv: &CsvName, namespace: &str) -> Result<Option<String>>
where
    R: CommandRunner,
{
    let phase = runner
        .exec(
            namespace,
            &["get", "csv", csv.as_str(), "-o", CSV_PHASE_JSONPATH],
        )
        .await
        .allow_absent()?
        .map(|phase| phase.trim().to_string())
        .filter(|phase| !phase.is_empty());
    debug!("CSV '{}' is in phase {:?}", csv, phase);
    Ok(phase)
}

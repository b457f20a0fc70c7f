/*!

Parsers for the two forms in which the cluster CLI lists install plans.

The tabular form is what `get installplan` prints:

```text
NAME            CSV                                  APPROVAL   APPROVED
install-abc123  strimzi-cluster-operator.v0.37.0    Manual     true
install-xyz789  strimzi-cluster-operator.v0.38.0    Manual     false
```

Columns are separated by runs of spaces and appear in the order `NAME CSV APPROVAL APPROVED`. Only
rows whose first column carries the `install-` prefix are plans; the header and anything else are
skipped.

!*/

use crate::constants::INSTALL_PLAN_PREFIX;
use crate::error::{self, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

/// One row of the tabular listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallPlanRow {
    pub name: String,
    /// The CSV the plan would install, e.g. `strimzi-cluster-operator.v0.38.0`.
    pub csv: Option<String>,
    /// `Automatic` or `Manual`.
    pub approval: Option<String>,
    pub approved: Option<bool>,
}

/// Parse the tabular output of `get installplan`, keeping the order in which rows were printed.
pub fn parse_listing(listing: &str) -> Vec<InstallPlanRow> {
    listing
        .lines()
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let name = columns.next()?;
            if !name.starts_with(INSTALL_PLAN_PREFIX) {
                return None;
            }
            Some(InstallPlanRow {
                name: name.to_string(),
                csv: columns.next().map(str::to_string),
                approval: columns.next().map(str::to_string),
                approved: columns.next().and_then(|approved| approved.parse().ok()),
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct InstallPlanList {
    #[serde(default)]
    items: Vec<InstallPlanObject>,
}

#[derive(Debug, Deserialize)]
struct InstallPlanObject {
    metadata: ObjectMeta,
}

/// Parse the output of `get installplan -o json` and return the plan names ordered by
/// `metadata.creationTimestamp`, oldest first. Plans created within the same second are ordered by
/// name.
pub fn parse_json_listing_by_creation(listing: &str) -> Result<Vec<String>> {
    let list: InstallPlanList = serde_json::from_str(listing).context(error::JsonSnafu {
        action: "parse install plan list",
    })?;
    let mut plans: Vec<_> = list
        .items
        .into_iter()
        .filter_map(|plan| {
            let name = plan.metadata.name?;
            Some((plan.metadata.creation_timestamp, name))
        })
        .filter(|(_, name)| name.starts_with(INSTALL_PLAN_PREFIX))
        .collect();
    plans.sort();
    Ok(plans.into_iter().map(|(_, name)| name).collect())
}

use crate::constants::SETTINGS_ENV_PREFIX;
use crate::error::{self, Result};
use serde::Deserialize;
use serde_plain::derive_fromstr_from_deserialize;
use snafu::ResultExt;
use std::time::Duration;

/// Everything the surrounding test environment tells us about the operator package and the
/// cluster. Each field can be set with an environment variable carrying the `OLMTEST_` prefix.
///
/// # Example
///
/// ```text
/// OLMTEST_LATEST_RELEASE_VERSION=0.38.0
/// OLMTEST_SOURCE_NAMESPACE=openshift-marketplace
/// OLMTEST_INSTALL_PLAN_ORDERING=creation-timestamp
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct OlmSettings {
    /// The path or name of the cluster CLI binary. Defaults to `kubectl` (found via `$PATH`).
    #[serde(default = "kubectl")]
    pub kubectl: String,
    /// The package name of the operator in the catalog.
    #[serde(default = "operator_name")]
    pub operator_name: String,
    /// CSV names are `<app_bundle_prefix>.v<version>`.
    #[serde(default = "app_bundle_prefix")]
    pub app_bundle_prefix: String,
    #[serde(default = "source_name")]
    pub source_name: String,
    #[serde(default = "source_namespace")]
    pub source_namespace: String,
    /// Version installed when no explicit version is requested.
    #[serde(default = "latest_release_version")]
    pub latest_release_version: String,
    #[serde(default)]
    pub feature_gates: String,
    #[serde(default = "deployment_name_prefix")]
    pub deployment_name_prefix: String,
    /// Namespace where the cluster already provides a global operator group.
    #[serde(default = "default_olm_namespace")]
    pub default_olm_namespace: String,
    /// Label selector matching the subscription and operator group created from the templates.
    #[serde(default = "app_label")]
    pub app_label: String,
    #[serde(default = "poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "deployment_timeout_ms")]
    pub deployment_timeout_ms: u64,
    #[serde(default = "install_plan_timeout_ms")]
    pub install_plan_timeout_ms: u64,
    #[serde(default = "deletion_timeout_ms")]
    pub deletion_timeout_ms: u64,
    /// Default value for the operator's operation timeout.
    #[serde(default = "operation_timeout_ms")]
    pub operation_timeout_ms: u64,
    /// Default value for the operator's full reconciliation interval.
    #[serde(default = "reconciliation_interval_ms")]
    pub reconciliation_interval_ms: u64,
    #[serde(default)]
    pub install_plan_ordering: InstallPlanOrdering,
}

/// How newly discovered install plans are ordered before they are handed to the tracker.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum InstallPlanOrdering {
    /// Trust the order in which `get installplan` prints the plans. This assumes the listing order
    /// equals creation order and is stable between calls.
    #[default]
    Listing,
    /// Read the plans as JSON and sort them by `metadata.creationTimestamp`.
    CreationTimestamp,
}

derive_fromstr_from_deserialize!(InstallPlanOrdering);

impl OlmSettings {
    /// Read the settings from `OLMTEST_*` environment variables, using defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        envy::prefixed(SETTINGS_ENV_PREFIX)
            .from_env::<Self>()
            .context(error::SettingsSnafu)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn deployment_timeout(&self) -> Duration {
        Duration::from_millis(self.deployment_timeout_ms)
    }

    pub fn install_plan_timeout(&self) -> Duration {
        Duration::from_millis(self.install_plan_timeout_ms)
    }

    pub fn deletion_timeout(&self) -> Duration {
        Duration::from_millis(self.deletion_timeout_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn reconciliation_interval(&self) -> Duration {
        Duration::from_millis(self.reconciliation_interval_ms)
    }

    /// The CSV name of the latest release.
    pub fn latest_csv(&self) -> crate::CsvName {
        crate::CsvName::new(&self.app_bundle_prefix, &self.latest_release_version)
    }
}

impl Default for OlmSettings {
    fn default() -> Self {
        Self {
            kubectl: kubectl(),
            operator_name: operator_name(),
            app_bundle_prefix: app_bundle_prefix(),
            source_name: source_name(),
            source_namespace: source_namespace(),
            latest_release_version: latest_release_version(),
            feature_gates: String::new(),
            deployment_name_prefix: deployment_name_prefix(),
            default_olm_namespace: default_olm_namespace(),
            app_label: app_label(),
            poll_interval_ms: poll_interval_ms(),
            deployment_timeout_ms: deployment_timeout_ms(),
            install_plan_timeout_ms: install_plan_timeout_ms(),
            deletion_timeout_ms: deletion_timeout_ms(),
            operation_timeout_ms: operation_timeout_ms(),
            reconciliation_interval_ms: reconciliation_interval_ms(),
            install_plan_ordering: InstallPlanOrdering::default(),
        }
    }
}

// Defaults for serde.

fn kubectl() -> String {
    String::from("kubectl")
}

fn operator_name() -> String {
    String::from("strimzi-kafka-operator")
}

fn app_bundle_prefix() -> String {
    String::from("strimzi-cluster-operator")
}

fn source_name() -> String {
    String::from("community-operators")
}

fn source_namespace() -> String {
    String::from("olm")
}

fn latest_release_version() -> String {
    String::from("0.38.0")
}

fn deployment_name_prefix() -> String {
    String::from("strimzi-cluster-operator")
}

fn default_olm_namespace() -> String {
    String::from("operators")
}

fn app_label() -> String {
    String::from("app=strimzi")
}

fn poll_interval_ms() -> u64 {
    1_000
}

fn deployment_timeout_ms() -> u64 {
    180_000
}

fn install_plan_timeout_ms() -> u64 {
    300_000
}

fn deletion_timeout_ms() -> u64 {
    180_000
}

fn operation_timeout_ms() -> u64 {
    300_000
}

fn reconciliation_interval_ms() -> u64 {
    30_000
}

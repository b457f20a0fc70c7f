use crate::command::CommandRunner;
use crate::constants::{
    DEFAULT_CHANNEL, ENV_FEATURE_GATES, ENV_OPERATION_TIMEOUT, ENV_RECONCILIATION_INTERVAL,
};
use crate::error::{self, Result};
use crate::{CsvName, OlmSettings};
use k8s_openapi::api::core::v1::EnvVar;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_plain::{derive_display_from_serialize, derive_fromstr_from_deserialize};
use snafu::{OptionExt, ResultExt};
use std::time::Duration;

const SUBSCRIPTION_TEMPLATE: &str = include_str!("../templates/subscription.yaml");

/// Operator environment variables the template declares and the director fills in.
const RECOGNIZED_ENV: [&str; 3] = [
    ENV_RECONCILIATION_INTERVAL,
    ENV_OPERATION_TIMEOUT,
    ENV_FEATURE_GATES,
];

/// Whether OLM approves install plans on its own.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ApprovalMode {
    #[default]
    Automatic,
    Manual,
}

derive_display_from_serialize!(ApprovalMode);
derive_fromstr_from_deserialize!(ApprovalMode);

/// The OLM `Subscription` object, limited to the fields this crate reads or writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: SubscriptionSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSpec {
    /// Package name of the operator.
    pub name: String,
    pub source: String,
    pub source_namespace: String,
    #[serde(rename = "startingCSV", skip_serializing_if = "Option::is_none")]
    pub starting_csv: Option<String>,
    pub channel: String,
    pub install_plan_approval: ApprovalMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<SubscriptionConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionConfig {
    #[serde(default)]
    pub env: Vec<EnvVar>,
}

/// What the caller wants the subscription to say.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionRequest {
    pub namespace: String,
    /// `None` installs the latest release.
    pub version: Option<String>,
    pub channel: String,
    pub approval: ApprovalMode,
    pub operation_timeout: Duration,
    pub reconciliation_interval: Duration,
    /// Additional operator environment, applied after the recognized entries.
    pub extra_env: Vec<EnvVar>,
}

impl SubscriptionRequest {
    /// A request for the latest release on the default channel with automatic approval.
    pub fn new<S: Into<String>>(namespace: S, settings: &OlmSettings) -> Self {
        Self {
            namespace: namespace.into(),
            version: None,
            channel: DEFAULT_CHANNEL.to_string(),
            approval: ApprovalMode::Automatic,
            operation_timeout: settings.operation_timeout(),
            reconciliation_interval: settings.reconciliation_interval(),
            extra_env: Vec::new(),
        }
    }

    pub fn version<S: Into<String>>(mut self, version: Option<S>) -> Self {
        self.version = version.map(Into::into);
        self
    }

    pub fn channel<S: Into<String>>(mut self, channel: S) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn approval(mut self, approval: ApprovalMode) -> Self {
        self.approval = approval;
        self
    }

    pub fn env<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.extra_env.push(EnvVar {
            name: name.into(),
            value: Some(value.into()),
            value_from: None,
        });
        self
    }

    /// The overrides in the order they are applied: the recognized entries first, then the
    /// caller's extra environment.
    fn env_overrides(&self, settings: &OlmSettings) -> Vec<EnvVar> {
        let recognized = [
            (
                ENV_RECONCILIATION_INTERVAL,
                self.reconciliation_interval.as_millis().to_string(),
            ),
            (
                ENV_OPERATION_TIMEOUT,
                self.operation_timeout.as_millis().to_string(),
            ),
            (ENV_FEATURE_GATES, settings.feature_gates.clone()),
        ];
        recognized
            .into_iter()
            .map(|(name, value)| EnvVar {
                name: name.to_string(),
                value: Some(value),
                value_from: None,
            })
            .chain(self.extra_env.iter().cloned())
            .collect()
    }
}

/// The fields of an applied subscription a test usually wants to check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSummary {
    pub namespace: Option<String>,
    pub channel: String,
    pub approval: ApprovalMode,
    pub starting_csv: Option<String>,
}

/// # Subscription Director
///
/// Fills the subscription template from a [`SubscriptionRequest`] and the [`OlmSettings`] and
/// applies it. The subscription is re-applied on every call, never patched, so applying twice with
/// different requests leaves only the second request's spec on the cluster.
pub struct SubscriptionDirector<'a> {
    settings: &'a OlmSettings,
}

impl<'a> SubscriptionDirector<'a> {
    pub fn new(settings: &'a OlmSettings) -> Self {
        Self { settings }
    }

    /// The CSV the request starts from.
    pub fn starting_csv(&self, request: &SubscriptionRequest) -> CsvName {
        let version = request
            .version
            .as_deref()
            .unwrap_or(&self.settings.latest_release_version);
        CsvName::new(&self.settings.app_bundle_prefix, version)
    }

    /// Render the subscription object for `request`.
    pub fn render(&self, request: &SubscriptionRequest) -> Result<Subscription> {
        let mut subscription = template()?;
        subscription.metadata.namespace = Some(request.namespace.clone());

        let spec = &mut subscription.spec;
        spec.name = self.settings.operator_name.clone();
        spec.source = self.settings.source_name.clone();
        spec.source_namespace = self.settings.source_namespace.clone();
        spec.starting_csv = Some(self.starting_csv(request).to_string());
        spec.channel = request.channel.clone();
        spec.install_plan_approval = request.approval;

        let env = &mut spec.config.get_or_insert_with(Default::default).env;
        for over in request.env_overrides(self.settings) {
            let existing = if RECOGNIZED_ENV.contains(&over.name.as_str()) {
                env.iter_mut().find(|var| var.name == over.name)
            } else {
                None
            };
            match existing {
                Some(var) => {
                    var.value = over.value;
                    var.value_from = None;
                }
                None => env.push(over),
            }
        }
        Ok(subscription)
    }

    /// Render the subscription for `request` and apply it. Returns the applied manifest.
    pub async fn create_or_update<R>(
        &self,
        runner: &R,
        request: &SubscriptionRequest,
    ) -> Result<String>
    where
        R: CommandRunner,
    {
        let subscription = self.render(request)?;
        let manifest = serde_yaml::to_string(&subscription).context(error::SerdeYamlSnafu {
            action: "serialize subscription",
        })?;
        info!(
            "Applying subscription for '{}' (channel '{}', {} approval) in namespace '{}'",
            subscription.spec.starting_csv.as_deref().unwrap_or_default(),
            subscription.spec.channel,
            subscription.spec.install_plan_approval,
            request.namespace
        );
        debug!("Subscription manifest:\n{}", manifest);
        runner.apply(&request.namespace, &manifest).await?;
        Ok(manifest)
    }

    /// Read the applied subscription back from the cluster.
    pub async fn read_back<R>(&self, runner: &R, namespace: &str) -> Result<SubscriptionSummary>
    where
        R: CommandRunner,
    {
        let name = template()?.metadata.name.context(error::MissingFieldSnafu {
            field: "metadata.name",
            what: "subscription template",
        })?;
        let output = runner
            .exec(namespace, &["get", "subscription", &name, "-o", "yaml"])
            .await?;
        let subscription: Subscription =
            serde_yaml::from_str(&output).context(error::SerdeYamlSnafu {
                action: "parse subscription",
            })?;
        Ok(SubscriptionSummary {
            namespace: subscription.metadata.namespace,
            channel: subscription.spec.channel,
            approval: subscription.spec.install_plan_approval,
            starting_csv: subscription.spec.starting_csv,
        })
    }
}

fn template() -> Result<Subscription> {
    serde_yaml::from_str(SUBSCRIPTION_TEMPLATE).context(error::SerdeYamlSnafu {
        action: "parse subscription template",
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::command::mock::MockRunner;

    fn env_value<'s>(subscription: &'s Subscription, name: &str) -> Option<&'s str> {
        subscription
            .spec
            .config
            .as_ref()?
            .env
            .iter()
            .find(|var| var.name == name)?
            .value
            .as_deref()
    }

    #[test]
    fn template_parses() {
        let subscription = template().unwrap();
        assert_eq!(subscription.kind, "Subscription");
        assert_eq!(
            subscription.api_version,
            crate::constants::SUBSCRIPTION_API_VERSION
        );
        assert_eq!(subscription.spec.config.unwrap().env.len(), 3);
    }

    #[test]
    fn latest_release_with_automatic_approval() {
        let settings = OlmSettings::default();
        let request = SubscriptionRequest::new("test", &settings)
            .channel("stable")
            .approval(ApprovalMode::Automatic);
        let subscription = SubscriptionDirector::new(&settings).render(&request).unwrap();
        assert_eq!(subscription.metadata.namespace.as_deref(), Some("test"));
        assert_eq!(
            subscription.spec.starting_csv.as_deref(),
            Some("strimzi-cluster-operator.v0.38.0")
        );
        assert_eq!(subscription.spec.install_plan_approval, ApprovalMode::Automatic);
        assert_eq!(subscription.spec.channel, "stable");
        assert_eq!(subscription.spec.name, settings.operator_name);
        assert_eq!(subscription.spec.source, settings.source_name);
        assert_eq!(subscription.spec.source_namespace, settings.source_namespace);

        let manifest = serde_yaml::to_string(&subscription).unwrap();
        assert!(manifest.contains("installPlanApproval: Automatic"));
        assert!(manifest.contains("startingCSV: strimzi-cluster-operator.v0.38.0"));
    }

    #[test]
    fn explicit_version_and_recognized_env() {
        let settings = OlmSettings {
            feature_gates: "+UseKRaft".to_string(),
            ..OlmSettings::default()
        };
        let mut request = SubscriptionRequest::new("test", &settings)
            .version(Some("0.36.1"))
            .approval(ApprovalMode::Manual);
        request.operation_timeout = Duration::from_secs(10);
        request.reconciliation_interval = Duration::from_millis(1500);
        let subscription = SubscriptionDirector::new(&settings).render(&request).unwrap();
        assert_eq!(
            subscription.spec.starting_csv.as_deref(),
            Some("strimzi-cluster-operator.v0.36.1")
        );
        assert_eq!(subscription.spec.install_plan_approval, ApprovalMode::Manual);
        assert_eq!(env_value(&subscription, ENV_OPERATION_TIMEOUT), Some("10000"));
        assert_eq!(env_value(&subscription, ENV_RECONCILIATION_INTERVAL), Some("1500"));
        assert_eq!(env_value(&subscription, ENV_FEATURE_GATES), Some("+UseKRaft"));
        // Recognized entries are overwritten in place.
        assert_eq!(subscription.spec.config.unwrap().env.len(), 3);
    }

    #[test]
    fn unknown_env_is_appended_in_order() {
        let settings = OlmSettings::default();
        let request = SubscriptionRequest::new("test", &settings)
            .env("STRIMZI_LOG_LEVEL", "DEBUG")
            .env("STRIMZI_FEATURE_GATES", "-ControlPlaneListener")
            .env("HTTP_PROXY", "http://proxy:3128");
        let subscription = SubscriptionDirector::new(&settings).render(&request).unwrap();
        let names: Vec<_> = subscription
            .spec
            .config
            .as_ref()
            .unwrap()
            .env
            .iter()
            .map(|var| var.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                ENV_RECONCILIATION_INTERVAL,
                ENV_OPERATION_TIMEOUT,
                ENV_FEATURE_GATES,
                "STRIMZI_LOG_LEVEL",
                "HTTP_PROXY",
            ]
        );
        assert_eq!(
            env_value(&subscription, ENV_FEATURE_GATES),
            Some("-ControlPlaneListener")
        );
    }

    #[test]
    fn approval_mode_text() {
        assert_eq!(ApprovalMode::Manual.to_string(), "Manual");
        assert_eq!("Automatic".parse::<ApprovalMode>().unwrap(), ApprovalMode::Automatic);
        assert!("manual".parse::<ApprovalMode>().is_err());
    }

    #[tokio::test]
    async fn applied_subscription_reads_back() {
        let settings = OlmSettings::default();
        let runner = MockRunner::default();
        let director = SubscriptionDirector::new(&settings);
        let request = SubscriptionRequest::new("test", &settings)
            .channel("candidate")
            .approval(ApprovalMode::Manual);

        let manifest = director.create_or_update(&runner, &request).await.unwrap();
        assert_eq!(runner.applied(), vec![manifest.clone()]);

        runner.respond("get subscription strimzi-sub -o yaml", &manifest);
        let summary = director.read_back(&runner, "test").await.unwrap();
        assert_eq!(
            summary,
            SubscriptionSummary {
                namespace: Some("test".to_string()),
                channel: "candidate".to_string(),
                approval: ApprovalMode::Manual,
                starting_csv: Some("strimzi-cluster-operator.v0.38.0".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn second_apply_replaces_the_spec() {
        let settings = OlmSettings::default();
        let runner = MockRunner::default();
        let director = SubscriptionDirector::new(&settings);
        director
            .create_or_update(&runner, &SubscriptionRequest::new("test", &settings))
            .await
            .unwrap();
        let request = SubscriptionRequest::new("test", &settings)
            .version(Some("0.39.0"))
            .channel("candidate");
        director.create_or_update(&runner, &request).await.unwrap();

        let applied = runner.applied();
        assert_eq!(applied.len(), 2);
        let last: Subscription = serde_yaml::from_str(&applied[1]).unwrap();
        assert_eq!(last.spec.channel, "candidate");
        assert_eq!(
            last.spec.starting_csv.as_deref(),
            Some("strimzi-cluster-operator.v0.39.0")
        );
    }
}

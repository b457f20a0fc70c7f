use crate::command::{AllowAbsent, CommandRunner, Kubectl};
use crate::constants::CSV_PHASE_SUCCEEDED;
use crate::csv::{csv_phase, extract_example_resources, CsvName, ExampleResources};
use crate::error::{self, Result};
use crate::install_plan::{
    parse_json_listing_by_creation, parse_listing, Discovery, InstallPlanApprover, InstallPlanRow,
    InstallPlanTracker, NextInstallPlan,
};
use crate::operator_group::create_operator_group;
use crate::readiness::{DeploymentWaiter, KubeDeploymentWaiter};
use crate::settings::{InstallPlanOrdering, OlmSettings};
use crate::subscription::{ApprovalMode, SubscriptionDirector, SubscriptionRequest};
use crate::wait::{wait_for, Polling};
use log::{info, warn};
use snafu::{ensure, OptionExt};
use std::time::Duration;

/// The operator deployment is expected to run a single replica.
const OPERATOR_REPLICAS: i32 = 1;

/// Where an [`OlmLifecycle`] is in the install/upgrade/teardown sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninstalled,
    Installing,
    Ready,
    Upgrading,
    Deleted,
}

/// An `OlmLifecycle` talking to a real cluster.
pub type KubeOlmLifecycle = OlmLifecycle<Kubectl, KubeDeploymentWaiter>;

/// # OLM Lifecycle
///
/// Installs, upgrades and removes the operator through OLM for one test suite run. It owns the
/// [`InstallPlanTracker`], so consecutive steps of an upgrade sequence (v1 → v2 → v3) each approve
/// exactly the install plan created for them.
///
/// # Operations
///
/// - [`create`](Self::create): operator group, subscription, approval (for `Manual`), readiness,
///   example resources
/// - [`update_subscription`](Self::update_subscription): point the subscription at a new
///   channel/version without approving anything
/// - [`upgrade`](Self::upgrade): approve the install plan created for the new version
/// - [`delete`](Self::delete): remove subscription, operator group and CSV
pub struct OlmLifecycle<R, W>
where
    R: CommandRunner,
    W: DeploymentWaiter,
{
    runner: R,
    waiter: W,
    settings: OlmSettings,
    namespace: String,
    tracker: InstallPlanTracker,
    deployment_name: Option<String>,
    csv_name: Option<CsvName>,
    example_resources: ExampleResources,
    state: LifecycleState,
}

impl<R, W> OlmLifecycle<R, W>
where
    R: CommandRunner,
    W: DeploymentWaiter,
{
    pub fn new<S: Into<String>>(runner: R, waiter: W, settings: OlmSettings, namespace: S) -> Self {
        Self {
            runner,
            waiter,
            settings,
            namespace: namespace.into(),
            tracker: InstallPlanTracker::new(),
            deployment_name: None,
            csv_name: None,
            example_resources: ExampleResources::default(),
            state: LifecycleState::Uninstalled,
        }
    }

    /// A subscription request for this lifecycle's namespace with default values.
    pub fn subscription_request(&self) -> SubscriptionRequest {
        SubscriptionRequest::new(self.namespace.as_str(), &self.settings)
    }

    /// Install the operator as described by `request`.
    pub async fn create(&mut self, request: SubscriptionRequest) -> Result<()> {
        self.namespace = request.namespace.clone();
        self.state = LifecycleState::Installing;

        // The default OLM namespace already has a global operator group.
        if self.namespace != self.settings.default_olm_namespace {
            create_operator_group(&self.runner, &self.namespace).await?;
        }

        let director = SubscriptionDirector::new(&self.settings);
        director.create_or_update(&self.runner, &request).await?;
        self.csv_name = Some(director.starting_csv(&request));

        if request.approval == ApprovalMode::Manual {
            self.wait_for_pending_install_plan().await?;
            self.approve_next().await?;
        }

        let deployment = self
            .waiter
            .wait_for_deployment(
                &self.namespace,
                &self.settings.deployment_name_prefix,
                self.polling(self.settings.deployment_timeout()),
            )
            .await?;
        self.waiter
            .wait_for_deployment_ready(
                &self.namespace,
                &deployment,
                OPERATOR_REPLICAS,
                self.polling(self.settings.deployment_timeout()),
            )
            .await?;
        self.deployment_name = Some(deployment);

        // Plans OLM approved on its own belong to this install.
        if request.approval == ApprovalMode::Automatic {
            self.restore_tracker().await?;
        }

        self.refresh_example_resources().await?;
        self.state = LifecycleState::Ready;
        Ok(())
    }

    /// Approve the install plan created for the version the subscription now points at and wait
    /// until the operator has rolled out. Returns the name of the approved plan.
    ///
    /// OLM names the operator deployment after the bundle version, so the deployment is looked up
    /// by prefix before the approval and the rolled out one is tracked afterwards.
    pub async fn upgrade(&mut self) -> Result<String> {
        ensure!(
            self.deployment_name.is_some(),
            error::NotInstalledSnafu { action: "upgrade" }
        );
        let prefix = self.settings.deployment_name_prefix.as_str();
        let current = self
            .waiter
            .deployment_name_by_prefix(&self.namespace, prefix)
            .await?;
        let running = match &current {
            Some(deployment) => {
                self.waiter
                    .running_pods_by_prefix(&self.namespace, deployment)
                    .await?
            }
            None => 0,
        };
        let previous = current.unwrap_or_else(|| prefix.to_string());
        ensure!(
            running > 0,
            error::OperatorPodAbsentSnafu {
                deployment: previous.as_str(),
                namespace: self.namespace.as_str(),
            }
        );

        self.state = LifecycleState::Upgrading;
        self.wait_for_pending_install_plan().await?;
        let target = CsvName::from(self.pending_operator_version().await?);
        let approved = self.approve_next().await?;

        let deployment = self.wait_for_rollout(&previous, &target).await?;
        self.waiter
            .wait_for_deployment_ready(
                &self.namespace,
                &deployment,
                OPERATOR_REPLICAS,
                self.polling(self.settings.deployment_timeout()),
            )
            .await?;
        info!(
            "Operator upgraded from deployment '{}' to '{}' ({})",
            previous, deployment, target
        );
        self.deployment_name = Some(deployment);
        self.csv_name = Some(target);
        self.state = LifecycleState::Ready;
        Ok(approved)
    }

    /// Re-apply the subscription with a new channel and/or version. For `Manual` approval a
    /// subsequent [`upgrade`](Self::upgrade) approves the resulting install plan.
    pub async fn update_subscription(&mut self, request: SubscriptionRequest) -> Result<()> {
        let director = SubscriptionDirector::new(&self.settings);
        director.create_or_update(&self.runner, &request).await?;
        self.csv_name = Some(director.starting_csv(&request));
        Ok(())
    }

    /// Remove the subscription, the operator group and the CSV. Objects that are already gone are
    /// skipped.
    pub async fn delete(&mut self) -> Result<()> {
        let present = self
            .waiter
            .deployment_name_by_prefix(&self.namespace, &self.settings.deployment_name_prefix)
            .await?;
        if present.is_none() {
            info!(
                "Operator deployment '{}' is already deleted in namespace '{}'",
                self.deployment_name.as_deref().unwrap_or_default(),
                self.namespace
            );
        }

        info!(
            "Deleting subscription, operator group and CSV from namespace '{}'",
            self.namespace
        );
        let label = self.settings.app_label.as_str();
        for kind in ["subscriptions", "operatorgroups"] {
            if self
                .runner
                .exec(&self.namespace, &["delete", kind, "-l", label])
                .await
                .allow_absent()?
                .is_none()
            {
                info!("No {} to delete", kind);
            }
        }
        match &self.csv_name {
            Some(csv) => {
                if self
                    .runner
                    .exec(&self.namespace, &["delete", "csv", csv.as_str()])
                    .await
                    .allow_absent()?
                    .is_none()
                {
                    info!("CSV '{}' is already deleted", csv);
                }
            }
            None => warn!("No CSV is known for namespace '{}'", self.namespace),
        }

        if let Some(deployment) = present {
            self.waiter
                .wait_for_deployment_deletion(
                    &self.namespace,
                    &deployment,
                    self.polling(self.settings.deletion_timeout()),
                )
                .await?;
        }

        self.deployment_name = None;
        self.state = LifecycleState::Deleted;
        Ok(())
    }

    /// List the install plans in the namespace and start tracking the ones not seen before.
    /// Returns the newly tracked plan names. It is an error if no plan exists at all.
    pub async fn discover_install_plans(&mut self) -> Result<Vec<String>> {
        let discovery = match self.settings.install_plan_ordering {
            InstallPlanOrdering::Listing => {
                let listing = self
                    .runner
                    .exec(&self.namespace, &["get", "installplan"])
                    .await?;
                self.tracker.observe(&listing)
            }
            InstallPlanOrdering::CreationTimestamp => {
                let listing = self
                    .runner
                    .exec(&self.namespace, &["get", "installplan", "-o", "json"])
                    .await?;
                self.tracker
                    .observe_names(parse_json_listing_by_creation(&listing)?)
            }
        };
        match discovery {
            Discovery::Found { new } => Ok(new),
            Discovery::Empty => error::NoInstallPlansSnafu {
                namespace: self.namespace.as_str(),
            }
            .fail(),
        }
    }

    /// Discover install plans and approve the next one that has not been used yet.
    pub async fn approve_next(&mut self) -> Result<String> {
        self.discover_install_plans().await?;
        InstallPlanApprover::new(&self.runner, &self.namespace)
            .approve(&mut self.tracker)
            .await
    }

    /// Wait until OLM has rolled out CSV `target` and return the operator deployment to follow
    /// from now on.
    async fn wait_for_rollout(&self, previous: &str, target: &CsvName) -> Result<String> {
        let what = format!("rollout of '{}'", target);
        wait_for(
            &what,
            &self.namespace,
            self.polling(self.settings.deployment_timeout()),
            move || async move { Ok(self.rolled_out_deployment(previous, target).await?.is_some()) },
        )
        .await?;
        self.rolled_out_deployment(previous, target)
            .await?
            .context(error::MissingFieldSnafu {
                field: self.settings.deployment_name_prefix.as_str(),
                what: "deployments",
            })
    }

    /// A deployment with the operator prefix other than `previous` is the rolled out one. If only
    /// `previous` is listed, the deployment was updated in place and has rolled out once `target`
    /// has succeeded.
    async fn rolled_out_deployment(
        &self,
        previous: &str,
        target: &CsvName,
    ) -> Result<Option<String>> {
        let names = self
            .waiter
            .deployment_names_by_prefix(&self.namespace, &self.settings.deployment_name_prefix)
            .await?;
        if let Some(new) = names.iter().find(|name| name.as_str() != previous) {
            return Ok(Some(new.clone()));
        }
        if names.is_empty() {
            return Ok(None);
        }
        let phase = csv_phase(&self.runner, target, &self.namespace).await?;
        Ok(Some(previous.to_string()).filter(|_| phase.as_deref() == Some(CSV_PHASE_SUCCEEDED)))
    }

    /// Wait until the namespace holds an install plan this lifecycle has not approved.
    pub async fn wait_for_pending_install_plan(&self) -> Result<()> {
        let runner = &self.runner;
        let tracker = &self.tracker;
        let namespace = self.namespace.as_str();
        wait_for(
            "a non-used install plan",
            namespace,
            self.polling(self.settings.install_plan_timeout()),
            move || async move {
                let listing = runner.exec(namespace, &["get", "installplan"]).await?;
                Ok(parse_listing(&listing)
                    .iter()
                    .any(|row| tracker.is_approved(&row.name) != Some(true)))
            },
        )
        .await
    }

    /// The CSV the next approval would install, read from the install plan listing.
    pub async fn pending_operator_version(&mut self) -> Result<String> {
        self.discover_install_plans().await?;
        let name = match self.tracker.next_unapproved() {
            NextInstallPlan::Found(name) => name,
            NextInstallPlan::Exhausted => {
                return error::NoUnapprovedInstallPlanSnafu {
                    namespace: self.namespace.as_str(),
                }
                .fail()
            }
        };
        self.install_plan_rows()
            .await?
            .into_iter()
            .find(|row| row.name == name)
            .and_then(|row| row.csv)
            .context(error::MissingFieldSnafu {
                field: "CSV",
                what: format!("install plan '{}'", name),
            })
    }

    /// The install plans currently listed in the namespace.
    pub async fn install_plan_rows(&self) -> Result<Vec<InstallPlanRow>> {
        let listing = self
            .runner
            .exec(&self.namespace, &["get", "installplan"])
            .await?;
        Ok(parse_listing(&listing))
    }

    /// Seed the tracker from the cluster's approval state. Used when this process did not drive
    /// the earlier steps itself.
    pub async fn restore_tracker(&mut self) -> Result<()> {
        let rows = self.install_plan_rows().await?;
        self.tracker.restore(&rows);
        Ok(())
    }

    /// Re-read the example resources from the tracked CSV, replacing the previous ones.
    pub async fn refresh_example_resources(&mut self) -> Result<&ExampleResources> {
        let csv = self
            .csv_name
            .as_ref()
            .context(error::NotInstalledSnafu {
                action: "read example resources",
            })?;
        self.example_resources =
            extract_example_resources(&self.runner, csv, &self.namespace).await?;
        Ok(&self.example_resources)
    }

    /// Point this lifecycle at an already installed CSV, e.g. one installed by another process.
    pub fn set_csv_name(&mut self, csv: CsvName) {
        self.csv_name = Some(csv);
    }

    pub fn set_deployment_name<S: Into<String>>(&mut self, deployment: S) {
        self.deployment_name = Some(deployment.into());
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn deployment_name(&self) -> Option<&str> {
        self.deployment_name.as_deref()
    }

    pub fn csv_name(&self) -> Option<&CsvName> {
        self.csv_name.as_ref()
    }

    pub fn example_resources(&self) -> &ExampleResources {
        &self.example_resources
    }

    pub fn tracker(&self) -> &InstallPlanTracker {
        &self.tracker
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn settings(&self) -> &OlmSettings {
        &self.settings
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn waiter(&self) -> &W {
        &self.waiter
    }

    fn polling(&self, timeout: Duration) -> Polling {
        Polling::new(self.settings.poll_interval(), timeout)
    }
}

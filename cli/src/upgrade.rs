use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use model::{DeploymentWaiter, KubeOlmLifecycle};

/// The upgrade subcommand approves the install plan created by the last `update-subscription` and
/// waits for the operator deployment of the new version to become ready.
#[derive(Debug, Parser)]
pub(crate) struct Upgrade {}

impl Upgrade {
    pub(crate) async fn run(self, mut olm: KubeOlmLifecycle) -> Result<()> {
        let namespace = olm.namespace().to_string();
        let prefix = olm.settings().deployment_name_prefix.clone();
        let deployment = olm
            .waiter()
            .deployment_name_by_prefix(&namespace, &prefix)
            .await
            .context("Unable to look up the operator deployment")?
            .context(format!(
                "No deployment with prefix '{}' in namespace '{}'",
                prefix, namespace
            ))?;
        olm.set_deployment_name(deployment.as_str());

        olm.restore_tracker()
            .await
            .context("Unable to read install plans")?;
        let pending = olm
            .pending_operator_version()
            .await
            .context("No install plan is waiting for approval")?;
        info!("Upgrading to '{}'", pending);

        let approved = olm.upgrade().await.context("Unable to upgrade the operator")?;
        println!("Approved install plan '{}' for '{}'.", approved, pending);
        if let Some(deployment) = olm.deployment_name() {
            println!("Operator '{}' is ready.", deployment);
        }
        Ok(())
    }
}

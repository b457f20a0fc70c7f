use crate::subscription_args::SubscriptionArgs;
use anyhow::{Context, Result};
use clap::Parser;
use model::KubeOlmLifecycle;

/// The install subcommand creates the operator group and the subscription, approves the first
/// install plan for `Manual` approval and waits until the operator deployment is ready.
#[derive(Debug, Parser)]
pub(crate) struct Install {
    #[clap(flatten)]
    subscription: SubscriptionArgs,
}

impl Install {
    pub(crate) async fn run(self, mut olm: KubeOlmLifecycle) -> Result<()> {
        let request = self.subscription.request(&olm)?;
        olm.create(request).await.context(format!(
            "Unable to install the operator in namespace '{}'. (Some artifacts may be left behind)",
            olm.namespace()
        ))?;

        println!(
            "Operator '{}' is ready in namespace '{}' from CSV '{}'.",
            olm.deployment_name().unwrap_or_default(),
            olm.namespace(),
            olm.csv_name().map(ToString::to_string).unwrap_or_default()
        );
        let kinds = olm.example_resources().kinds().collect::<Vec<_>>();
        if !kinds.is_empty() {
            println!("Example resources: {}", kinds.join(", "));
        }
        Ok(())
    }
}

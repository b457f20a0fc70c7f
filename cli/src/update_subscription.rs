use crate::subscription_args::SubscriptionArgs;
use anyhow::{Context, Result};
use clap::Parser;
use model::{KubeOlmLifecycle, SubscriptionDirector};

/// Points the subscription at a new channel or version. With `Manual` approval OLM creates a new
/// install plan that `upgrade` approves.
#[derive(Debug, Parser)]
pub(crate) struct UpdateSubscription {
    #[clap(flatten)]
    subscription: SubscriptionArgs,
}

impl UpdateSubscription {
    pub(crate) async fn run(self, mut olm: KubeOlmLifecycle) -> Result<()> {
        let request = self.subscription.request(&olm)?;
        olm.update_subscription(request)
            .await
            .context("Unable to update the subscription")?;

        let summary = SubscriptionDirector::new(olm.settings())
            .read_back(olm.runner(), olm.namespace())
            .await
            .context("Unable to read the subscription back")?;
        println!(
            "{}",
            serde_json::to_string_pretty(&summary)
                .context("Could not create string from subscription.")?
        );
        Ok(())
    }
}

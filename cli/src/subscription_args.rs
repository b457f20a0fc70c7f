use anyhow::{format_err, Result};
use clap::Parser;
use model::{ApprovalMode, KubeOlmLifecycle, SubscriptionRequest};

/// Subscription options shared by `install` and `update-subscription`.
#[derive(Debug, Parser)]
pub(crate) struct SubscriptionArgs {
    /// The operator version to start from. Defaults to `OLMTEST_LATEST_RELEASE_VERSION`.
    #[clap(long = "version")]
    version: Option<String>,

    /// The catalog channel to subscribe to.
    #[clap(long = "channel", default_value = "stable")]
    channel: String,

    /// Install plan approval strategy [Automatic|Manual].
    #[clap(long = "approval", default_value = "Automatic")]
    approval: ApprovalMode,

    /// Additional operator environment variables as `NAME=VALUE`. May be repeated.
    #[clap(long = "env")]
    env: Vec<String>,
}

impl SubscriptionArgs {
    pub(crate) fn request(&self, olm: &KubeOlmLifecycle) -> Result<SubscriptionRequest> {
        let mut request = olm
            .subscription_request()
            .version(self.version.as_deref())
            .channel(self.channel.as_str())
            .approval(self.approval);
        for var in &self.env {
            let (name, value) = parse_env(var)?;
            request = request.env(name, value);
        }
        Ok(request)
    }
}

fn parse_env(var: &str) -> Result<(&str, &str)> {
    var.split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| format_err!("Expected NAME=VALUE for '--env', got '{}'", var))
}

use anyhow::{Context, Result};
use clap::Parser;
use model::KubeOlmLifecycle;

/// Approves the next install plan that has not been approved yet, without checking the operator.
#[derive(Debug, Parser)]
pub(crate) struct Approve {}

impl Approve {
    pub(crate) async fn run(self, mut olm: KubeOlmLifecycle) -> Result<()> {
        olm.restore_tracker()
            .await
            .context("Unable to read install plans")?;
        let approved = olm
            .approve_next()
            .await
            .context("Unable to approve an install plan")?;
        println!("Approved install plan '{}'.", approved);
        Ok(())
    }
}

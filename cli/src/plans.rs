use anyhow::{Context, Result};
use clap::Parser;
use model::KubeOlmLifecycle;

/// Lists the install plans in the namespace in the order the cluster prints them.
#[derive(Debug, Parser)]
pub(crate) struct Plans {
    /// Output the install plans in JSON format.
    #[clap(long = "json")]
    json: bool,
}

impl Plans {
    pub(crate) async fn run(self, olm: KubeOlmLifecycle) -> Result<()> {
        let rows = olm
            .install_plan_rows()
            .await
            .context("Unable to list install plans")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&rows)
                    .context("Could not create string from install plans.")?
            );
            return Ok(());
        }
        println!("{:<24} {:<44} {:<10} APPROVED", "NAME", "CSV", "APPROVAL");
        for row in rows {
            println!(
                "{:<24} {:<44} {:<10} {}",
                row.name,
                row.csv.unwrap_or_default(),
                row.approval.unwrap_or_default(),
                row.approved.map(|a| a.to_string()).unwrap_or_default()
            );
        }
        Ok(())
    }
}

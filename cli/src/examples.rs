use anyhow::{Context, Result};
use clap::Parser;
use model::{CsvName, KubeOlmLifecycle};

/// Prints the example resources from a CSV's `alm-examples` annotation as JSON.
#[derive(Debug, Parser)]
pub(crate) struct Examples {
    /// The operator version whose CSV is read. Defaults to `OLMTEST_LATEST_RELEASE_VERSION`.
    #[clap(long = "version")]
    version: Option<String>,

    /// Print only the example of this kind, e.g. `KafkaTopic`.
    #[clap(long = "kind")]
    kind: Option<String>,
}

impl Examples {
    pub(crate) async fn run(self, mut olm: KubeOlmLifecycle) -> Result<()> {
        let settings = olm.settings();
        let csv = CsvName::new(
            &settings.app_bundle_prefix,
            self.version
                .as_deref()
                .unwrap_or(&settings.latest_release_version),
        );
        olm.set_csv_name(csv);
        let examples = olm
            .refresh_example_resources()
            .await
            .context("Unable to read example resources")?;

        let output = match &self.kind {
            Some(kind) => serde_json::to_string_pretty(
                examples
                    .get(kind)
                    .context(format!("The CSV has no example of kind '{}'", kind))?,
            ),
            None => serde_json::to_string_pretty(examples),
        };
        println!(
            "{}",
            output.context("Could not create string from example resources.")?
        );
        Ok(())
    }
}

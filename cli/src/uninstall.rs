use anyhow::{Context, Result};
use clap::Parser;
use model::{CsvName, KubeOlmLifecycle};

/// The uninstall subcommand removes the subscription, the operator group and the CSV and waits for
/// the operator deployment to disappear.
#[derive(Debug, Parser)]
pub(crate) struct Uninstall {
    /// The installed operator version. Defaults to `OLMTEST_LATEST_RELEASE_VERSION`.
    #[clap(long = "version")]
    version: Option<String>,
}

impl Uninstall {
    pub(crate) async fn run(self, mut olm: KubeOlmLifecycle) -> Result<()> {
        let settings = olm.settings();
        let csv = CsvName::new(
            &settings.app_bundle_prefix,
            self.version
                .as_deref()
                .unwrap_or(&settings.latest_release_version),
        );
        olm.set_csv_name(csv);
        olm.delete().await.context(
            "Unable to uninstall the operator from the cluster. (Some artifacts may be left behind)",
        )?;

        println!(
            "The operator was successfully uninstalled from namespace '{}'.",
            olm.namespace()
        );
        Ok(())
    }
}

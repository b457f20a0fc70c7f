/*!

This is the command line interface for installing, upgrading and removing an operator through OLM
while a test suite runs against it.

Each invocation is a single step. Install plans approved by earlier invocations are recognized from
the cluster's approval state, so a test script can call `update-subscription` and `upgrade`
repeatedly to walk through a version sequence.

!*/

mod approve;
mod examples;
mod install;
mod plans;
mod subscription_args;
mod uninstall;
mod update_subscription;
mod upgrade;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;
use model::{KubeDeploymentWaiter, KubeOlmLifecycle, Kubectl, OlmLifecycle, OlmSettings};
use std::path::PathBuf;

/// The command line interface for driving an operator through OLM in a test cluster. Operator
/// package and timing settings are read from `OLMTEST_*` environment variables.
#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Args {
    /// Set logging verbosity [trace|debug|info|warn|error]. If the environment variable `RUST_LOG`
    /// is present, it overrides the default logging behavior. See https://docs.rs/env_logger/latest
    #[clap(long = "log-level", default_value = "info")]
    log_level: LevelFilter,
    /// Path to the kubeconfig file. Also can be passed with the KUBECONFIG environment variable.
    #[clap(long = "kubeconfig")]
    kubeconfig: Option<PathBuf>,
    /// The namespace the operator is installed into.
    #[clap(long = "namespace", short = 'n')]
    namespace: String,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Parser)]
enum Command {
    /// Create the operator group and subscription and wait for the operator to be ready.
    Install(install::Install),
    /// Re-apply the subscription with a new channel or version without approving anything.
    UpdateSubscription(update_subscription::UpdateSubscription),
    /// Approve the install plan created for the new version and wait for the operator.
    Upgrade(upgrade::Upgrade),
    /// Approve the next install plan that has not been approved yet.
    Approve(approve::Approve),
    /// List the install plans in the namespace.
    Plans(plans::Plans),
    /// Print the example resources bundled in a CSV.
    Examples(examples::Examples),
    /// Remove the subscription, operator group and CSV.
    Uninstall(uninstall::Uninstall),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logger(args.log_level);
    if let Err(e) = run(args).await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let settings = OlmSettings::from_env().context("Unable to read OLMTEST_* settings")?;
    let mut kubectl = Kubectl::new(settings.kubectl.as_str());
    let waiter = match &args.kubeconfig {
        Some(path) => {
            kubectl = kubectl.with_kubeconfig(path);
            KubeDeploymentWaiter::new_from_kubeconfig_path(path)
                .await
                .context(format!("Unable to create client from path '{:?}'", path))?
        }
        None => KubeDeploymentWaiter::try_default()
            .await
            .context("Unable to create default client")?,
    };
    let olm: KubeOlmLifecycle = OlmLifecycle::new(kubectl, waiter, settings, args.namespace);
    match args.command {
        Command::Install(install) => install.run(olm).await,
        Command::UpdateSubscription(update) => update.run(olm).await,
        Command::Upgrade(upgrade) => upgrade.run(olm).await,
        Command::Approve(approve) => approve.run(olm).await,
        Command::Plans(plans) => plans.run(olm).await,
        Command::Examples(examples) => examples.run(olm).await,
        Command::Uninstall(uninstall) => uninstall.run(olm).await,
    }
}

/// Initialize the logger with the value passed by `--log-level` (or its default) when the
/// `RUST_LOG` environment variable is not present. If present, the `RUST_LOG` environment variable
/// overrides `--log-level`/`level`.
fn init_logger(level: LevelFilter) {
    match std::env::var(env_logger::DEFAULT_FILTER_ENV).ok() {
        Some(_) => {
            // RUST_LOG exists; env_logger will use it.
            Builder::from_default_env().init();
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate and the library.
            Builder::new()
                .filter(Some(env!("CARGO_CRATE_NAME")), level)
                .filter(Some("model"), level)
                .init();
        }
    }
}

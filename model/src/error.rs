use snafu::Snafu;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// The error type for everything that drives OLM on behalf of a test.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("No install plans located in namespace '{}'", namespace))]
    NoInstallPlans { namespace: String },

    #[snafu(display(
        "There is no install plan left to approve in namespace '{}'",
        namespace
    ))]
    NoUnapprovedInstallPlan { namespace: String },

    #[snafu(display("Install plan '{}' was never observed by the tracker", name))]
    UnknownInstallPlan { name: String },

    #[snafu(display(
        "Unable to upgrade, operator pod of deployment '{}' is not present in namespace '{}'",
        deployment,
        namespace
    ))]
    OperatorPodAbsent {
        deployment: String,
        namespace: String,
    },

    #[snafu(display("Unable to {}, the operator has not been installed yet", action))]
    NotInstalled { action: String },

    #[snafu(display("Failed to create '{}' process: {}", what, source))]
    Process {
        what: String,
        source: std::io::Error,
    },

    #[snafu(display(
        "Command '{}' failed with exit status '{}'\n\n{}",
        command,
        exit_code,
        stderr
    ))]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[snafu(display("Unable to {} '{}': {}", action, path.display(), source))]
    Script {
        action: String,
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Unable to {}: {}", action, source))]
    TempFile {
        action: String,
        source: std::io::Error,
    },

    #[snafu(display("Timed out waiting for {} in namespace '{}'", what, namespace))]
    Timeout { what: String, namespace: String },

    #[snafu(display("Unable to {}: {}", action, source))]
    Kube { action: String, source: kube::Error },

    #[snafu(display("Unable to read kubeconfig: {}", source))]
    ConfigRead {
        source: kube::config::KubeconfigError,
    },

    #[snafu(display("Unable to create client: {}", source))]
    ClientCreateKubeconfig {
        source: kube::config::KubeconfigError,
    },

    #[snafu(display("Unable to {}: {}", action, source))]
    SerdeYaml {
        action: String,
        source: serde_yaml::Error,
    },

    #[snafu(display("Unable to {}: {}", action, source))]
    Json {
        action: String,
        source: serde_json::Error,
    },

    #[snafu(display("Missing '{}' in {}", field, what))]
    MissingField { field: String, what: String },

    #[snafu(display("Error reading settings from the environment: {}", source))]
    Settings { source: envy::Error },
}

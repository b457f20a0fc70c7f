use crate::test_settings::TestSettings;
use anyhow::{format_err, Result};
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::ListParams,
    config::{KubeConfigOptions, Kubeconfig},
    Api, Client, Config,
};
use model::{DeploymentWaiter, KubeDeploymentWaiter, Kubectl, Polling};
use std::convert::TryInto;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tempfile::TempDir;

pub const KUBECONFIG_FILENAME: &str = "kubeconfig.yaml";

/// The namespace OLM's own components are installed into.
pub const OLM_NAMESPACE: &str = "olm";

const OLM_RELEASES: &str = "https://github.com/operator-framework/operator-lifecycle-manager/releases/download";

/// Represents a `kind` cluster. The `Drop` trait is implemented deleting the `kind` cluster when it
/// goes out of scope.
#[derive(Debug)]
pub struct Cluster {
    name: String,
    kubeconfig_dir: TempDir,
}

impl Cluster {
    /// Creates a `Cluster` while initializing a kind cluster. If a cluster named `cluster_name`
    ///  already exists, it will be deleted.
    pub fn new(cluster_name: &str) -> Result<Cluster> {
        let kubeconfig_dir = TempDir::new()?;
        Self::delete_kind_cluster(cluster_name)?;
        Self::create_kind_cluster(
            cluster_name,
            &kubeconfig_dir.path().join(KUBECONFIG_FILENAME),
        )?;
        Ok(Self {
            name: cluster_name.into(),
            kubeconfig_dir,
        })
    }

    /// Returns the path to the kubeconfig file in the `TempDir` created for the cluster.
    pub fn kubeconfig(&self) -> PathBuf {
        self.kubeconfig_dir.path().join(KUBECONFIG_FILENAME)
    }

    /// Create the k8s client for the cluster.
    pub async fn k8s_client(&self) -> Result<Client> {
        let kubeconfig = Kubeconfig::read_from(self.kubeconfig())?;
        let config =
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
        Ok(config.try_into()?)
    }

    /// A `kubectl` runner pointed at this cluster.
    pub fn kubectl(&self) -> Kubectl {
        Kubectl::new(TestSettings::kubectl_path()).with_kubeconfig(self.kubeconfig())
    }

    /// A deployment waiter talking to this cluster.
    pub async fn deployment_waiter(&self) -> Result<KubeDeploymentWaiter> {
        Ok(KubeDeploymentWaiter::new(self.k8s_client().await?))
    }

    /// Installs the OLM release named by `OLMTEST_SELFTEST_OLM_VERSION` and waits for the OLM
    /// operator and its catalog operator to become ready.
    pub async fn install_olm(&self, timeout: Duration) -> Result<()> {
        let release = format!("{}/{}", OLM_RELEASES, TestSettings::olm_version());
        for manifest in ["crds.yaml", "olm.yaml"] {
            run(
                Command::new(TestSettings::kubectl_path())
                    .arg("--kubeconfig")
                    .arg(self.kubeconfig())
                    .arg("apply")
                    .arg("--server-side")
                    .arg("-f")
                    .arg(format!("{}/{}", release, manifest)),
                "kubectl apply",
            )?;
        }
        let waiter = self.deployment_waiter().await?;
        let polling = Polling::new(Duration::from_secs(2), timeout);
        for deployment in ["olm-operator", "catalog-operator"] {
            waiter
                .wait_for_deployment_ready(OLM_NAMESPACE, deployment, 1, polling)
                .await?;
        }
        Ok(())
    }

    /// Returns `true` if a pod whose name starts with `prefix` is in the running state.
    pub async fn is_operator_running(&self, namespace: &str, prefix: &str) -> Result<bool> {
        let client = self.k8s_client().await?;
        let pod_api = Api::<Pod>::namespaced(client, namespace);
        let pods = pod_api.list(&ListParams::default()).await?;
        for pod in pods {
            let name = pod.metadata.name.clone().unwrap_or_default();
            if name.starts_with(prefix)
                && pod.status.unwrap_or_default().phase.unwrap_or_default() == "Running"
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Wait until a pod whose name starts with `prefix` is running.
    pub async fn wait_for_operator(
        &self,
        namespace: &str,
        prefix: &str,
        timeout: Duration,
    ) -> Result<()> {
        tokio::time::timeout(timeout, async {
            while !self.is_operator_running(namespace, prefix).await? {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            Ok::<(), anyhow::Error>(())
        })
        .await
        .map_err(|_| {
            format_err!(
                "no pod with prefix '{}' was running in namespace '{}' after {:?}",
                prefix,
                namespace,
                timeout
            )
        })?
    }

    fn create_kind_cluster(name: &str, kubeconfig: &Path) -> Result<()> {
        run(
            Command::new(TestSettings::kind_path())
                .arg("--kubeconfig")
                .arg(kubeconfig.to_str().ok_or_else(|| {
                    format_err!("non utf-8 path '{}'", kubeconfig.to_string_lossy())
                })?)
                .arg("create")
                .arg("cluster")
                .arg("--name")
                .arg(name),
            "kind create cluster",
        )
    }

    fn delete_kind_cluster(name: &str) -> Result<()> {
        run(
            Command::new(TestSettings::kind_path())
                .arg("delete")
                .arg("cluster")
                .arg("--name")
                .arg(name),
            "kind delete cluster",
        )
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        if let Err(e) = Self::delete_kind_cluster(&self.name) {
            eprintln!("unable to delete kind cluster '{}': {}", self.name, e)
        }
    }
}

fn run(command: &mut Command, what: &str) -> Result<()> {
    let output = command.output()?;
    if !output.status.success() {
        return Err(format_err!(
            "'{}' failed with exit status '{}'\n\n{}\n\n{}",
            what,
            output.status.code().unwrap_or(1),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        ));
    }
    Ok(())
}

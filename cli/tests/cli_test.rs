#![cfg(feature = "integ")]
use assert_cmd::Command;
use selftest::Cluster;
use tokio::time::Duration;

/// The amount of time we will wait for OLM and the operator to run before we consider the selftest
/// a failure. This can be a very long time on resource constrained machines.
const POD_TIMEOUT: Duration = Duration::from_secs(600);
const NAMESPACE: &str = "olmtest-cli";

/// We will test:
/// `olmtest install` (manual approval)
/// `olmtest plans`
/// `olmtest update-subscription`
/// `olmtest upgrade`
/// `olmtest examples`
/// `olmtest uninstall`

fn olmtest(cluster: &Cluster) -> Command {
    let mut cmd = Command::cargo_bin("olmtest").unwrap();
    cmd.env("OLMTEST_SOURCE_NAME", "operatorhubio-catalog").args(&[
        "--kubeconfig",
        cluster.kubeconfig().to_str().unwrap(),
        "--namespace",
        NAMESPACE,
    ]);
    cmd
}

#[tokio::test]
async fn manual_upgrade_from_the_command_line() {
    let cluster = Cluster::new("olmtest-cli").unwrap();
    cluster.install_olm(POD_TIMEOUT).await.unwrap();
    std::process::Command::new("kubectl")
        .arg("--kubeconfig")
        .arg(cluster.kubeconfig())
        .args(["create", "namespace", NAMESPACE])
        .status()
        .unwrap();

    olmtest(&cluster)
        .args(&["install", "--version", "0.37.0", "--approval", "Manual"])
        .assert()
        .success();
    cluster
        .wait_for_operator(NAMESPACE, "strimzi-cluster-operator", POD_TIMEOUT)
        .await
        .unwrap();

    let summary = olmtest(&cluster)
        .args(&[
            "update-subscription",
            "--version",
            "0.38.0",
            "--approval",
            "Manual",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8_lossy(&summary).contains("strimzi-cluster-operator.v0.38.0"));

    olmtest(&cluster).args(&["upgrade"]).assert().success();

    let plans = olmtest(&cluster)
        .args(&["plans", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let plans: serde_json::Value = serde_json::from_slice(&plans).unwrap();
    let plans = plans.as_array().unwrap();
    assert_eq!(plans.len(), 2);
    assert!(plans.iter().all(|plan| plan["approved"] == true));

    olmtest(&cluster)
        .args(&["examples", "--version", "0.38.0", "--kind", "KafkaTopic"])
        .assert()
        .success();

    olmtest(&cluster)
        .args(&["uninstall", "--version", "0.38.0"])
        .assert()
        .success();
}

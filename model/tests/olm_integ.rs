#![cfg(feature = "integ")]
//! Installs the operator through a real OLM in a `kind` cluster, upgrades it with manual approval
//! and removes it again.

use model::{ApprovalMode, CommandRunner, LifecycleState, OlmLifecycle, OlmSettings};
use selftest::Cluster;
use std::time::Duration;

/// Pulling OLM, the catalog and the operator image can take a long time on a fresh cluster.
const OLM_TIMEOUT: Duration = Duration::from_secs(600);
const NAMESPACE: &str = "olm-integ";

#[tokio::test]
async fn manual_install_and_upgrade() {
    let cluster = Cluster::new("olm-integ").unwrap();
    cluster.install_olm(OLM_TIMEOUT).await.unwrap();

    let settings = OlmSettings {
        source_name: "operatorhubio-catalog".to_string(),
        ..OlmSettings::from_env().unwrap()
    };
    let mut olm = OlmLifecycle::new(
        cluster.kubectl(),
        cluster.deployment_waiter().await.unwrap(),
        settings,
        NAMESPACE,
    );
    olm.runner()
        .exec(NAMESPACE, &["create", "namespace", NAMESPACE])
        .await
        .unwrap();

    let request = olm
        .subscription_request()
        .version(Some("0.37.0"))
        .approval(ApprovalMode::Manual);
    olm.create(request).await.unwrap();
    assert_eq!(olm.state(), LifecycleState::Ready);
    assert!(cluster
        .is_operator_running(NAMESPACE, olm.deployment_name().unwrap())
        .await
        .unwrap());
    assert!(olm.example_resources().get("Kafka").is_some());

    let request = olm
        .subscription_request()
        .version(Some("0.38.0"))
        .approval(ApprovalMode::Manual);
    olm.update_subscription(request).await.unwrap();
    let approved = olm.upgrade().await.unwrap();
    assert_eq!(olm.tracker().is_approved(&approved), Some(true));
    assert_eq!(olm.tracker().len(), 2);
    assert!(cluster
        .is_operator_running(NAMESPACE, olm.deployment_name().unwrap())
        .await
        .unwrap());

    olm.delete().await.unwrap();
    assert_eq!(olm.state(), LifecycleState::Deleted);
}

/// Helper macro to avoid retyping the base domain-like name of the OLM API group when creating
/// further string constants from it. When given no parameters, this returns the group name. When
/// given a string literal parameter it adds `/parameter` to the end.
macro_rules! olm {
    () => {
        "operators.coreos.com"
    };
    ($s:literal) => {
        concat!(olm!(), "/", $s)
    };
}

// API versions of the OLM objects we render
pub const OPERATOR_GROUP_API_VERSION: &str = olm!("v1");
pub const SUBSCRIPTION_API_VERSION: &str = olm!("v1alpha1");

// Install plans
/// Every install plan created by the package manager carries this name prefix.
pub const INSTALL_PLAN_PREFIX: &str = "install-";
/// Returned in place of a plan name when every tracked install plan has been approved. It can never
/// collide with a real plan name because it lacks [`INSTALL_PLAN_PREFIX`].
pub const NO_MORE_NON_USED_INSTALL_PLANS: &str = "NoMoreNonUsedInstallPlans";
/// The JSON patch that flips `spec.approved` on an install plan.
pub const APPROVE_PATCH: &str = r#"[{"op": "add", "path": "/spec/approved", "value": true}]"#;

// CSV
pub const ALM_EXAMPLES_ANNOTATION: &str = "alm-examples";
pub const CSV_PHASE_JSONPATH: &str = "jsonpath={.status.phase}";
/// The phase of a CSV whose operator deployment has been rolled out.
pub const CSV_PHASE_SUCCEEDED: &str = "Succeeded";

// Template placeholders
pub const OPERATOR_NAMESPACE_PLACEHOLDER: &str = "${OPERATOR_NAMESPACE}";

// Operator environment variables recognized in the subscription template
pub const ENV_RECONCILIATION_INTERVAL: &str = "STRIMZI_FULL_RECONCILIATION_INTERVAL_MS";
pub const ENV_OPERATION_TIMEOUT: &str = "STRIMZI_OPERATION_TIMEOUT_MS";
pub const ENV_FEATURE_GATES: &str = "STRIMZI_FEATURE_GATES";

/// Channel used when the caller does not ask for one.
pub const DEFAULT_CHANNEL: &str = "stable";

/// Prefix for the environment variables read into `OlmSettings`.
pub const SETTINGS_ENV_PREFIX: &str = "OLMTEST_";

#[test]
fn olm_constants_macro_test() {
    assert_eq!("operators.coreos.com", olm!());
    assert_eq!("operators.coreos.com/v1", OPERATOR_GROUP_API_VERSION);
    assert_eq!("operators.coreos.com/v1alpha1", SUBSCRIPTION_API_VERSION);
    assert!(!NO_MORE_NON_USED_INSTALL_PLANS.starts_with(INSTALL_PLAN_PREFIX));
}

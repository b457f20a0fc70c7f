use crate::command::CommandRunner;
use crate::constants::OPERATOR_NAMESPACE_PLACEHOLDER;
use crate::error::Result;
use log::info;

const OPERATOR_GROUP_TEMPLATE: &str = include_str!("../templates/operator-group.yaml");

/// The operator group manifest scoped to `namespace`.
pub fn operator_group_manifest(namespace: &str) -> String {
    OPERATOR_GROUP_TEMPLATE.replace(OPERATOR_NAMESPACE_PLACEHOLDER, namespace)
}

/// Apply an operator group in `namespace` so subscriptions there become visible to OLM. Applying it
/// again is harmless.
pub async fn create_operator_group<R>(runner: &R, namespace: &str) -> Result<()>
where
    R: CommandRunner,
{
    info!("Creating operator group in namespace '{}'", namespace);
    runner
        .apply(namespace, &operator_group_manifest(namespace))
        .await?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn namespace_is_substituted_everywhere() {
        let manifest = operator_group_manifest("kafka-tests");
        assert!(!manifest.contains(OPERATOR_NAMESPACE_PLACEHOLDER));
        assert_eq!(manifest.matches("kafka-tests").count(), 2);
        let parsed: serde_json::Value = serde_yaml::from_str(&manifest).unwrap();
        assert_eq!(parsed["kind"], "OperatorGroup");
        assert_eq!(
            parsed["apiVersion"],
            crate::constants::OPERATOR_GROUP_API_VERSION
        );
    }
}

use super::tracker::{InstallPlanTracker, NextInstallPlan};
use crate::command::CommandRunner;
use crate::constants::APPROVE_PATCH;
use crate::error::{self, Result};
use log::info;
use snafu::ResultExt;
use std::io::Write;

/// Approves install plans for the `Manual` approval strategy.
///
/// The cluster's patch endpoint is only reachable through the CLI here, so the approval is a
/// generated one-shot shell script that the [`CommandRunner`] executes.
pub struct InstallPlanApprover<'a, R: CommandRunner> {
    runner: &'a R,
    namespace: &'a str,
}

impl<'a, R: CommandRunner> InstallPlanApprover<'a, R> {
    pub fn new(runner: &'a R, namespace: &'a str) -> Self {
        Self { runner, namespace }
    }

    /// Approve the tracker's next unapproved plan and record the approval. Returns the name of the
    /// approved plan. Exactly one plan is approved per call.
    pub async fn approve(&self, tracker: &mut InstallPlanTracker) -> Result<String> {
        let name = match tracker.next_unapproved() {
            NextInstallPlan::Found(name) => name,
            NextInstallPlan::Exhausted => {
                return error::NoUnapprovedInstallPlanSnafu {
                    namespace: self.namespace,
                }
                .fail()
            }
        };

        info!("Approving install plan '{}'", name);
        let script = patch_script(&self.runner.cmd(), &name, self.namespace);
        let mut file = tempfile::Builder::new()
            .prefix("installplan_patch")
            .suffix(".sh")
            .tempfile()
            .context(error::TempFileSnafu {
                action: "create install plan patch script",
            })?;
        file.write_all(script.as_bytes())
            .context(error::ScriptSnafu {
                action: "write install plan patch script",
                path: file.path().to_path_buf(),
            })?;
        self.runner.run_script(file.path()).await?;

        tracker.mark_approved(&name)?;
        info!("Install plan '{}' approved", name);
        Ok(name)
    }
}

/// The script that sets `spec.approved` on install plan `name`.
pub(crate) fn patch_script(cmd: &str, name: &str, namespace: &str) -> String {
    format!(
        "#!/bin/bash\n{} patch installplan {} --type json --patch '{}' -n {}\n",
        cmd, name, APPROVE_PATCH, namespace
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::command::mock::MockRunner;
    use crate::Error;

    #[test]
    fn script_is_a_single_patch_invocation() {
        assert_eq!(
            patch_script("kubectl", "install-abc123", "test"),
            "#!/bin/bash\nkubectl patch installplan install-abc123 --type json --patch \
             '[{\"op\": \"add\", \"path\": \"/spec/approved\", \"value\": true}]' -n test\n"
        );
    }

    #[tokio::test]
    async fn approves_next_plan_and_marks_it() {
        let runner = MockRunner::default();
        let mut tracker = InstallPlanTracker::new();
        tracker.observe("install-aaa csv Manual false\ninstall-bbb csv Manual false");

        let approver = InstallPlanApprover::new(&runner, "test");
        assert_eq!(approver.approve(&mut tracker).await.unwrap(), "install-aaa");
        assert_eq!(tracker.is_approved("install-aaa"), Some(true));
        assert_eq!(tracker.is_approved("install-bbb"), Some(false));

        let scripts = runner.scripts();
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0].contains("patch installplan install-aaa"));
        assert!(scripts[0].ends_with("-n test\n"));
    }

    #[tokio::test]
    async fn nothing_left_to_approve() {
        let runner = MockRunner::default();
        let mut tracker = InstallPlanTracker::new();
        tracker.observe("install-aaa csv Manual false");
        tracker.mark_approved("install-aaa").unwrap();

        let err = InstallPlanApprover::new(&runner, "test")
            .approve(&mut tracker)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoUnapprovedInstallPlan { namespace } if namespace == "test"));
        assert!(runner.scripts().is_empty());
    }

    #[tokio::test]
    async fn failed_patch_leaves_the_plan_unapproved() {
        let runner = MockRunner::default();
        runner.fail_script(
            r#"Error from server (Forbidden): installplans.operators.coreos.com "install-aaa" is forbidden"#,
        );
        let mut tracker = InstallPlanTracker::new();
        tracker.observe("install-aaa csv Manual false");
        let approver = InstallPlanApprover::new(&runner, "test");

        let err = approver.approve(&mut tracker).await.unwrap_err();
        assert!(matches!(err, Error::CommandFailed { stderr, .. } if stderr.contains("Forbidden")));
        assert_eq!(tracker.is_approved("install-aaa"), Some(false));
        assert_eq!(runner.scripts().len(), 1);
        assert_eq!(
            tracker.next_unapproved(),
            NextInstallPlan::Found("install-aaa".to_string())
        );

        // The next call approves the same plan again.
        assert_eq!(approver.approve(&mut tracker).await.unwrap(), "install-aaa");
        assert_eq!(tracker.is_approved("install-aaa"), Some(true));
    }
}

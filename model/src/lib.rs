/*!

This library drives an operator's install, upgrade and teardown through the Operator Lifecycle
Manager (OLM) for integration tests.

The interesting part is install plan tracking: a [`InstallPlanTracker`] remembers every install plan
seen during a test run, so that each step of a manual upgrade sequence approves exactly the plan
created for it and never one consumed by an earlier step. [`OlmLifecycle`] ties the tracker together
with the [`SubscriptionDirector`], the [`InstallPlanApprover`], a [`DeploymentWaiter`] and the
example resource extraction.

All cluster CLI work goes through the [`CommandRunner`] trait, and all deployment checks through the
[`DeploymentWaiter`] trait, so both can be replaced in tests.

!*/

#![deny(
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::panicking_unwrap,
    clippy::unwrap_in_result,
    clippy::unwrap_used
)]

pub use command::{AllowAbsent, CommandRunner, Kubectl};
pub use csv::{csv_phase, extract_example_resources, CsvName, ExampleResources};
pub use error::{Error, Result};
pub use install_plan::{
    Discovery, InstallPlan, InstallPlanApprover, InstallPlanRow, InstallPlanTracker,
    NextInstallPlan,
};
pub use lifecycle::{KubeOlmLifecycle, LifecycleState, OlmLifecycle};
pub use readiness::{DeploymentWaiter, KubeDeploymentWaiter};
pub use settings::{InstallPlanOrdering, OlmSettings};
pub use subscription::{
    ApprovalMode, Subscription, SubscriptionDirector, SubscriptionRequest, SubscriptionSummary,
};
pub use wait::{wait_for, Polling};

mod command;
pub mod constants;
mod csv;
mod error;
pub mod install_plan;
mod lifecycle;
pub mod operator_group;
pub mod readiness;
mod settings;
mod subscription;
mod wait;

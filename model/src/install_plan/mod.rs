pub use approver::InstallPlanApprover;
pub use listing::{parse_json_listing_by_creation, parse_listing, InstallPlanRow};
pub use tracker::{Discovery, InstallPlan, InstallPlanTracker, NextInstallPlan};

mod approver;
mod listing;
mod tracker;

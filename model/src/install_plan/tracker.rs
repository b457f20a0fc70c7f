use super::listing::{parse_listing, InstallPlanRow};
use crate::constants::{INSTALL_PLAN_PREFIX, NO_MORE_NON_USED_INSTALL_PLANS};
use crate::error::{self, Result};
use log::{debug, info};
use snafu::OptionExt;
use std::fmt::{Display, Formatter};

/// An install plan as far as the tracker is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    pub name: String,
    pub approved: bool,
}

/// The install plan the next approval should target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextInstallPlan {
    Found(String),
    /// Every tracked plan has already been approved.
    Exhausted,
}

impl Display for NextInstallPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NextInstallPlan::Found(name) => write!(f, "{}", name),
            NextInstallPlan::Exhausted => write!(f, "{}", NO_MORE_NON_USED_INSTALL_PLANS),
        }
    }
}

/// The outcome of observing a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// The tracker holds at least one plan. `new` lists the plans this observation added, in
    /// discovery order, and may be empty.
    Found { new: Vec<String> },
    /// The tracker is still empty: the package manager has not created any plan yet.
    Empty,
}

/// # Install Plan Tracker
///
/// Remembers every install plan seen during a test run and whether this process approved it.
/// Plans are kept in discovery order and are never removed, so a plan consumed by an earlier
/// install or upgrade step is never handed out again.
///
/// The next plan to approve is the first plan in discovery order that is not approved yet. This
/// relies on the listing printing plans in creation order, stably across calls. Where that does not
/// hold, discover plans with
/// [`InstallPlanOrdering::CreationTimestamp`](crate::InstallPlanOrdering::CreationTimestamp).
///
/// One tracker belongs to one lifecycle (one test suite run). All mutation goes through `&mut self`.
#[derive(Debug, Clone, Default)]
pub struct InstallPlanTracker {
    plans: Vec<InstallPlan>,
}

impl InstallPlanTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the tabular output of `get installplan` and start tracking every plan not seen before.
    pub fn observe(&mut self, listing: &str) -> Discovery {
        self.observe_names(parse_listing(listing).into_iter().map(|row| row.name))
    }

    /// Start tracking every name in `names` that carries the install plan prefix and is not tracked
    /// yet. New plans start out unapproved.
    pub fn observe_names<I, S>(&mut self, names: I) -> Discovery
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut new = Vec::new();
        for name in names {
            let name = name.as_ref();
            if !name.starts_with(INSTALL_PLAN_PREFIX) || self.contains(name) {
                continue;
            }
            info!(
                "Install plan '{}' has not been used yet, it will be used by the next approval",
                name
            );
            self.plans.push(InstallPlan {
                name: name.to_string(),
                approved: false,
            });
            new.push(name.to_string());
        }
        if self.plans.is_empty() {
            Discovery::Empty
        } else {
            Discovery::Found { new }
        }
    }

    /// Rebuild tracker state from the cluster's view, taking the `APPROVED` column at face value.
    /// Only meant for a process that did not observe the earlier steps itself, e.g. a one-shot CLI
    /// invocation. Plans already tracked are left alone.
    pub fn restore(&mut self, rows: &[InstallPlanRow]) {
        for row in rows {
            if self.contains(&row.name) {
                continue;
            }
            self.plans.push(InstallPlan {
                name: row.name.clone(),
                approved: row.approved.unwrap_or(false),
            });
        }
    }

    /// The first plan, in discovery order, that has not been approved.
    pub fn next_unapproved(&self) -> NextInstallPlan {
        let next = self
            .plans
            .iter()
            .find(|plan| !plan.approved)
            .map(|plan| NextInstallPlan::Found(plan.name.clone()))
            .unwrap_or(NextInstallPlan::Exhausted);
        debug!("Non-used install plan is {}", next);
        next
    }

    /// Record that `name` has been approved on the cluster. `name` must have come from
    /// [`InstallPlanTracker::next_unapproved`]; an unknown name is an error.
    pub fn mark_approved(&mut self, name: &str) -> Result<()> {
        let plan = self
            .plans
            .iter_mut()
            .find(|plan| plan.name == name)
            .context(error::UnknownInstallPlanSnafu { name })?;
        plan.approved = true;
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plans.iter().any(|plan| plan.name == name)
    }

    pub fn is_approved(&self, name: &str) -> Option<bool> {
        self.plans
            .iter()
            .find(|plan| plan.name == name)
            .map(|plan| plan.approved)
    }

    /// Tracked plans in discovery order.
    pub fn plans(&self) -> &[InstallPlan] {
        &self.plans
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

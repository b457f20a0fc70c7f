use crate::error::{self, Result};
use log::{info, trace};
use std::future::Future;
use std::time::Duration;

/// How often a condition is checked and for how long before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Polling {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Polling {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Check `condition` every `polling.interval` until it returns `true`. Errors from `condition`
/// abort the wait immediately; running out of time is a `Timeout` error naming `what` and
/// `namespace`.
pub async fn wait_for<F, Fut>(
    what: &str,
    namespace: &str,
    polling: Polling,
    mut condition: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    info!("Waiting for {} in namespace '{}'", what, namespace);
    let poll = async {
        loop {
            if condition().await? {
                return Ok(());
            }
            trace!("{} is not there yet, checking again in {:?}", what, polling.interval);
            tokio::time::sleep(polling.interval).await;
        }
    };
    match tokio::time::timeout(polling.timeout, poll).await {
        Ok(result) => result,
        Err(_) => error::TimeoutSnafu { what, namespace }.fail(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FAST: Polling = Polling {
        interval: Duration::from_millis(1),
        timeout: Duration::from_millis(500),
    };

    #[tokio::test]
    async fn condition_is_polled_until_true() {
        let checks = AtomicUsize::new(0);
        let counter = &checks;
        wait_for("the third check", "test", FAST, move || async move {
            Ok(counter.fetch_add(1, Ordering::SeqCst) == 2)
        })
        .await
        .unwrap();
        assert_eq!(checks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn never_true_times_out() {
        let polling = Polling::new(Duration::from_millis(1), Duration::from_millis(20));
        let err = wait_for("nothing", "test", polling, || async { Ok(false) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { what, namespace } if what == "nothing" && namespace == "test"));
    }

    #[tokio::test]
    async fn condition_errors_abort() {
        let checks = AtomicUsize::new(0);
        let counter = &checks;
        let err = wait_for("a broken check", "test", FAST, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            error::NoInstallPlansSnafu { namespace: "test" }.fail()
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::NoInstallPlans { .. }));
        assert_eq!(checks.load(Ordering::SeqCst), 1);
    }
}

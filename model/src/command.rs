use crate::error::{self, Error, Result};
use async_trait::async_trait;
use log::{debug, trace};
use snafu::{ensure, ResultExt};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// The narrow contract through which all cluster CLI work happens. Everything that drives OLM
/// talks to the cluster through this trait so it can be replaced with a scripted mock in tests.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// The CLI invocation prefix used when composing shell scripts, e.g. `kubectl`.
    fn cmd(&self) -> String;

    /// Run the CLI with `args` in `namespace` and return its stdout. A non-zero exit status is an
    /// error.
    async fn exec(&self, namespace: &str, args: &[&str]) -> Result<String>;

    /// Apply `manifest` (YAML or JSON) in `namespace` and return the CLI output.
    async fn apply(&self, namespace: &str, manifest: &str) -> Result<String>;

    /// Execute a generated shell script with `bash` and return its stdout.
    async fn run_script(&self, script: &Path) -> Result<String>;
}

/// Runs the real cluster CLI binary as a child process.
#[derive(Debug, Clone)]
pub struct Kubectl {
    binary: String,
    kubeconfig: Option<PathBuf>,
}

impl Kubectl {
    pub fn new<S: Into<String>>(binary: S) -> Self {
        Self {
            binary: binary.into(),
            kubeconfig: None,
        }
    }

    /// Point every invocation at an explicit kubeconfig file instead of the CLI's default.
    pub fn with_kubeconfig<P: Into<PathBuf>>(mut self, kubeconfig: P) -> Self {
        self.kubeconfig = Some(kubeconfig.into());
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        if let Some(kubeconfig) = &self.kubeconfig {
            command.arg("--kubeconfig").arg(kubeconfig);
        }
        command
    }

    fn describe(&self, args: &[&str]) -> String {
        format!("{} {}", self.binary, args.join(" "))
    }
}

#[async_trait]
impl CommandRunner for Kubectl {
    fn cmd(&self) -> String {
        match &self.kubeconfig {
            Some(kubeconfig) => format!("{} --kubeconfig {}", self.binary, kubeconfig.display()),
            None => self.binary.clone(),
        }
    }

    async fn exec(&self, namespace: &str, args: &[&str]) -> Result<String> {
        let description = self.describe(args);
        debug!("Running '{}' in namespace '{}'", description, namespace);
        let output = self
            .command()
            .args(args)
            .arg("-n")
            .arg(namespace)
            .output()
            .context(error::ProcessSnafu {
                what: self.binary.clone(),
            })?;
        stdout_or_error(description, output)
    }

    async fn apply(&self, namespace: &str, manifest: &str) -> Result<String> {
        let mut file = tempfile::Builder::new()
            .prefix("olmtest-manifest")
            .suffix(".yaml")
            .tempfile()
            .context(error::TempFileSnafu {
                action: "create manifest file",
            })?;
        file.write_all(manifest.as_bytes())
            .context(error::ScriptSnafu {
                action: "write manifest",
                path: file.path().to_path_buf(),
            })?;
        trace!("Applying manifest:\n{}", manifest);
        let path = file.path().display().to_string();
        self.exec(namespace, &["apply", "-f", &path]).await
    }

    async fn run_script(&self, script: &Path) -> Result<String> {
        let description = format!("bash {}", script.display());
        debug!("Running '{}'", description);
        let output = Command::new("bash")
            .arg(script)
            .output()
            .context(error::ProcessSnafu { what: "bash" })?;
        stdout_or_error(description, output)
    }
}

fn stdout_or_error(command: String, output: Output) -> Result<String> {
    ensure!(
        output.status.success(),
        error::CommandFailedSnafu {
            command,
            exit_code: output.status.code().unwrap_or(1),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    );
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Teardown helpers treat a missing object as already removed.
pub trait AllowAbsent<T> {
    /// Converts a failed command whose stderr reports `NotFound` into `Ok(None)`.
    fn allow_absent(self) -> Result<Option<T>>;
}

impl<T> AllowAbsent<T> for Result<T> {
    fn allow_absent(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(Error::CommandFailed { stderr, .. })
                if stderr.contains("NotFound") || stderr.contains("not found") =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// A `CommandRunner` that answers from a script of canned outputs keyed by the joined
    /// arguments. The last queued output for a key keeps being returned once the queue is drained.
    /// Every call is recorded so tests can assert on what reached the "cluster".
    #[derive(Default)]
    pub(crate) struct MockRunner {
        responses: Mutex<HashMap<String, VecDeque<Result<String>>>>,
        pub(crate) calls: Mutex<Vec<String>>,
        pub(crate) applied: Mutex<Vec<String>>,
        pub(crate) scripts: Mutex<Vec<String>>,
        script_failures: Mutex<VecDeque<String>>,
    }

    impl MockRunner {
        pub(crate) fn respond(&self, args: &str, output: &str) -> &Self {
            self.responses
                .lock()
                .unwrap()
                .entry(args.to_string())
                .or_default()
                .push_back(Ok(output.to_string()));
            self
        }

        /// Replace whatever is queued for `args` with a single output.
        pub(crate) fn set(&self, args: &str, output: &str) -> &Self {
            self.responses
                .lock()
                .unwrap()
                .insert(args.to_string(), VecDeque::from([Ok(output.to_string())]));
            self
        }

        pub(crate) fn fail(&self, args: &str, stderr: &str) -> &Self {
            self.responses
                .lock()
                .unwrap()
                .entry(args.to_string())
                .or_default()
                .push_back(Err(Error::CommandFailed {
                    command: args.to_string(),
                    exit_code: 1,
                    stderr: stderr.to_string(),
                }));
            self
        }

        /// Make the next `run_script` call fail with `stderr`. The script is still recorded.
        pub(crate) fn fail_script(&self, stderr: &str) -> &Self {
            self.script_failures
                .lock()
                .unwrap()
                .push_back(stderr.to_string());
            self
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn applied(&self) -> Vec<String> {
            self.applied.lock().unwrap().clone()
        }

        pub(crate) fn scripts(&self) -> Vec<String> {
            self.scripts.lock().unwrap().clone()
        }

        fn next(&self, key: &str) -> Result<String> {
            let mut responses = self.responses.lock().unwrap();
            let queue = match responses.get_mut(key) {
                Some(queue) => queue,
                None => return Ok(String::new()),
            };
            if queue.len() > 1 {
                return queue.pop_front().unwrap();
            }
            match queue.front().unwrap() {
                Ok(output) => Ok(output.clone()),
                Err(Error::CommandFailed {
                    command,
                    exit_code,
                    stderr,
                }) => Err(Error::CommandFailed {
                    command: command.clone(),
                    exit_code: *exit_code,
                    stderr: stderr.clone(),
                }),
                Err(_) => unreachable!("mock only queues command failures"),
            }
        }
    }

    #[async_trait]
    impl CommandRunner for MockRunner {
        fn cmd(&self) -> String {
            "kubectl".to_string()
        }

        async fn exec(&self, namespace: &str, args: &[&str]) -> Result<String> {
            let key = args.join(" ");
            self.calls
                .lock()
                .unwrap()
                .push(format!("{} -n {}", key, namespace));
            self.next(&key)
        }

        async fn apply(&self, namespace: &str, manifest: &str) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("apply -n {}", namespace));
            self.applied.lock().unwrap().push(manifest.to_string());
            Ok(String::new())
        }

        async fn run_script(&self, script: &Path) -> Result<String> {
            let content = std::fs::read_to_string(script).unwrap();
            self.scripts.lock().unwrap().push(content);
            match self.script_failures.lock().unwrap().pop_front() {
                Some(stderr) => Err(Error::CommandFailed {
                    command: format!("bash {}", script.display()),
                    exit_code: 1,
                    stderr,
                }),
                None => Ok(String::new()),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn failed(stderr: &str) -> Result<String> {
        Err(Error::CommandFailed {
            command: "kubectl delete csv x".to_string(),
            exit_code: 1,
            stderr: stderr.to_string(),
        })
    }

    #[test]
    fn allow_absent_swallows_not_found_only() {
        assert_eq!(
            failed(r#"Error from server (NotFound): clusterserviceversions "x" not found"#)
                .allow_absent()
                .unwrap(),
            None
        );
        assert!(failed("Unable to connect to the server").allow_absent().is_err());
        assert_eq!(
            Ok::<_, Error>("deleted".to_string()).allow_absent().unwrap(),
            Some("deleted".to_string())
        );
    }

    #[test]
    fn kubeconfig_is_part_of_script_command() {
        let kubectl = Kubectl::new("kubectl").with_kubeconfig("/tmp/kubeconfig.yaml");
        assert_eq!(kubectl.cmd(), "kubectl --kubeconfig /tmp/kubeconfig.yaml");
        assert_eq!(Kubectl::new("oc").cmd(), "oc");
    }

    #[tokio::test]
    async fn failing_command_reports_stderr() {
        let kubectl = Kubectl::new("false");
        let err = kubectl.exec("default", &[]).await.unwrap_err();
        assert!(matches!(err, Error::CommandFailed { exit_code: 1, .. }));
    }
}

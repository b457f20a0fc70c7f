use serde::Deserialize;

/// Test settings provides a way to send arguments into the Rust tests using environment variables.
pub(super) struct TestSettings {}

impl TestSettings {
    /// The path or name of the `kind` binary.
    pub(super) fn kind_path() -> &'static str {
        TEST_SETTINGS.kind_path.as_str()
    }

    /// The path or name of the `kubectl` binary.
    pub(super) fn kubectl_path() -> &'static str {
        TEST_SETTINGS.kubectl_path.as_str()
    }

    /// The OLM release installed into selftest clusters.
    pub(super) fn olm_version() -> &'static str {
        TEST_SETTINGS.olm_version.as_str()
    }
}

#[derive(Debug, Deserialize)]
struct Inner {
    /// The path to the [kind] binary. Defaults to `kind` (i.e. by default the kind binary is
    /// expected to be found via `$PATH`).
    ///
    /// # Example
    ///
    /// ```text
    /// OLMTEST_SELFTEST_KIND_PATH=/wherever/kind
    /// ```
    ///
    /// [kind]: https://kind.sigs.k8s.io/
    #[serde(default = "kind")]
    kind_path: String,

    /// The path to the `kubectl` binary. Defaults to `kubectl`.
    #[serde(default = "kubectl")]
    kubectl_path: String,

    /// The OLM release to install, e.g. `OLMTEST_SELFTEST_OLM_VERSION=v0.25.0`.
    #[serde(default = "olm_version")]
    olm_version: String,
}

lazy_static::lazy_static! {
    static ref TEST_SETTINGS: Inner =
        envy::prefixed("OLMTEST_SELFTEST_")
            .from_env::<Inner>()
            .expect("Error parsing TestSettings environment variables");
}

/// We need these to provide defaults for serde.
fn kind() -> String {
    String::from("kind")
}

fn kubectl() -> String {
    String::from("kubectl")
}

fn olm_version() -> String {
    String::from("v0.25.0")
}

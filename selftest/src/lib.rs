/*!

Provides utilities for testing the OLM lifecycle driver against a real cluster using `kind`,
`docker` and `kubectl`. We call this testing modality `selftest` to distinguish it from the operator
test suites that use the driver.

!*/

pub mod cluster;
mod test_settings;

pub use cluster::Cluster;

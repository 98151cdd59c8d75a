use std::fmt;

/// Stable key of one configured sink: `<scope>/<namespace>/<name>`.
///
/// The scope is the cluster name, so two clusters sharing a registry never
/// collide on the same configuration object name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SinkIdentity(String);

impl SinkIdentity {
    pub fn new(scope: &str, namespace: &str, name: &str) -> Self {
        Self(format!("{scope}/{namespace}/{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SinkIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SinkIdentity {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};

/// Correlation id for one invocation.
///
/// Taken from the platform envelope when it carries one (API Gateway
/// request id, queue message id, scheduled event id); otherwise a fresh
/// ULID so local and test invocations still correlate in logs.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct InvocationId(String);

impl InvocationId {
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    #[must_use]
    pub fn from_platform(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Use the platform's id when present and non-empty.
    #[must_use]
    pub fn from_platform_or_new(id: Option<&str>) -> Self {
        match id {
            Some(raw) if !raw.trim().is_empty() => Self(raw.to_string()),
            _ => Self::new(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for InvocationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for InvocationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for InvocationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(InvocationId(s))
    }
}

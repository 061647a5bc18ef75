//! Limiter key generation and handling.

/// A key that uniquely identifies one limiter instance in a counter store.
///
/// The key is composed of a fixed purpose (e.g. `login_rate_limit`) and an
/// optional caller-supplied scope, so several instances of the same limiter
/// (per user, per IP) can share one store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LimiterKey {
    /// What the limiter guards
    pub purpose: String,
    /// Optional partition within the purpose
    pub scope: Option<String>,
}

impl LimiterKey {
    /// Create an unscoped key for a purpose.
    pub fn new(purpose: &str) -> Self {
        Self {
            purpose: purpose.to_string(),
            scope: None,
        }
    }

    /// Create a key for a purpose, partitioned by scope.
    pub fn scoped(purpose: &str, scope: &str) -> Self {
        Self {
            purpose: purpose.to_string(),
            scope: Some(scope.to_string()),
        }
    }

    /// Convert the key to the string used by counter stores.
    pub fn to_string_key(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{}:{}", self.purpose, scope),
            None => self.purpose.clone(),
        }
    }
}

impl std::fmt::Display for LimiterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unscoped_key() {
        let key = LimiterKey::new("login_rate_limit");
        assert_eq!(key.to_string_key(), "login_rate_limit");
        assert_eq!(key.scope, None);
    }

    #[test]
    fn test_scoped_key_to_string() {
        let key = LimiterKey::scoped("upload_rate_limit", "user-42");
        assert_eq!(key.to_string(), "upload_rate_limit:user-42");
    }

    #[test]
    fn test_key_equality() {
        let key1 = LimiterKey::scoped("login_rate_limit", "10.0.0.1");
        let key2 = LimiterKey::scoped("login_rate_limit", "10.0.0.1");
        let key3 = LimiterKey::scoped("login_rate_limit", "10.0.0.2");

        assert_eq!(key1, key2);
        assert_ne!(key1, key3);
    }
}

//! Shared-secret checks for admin actions.
//!
//! Two secrets: the admin key guards sync and link repair, the admin
//! password guards registration and manual snapshots. A secret that is not
//! configured leaves its actions open, with a warning on every use.

use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct AdminGuard {
    admin_key: Option<String>,
    admin_password: Option<String>,
}

impl AdminGuard {
    pub fn new(admin_key: Option<String>, admin_password: Option<String>) -> Self {
        Self {
            admin_key: admin_key.filter(|k| !k.is_empty()),
            admin_password: admin_password.filter(|p| !p.is_empty()),
        }
    }

    pub fn has_key(&self) -> bool {
        self.admin_key.is_some()
    }

    /// Check a caller-supplied admin key.
    pub fn check_key(&self, supplied: Option<&str>) -> bool {
        check(self.admin_key.as_deref(), supplied, "admin key")
    }

    /// Check a caller-supplied admin password.
    pub fn check_password(&self, supplied: Option<&str>) -> bool {
        check(self.admin_password.as_deref(), supplied, "admin password")
    }
}

fn check(expected: Option<&str>, supplied: Option<&str>, what: &str) -> bool {
    match expected {
        Some(expected) => supplied.is_some_and(|s| constant_time_compare(s, expected)),
        None => {
            warn!("No {} configured, allowing unprotected admin action", what);
            true
        }
    }
}

/// Constant-time string comparison
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_allows() {
        let guard = AdminGuard::new(None, Some(String::new()));
        assert!(!guard.has_key());
        assert!(guard.check_key(None));
        assert!(guard.check_password(Some("anything")));
    }

    #[test]
    fn test_configured_key() {
        let guard = AdminGuard::new(Some("s3cret".into()), Some("pw".into()));
        assert!(guard.check_key(Some("s3cret")));
        assert!(!guard.check_key(Some("s3cre")));
        assert!(!guard.check_key(None));
        assert!(!guard.check_password(Some("s3cret")));
        assert!(guard.check_password(Some("pw")));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hell", "hello"));
    }
}

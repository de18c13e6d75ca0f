//! Label identities: team numbers and solo reference indices.

use serde::{Deserialize, Serialize};

/// Group key used when a registration carries no explicit group.
pub const ALL_GROUP: &str = "ALL";

/// Reserved group key holding the solo reference labels.
pub const SOLO_GROUP: &str = "SOLO";

/// Error types for label construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabelError {
    /// Label numbers start at 1
    #[error("Invalid label index {0}: label numbers start at 1")]
    InvalidLabelIndex(u32),
}

/// How a user registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationKind {
    /// Shares a round-robin team number
    Team,
    /// Holds a personal reference index
    Solo,
}

impl RegistrationKind {
    /// Parse a user-supplied kind, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "team" => Some(Self::Team),
            "solo" => Some(Self::Solo),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Team => "team",
            Self::Solo => "solo",
        }
    }
}

/// `TEAM<n>`
pub fn team_label(number: u32) -> String {
    format!("TEAM{}", number)
}

/// `REF<nnn>`, zero-padded to three digits.
pub fn ref_label(number: u32) -> String {
    format!("REF{:03}", number)
}

/// Canonical display label for a kind and number.
pub fn display_label(kind: RegistrationKind, number: u32) -> String {
    match kind {
        RegistrationKind::Team => team_label(number),
        RegistrationKind::Solo => ref_label(number),
    }
}

/// One countable label.
///
/// Team labels are scoped by group; solo labels always live in [`SOLO_GROUP`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelSpec {
    pub group: String,
    pub number: u32,
    pub kind: RegistrationKind,
}

impl LabelSpec {
    pub fn team(group: impl Into<String>, number: u32) -> Self {
        Self {
            group: group.into(),
            number,
            kind: RegistrationKind::Team,
        }
    }

    pub fn solo(number: u32) -> Self {
        Self {
            group: SOLO_GROUP.to_string(),
            number,
            kind: RegistrationKind::Solo,
        }
    }

    pub fn display_label(&self) -> String {
        display_label(self.kind, self.number)
    }

    /// Key of this label's entry inside its group of the stored aggregate.
    pub fn entry_key(&self) -> String {
        match self.kind {
            RegistrationKind::Team => self.number.to_string(),
            RegistrationKind::Solo => ref_label(self.number),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(team_label(3), "TEAM3");
        assert_eq!(ref_label(14), "REF014");
        assert_eq!(ref_label(1234), "REF1234");
    }

    #[test]
    fn test_entry_keys() {
        assert_eq!(LabelSpec::team(ALL_GROUP, 4).entry_key(), "4");
        assert_eq!(LabelSpec::solo(4).entry_key(), "REF004");
        assert_eq!(LabelSpec::solo(4).group, SOLO_GROUP);
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!(RegistrationKind::parse(" Team "), Some(RegistrationKind::Team));
        assert_eq!(RegistrationKind::parse("SOLO"), Some(RegistrationKind::Solo));
        assert_eq!(RegistrationKind::parse("duo"), None);
    }
}

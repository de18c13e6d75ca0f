//! Registered users and round-robin number assignment.
//!
//! The persisted roster is a JSON array of user objects written by several
//! generations of the registration form, so loading tolerates missing or
//! mistyped fields and re-derives what it can.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::coerce::{coerce_count, coerce_number};
use crate::label::{display_label, LabelSpec, RegistrationKind, ALL_GROUP};
use crate::settings::{LinkTable, ReferralSettings};

/// Normalise a display name (or a supplied id) into a referral id.
///
/// Trimmed, lower-cased, whitespace runs collapsed to `_`, and anything
/// other than alphanumerics, `_` and `-` dropped.
pub fn normalize_referral_id(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// One registered participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredUser", into = "StoredUser")]
pub struct RegisteredUser {
    pub name: String,
    pub referral_id: String,
    pub kind: RegistrationKind,
    pub assigned_number: u32,
    /// Group key; `None` means [`ALL_GROUP`]
    pub group: Option<String>,
    /// Cached messaging deep link for the assigned number
    pub link: Option<String>,
    /// Unix seconds
    pub registered_at: i64,
}

impl RegisteredUser {
    /// `TEAM<n>` or `REF<nnn>`, always derived.
    pub fn team_label(&self) -> String {
        display_label(self.kind, self.assigned_number)
    }

    pub fn group_key(&self) -> &str {
        self.group.as_deref().unwrap_or(ALL_GROUP)
    }

    pub fn label_spec(&self) -> LabelSpec {
        match self.kind {
            RegistrationKind::Team => LabelSpec::team(self.group_key(), self.assigned_number),
            RegistrationKind::Solo => LabelSpec::solo(self.assigned_number),
        }
    }
}

/// On-disk shape of a user record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct StoredUser {
    name: Option<String>,
    ref_id: Option<String>,
    registration_type: Option<String>,
    assigned_number: Value,
    team_number: Value,
    team_label: Option<String>,
    team_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    group: Option<String>,
    registered_at: Value,
}

impl From<StoredUser> for RegisteredUser {
    fn from(stored: StoredUser) -> Self {
        let label = stored.team_label.unwrap_or_default();
        let kind = stored
            .registration_type
            .as_deref()
            .and_then(RegistrationKind::parse)
            .unwrap_or(if label.to_ascii_uppercase().starts_with("REF") {
                RegistrationKind::Solo
            } else {
                RegistrationKind::Team
            });

        let from_label = label
            .trim_start_matches(|c: char| c.is_ascii_alphabetic())
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0);

        let assigned_number = match kind {
            RegistrationKind::Team => coerce_number(&stored.team_number)
                .or_else(|| coerce_number(&stored.assigned_number)),
            RegistrationKind::Solo => coerce_number(&stored.assigned_number),
        }
        .or(from_label)
        .unwrap_or(1);

        let name = stored.name.unwrap_or_default();
        let referral_id = stored
            .ref_id
            .map(|id| normalize_referral_id(&id))
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| normalize_referral_id(&name));

        Self {
            name,
            referral_id,
            kind,
            assigned_number,
            group: stored.group.filter(|g| !g.trim().is_empty()),
            link: stored.team_link.filter(|l| !l.is_empty()),
            registered_at: i64::try_from(coerce_count(&stored.registered_at)).unwrap_or(0),
        }
    }
}

impl From<RegisteredUser> for StoredUser {
    fn from(user: RegisteredUser) -> Self {
        let team_label = user.team_label();
        Self {
            team_number: match user.kind {
                RegistrationKind::Team => Value::from(user.assigned_number),
                RegistrationKind::Solo => Value::Null,
            },
            assigned_number: Value::from(user.assigned_number),
            registration_type: Some(user.kind.as_str().to_string()),
            team_label: Some(team_label),
            name: Some(user.name),
            ref_id: Some(user.referral_id),
            team_link: user.link,
            group: user.group,
            registered_at: Value::from(user.registered_at),
        }
    }
}

/// Result of a registration attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Registration {
    Created(RegisteredUser),
    /// The referral id was already taken; the stored record is returned
    Existing(RegisteredUser),
}

impl Registration {
    pub fn user(&self) -> &RegisteredUser {
        match self {
            Self::Created(u) | Self::Existing(u) => u,
        }
    }

    pub fn into_user(self) -> RegisteredUser {
        match self {
            Self::Created(u) | Self::Existing(u) => u,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Ordered list of registered users.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Roster {
    users: Vec<RegisteredUser>,
}

impl Roster {
    pub fn new(users: Vec<RegisteredUser>) -> Self {
        Self { users }
    }

    /// Load from stored JSON. Anything but an array is an empty roster;
    /// entries that are not objects are skipped.
    pub fn from_value(value: Value) -> Self {
        let Value::Array(items) = value else {
            warn!("Stored roster is not a list, starting empty");
            return Self::default();
        };

        let users = items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(_) => match serde_json::from_value::<RegisteredUser>(item) {
                    Ok(user) => Some(user),
                    Err(e) => {
                        warn!(error = %e, "Skipping unreadable roster entry");
                        None
                    }
                },
                _ => None,
            })
            .collect();

        Self { users }
    }

    pub fn users(&self) -> &[RegisteredUser] {
        &self.users
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Look up by referral id, normalising the query.
    pub fn find(&self, referral_id: &str) -> Option<&RegisteredUser> {
        let wanted = normalize_referral_id(referral_id);
        self.users.iter().find(|u| u.referral_id == wanted)
    }

    pub fn count_kind(&self, kind: RegistrationKind) -> usize {
        self.users.iter().filter(|u| u.kind == kind).count()
    }

    /// Register `name`, or return the existing record for its referral id.
    ///
    /// New users get the next round-robin number for their kind. An
    /// unrecognised kind (`None`) registers as team number 1.
    pub fn register(
        &mut self,
        name: &str,
        kind: Option<RegistrationKind>,
        settings: &ReferralSettings,
        registered_at: i64,
    ) -> Registration {
        let name = name.trim();
        let referral_id = normalize_referral_id(name);

        if let Some(existing) = self.users.iter().find(|u| u.referral_id == referral_id) {
            return Registration::Existing(existing.clone());
        }

        let (kind, assigned_number, link) = match kind {
            Some(RegistrationKind::Team) => {
                let n = next_number(self.count_kind(RegistrationKind::Team), settings.teams_per_group.get());
                (RegistrationKind::Team, n, settings.links.team_link(n))
            }
            Some(RegistrationKind::Solo) => {
                let n = next_number(self.count_kind(RegistrationKind::Solo), settings.solo_count.get());
                (RegistrationKind::Solo, n, settings.links.solo_link(n))
            }
            None => (RegistrationKind::Team, 1, settings.links.team_link(1)),
        };

        let user = RegisteredUser {
            name: name.to_string(),
            referral_id,
            kind,
            assigned_number,
            group: None,
            link,
            registered_at,
        };
        self.users.push(user.clone());
        Registration::Created(user)
    }

    /// Fill missing cached links on team users. Returns how many changed.
    pub fn repair_links(&mut self, links: &LinkTable) -> usize {
        let mut updated = 0;
        for user in self
            .users
            .iter_mut()
            .filter(|u| u.kind == RegistrationKind::Team && u.link.is_none())
        {
            if let Some(link) = links.team_link(user.assigned_number) {
                user.link = Some(link);
                updated += 1;
            }
        }
        updated
    }
}

fn next_number(existing: usize, range: u32) -> u32 {
    // existing % range < range, which fits in u32
    (existing % range as usize) as u32 + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings() -> ReferralSettings {
        let mut s = ReferralSettings::default();
        s.links.team.insert("1".into(), "https://wa.link/t1".into());
        s.links.solo.insert("2".into(), "https://wa.link/s2".into());
        s
    }

    #[test]
    fn test_normalize_referral_id() {
        assert_eq!(normalize_referral_id("  Amaka   Obi "), "amaka_obi");
        assert_eq!(normalize_referral_id("Bola!! O'Neil"), "bola_oneil");
        assert_eq!(normalize_referral_id("Jean-Luc\tDupré"), "jean-luc_dupré");
        assert_eq!(normalize_referral_id(""), "");
    }

    #[test]
    fn test_round_robin_assignment() {
        let s = settings();
        let mut roster = Roster::default();
        let numbers: Vec<u32> = (0..7)
            .map(|i| {
                roster
                    .register(&format!("user {}", i), Some(RegistrationKind::Team), &s, 0)
                    .user()
                    .assigned_number
            })
            .collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 1, 2]);

        let solo = roster.register("solo one", Some(RegistrationKind::Solo), &s, 0);
        assert_eq!(solo.user().assigned_number, 1);
        assert_eq!(solo.user().team_label(), "REF001");
        let solo = roster.register("solo two", Some(RegistrationKind::Solo), &s, 0);
        assert_eq!(solo.user().link.as_deref(), Some("https://wa.link/s2"));
    }

    #[test]
    fn test_register_is_idempotent() {
        let s = settings();
        let mut roster = Roster::default();
        let first = roster.register("Amaka", Some(RegistrationKind::Team), &s, 10);
        let second = roster.register("  amaka ", Some(RegistrationKind::Solo), &s, 20);

        assert!(first.is_new());
        assert!(!second.is_new());
        assert_eq!(second.user(), first.user());
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_unknown_kind_registers_as_team_one() {
        let s = settings();
        let mut roster = Roster::default();
        roster.register("a", Some(RegistrationKind::Team), &s, 0);
        let user = roster.register("b", None, &s, 0).into_user();
        assert_eq!(user.kind, RegistrationKind::Team);
        assert_eq!(user.assigned_number, 1);
        assert_eq!(user.link.as_deref(), Some("https://wa.link/t1"));
    }

    #[test]
    fn test_stored_round_trip() {
        let user = RegisteredUser {
            name: "Amaka".into(),
            referral_id: "amaka".into(),
            kind: RegistrationKind::Solo,
            assigned_number: 14,
            group: None,
            link: None,
            registered_at: 1_700_000_000,
        };
        let stored = serde_json::to_value(&user).unwrap();
        assert_eq!(stored["team_label"], "REF014");
        assert_eq!(stored["team_number"], Value::Null);
        assert_eq!(stored["registration_type"], "solo");

        let back: RegisteredUser = serde_json::from_value(stored).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn test_stored_team_round_trip() {
        let user = RegisteredUser {
            name: "Bola".into(),
            referral_id: "bola".into(),
            kind: RegistrationKind::Team,
            assigned_number: 7,
            group: Some("lekki".into()),
            link: Some("https://wa.link/t7".into()),
            registered_at: 1_700_000_000,
        };
        let stored = serde_json::to_value(&user).unwrap();
        assert_eq!(stored["team_label"], "TEAM7");
        assert_eq!(stored["team_number"], 7);
        assert_eq!(stored["registration_type"], "team");

        let back: RegisteredUser = serde_json::from_value(stored).unwrap();
        assert_eq!(back.team_label(), "TEAM7");
        assert_eq!(back, user);
    }

    #[test]
    fn test_lenient_legacy_records() {
        let roster = Roster::from_value(json!([
            {"name": "Old Timer", "team_label": "REF007"},
            {"name": "Teamy", "ref_id": "teamy", "team_number": "3", "assigned_number": 9},
            "garbage",
            {"name": "Nobody", "registration_type": "team", "assigned_number": null}
        ]));

        assert_eq!(roster.len(), 3);
        let old = roster.find("old timer").unwrap();
        assert_eq!(old.kind, RegistrationKind::Solo);
        assert_eq!(old.assigned_number, 7);
        assert_eq!(roster.find("teamy").unwrap().assigned_number, 3);
        assert_eq!(roster.find("Nobody").unwrap().assigned_number, 1);
    }

    #[test]
    fn test_non_list_roster_is_empty() {
        assert!(Roster::from_value(json!({"users": []})).is_empty());
    }

    #[test]
    fn test_repair_links() {
        let s = settings();
        let mut roster = Roster::from_value(json!([
            {"name": "a", "registration_type": "team", "assigned_number": 1},
            {"name": "b", "registration_type": "team", "assigned_number": 4},
            {"name": "c", "registration_type": "team", "assigned_number": 1, "team_link": "keep"}
        ]));

        assert_eq!(roster.repair_links(&s.links), 1);
        assert_eq!(roster.find("a").unwrap().link.as_deref(), Some("https://wa.link/t1"));
        assert_eq!(roster.find("b").unwrap().link, None);
        assert_eq!(roster.find("c").unwrap().link.as_deref(), Some("keep"));
        assert_eq!(roster.repair_links(&s.links), 0);
    }
}

//! Label pattern engine.
//!
//! A [`Matcher`] answers "does this blob of contact text mention label N?"
//! across the spellings people actually type: `TEAM3`, `team 3`, `Team-03`,
//! `team_3`, `ref 14`, `REF014`.
//!
//! Three paths, tried in order:
//! 1. Strict: lower-case, punctuation replaced by spaces, then
//!    `\b<keyword>[\s_-]*0*<N>\b`.
//! 2. Compact: whitespace removed, the literal `team<N>` / `ref<NNN>` must
//!    appear and must not be followed by another digit.
//! 3. Group hint (team only): the group's name appears in the text and the
//!    team pattern matches without word boundaries. Deliberately permissive.

use regex::Regex;
use std::sync::LazyLock;

use crate::label::{LabelError, RegistrationKind};

static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("punctuation pattern is valid"));

/// Tests a block of contact text for one label.
#[derive(Debug, Clone)]
pub struct Matcher {
    kind: RegistrationKind,
    number: u32,
    strict: Regex,
    compact: String,
    group_hint: Option<GroupHint>,
}

#[derive(Debug, Clone)]
struct GroupHint {
    name: String,
    loose: Regex,
}

/// Matcher for `TEAM<n>`.
pub fn build_team_matcher(team_number: u32) -> Result<Matcher, LabelError> {
    Matcher::team(team_number, None)
}

/// Matcher for `REF<nnn>`.
pub fn build_ref_matcher(ref_index: u32) -> Result<Matcher, LabelError> {
    Matcher::solo(ref_index)
}

impl Matcher {
    /// Team matcher, optionally carrying the group's name as a secondary hint.
    pub fn team(team_number: u32, group_name: Option<&str>) -> Result<Self, LabelError> {
        if team_number == 0 {
            return Err(LabelError::InvalidLabelIndex(team_number));
        }

        let group_hint = group_name
            .map(|g| g.trim().to_lowercase())
            .filter(|g| !g.is_empty())
            .map(|name| GroupHint {
                name,
                loose: compile(&format!(r"team[\s_\-]*0*{}", team_number)),
            });

        Ok(Self {
            kind: RegistrationKind::Team,
            number: team_number,
            strict: compile(&strict_pattern("team", team_number)),
            compact: format!("team{}", team_number),
            group_hint,
        })
    }

    /// Solo reference matcher.
    pub fn solo(ref_index: u32) -> Result<Self, LabelError> {
        if ref_index == 0 {
            return Err(LabelError::InvalidLabelIndex(ref_index));
        }

        Ok(Self {
            kind: RegistrationKind::Solo,
            number: ref_index,
            strict: compile(&strict_pattern("ref", ref_index)),
            compact: format!("ref{:03}", ref_index),
            group_hint: None,
        })
    }

    pub fn kind(&self) -> RegistrationKind {
        self.kind
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// Test optional text; `None` never matches.
    pub fn is_match(&self, text: Option<&str>) -> bool {
        text.is_some_and(|t| self.matches(t))
    }

    /// Test a block of text.
    pub fn matches(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }

        let lowered = text.to_lowercase();

        let cleaned = PUNCTUATION.replace_all(&lowered, " ");
        if self.strict.is_match(&cleaned) {
            return true;
        }

        let squashed: String = lowered.chars().filter(|c| !c.is_whitespace()).collect();
        if contains_unextended(&squashed, &self.compact) {
            return true;
        }

        match &self.group_hint {
            Some(hint) => lowered.contains(&hint.name) && hint.loose.is_match(&lowered),
            None => false,
        }
    }
}

fn strict_pattern(keyword: &str, number: u32) -> String {
    format!(r"\b{}[\s_\-]*0*{}\b", keyword, number)
}

// Patterns are built from a fixed keyword and a decimal number only.
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("label pattern is valid")
}

/// True when `needle` occurs in `haystack` without a digit right after it,
/// so `team1` is not found inside `team10`.
fn contains_unextended(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        !haystack[start + needle.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_spellings() {
        for n in 1..=40u32 {
            let m = build_team_matcher(n).unwrap();
            assert!(m.matches(&format!("TEAM{}", n)), "TEAM{}", n);
            assert!(m.matches(&format!("team {}", n)), "team {}", n);
            assert!(m.matches(&format!("Team-{}", n)), "Team-{}", n);
            assert!(m.matches(&format!("team_{}", n)), "team_{}", n);
            if n < 10 {
                assert!(m.matches(&format!("team_0{}", n)), "team_0{}", n);
            }
            assert!(!m.matches(&format!("TEAM{}", n + 1)), "TEAM{} vs {}", n + 1, n);
            assert!(!m.matches(&format!("TEAM{}0", n)), "TEAM{}0 vs {}", n, n);
        }
    }

    #[test]
    fn test_ref_spellings() {
        for n in 1..=40u32 {
            let m = build_ref_matcher(n).unwrap();
            assert!(m.matches(&format!("REF{:03}", n)));
            assert!(m.matches(&format!("ref {}", n)));
            assert!(!m.matches(&format!("REF{:03}", n + 1)));
        }
    }

    #[test]
    fn test_surrounding_punctuation() {
        let m = build_team_matcher(3).unwrap();
        assert!(m.matches("Chidi (TEAM3), Lagos"));
        assert!(m.matches("met at church #team.3"));
        assert!(m.matches("Ada - team 003 referral"));
    }

    #[test]
    fn test_compact_fallback_recovers_glued_text() {
        let m = build_team_matcher(2).unwrap();
        // No word boundary before "team" here, only the compact path sees it.
        assert!(m.matches("xyzteam2"));
        assert!(!m.matches("xyzteam23"));

        let r = build_ref_matcher(7).unwrap();
        assert!(r.matches("nameREF007"));
        assert!(!r.matches("nameREF0071"));
    }

    #[test]
    fn test_empty_text_never_matches() {
        let m = build_team_matcher(1).unwrap();
        assert!(!m.matches(""));
        assert!(!m.matches("   "));
        assert!(!m.is_match(None));
        assert!(m.is_match(Some("team1")));
    }

    #[test]
    fn test_zero_index_is_rejected() {
        assert_eq!(
            build_team_matcher(0).unwrap_err(),
            LabelError::InvalidLabelIndex(0)
        );
        assert!(build_ref_matcher(0).is_err());
    }

    #[test]
    fn test_group_hint_is_permissive() {
        let plain = Matcher::team(1, None).unwrap();
        let hinted = Matcher::team(1, Some("Lekki")).unwrap();

        let text = "Bisi lekki team12";
        assert!(!plain.matches(text));
        assert!(hinted.matches(text));
        // Without the group's name the hint adds nothing.
        assert!(!hinted.matches("Bisi team12"));
    }

    #[test]
    fn test_blank_group_hint_ignored() {
        let m = Matcher::team(1, Some("  ")).unwrap();
        assert!(!m.matches("team12"));
    }
}

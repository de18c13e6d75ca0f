//! Referral aggregation: count matching contacts per label.
//!
//! Counts are recomputed from the full contact list on every pass. Contacts
//! are scanned in parallel; each worker keeps its own count vector and the
//! vectors are summed once at the end.

use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

use crate::contact::ContactRecord;
use crate::extract::{contact_display_name, contact_text};
use crate::label::{LabelError, LabelSpec, RegistrationKind};
use crate::labelset::LabelSet;
use crate::matcher::Matcher;

/// Count per label; every label of the input set is present.
pub type LabelCounts = BTreeMap<LabelSpec, u64>;

/// Count, for every label in `labels`, the contacts whose text mentions it.
///
/// A contact may count toward several labels but at most once per label.
/// Fails only when the label set holds a zero number.
pub fn aggregate(contacts: &[ContactRecord], labels: &LabelSet) -> Result<LabelCounts, LabelError> {
    let matchers = labels
        .iter()
        .map(build_matcher)
        .collect::<Result<Vec<_>, _>>()?;
    let specs: Vec<&LabelSpec> = labels.iter().collect();

    let totals = contacts
        .par_iter()
        .fold(
            || vec![0u64; matchers.len()],
            |mut counts, contact| {
                let text = contact_text(contact);
                if text.is_empty() {
                    return counts;
                }
                for (i, matcher) in matchers.iter().enumerate() {
                    if matcher.matches(&text) {
                        counts[i] += 1;
                        debug!(
                            contact = %contact_display_name(contact),
                            label = %specs[i].display_label(),
                            group = %specs[i].group,
                            "[MATCH] contact mentions label"
                        );
                    }
                }
                counts
            },
        )
        .reduce(
            || vec![0u64; matchers.len()],
            |mut left, right| {
                for (l, r) in left.iter_mut().zip(right) {
                    *l += r;
                }
                left
            },
        );

    Ok(specs.into_iter().cloned().zip(totals).collect())
}

/// Team matchers carry their group's name as a hint, `ALL` included.
fn build_matcher(spec: &LabelSpec) -> Result<Matcher, LabelError> {
    match spec.kind {
        RegistrationKind::Team => {
            Matcher::team(spec.number, Some(spec.group.as_str()))
        }
        RegistrationKind::Solo => Matcher::solo(spec.number),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::ALL_GROUP;
    use crate::labelset::build_label_set;
    use std::num::NonZeroU32;

    fn labels(items: &[LabelSpec]) -> LabelSet {
        items.iter().cloned().collect()
    }

    #[test]
    fn test_empty_contacts_yield_zero_for_every_label() {
        let set = build_label_set(&[], NonZeroU32::new(5).unwrap());
        let counts = aggregate(&[], &set).unwrap();
        assert_eq!(counts.len(), 5);
        assert!(counts.values().all(|c| *c == 0));
    }

    #[test]
    fn test_one_contact_counts_once_per_label() {
        let set = labels(&[LabelSpec::team(ALL_GROUP, 1), LabelSpec::solo(4)]);
        let contacts = vec![
            ContactRecord::named("Chidi - TEAM1 referral").with_biography("team 1 again, also REF004"),
            ContactRecord::named("Ngozi").with_custom_field("note", "team_01"),
            ContactRecord::named("Emeka TEAM10"),
            ContactRecord::default(),
        ];

        let counts = aggregate(&contacts, &set).unwrap();
        assert_eq!(counts[&LabelSpec::team(ALL_GROUP, 1)], 2);
        assert_eq!(counts[&LabelSpec::solo(4)], 1);
    }

    #[test]
    fn test_deterministic_across_runs() {
        let set = build_label_set(&[], NonZeroU32::new(25).unwrap());
        let contacts: Vec<ContactRecord> = (0..500)
            .map(|i| ContactRecord::named(format!("contact ref {}", i % 30)))
            .collect();

        let first = aggregate(&contacts, &set).unwrap();
        let second = aggregate(&contacts, &set).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[&LabelSpec::solo(1)], 17);
    }

    #[test]
    fn test_group_hint_applies_to_every_group() {
        let set = labels(&[LabelSpec::team(ALL_GROUP, 1), LabelSpec::team("lekki", 1)]);
        let contacts = vec![ContactRecord::named("Bisi Lekki team12")];

        let counts = aggregate(&contacts, &set).unwrap();
        assert_eq!(counts[&LabelSpec::team(ALL_GROUP, 1)], 0);
        assert_eq!(counts[&LabelSpec::team("lekki", 1)], 1);

        // "all" inside "small" satisfies the hint for the catch-all group
        let counts = aggregate(&[ContactRecord::named("small team12")], &set).unwrap();
        assert_eq!(counts[&LabelSpec::team(ALL_GROUP, 1)], 1);
        assert_eq!(counts[&LabelSpec::team("lekki", 1)], 0);
    }

    #[test]
    fn test_zero_label_is_rejected() {
        let set = labels(&[LabelSpec::solo(0)]);
        assert_eq!(aggregate(&[], &set), Err(LabelError::InvalidLabelIndex(0)));
    }
}

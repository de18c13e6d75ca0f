//! Derive the working label set from the roster.

use std::collections::BTreeSet;
use std::num::NonZeroU32;

use crate::label::{LabelSpec, RegistrationKind};
use crate::roster::RegisteredUser;

/// Labels to count in one aggregation pass.
pub type LabelSet = BTreeSet<LabelSpec>;

/// One team label per distinct `(group, number)` held by a team user, plus
/// every solo label `1..=solo_range` whether or not anyone holds it.
pub fn build_label_set(users: &[RegisteredUser], solo_range: NonZeroU32) -> LabelSet {
    let teams = users
        .iter()
        .filter(|u| u.kind == RegistrationKind::Team)
        .map(RegisteredUser::label_spec);

    let solos = (1..=solo_range.get()).map(LabelSpec::solo);

    teams.chain(solos).collect()
}

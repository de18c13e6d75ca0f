//! Flatten a contact's free-text fields into one searchable string.

use crate::contact::{ContactItem, ContactRecord};

/// Text fragments of a contact, in field-group order: names, biographies,
/// organizations, custom fields.
///
/// Within each item every present sub-key contributes, in the order display
/// name, `key value`, name, title. Blank fragments are dropped.
pub fn extract_text_fragments(contact: &ContactRecord) -> Vec<String> {
    let groups = [
        &contact.names,
        &contact.biographies,
        &contact.organizations,
        &contact.user_defined,
    ];

    groups
        .into_iter()
        .flatten()
        .flat_map(|items| items.iter())
        .flat_map(item_fragments)
        .filter(|s| !s.trim().is_empty())
        .collect()
}

/// All fragments joined with single spaces.
pub fn contact_text(contact: &ContactRecord) -> String {
    extract_text_fragments(contact).join(" ")
}

/// First display name, or `"Unknown"`.
pub fn contact_display_name(contact: &ContactRecord) -> String {
    contact
        .names
        .iter()
        .flatten()
        .find_map(|item| item.display_name.as_deref())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("Unknown")
        .to_string()
}

fn item_fragments(item: &ContactItem) -> Vec<String> {
    if let Some(bare) = &item.bare {
        return vec![bare.clone()];
    }

    let mut out = Vec::new();
    if let Some(display) = &item.display_name {
        out.push(display.clone());
    }
    match (&item.key, &item.value) {
        (Some(key), Some(value)) => out.push(format!("{} {}", key, value)),
        (None, Some(value)) => out.push(value.clone()),
        _ => {}
    }
    if let Some(name) = &item.name {
        out.push(name.clone());
    }
    if let Some(title) = &item.title {
        out.push(title.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_order() {
        let contact = ContactRecord::named("Chidi Okeke")
            .with_biography("met at TEAM2 event")
            .with_organization(Some("Acme"), Some("Lead"))
            .with_custom_field("code", "REF004");

        assert_eq!(
            extract_text_fragments(&contact),
            vec![
                "Chidi Okeke",
                "met at TEAM2 event",
                "Acme",
                "Lead",
                "code REF004"
            ]
        );
        assert_eq!(
            contact_text(&contact),
            "Chidi Okeke met at TEAM2 event Acme Lead code REF004"
        );
    }

    #[test]
    fn test_blank_and_bare_items() {
        let contact = ContactRecord {
            names: Some(vec![ContactItem::display_name("   ")]),
            user_defined: Some(vec![ContactItem::bare("team 5"), ContactItem::default()]),
            ..Default::default()
        };

        assert_eq!(extract_text_fragments(&contact), vec!["team 5"]);
    }

    #[test]
    fn test_empty_contact() {
        let contact = ContactRecord::default();
        assert!(extract_text_fragments(&contact).is_empty());
        assert_eq!(contact_text(&contact), "");
        assert_eq!(contact_display_name(&contact), "Unknown");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(contact_display_name(&ContactRecord::named("Ada")), "Ada");
    }
}

//! Contact records as returned by the contacts provider.
//!
//! Field groups arrive in inconsistent shapes, so every group is an optional
//! list and every item an optional-keyed bag. Reading text out of a record
//! goes through [`crate::extract`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One address-book contact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_items", skip_serializing_if = "Option::is_none")]
    pub names: Option<Vec<ContactItem>>,
    #[serde(default, deserialize_with = "lenient_items", skip_serializing_if = "Option::is_none")]
    pub biographies: Option<Vec<ContactItem>>,
    #[serde(default, deserialize_with = "lenient_items", skip_serializing_if = "Option::is_none")]
    pub organizations: Option<Vec<ContactItem>>,
    #[serde(default, deserialize_with = "lenient_items", skip_serializing_if = "Option::is_none")]
    pub user_defined: Option<Vec<ContactItem>>,
}

impl ContactRecord {
    /// Contact with a single display name.
    pub fn named(display_name: impl Into<String>) -> Self {
        Self {
            names: Some(vec![ContactItem::display_name(display_name)]),
            ..Default::default()
        }
    }

    /// Add a biography entry.
    pub fn with_biography(mut self, value: impl Into<String>) -> Self {
        self.biographies
            .get_or_insert_with(Vec::new)
            .push(ContactItem::value(value));
        self
    }

    /// Add an organization entry.
    pub fn with_organization(mut self, name: Option<&str>, title: Option<&str>) -> Self {
        self.organizations.get_or_insert_with(Vec::new).push(ContactItem {
            name: name.map(str::to_string),
            title: title.map(str::to_string),
            ..Default::default()
        });
        self
    }

    /// Add a custom key/value field.
    pub fn with_custom_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_defined.get_or_insert_with(Vec::new).push(ContactItem {
            key: Some(key.into()),
            value: Some(value.into()),
            ..Default::default()
        });
        self
    }
}

/// One item of a field group.
///
/// `bare` holds items that arrived as a plain scalar rather than an object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bare: Option<String>,
}

impl ContactItem {
    pub fn display_name(text: impl Into<String>) -> Self {
        Self {
            display_name: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn value(text: impl Into<String>) -> Self {
        Self {
            value: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn bare(text: impl Into<String>) -> Self {
        Self {
            bare: Some(text.into()),
            ..Default::default()
        }
    }
}

impl From<Value> for ContactItem {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => {
                let field = |k: &str| map.get(k).and_then(scalar_text);
                Self {
                    display_name: field("displayName"),
                    value: field("value"),
                    name: field("name"),
                    title: field("title"),
                    key: field("key"),
                    bare: None,
                }
            }
            other => Self {
                bare: scalar_text(&other),
                ..Default::default()
            },
        }
    }
}

impl<'de> Deserialize<'de> for ContactItem {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Value::deserialize(deserializer)?.into())
    }
}

/// Render a scalar as text; containers and `null` have no text.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A field group that is not a list is treated as absent.
fn lenient_items<'de, D>(deserializer: D) -> Result<Option<Vec<ContactItem>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(Some(items.into_iter().map(ContactItem::from).collect())),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_people_api_shape() {
        let contact: ContactRecord = serde_json::from_value(json!({
            "resourceName": "people/c1",
            "names": [{"displayName": "Chidi - TEAM1 referral", "metadata": {"primary": true}}],
            "organizations": [{"name": "Acme", "title": "Lead"}],
            "userDefined": [{"key": "ref", "value": "REF004"}, "loose note", 12]
        }))
        .unwrap();

        assert_eq!(contact.resource_name.as_deref(), Some("people/c1"));
        let names = contact.names.unwrap();
        assert_eq!(names[0].display_name.as_deref(), Some("Chidi - TEAM1 referral"));
        let custom = contact.user_defined.unwrap();
        assert_eq!(custom[0].key.as_deref(), Some("ref"));
        assert_eq!(custom[1].bare.as_deref(), Some("loose note"));
        assert_eq!(custom[2].bare.as_deref(), Some("12"));
    }

    #[test]
    fn test_malformed_groups_are_absent() {
        let contact: ContactRecord = serde_json::from_value(json!({
            "names": "not a list",
            "biographies": null,
            "organizations": {"name": "x"}
        }))
        .unwrap();

        assert!(contact.names.is_none());
        assert!(contact.biographies.is_none());
        assert!(contact.organizations.is_none());
        assert!(contact.user_defined.is_none());
    }
}

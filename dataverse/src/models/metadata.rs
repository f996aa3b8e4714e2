use serde::{Deserialize, Serialize};

// Shapes handed to callers.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMetadata {
    pub logical_name: String,
    pub display_name: String,
    pub entity_set_name: String,
    pub primary_id_attribute: String,
    pub primary_name_attribute: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_custom_entity: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeMetadata {
    pub logical_name: String,
    pub display_name: String,
    pub attribute_type: String,
    pub is_primary_id: bool,
    pub is_primary_name: bool,
    pub is_required: bool,
    pub is_custom_attribute: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<OptionValue>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionValue {
    pub value: i64,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationshipType {
    OneToMany,
    ManyToOne,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipMetadata {
    pub schema_name: String,
    pub relationship_type: RelationshipType,
    pub referencing_entity: String,
    pub referencing_attribute: String,
    pub referenced_entity: String,
    pub referenced_attribute: String,
    /// Single-valued navigation property on the referencing entity, when
    /// Dataverse reports it. This is the name `$expand` needs, so it is only
    /// set on many-to-one rows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation_property: Option<String>,
}

// Wire shapes returned by the metadata endpoints.

#[derive(Debug, Deserialize)]
pub(crate) struct ODataCollection<T> {
    pub value: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Label {
    #[serde(default)]
    pub user_localized_label: Option<LocalizedLabel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct LocalizedLabel {
    pub label: String,
}

impl Label {
    fn text(label: &Option<Label>) -> Option<String> {
        label
            .as_ref()
            .and_then(|l| l.user_localized_label.as_ref())
            .map(|l| l.label.clone())
            .filter(|l| !l.is_empty())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawEntity {
    pub logical_name: String,
    #[serde(default)]
    pub display_name: Option<Label>,
    #[serde(default)]
    pub entity_set_name: Option<String>,
    #[serde(default)]
    pub primary_id_attribute: Option<String>,
    #[serde(default)]
    pub primary_name_attribute: Option<String>,
    #[serde(default)]
    pub description: Option<Label>,
    #[serde(default)]
    pub is_custom_entity: bool,
}

impl From<RawEntity> for EntityMetadata {
    fn from(raw: RawEntity) -> Self {
        Self {
            display_name: Label::text(&raw.display_name)
                .unwrap_or_else(|| raw.logical_name.clone()),
            entity_set_name: raw.entity_set_name.unwrap_or_default(),
            primary_id_attribute: raw.primary_id_attribute.unwrap_or_default(),
            primary_name_attribute: raw.primary_name_attribute.unwrap_or_default(),
            description: Label::text(&raw.description),
            is_custom_entity: raw.is_custom_entity,
            logical_name: raw.logical_name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RequiredLevel {
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawAttribute {
    pub logical_name: String,
    #[serde(default)]
    pub display_name: Option<Label>,
    #[serde(default)]
    pub attribute_type: Option<String>,
    #[serde(default)]
    pub is_primary_id: Option<bool>,
    #[serde(default)]
    pub is_primary_name: Option<bool>,
    #[serde(default)]
    pub required_level: Option<RequiredLevel>,
    #[serde(default)]
    pub is_custom_attribute: Option<bool>,
    #[serde(default)]
    pub description: Option<Label>,
    #[serde(default)]
    pub attribute_of: Option<String>,
}

impl RawAttribute {
    /// Helper columns (e.g. `owneridname`) point back at their parent.
    pub fn is_helper_column(&self) -> bool {
        self.attribute_of.is_some()
    }
}

impl From<RawAttribute> for AttributeMetadata {
    fn from(raw: RawAttribute) -> Self {
        let is_required = raw
            .required_level
            .as_ref()
            .map(|level| matches!(level.value.as_str(), "ApplicationRequired" | "SystemRequired"))
            .unwrap_or(false);

        Self {
            display_name: Label::text(&raw.display_name)
                .unwrap_or_else(|| raw.logical_name.clone()),
            attribute_type: raw.attribute_type.unwrap_or_else(|| "Unknown".to_string()),
            is_primary_id: raw.is_primary_id.unwrap_or(false),
            is_primary_name: raw.is_primary_name.unwrap_or(false),
            is_required,
            is_custom_attribute: raw.is_custom_attribute.unwrap_or(false),
            description: Label::text(&raw.description),
            targets: None,
            options: None,
            logical_name: raw.logical_name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawLookupTargets {
    pub logical_name: String,
    #[serde(default)]
    pub targets: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawPicklist {
    pub logical_name: String,
    #[serde(default)]
    pub option_set: Option<RawOptionSet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawOptionSet {
    #[serde(default)]
    pub options: Vec<RawOption>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawOption {
    pub value: i64,
    #[serde(default)]
    pub label: Option<Label>,
}

impl RawPicklist {
    pub fn into_options(self) -> Vec<OptionValue> {
        self.option_set
            .map(|set| set.options)
            .unwrap_or_default()
            .into_iter()
            .map(|option| OptionValue {
                label: Label::text(&option.label).unwrap_or_else(|| option.value.to_string()),
                value: option.value,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawRelationship {
    pub schema_name: String,
    pub referencing_entity: String,
    pub referencing_attribute: String,
    pub referenced_entity: String,
    pub referenced_attribute: String,
    #[serde(default)]
    pub referencing_entity_navigation_property_name: Option<String>,
}

impl RawRelationship {
    pub fn into_metadata(self, relationship_type: RelationshipType) -> RelationshipMetadata {
        RelationshipMetadata {
            schema_name: self.schema_name,
            relationship_type,
            referencing_entity: self.referencing_entity,
            referencing_attribute: self.referencing_attribute,
            referenced_entity: self.referenced_entity,
            referenced_attribute: self.referenced_attribute,
            // On a one-to-many row the name belongs to the other entity.
            navigation_property: self
                .referencing_entity_navigation_property_name
                .filter(|name| !name.is_empty())
                .filter(|_| relationship_type == RelationshipType::ManyToOne),
        }
    }
}

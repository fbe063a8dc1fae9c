//! Schema field model

use serde::{Deserialize, Serialize};

/// Field type as reported by the schema registry.
///
/// Only `Many2one` changes engine behavior; the other variants exist so
/// values format sensibly. Unknown registry types are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Char,
    Text,
    Html,
    Integer,
    Float,
    Monetary,
    Boolean,
    Date,
    Datetime,
    Selection,
    Many2one,
    One2many,
    Many2many,
    Other(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Char => "char",
            FieldType::Text => "text",
            FieldType::Html => "html",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Monetary => "monetary",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Datetime => "datetime",
            FieldType::Selection => "selection",
            FieldType::Many2one => "many2one",
            FieldType::One2many => "one2many",
            FieldType::Many2many => "many2many",
            FieldType::Other(s) => s.as_str(),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "char" => FieldType::Char,
            "text" => FieldType::Text,
            "html" => FieldType::Html,
            "integer" => FieldType::Integer,
            "float" => FieldType::Float,
            "monetary" => FieldType::Monetary,
            "boolean" => FieldType::Boolean,
            "date" => FieldType::Date,
            "datetime" => FieldType::Datetime,
            "selection" => FieldType::Selection,
            "many2one" => FieldType::Many2one,
            "one2many" => FieldType::One2many,
            "many2many" => FieldType::Many2many,
            _ => FieldType::Other(s.to_string()),
        }
    }
}

impl From<String> for FieldType {
    fn from(s: String) -> Self {
        FieldType::parse(&s)
    }
}

impl From<FieldType> for String {
    fn from(t: FieldType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field definition for one model, in registry order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub field_id: i64,
    pub field_name: String,
    pub field_label: String,
    pub field_type: FieldType,
    /// Target model name for relational fields
    #[serde(default)]
    pub fk_location_model: Option<String>,
    /// Target model numeric id for relational fields
    #[serde(default)]
    pub fk_location_model_id: Option<i64>,
}

impl SchemaField {
    /// Check if this field references exactly one record of another model
    pub fn is_many2one(&self) -> bool {
        self.field_type == FieldType::Many2one
    }

    /// Label to show in semantic text, falling back to the technical name
    pub fn display_label(&self) -> &str {
        let label = self.field_label.trim();
        if label.is_empty() {
            &self.field_name
        } else {
            label
        }
    }

    /// Target model name and id, when both are declared
    pub fn fk_target(&self) -> Option<(&str, i64)> {
        match (&self.fk_location_model, self.fk_location_model_id) {
            (Some(model), Some(id)) if !model.trim().is_empty() => Some((model.as_str(), id)),
            _ => None,
        }
    }
}

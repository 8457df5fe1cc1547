// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Read-only schema catalogue consumed by the permission compiler.
//!
//! A [`Schema`] is loaded from a JSON or YAML document describing models,
//! enums and jobs. Loading runs a linking pass (see [`definition`]) that
//! fills in everything a schema author is allowed to leave implicit:
//!
//! - every model gets an `id` primary key plus `createdAt`/`updatedAt`,
//! - every belongs-to relationship `author: Author` gets its foreign key field
//!   `authorId`,
//! - has-many relationships learn the belongs-to field on the other side,
//! - the built-in `Identity` model is added, with a backlink field for every
//!   model holding a unique relationship to it.
//!
//! ```yaml
//! models:
//!   - name: Post
//!     fields:
//!       - name: title
//!         type: Text
//!       - name: author
//!         type: Author
//!     permissions:
//!       - expression: post.author.identity == ctx.identity
//!         actions: [get, list]
//! ```

use std::path::Path;

use anyhow::{bail, Result};
use serde::Deserialize;

use crate::ast::Expression;

mod definition;
pub mod naming;

pub use definition::SchemaError;

/// Name of the built-in model every authenticated request resolves to.
pub const IDENTITY_MODEL: &str = "Identity";

/// Type of a model field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Number,
    Boolean,
    Timestamp,
    Date,
    Id,
    Decimal,
    Enum(String),
    Model(String),
}

impl FieldType {
    /// Built-in scalar type by schema name.
    pub fn scalar(name: &str) -> Option<Self> {
        Some(match name {
            "Text" => Self::Text,
            "Number" => Self::Number,
            "Boolean" => Self::Boolean,
            "Timestamp" => Self::Timestamp,
            "Date" => Self::Date,
            "ID" => Self::Id,
            "Decimal" => Self::Decimal,
            _ => return None,
        })
    }

    pub fn is_model(&self) -> bool {
        matches!(self, Self::Model(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub repeated: bool,
    pub unique: bool,
    pub optional: bool,
    pub primary_key: bool,
    /// Foreign key field held by this model for a belongs-to relationship.
    pub foreign_key: Option<String>,
    /// Field on the related model that points back at this one.
    pub inverse_field: Option<String>,
}

impl Field {
    pub(crate) fn scalar(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            repeated: false,
            unique: false,
            optional: false,
            primary_key: false,
            foreign_key: None,
            inverse_field: None,
        }
    }

    /// Related model name when this field is a relationship.
    pub fn target_model(&self) -> Option<&str> {
        match &self.field_type {
            FieldType::Model(name) => Some(name),
            _ => None,
        }
    }

    /// Relationship whose foreign key lives on this field's model.
    pub fn is_belongs_to(&self) -> bool {
        self.foreign_key.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Get,
    List,
    Create,
    Update,
    Delete,
    Read,
    Write,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct PermissionRule {
    /// Row condition; a rule without one grants by role alone.
    #[serde(default)]
    pub expression: Option<Expression>,
    #[serde(default)]
    pub actions: Vec<ActionType>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl PermissionRule {
    pub fn is_role_only(&self) -> bool {
        self.expression.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct Action {
    pub name: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub permissions: Vec<PermissionRule>,
}

#[derive(Debug, Clone)]
pub struct Model {
    pub name: String,
    pub fields: Vec<Field>,
    pub actions: Vec<Action>,
    pub permissions: Vec<PermissionRule>,
}

impl Model {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn primary_key(&self) -> Option<&Field> {
        self.fields.iter().find(|f| f.primary_key)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Enum {
    pub name: String,
    pub values: Vec<String>,
}

impl Enum {
    pub fn has_value(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

/// Background job. Its rules are role or expression based like a model's but
/// are evaluated against the job's inputs, never compiled to a row filter.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Job {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<PermissionRule>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "definition::SchemaDefinition")]
pub struct Schema {
    pub models: Vec<Model>,
    pub enums: Vec<Enum>,
    pub jobs: Vec<Job>,
}

impl Schema {
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    #[cfg(feature = "yaml")]
    #[cfg_attr(docsrs, doc(cfg(feature = "yaml")))]
    pub fn from_yaml_str(s: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(s)
    }

    /// Load a schema document, choosing the format by file extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => bail!("Failed to read {}. {e}", path.display()),
        };

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(Self::from_json_str(&contents)?),
            #[cfg(feature = "yaml")]
            Some("yaml" | "yml") => Ok(Self::from_yaml_str(&contents)?),
            _ => bail!("unsupported schema file {}", path.display()),
        }
    }
}

/// Lookups the compiler needs from a schema.
pub trait SchemaCatalog {
    fn find_model(&self, name: &str) -> Option<&Model>;

    fn find_enum(&self, name: &str) -> Option<&Enum>;

    fn find_field(&self, model: &str, name: &str) -> Option<&Field> {
        self.find_model(model)?.field(name)
    }

    /// Rules governing `action` on `model`, or `None` when the model has no
    /// such action.
    ///
    /// Rules declared on the action itself take precedence; otherwise the
    /// model-level rules listing the action's type apply.
    fn permission_rules_for(&self, model: &str, action: &str) -> Option<Vec<&PermissionRule>> {
        let model = self.find_model(model)?;
        let action = model.action(action)?;
        if !action.permissions.is_empty() {
            return Some(action.permissions.iter().collect());
        }

        Some(
            model
                .permissions
                .iter()
                .filter(|rule| rule.actions.contains(&action.action_type))
                .collect(),
        )
    }

    fn primary_key_column(&self, model: &str) -> String {
        self.find_model(model)
            .and_then(Model::primary_key)
            .map_or_else(|| "id".to_string(), |f| naming::column_name(&f.name))
    }
}

impl SchemaCatalog for Schema {
    fn find_model(&self, name: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.name == name)
    }

    fn find_enum(&self, name: &str) -> Option<&Enum> {
        self.enums.iter().find(|e| e.name == name)
    }
}

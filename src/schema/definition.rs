// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashSet;

use serde::Deserialize;

use super::naming::{foreign_key_field, identifier_root};
use super::{Action, Enum, Field, FieldType, Job, Model, PermissionRule, Schema, IDENTITY_MODEL};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("model {0} is declared more than once")]
    DuplicateModel(String),

    #[error("field {model}.{field} has unknown type {type_name}")]
    UnknownType {
        model: String,
        field: String,
        type_name: String,
    },

    #[error("field {model}.{field} names inverse field {inverse} which is not a relationship back to {model}")]
    InvalidInverseField {
        model: String,
        field: String,
        inverse: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub(crate) struct SchemaDefinition {
    #[serde(default)]
    models: Vec<ModelDefinition>,
    #[serde(default)]
    enums: Vec<Enum>,
    #[serde(default)]
    jobs: Vec<Job>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
struct ModelDefinition {
    name: String,
    #[serde(default)]
    fields: Vec<FieldDefinition>,
    #[serde(default)]
    actions: Vec<Action>,
    #[serde(default)]
    permissions: Vec<PermissionRule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
struct FieldDefinition {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    repeated: bool,
    #[serde(default)]
    unique: bool,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    inverse_field: Option<String>,
}

impl FieldDefinition {
    fn new(name: &str, type_name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            repeated: false,
            unique: false,
            optional: false,
            inverse_field: None,
        }
    }

    fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

fn identity_definition() -> ModelDefinition {
    ModelDefinition {
        name: IDENTITY_MODEL.to_string(),
        fields: vec![
            FieldDefinition::new("email", "Text").unique().optional(),
            FieldDefinition::new("emailVerified", "Boolean"),
            FieldDefinition::new("externalId", "Text").optional(),
            FieldDefinition::new("issuer", "Text").optional(),
        ],
        actions: vec![],
        permissions: vec![],
    }
}

impl TryFrom<SchemaDefinition> for Schema {
    type Error = SchemaError;

    fn try_from(definition: SchemaDefinition) -> Result<Self, Self::Error> {
        let mut definitions = definition.models;
        if !definitions.iter().any(|m| m.name == IDENTITY_MODEL) {
            definitions.push(identity_definition());
        }

        let mut model_names = HashSet::new();
        for model in &definitions {
            if !model_names.insert(model.name.clone()) {
                return Err(SchemaError::DuplicateModel(model.name.clone()));
            }
        }
        let enum_names: HashSet<&str> = definition.enums.iter().map(|e| e.name.as_str()).collect();

        let mut models = definitions
            .into_iter()
            .map(|m| link_model(m, &model_names, &enum_names))
            .collect::<Result<Vec<_>, _>>()?;

        infer_inverse_fields(&mut models)?;
        add_identity_backlinks(&mut models);

        Ok(Schema {
            models,
            enums: definition.enums,
            jobs: definition.jobs,
        })
    }
}

fn link_model(
    definition: ModelDefinition,
    model_names: &HashSet<String>,
    enum_names: &HashSet<&str>,
) -> Result<Model, SchemaError> {
    let declared: HashSet<String> = definition.fields.iter().map(|f| f.name.clone()).collect();
    let mut fields = vec![];

    if !declared.contains("id") {
        let mut id = Field::scalar("id", FieldType::Id);
        id.unique = true;
        id.primary_key = true;
        fields.push(id);
    }

    for f in definition.fields {
        let field_type = if let Some(scalar) = FieldType::scalar(&f.type_name) {
            scalar
        } else if enum_names.contains(f.type_name.as_str()) {
            FieldType::Enum(f.type_name)
        } else if model_names.contains(&f.type_name) {
            FieldType::Model(f.type_name)
        } else {
            return Err(SchemaError::UnknownType {
                model: definition.name,
                field: f.name,
                type_name: f.type_name,
            });
        };

        let belongs_to = field_type.is_model() && !f.repeated && f.inverse_field.is_none();
        let foreign_key = belongs_to.then(|| foreign_key_field(&f.name));
        let (unique, optional) = (f.unique, f.optional);

        fields.push(Field {
            primary_key: f.name == "id",
            name: f.name,
            field_type,
            repeated: f.repeated,
            unique,
            optional,
            foreign_key: foreign_key.clone(),
            inverse_field: f.inverse_field,
        });

        if let Some(fk) = foreign_key {
            if !declared.contains(&fk) {
                let mut field = Field::scalar(fk, FieldType::Id);
                field.unique = unique;
                field.optional = optional;
                fields.push(field);
            }
        }
    }

    for timestamp in ["createdAt", "updatedAt"] {
        if !declared.contains(timestamp) {
            fields.push(Field::scalar(timestamp, FieldType::Timestamp));
        }
    }

    Ok(Model {
        name: definition.name,
        fields,
        actions: definition.actions,
        permissions: definition.permissions,
    })
}

// Belongs-to fields on `target` pointing at `model`.
fn back_references<'a>(target: &'a Model, model: &'a str) -> impl Iterator<Item = &'a Field> {
    target
        .fields
        .iter()
        .filter(move |f| f.is_belongs_to() && f.target_model() == Some(model))
}

fn infer_inverse_fields(models: &mut [Model]) -> Result<(), SchemaError> {
    let mut inferred = vec![];

    for (model_idx, model) in models.iter().enumerate() {
        for (field_idx, field) in model.fields.iter().enumerate() {
            let Some(target_name) = field.target_model() else {
                continue;
            };
            if field.is_belongs_to() {
                continue;
            }
            let Some(target) = models.iter().find(|m| m.name == target_name) else {
                continue;
            };

            match &field.inverse_field {
                Some(inverse) => {
                    if !back_references(target, &model.name).any(|f| &f.name == inverse) {
                        return Err(SchemaError::InvalidInverseField {
                            model: model.name.clone(),
                            field: field.name.clone(),
                            inverse: inverse.clone(),
                        });
                    }
                }
                None => {
                    // Only an unambiguous back reference is inferred.
                    let mut candidates = back_references(target, &model.name);
                    if let (Some(only), None) = (candidates.next(), candidates.next()) {
                        inferred.push((model_idx, field_idx, only.name.clone()));
                    }
                }
            }
        }
    }

    for (model_idx, field_idx, inverse) in inferred {
        models[model_idx].fields[field_idx].inverse_field = Some(inverse);
    }
    Ok(())
}

fn add_identity_backlinks(models: &mut [Model]) {
    let backlinks: Vec<Field> = models
        .iter()
        .filter(|m| m.name != IDENTITY_MODEL)
        .flat_map(|model| {
            back_references_to_identity(model).map(move |owner| Field {
                name: identifier_root(&model.name),
                field_type: FieldType::Model(model.name.clone()),
                repeated: false,
                unique: true,
                optional: true,
                primary_key: false,
                foreign_key: None,
                inverse_field: Some(owner.name.clone()),
            })
        })
        .collect();

    let Some(identity) = models.iter_mut().find(|m| m.name == IDENTITY_MODEL) else {
        return;
    };
    for backlink in backlinks {
        if identity.field(&backlink.name).is_none() {
            identity.fields.push(backlink);
        }
    }
}

fn back_references_to_identity(model: &Model) -> impl Iterator<Item = &Field> {
    back_references(model, IDENTITY_MODEL).filter(|f| f.unique)
}

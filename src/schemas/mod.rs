//! Embedded JSON Schema documents for the persisted entity types.

use serde_json::Value;

use crate::hypermedia::{Catalog, CatalogBuilder, CatalogContext, EntitySchema, RepresentationError};

const WORKFLOW_DEFINITION: &str = include_str!("workflow_definition.json");
const WORKFLOW_INSTANCE: &str = include_str!("workflow_instance.json");
const TASK_INSTANCE: &str = include_str!("task_instance.json");

pub const DEFINITION: &str = "workflow_definition";
pub const INSTANCE: &str = "workflow_instance";
pub const TASK: &str = "task_instance";

/// Parsed schemas plus the catalog builder configured for this deployment.
/// Shared read-only across workers through `web::Data`.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    pub definition: EntitySchema,
    pub instance: EntitySchema,
    pub task: EntitySchema,
    builder: CatalogBuilder,
}

fn parse(entity_type: &str, source: &str) -> Result<EntitySchema, RepresentationError> {
    let document: Value =
        serde_json::from_str(source).map_err(|e| RepresentationError::InvalidSchema {
            entity_type: entity_type.to_string(),
            reason: e.to_string(),
        })?;
    EntitySchema::from_json(entity_type, &document)
}

impl SchemaRegistry {
    pub fn load(textarea_threshold: u64) -> Result<Self, RepresentationError> {
        Ok(Self {
            definition: parse(DEFINITION, WORKFLOW_DEFINITION)?,
            instance: parse(INSTANCE, WORKFLOW_INSTANCE)?,
            task: parse(TASK, TASK_INSTANCE)?,
            builder: CatalogBuilder::new(textarea_threshold),
        })
    }

    pub fn builder(&self) -> &CatalogBuilder {
        &self.builder
    }

    pub fn catalog(&self, schema: &EntitySchema, context: CatalogContext) -> Result<Catalog, RepresentationError> {
        self.builder.build(schema, context)
    }

    /// Build every catalog once so a schema without a mapping rule fails at
    /// startup rather than on first request.
    pub fn check(&self) -> Result<(), RepresentationError> {
        for schema in [&self.definition, &self.instance, &self.task] {
            for context in [CatalogContext::Display, CatalogContext::Query, CatalogContext::Template] {
                self.builder.build(schema, context)?;
            }
        }
        log::info!("Schemas loaded: {DEFINITION}, {INSTANCE}, {TASK}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_schemas_build_every_catalog() {
        let registry = SchemaRegistry::load(255).unwrap();
        registry.check().unwrap();
    }

    #[test]
    fn definition_template_is_name_description_tasks() {
        let registry = SchemaRegistry::load(255).unwrap();
        let template = registry.catalog(&registry.definition, CatalogContext::Template).unwrap();
        let names: Vec<&str> = template.fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, ["name", "description", "tasks"]);
        assert!(template.field("name").unwrap().required());
        assert!(template.field("tasks").unwrap().is_textarea());
    }

    #[test]
    fn instance_status_defaults_to_active() {
        let registry = SchemaRegistry::load(255).unwrap();
        let template = registry.catalog(&registry.instance, CatalogContext::Template).unwrap();
        let status = template.field("status").unwrap();
        assert!(status.is_select());
        assert!(!status.required());
        assert!(status.is_selected("active"));
        assert!(template.field("progress").is_none());
        assert!(template.field("share_token").is_none());
    }
}

//! Transition catalogs: per-context field descriptors for one entity type.

use super::descriptor::{FieldDescriptor, InputKind};
use super::error::RepresentationError;
use super::schema::{DATE_TIME_PATTERN, DeclaredType, EntitySchema, FieldMeta};

pub const DEFAULT_TEXTAREA_THRESHOLD: u64 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogContext {
    Display,
    Query,
    Template,
}

impl CatalogContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogContext::Display => "display",
            CatalogContext::Query => "query",
            CatalogContext::Template => "template",
        }
    }
}

/// Ordered field descriptors governing one read or write context.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    entity_type: String,
    context: CatalogContext,
    fields: Vec<FieldDescriptor>,
}

impl Catalog {
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn context(&self) -> CatalogContext {
        self.context
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CatalogBuilder {
    textarea_threshold: u64,
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_TEXTAREA_THRESHOLD)
    }
}

impl CatalogBuilder {
    pub fn new(textarea_threshold: u64) -> Self {
        Self { textarea_threshold }
    }

    pub fn build(
        &self,
        schema: &EntitySchema,
        context: CatalogContext,
    ) -> Result<Catalog, RepresentationError> {
        self.build_fields(schema.entity_type(), schema.fields(), context)
    }

    pub fn build_fields(
        &self,
        entity_type: &str,
        metadata: &[FieldMeta],
        context: CatalogContext,
    ) -> Result<Catalog, RepresentationError> {
        let mut fields = Vec::with_capacity(metadata.len());
        for meta in metadata {
            if let Some(descriptor) = self.descriptor(entity_type, meta, context)? {
                fields.push(descriptor);
            }
        }
        log::debug!(
            "Built {} catalog for {} with {} fields",
            context.as_str(),
            entity_type,
            fields.len()
        );
        Ok(Catalog {
            entity_type: entity_type.to_string(),
            context,
            fields,
        })
    }

    fn descriptor(
        &self,
        entity_type: &str,
        meta: &FieldMeta,
        context: CatalogContext,
    ) -> Result<Option<FieldDescriptor>, RepresentationError> {
        // Type check comes first: an unmappable field is an error in every context
        let kind = self.input_kind(entity_type, meta)?;

        let omitted = match context {
            CatalogContext::Display => false,
            CatalogContext::Query => meta.system_managed || !meta.filterable,
            CatalogContext::Template => meta.system_managed,
        };
        if omitted {
            return Ok(None);
        }

        let (required, value) = match context {
            CatalogContext::Display => (!meta.nullable, meta.value.clone()),
            CatalogContext::Query => (false, meta.value.clone()),
            CatalogContext::Template => (
                !meta.nullable && meta.default.is_none(),
                meta.value.clone().or_else(|| meta.default.clone()),
            ),
        };

        FieldDescriptor::new(meta.name.clone(), meta.title.clone(), kind, required, value)
            .map(Some)
            .map_err(|e| RepresentationError::CatalogMismatch {
                entity_type: entity_type.to_string(),
                field: meta.name.clone(),
                reason: e.to_string(),
            })
    }

    fn input_kind(&self, entity_type: &str, meta: &FieldMeta) -> Result<InputKind, RepresentationError> {
        let c = &meta.constraints;
        let kind = match &meta.declared {
            DeclaredType::Array | DeclaredType::Object | DeclaredType::Other(_) => {
                return Err(RepresentationError::UnsupportedFieldType {
                    entity_type: entity_type.to_string(),
                    field: meta.name.clone(),
                    declared: meta.declared.to_string(),
                });
            }
            _ if meta.hidden => InputKind::Hidden,
            _ if !meta.allowed_values.is_empty() => InputKind::Select {
                options: meta.allowed_values.clone(),
            },
            DeclaredType::Boolean => InputKind::Boolean,
            DeclaredType::Integer | DeclaredType::Number => InputKind::Number {
                minimum: c.minimum,
                maximum: c.maximum,
            },
            DeclaredType::String
                if meta.long_form || c.max_length.is_some_and(|m| m > self.textarea_threshold) =>
            {
                InputKind::Textarea {
                    min_length: c.min_length,
                    max_length: c.max_length,
                }
            }
            DeclaredType::String => InputKind::Text {
                pattern: c.pattern.clone().or_else(|| {
                    meta.is_date_time().then(|| DATE_TIME_PATTERN.to_string())
                }),
                min_length: c.min_length,
                max_length: c.max_length,
            },
        };
        Ok(kind)
    }
}

use std::fmt;

/// Integration failures raised while building catalogs or documents.
///
/// None of these come from end-user input; they mean the schema, the catalog
/// or the calling handler disagree with each other.
#[derive(Debug, Clone, PartialEq)]
pub enum RepresentationError {
    UnsupportedFieldType {
        entity_type: String,
        field: String,
        declared: String,
    },
    MissingHrefResolver {
        entity_type: String,
        detail: String,
    },
    CatalogMismatch {
        entity_type: String,
        field: String,
        reason: String,
    },
    DuplicateRel(String),
    InvalidSchema {
        entity_type: String,
        reason: String,
    },
}

impl fmt::Display for RepresentationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepresentationError::UnsupportedFieldType { entity_type, field, declared } => write!(
                f,
                "Unsupported field type '{declared}' for {entity_type}.{field}"
            ),
            RepresentationError::MissingHrefResolver { entity_type, detail } => {
                write!(f, "Cannot resolve href for {entity_type}: {detail}")
            }
            RepresentationError::CatalogMismatch { entity_type, field, reason } => {
                write!(f, "Catalog mismatch on {entity_type}.{field}: {reason}")
            }
            RepresentationError::DuplicateRel(rel) => write!(f, "Duplicate link rel '{rel}'"),
            RepresentationError::InvalidSchema { entity_type, reason } => {
                write!(f, "Invalid schema for {entity_type}: {reason}")
            }
        }
    }
}

impl std::error::Error for RepresentationError {}

//! Error types for the Mitsuba exporter.
//!
//! Two layers: [`ExportError`] aborts a whole export session, while
//! [`EntityError`] lets a single object, material or lamp be skipped without
//! unwinding past the entity that produced it.

use thiserror::Error;

/// Result type alias using ExportError.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Session-level errors. Any of these aborts the export.
#[derive(Error, Debug)]
pub enum ExportError {
    /// I/O error while writing output files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a JSON scene description.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Materials or textures reference each other in a loop.
    #[error("Reference cycle: {}", chain.join(" -> "))]
    ReferenceCycle { chain: Vec<String> },

    /// The same id was emitted twice with different contents.
    #[error("Conflicting definitions for id '{id}'")]
    ConflictingDefinition { id: String },

    /// Two distinct source entities mangle to the same id.
    #[error("Id '{id}' is produced by both '{first}' and '{second}'")]
    IdCollision {
        id: String,
        first: String,
        second: String,
    },

    /// Ids referenced by `ref` elements that were never emitted.
    #[error("Unresolved references: {}", .0.join(", "))]
    UnresolvedReferences(Vec<String>),

    /// Misuse of the XML writer (unbalanced elements).
    #[error("XML writer error: {0}")]
    Xml(String),

    /// A serialized container could not be parsed.
    #[error("Invalid serialized container: {0}")]
    InvalidContainer(String),

    /// A mesh record violates the record invariants.
    #[error("Invalid mesh record: {0}")]
    InvalidRecord(String),
}

/// Why a single entity was left out of the export.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The object's geometry could not be turned into triangles.
    #[error("mesh conversion failed: {0}")]
    MeshConversion(String),

    /// Duplication render type the exporter cannot express.
    #[error("unsupported duplication type '{0}'")]
    UnsupportedDupli(String),

    /// Placement matrix has no inverse.
    #[error("singular transform")]
    SingularTransform,

    /// Plugin name missing from the element-kind table.
    #[error("unknown plugin type '{0}'")]
    UnknownPlugin(String),

    /// Emitters cannot be placed more than once.
    #[error("emitter used by multiple instances")]
    InstancedEmitter,

    /// A named entity does not exist in the scene.
    #[error("missing {kind} '{name}'")]
    MissingEntity { kind: &'static str, name: String },
}

/// Outcome of processing one entity.
#[derive(Error, Debug)]
pub enum EntityError {
    /// Log and continue with the next entity.
    #[error("skipped: {0}")]
    Skip(SkipReason),

    /// Abort the session.
    #[error(transparent)]
    Fatal(#[from] ExportError),
}

/// Result type for per-entity work.
pub type EntityResult<T> = std::result::Result<T, EntityError>;

impl From<SkipReason> for EntityError {
    fn from(reason: SkipReason) -> Self {
        EntityError::Skip(reason)
    }
}

impl From<std::io::Error> for EntityError {
    fn from(err: std::io::Error) -> Self {
        EntityError::Fatal(ExportError::Io(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_names_chain() {
        let err = ExportError::ReferenceCycle {
            chain: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "Reference cycle: A -> B -> A");
    }

    #[test]
    fn test_export_error_is_fatal() {
        let err: EntityError = ExportError::Xml("unclosed".into()).into();
        assert!(matches!(err, EntityError::Fatal(_)));
        let skip: EntityError = SkipReason::SingularTransform.into();
        assert!(matches!(skip, EntityError::Skip(SkipReason::SingularTransform)));
    }
}

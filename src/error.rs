use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArgweaveError {
    #[error("'{0}' is not a record schema and cannot be introspected")]
    NotARecord(String),

    #[error("Field '{field}' has unsupported type '{ty}' — expected bool, int, float, str, or a nested record")]
    UnsupportedFieldType { field: String, ty: String },

    #[error("Cannot merge an overlay after a schema has been registered against this surface")]
    OverlayLocked,

    #[error("Overlay block '{dest}' conflicts with the instance registered under the same destination")]
    OverlayConflict { dest: String },

    #[error("Missing required field '{field}' while rebuilding '{dest}'")]
    Reconstruction { dest: String, field: String },

    #[error("{0}")]
    Parse(#[from] clap::Error),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    OverlayFile {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to parse overlay: {0}")]
    OverlaySyntax(toml::de::Error),

    #[error("Overlay block '{0}' is not a table")]
    OverlayNotATable(String),

    #[error("Failed to decode '{key}': {source}")]
    Decode {
        key: String,
        source: toml::de::Error,
    },

    #[error("No value named '{0}' in the parsed namespace")]
    KeyNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_field_type_names_field_and_type() {
        let err = ArgweaveError::UnsupportedFieldType {
            field: "threshold".into(),
            ty: "Duration".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("threshold"));
        assert!(msg.contains("Duration"));
    }

    #[test]
    fn reconstruction_names_destination_and_field() {
        let err = ArgweaveError::Reconstruction {
            dest: "train".into(),
            field: "lr".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("train"));
        assert!(msg.contains("lr"));
    }

    #[test]
    fn overlay_locked_mentions_schema_registration() {
        let msg = ArgweaveError::OverlayLocked.to_string();
        assert!(msg.contains("schema"));
    }
}

//! Runtime schema model: the record types that drive CLI generation.
//!
//! Rust has no runtime struct reflection, so the "record type" is a value:
//! a [`RecordSchema`] lists its fields in declaration order, each with a
//! declared [`TypeRef`] and an optional default. Schemas are built through
//! [`RecordSchemaBuilder`] and shared as `Arc<RecordSchema>` so nested
//! records can appear in several parents without copying.
//!
//! Field order is semantically relevant downstream (help-text ordering and
//! documentation correlation), so it is exactly the builder call order —
//! never sorted.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use toml::{Table, Value};

use crate::docs;
use crate::error::ArgweaveError;

/// A declared field type. Closed set: four scalar kinds plus nested records.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Bool,
    Int,
    Float,
    Str,
    Record(Arc<RecordSchema>),
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Bool => write!(f, "bool"),
            TypeRef::Int => write!(f, "int"),
            TypeRef::Float => write!(f, "float"),
            TypeRef::Str => write!(f, "str"),
            TypeRef::Record(schema) => write!(f, "record {}", schema.name()),
        }
    }
}

/// One declared field: name, type, and default-or-absent.
///
/// A field without a default is required unless an instance or overlay
/// supplies a value for it before parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: TypeRef,
    pub default: Option<Value>,
}

/// A structured record type: an ordered list of typed fields, an optional
/// display label (used as the option-group heading), and optional
/// declaration source text for documentation extraction.
#[derive(Debug, PartialEq)]
pub struct RecordSchema {
    name: String,
    label: Option<String>,
    source: Option<String>,
    fields: Vec<FieldDescriptor>,
}

impl RecordSchema {
    pub fn builder(name: &str) -> RecordSchemaBuilder {
        RecordSchemaBuilder {
            name: name.to_string(),
            label: None,
            source: None,
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The display name: the type-level label when present, else the bare
    /// type name.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Structural defaults as a nested table: every defaulted leaf plus a
    /// (possibly partial) sub-table per nested record. Used as the base of
    /// the overlay deep-merge, so nested tables are included even when the
    /// nested field itself has no default.
    pub fn defaults_table(&self) -> Table {
        let mut table = Table::new();
        for field in &self.fields {
            match (&field.ty, &field.default) {
                (TypeRef::Record(schema), None) => {
                    table.insert(field.name.clone(), Value::Table(schema.defaults_table()));
                }
                (_, Some(default)) => {
                    table.insert(field.name.clone(), default.clone());
                }
                (_, None) => {}
            }
        }
        table
    }

    /// Field documentation extracted from the attached declaration source,
    /// keyed by field name. Empty when no source was attached.
    pub fn attribute_docs(&self) -> BTreeMap<String, String> {
        match &self.source {
            Some(src) => docs::attribute_docs(src),
            None => BTreeMap::new(),
        }
    }
}

/// Schema introspection: the fields of a record type, in declaration order.
///
/// Fails with [`ArgweaveError::NotARecord`] for scalar types.
pub fn fields(ty: &TypeRef) -> Result<&[FieldDescriptor], ArgweaveError> {
    Ok(introspect(ty)?.fields())
}

/// Resolve a [`TypeRef`] to its record schema, or fail if it is not one.
pub fn introspect(ty: &TypeRef) -> Result<&Arc<RecordSchema>, ArgweaveError> {
    match ty {
        TypeRef::Record(schema) => Ok(schema),
        other => Err(ArgweaveError::NotARecord(other.to_string())),
    }
}

/// Builder for [`RecordSchema`]. Field declaration order is preserved.
pub struct RecordSchemaBuilder {
    name: String,
    label: Option<String>,
    source: Option<String>,
    fields: Vec<FieldDescriptor>,
}

impl RecordSchemaBuilder {
    /// Human-readable label, shown as the option-group heading instead of
    /// the bare type name.
    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Attach the declaration source text used for documentation
    /// extraction. See the [`docs`](crate::docs) module for the notation.
    pub fn source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    /// Declare a required field (no default).
    pub fn field(mut self, name: &str, ty: TypeRef) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.to_string(),
            ty,
            default: None,
        });
        self
    }

    /// Declare a defaulted field.
    pub fn defaulted(mut self, name: &str, ty: TypeRef, default: impl Into<Value>) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.to_string(),
            ty,
            default: Some(default.into()),
        });
        self
    }

    /// Declare a nested record field.
    pub fn nested(mut self, name: &str, schema: &Arc<RecordSchema>) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.to_string(),
            ty: TypeRef::Record(Arc::clone(schema)),
            default: None,
        });
        self
    }

    pub fn build(self) -> Arc<RecordSchema> {
        Arc::new(RecordSchema {
            name: self.name,
            label: self.label,
            source: self.source,
            fields: self.fields,
        })
    }
}

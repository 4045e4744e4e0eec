//! Leaf dispatch: pick the argument-binding strategy for one field and emit
//! the corresponding clap option(s).
//!
//! Dispatch is a closed type-case over the runtime kind of the field's
//! default value when one is present, falling back to the declared type:
//! booleans become an enable/disable flag pair, scalars become a single
//! valued option, nested records recurse, anything else is rejected. The
//! ordering is "most specific case wins" and there is no open extension
//! point.

use std::collections::BTreeMap;
use std::sync::Arc;

use clap::{Arg, ArgAction, value_parser};
use toml::Value;

use crate::error::ArgweaveError;
use crate::expand::ReconstructionEntry;
use crate::schema::{RecordSchema, TypeRef};

/// The scalar coercion target of a valued option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScalarKind {
    Int,
    Float,
    Str,
}

/// The resolved binding strategy for one field.
#[derive(Debug, Clone)]
pub(crate) enum Binding {
    Flag { default: bool },
    Scalar { kind: ScalarKind, default: Option<Value> },
    Nested(Arc<RecordSchema>),
    Unsupported(&'static str),
}

/// Transient traversal state for one field: where it sits in the mangled
/// path, its extracted help text, and the option-group heading its options
/// land under. Created fresh per recursion step.
#[derive(Debug, Clone)]
pub(crate) struct FieldContext {
    pub name: String,
    pub ty: TypeRef,
    pub help: Option<String>,
    /// `None` for a flattened root (no prefix level at all); otherwise the
    /// accumulated dotted prefix, possibly empty.
    pub prefix: Option<String>,
    pub heading: Option<String>,
}

/// Everything the surface accumulates while binding: the clap args, the
/// per-leaf extraction specs, and the reconstruction table.
#[derive(Debug, Default)]
pub(crate) struct OptionSink {
    pub args: Vec<Arg>,
    pub leaves: Vec<LeafSpec>,
    pub table: BTreeMap<String, ReconstructionEntry>,
}

/// How to pull one leaf's value out of the parsed matches.
#[derive(Debug, Clone)]
pub(crate) enum LeafSpec {
    Flag {
        dest: String,
        disable_id: String,
        default: bool,
    },
    Scalar {
        dest: String,
        kind: ScalarKind,
    },
}

/// Resolve the binding strategy: runtime kind of the default when present,
/// declared type otherwise.
pub(crate) fn classify(default: Option<&Value>, ty: &TypeRef) -> Binding {
    match default {
        Some(Value::Boolean(b)) => Binding::Flag { default: *b },
        Some(v @ (Value::Integer(_) | Value::Float(_) | Value::String(_))) => Binding::Scalar {
            kind: scalar_kind(ty, v),
            default: Some(v.clone()),
        },
        Some(Value::Table(_)) => match ty {
            TypeRef::Record(schema) => Binding::Nested(Arc::clone(schema)),
            _ => Binding::Unsupported("table"),
        },
        Some(Value::Array(_)) => Binding::Unsupported("array"),
        Some(Value::Datetime(_)) => Binding::Unsupported("datetime"),
        None => match ty {
            // An undefaulted boolean still gets a flag pair; the enable
            // flag is simply off unless supplied.
            TypeRef::Bool => Binding::Flag { default: false },
            TypeRef::Int => Binding::Scalar {
                kind: ScalarKind::Int,
                default: None,
            },
            TypeRef::Float => Binding::Scalar {
                kind: ScalarKind::Float,
                default: None,
            },
            TypeRef::Str => Binding::Scalar {
                kind: ScalarKind::Str,
                default: None,
            },
            TypeRef::Record(schema) => Binding::Nested(Arc::clone(schema)),
        },
    }
}

/// Coercion target: the declared scalar type, or the default's own kind
/// when the declared type is not scalar.
fn scalar_kind(ty: &TypeRef, default: &Value) -> ScalarKind {
    match ty {
        TypeRef::Int => ScalarKind::Int,
        TypeRef::Float => ScalarKind::Float,
        TypeRef::Str => ScalarKind::Str,
        _ => match default {
            Value::Integer(_) => ScalarKind::Int,
            Value::Float(_) => ScalarKind::Float,
            _ => ScalarKind::Str,
        },
    }
}

/// Bind one field: emit its option(s) into the sink, recursing for nested
/// records.
pub(crate) fn bind(
    default: Option<Value>,
    cx: FieldContext,
    sink: &mut OptionSink,
) -> Result<(), ArgweaveError> {
    match classify(default.as_ref(), &cx.ty) {
        Binding::Nested(schema) => bind_record(&schema, default, &cx, sink),
        Binding::Flag { default } => {
            bind_flag(default, &cx, sink);
            Ok(())
        }
        Binding::Scalar { kind, default } => {
            bind_scalar(kind, default, &cx, sink);
            Ok(())
        }
        Binding::Unsupported(kind) => Err(ArgweaveError::UnsupportedFieldType {
            field: destination(&cx),
            ty: kind.to_string(),
        }),
    }
}

fn destination(cx: &FieldContext) -> String {
    format!("{}{}", cx.prefix.as_deref().unwrap_or(""), cx.name)
}

fn bind_record(
    schema: &Arc<RecordSchema>,
    default: Option<Value>,
    cx: &FieldContext,
    sink: &mut OptionSink,
) -> Result<(), ArgweaveError> {
    let instance = match default {
        Some(Value::Table(table)) => Some(table),
        _ => None,
    };
    let prefix = match &cx.prefix {
        None => String::new(),
        Some(p) => format!("{p}{}.", cx.name),
    };
    sink.table.insert(
        prefix.clone(),
        ReconstructionEntry {
            prefix: prefix.clone(),
            schema: Arc::clone(schema),
            dest: destination(cx),
        },
    );

    let heading = schema.display_name().to_string();
    let docs = schema.attribute_docs();
    for field in schema.fields() {
        let field_default = instance
            .as_ref()
            .and_then(|t| t.get(&field.name).cloned())
            .or_else(|| field.default.clone());
        bind(
            field_default,
            FieldContext {
                name: field.name.clone(),
                ty: field.ty.clone(),
                help: docs.get(&field.name).cloned(),
                prefix: Some(prefix.clone()),
                heading: Some(heading.clone()),
            },
            sink,
        )?;
    }
    Ok(())
}

/// Name-mangle a destination path into its option form: underscores become
/// dashes, single-character paths become short options.
fn named_arg(id: String, path: &str, heading: &Option<String>) -> Arg {
    let mangled = path.replace('_', "-");
    let mut arg = Arg::new(id);
    let short = {
        let mut chars = mangled.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    };
    arg = match short {
        Some(c) => arg.short(c),
        None => arg.long(mangled),
    };
    if let Some(h) = heading {
        arg = arg.help_heading(h.clone());
    }
    arg
}

fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A boolean leaf: a pair of mutually overriding flags writing the same
/// destination. Whichever appears last on the command line wins.
fn bind_flag(default: bool, cx: &FieldContext, sink: &mut OptionSink) {
    let pfx = cx.prefix.as_deref().unwrap_or("");
    let dest = format!("{pfx}{}", cx.name);
    let disable_path = format!("{pfx}no-{}", cx.name);
    let disable_id = disable_path.clone();

    let mut enable = named_arg(dest.clone(), &dest, &cx.heading)
        .action(ArgAction::SetTrue)
        .overrides_with(disable_id.clone());
    if let Some(help) = &cx.help {
        let marker = if default { "(Default) " } else { "" };
        enable = enable.help(format!("{marker}{help}"));
    }

    let mut disable = named_arg(disable_id.clone(), &disable_path, &cx.heading)
        .action(ArgAction::SetTrue)
        .overrides_with(dest.clone());
    if let Some(help) = &cx.help {
        let marker = if default { "" } else { "(Default) " };
        disable = disable.help(format!("{marker}Do not {}", lowercase_first(help)));
    }

    sink.args.push(enable);
    sink.args.push(disable);
    sink.leaves.push(LeafSpec::Flag {
        dest,
        disable_id,
        default,
    });
}

/// Render a scalar default as the literal clap shows and re-parses.
fn scalar_literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn bind_scalar(kind: ScalarKind, default: Option<Value>, cx: &FieldContext, sink: &mut OptionSink) {
    let dest = destination(cx);
    let mut arg = named_arg(dest.clone(), &dest, &cx.heading)
        .action(ArgAction::Set)
        .value_name(cx.name.to_uppercase());
    arg = match kind {
        ScalarKind::Int => arg.value_parser(value_parser!(i64)),
        ScalarKind::Float => arg.value_parser(value_parser!(f64)),
        ScalarKind::Str => arg.value_parser(value_parser!(String)),
    };
    arg = match &default {
        Some(value) => arg.default_value(scalar_literal(value)),
        None => arg.required(true),
    };
    if let Some(help) = &cx.help {
        arg = arg.help(help.clone());
    }
    sink.args.push(arg);
    sink.leaves.push(LeafSpec::Scalar { dest, kind });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RecordSchema;

    #[test]
    fn default_kind_wins_over_declared_type() {
        let binding = classify(Some(&Value::Boolean(true)), &TypeRef::Str);
        assert!(matches!(binding, Binding::Flag { default: true }));
    }

    #[test]
    fn declared_type_used_without_default() {
        assert!(matches!(
            classify(None, &TypeRef::Float),
            Binding::Scalar {
                kind: ScalarKind::Float,
                default: None,
            }
        ));
        assert!(matches!(
            classify(None, &TypeRef::Bool),
            Binding::Flag { default: false }
        ));
    }

    #[test]
    fn record_type_dispatches_to_nested() {
        let schema = RecordSchema::builder("Inner").build();
        let ty = TypeRef::Record(schema);
        assert!(matches!(classify(None, &ty), Binding::Nested(_)));
    }

    #[test]
    fn array_defaults_are_unsupported() {
        let default = Value::Array(vec![Value::Integer(1)]);
        assert!(matches!(
            classify(Some(&default), &TypeRef::Str),
            Binding::Unsupported("array")
        ));
    }

    #[test]
    fn scalar_coercion_follows_declared_type() {
        // An integer default on a float field still parses floats.
        let binding = classify(Some(&Value::Integer(1)), &TypeRef::Float);
        assert!(matches!(
            binding,
            Binding::Scalar {
                kind: ScalarKind::Float,
                ..
            }
        ));
    }

    #[test]
    fn lowercase_first_only_touches_the_first_letter() {
        assert_eq!(lowercase_first("Enable verbose output"), "enable verbose output");
        assert_eq!(lowercase_first(""), "");
    }

    #[test]
    fn single_character_paths_become_short_options() {
        let arg = named_arg("x".into(), "x", &None);
        assert_eq!(arg.get_short(), Some('x'));
        assert_eq!(arg.get_long(), None);
    }

    #[test]
    fn underscores_mangle_to_dashes() {
        let arg = named_arg("train.learning_rate".into(), "train.learning_rate", &None);
        assert_eq!(arg.get_long(), Some("train.learning-rate"));
    }
}

//! Post-parse expansion: rebuild nested record instances from the flat
//! parsed namespace.
//!
//! Surface building records one [`ReconstructionEntry`] per nested-record
//! field, keyed by its full mangled prefix. Expansion runs exactly once,
//! processing entries by decreasing prefix length so inner records are
//! materialized before the outer record that consumes them as a plain field
//! value. The namespace is rewritten in place: matching flat keys are
//! removed and one constructed table is inserted under the entry's
//! destination name.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use toml::{Table, Value};

use crate::error::ArgweaveError;
use crate::schema::RecordSchema;

/// How to rebuild one nested-record field from its flattened destinations.
#[derive(Debug, Clone)]
pub(crate) struct ReconstructionEntry {
    pub prefix: String,
    pub schema: Arc<RecordSchema>,
    pub dest: String,
}

/// The parsed configuration: flat leaf values replaced by one reconstructed
/// table per registered destination.
#[derive(Debug, Clone, PartialEq)]
pub struct Namespace {
    values: BTreeMap<String, Value>,
}

impl Namespace {
    pub(crate) fn new(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Deserialize the value under `key` into a typed struct.
    pub fn decode<T: DeserializeOwned>(&self, key: &str) -> Result<T, ArgweaveError> {
        let value = self
            .values
            .get(key)
            .cloned()
            .ok_or_else(|| ArgweaveError::KeyNotFound(key.to_string()))?;
        value.try_into().map_err(|source| ArgweaveError::Decode {
            key: key.to_string(),
            source,
        })
    }
}

/// Rebuild nested records bottom-up, longest prefix first (ties broken
/// lexicographically for determinism).
///
/// A flat key belongs to an entry iff it starts with the entry's prefix and
/// the remainder names one of the entry's declared fields. Fields absent
/// from the scan fall back to their declared default; a required field with
/// no value fails with [`ArgweaveError::Reconstruction`].
pub(crate) fn expand(
    values: &mut BTreeMap<String, Value>,
    table: &BTreeMap<String, ReconstructionEntry>,
) -> Result<(), ArgweaveError> {
    let mut entries: Vec<&ReconstructionEntry> = table.values().collect();
    entries.sort_by(|a, b| {
        b.prefix
            .len()
            .cmp(&a.prefix.len())
            .then_with(|| a.prefix.cmp(&b.prefix))
    });

    for entry in entries {
        let matching: Vec<String> = values
            .keys()
            .filter(|key| {
                key.strip_prefix(&entry.prefix)
                    .is_some_and(|rest| entry.schema.has_field(rest))
            })
            .cloned()
            .collect();

        let mut built = Table::new();
        for key in matching {
            if let Some(value) = values.remove(&key) {
                built.insert(key[entry.prefix.len()..].to_string(), value);
            }
        }
        for field in entry.schema.fields() {
            if !built.contains_key(&field.name) {
                match &field.default {
                    Some(default) => {
                        built.insert(field.name.clone(), default.clone());
                    }
                    None => {
                        return Err(ArgweaveError::Reconstruction {
                            dest: entry.dest.clone(),
                            field: field.name.clone(),
                        });
                    }
                }
            }
        }
        values.insert(entry.dest.clone(), Value::Table(built));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{RecordSchema, TypeRef};
    use serde::Deserialize;

    fn entry(prefix: &str, schema: &Arc<RecordSchema>, dest: &str) -> (String, ReconstructionEntry) {
        (
            prefix.to_string(),
            ReconstructionEntry {
                prefix: prefix.to_string(),
                schema: Arc::clone(schema),
                dest: dest.to_string(),
            },
        )
    }

    fn flat(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn inner_prefixes_expand_before_outer_ones() {
        let inner = RecordSchema::builder("B").field("x", TypeRef::Int).build();
        let outer = RecordSchema::builder("A")
            .nested("b", &inner)
            .field("y", TypeRef::Int)
            .build();
        let table: BTreeMap<_, _> = [entry("a.", &outer, "a"), entry("a.b.", &inner, "a.b")]
            .into_iter()
            .collect();
        let mut values = flat(&[("a.b.x", Value::Integer(1)), ("a.y", Value::Integer(2))]);

        expand(&mut values, &table).unwrap();

        assert_eq!(values.len(), 1);
        let a = values["a"].as_table().unwrap();
        assert_eq!(a["y"].as_integer().unwrap(), 2);
        assert_eq!(a["b"].as_table().unwrap()["x"].as_integer().unwrap(), 1);
    }

    #[test]
    fn missing_required_field_fails_naming_destination_and_field() {
        let schema = RecordSchema::builder("T").field("lr", TypeRef::Float).build();
        let table: BTreeMap<_, _> = [entry("train.", &schema, "train")].into_iter().collect();
        let mut values = BTreeMap::new();

        let err = expand(&mut values, &table).unwrap_err();
        match err {
            ArgweaveError::Reconstruction { dest, field } => {
                assert_eq!(dest, "train");
                assert_eq!(field, "lr");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn absent_defaulted_fields_fall_back_to_their_defaults() {
        let schema = RecordSchema::builder("T")
            .defaulted("epochs", TypeRef::Int, 10)
            .build();
        let table: BTreeMap<_, _> = [entry("train.", &schema, "train")].into_iter().collect();
        let mut values = BTreeMap::new();

        expand(&mut values, &table).unwrap();
        let train = values["train"].as_table().unwrap();
        assert_eq!(train["epochs"].as_integer().unwrap(), 10);
    }

    #[test]
    fn keys_with_undeclared_remainders_are_left_alone() {
        let schema = RecordSchema::builder("T").defaulted("x", TypeRef::Int, 1).build();
        let table: BTreeMap<_, _> = [entry("a.", &schema, "a")].into_iter().collect();
        let mut values = flat(&[("a.x", Value::Integer(5)), ("a.unrelated", Value::Integer(9))]);

        expand(&mut values, &table).unwrap();
        assert_eq!(values["a.unrelated"].as_integer().unwrap(), 9);
        assert_eq!(values["a"].as_table().unwrap()["x"].as_integer().unwrap(), 5);
    }

    #[test]
    fn empty_prefix_collects_top_level_keys() {
        let schema = RecordSchema::builder("T")
            .defaulted("epochs", TypeRef::Int, 10)
            .build();
        let table: BTreeMap<_, _> = [entry("", &schema, "train")].into_iter().collect();
        let mut values = flat(&[("epochs", Value::Integer(3)), ("other", Value::Boolean(true))]);

        expand(&mut values, &table).unwrap();
        assert_eq!(
            values["train"].as_table().unwrap()["epochs"].as_integer().unwrap(),
            3
        );
        assert!(values.contains_key("other"));
    }

    #[test]
    fn namespace_decodes_into_typed_structs() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Training {
            epochs: i64,
            lr: f64,
        }
        let mut table = Table::new();
        table.insert("epochs".into(), Value::Integer(10));
        table.insert("lr".into(), Value::Float(0.01));
        let ns = Namespace::new([("train".to_string(), Value::Table(table))].into());

        let train: Training = ns.decode("train").unwrap();
        assert_eq!(
            train,
            Training {
                epochs: 10,
                lr: 0.01
            }
        );
        assert!(matches!(
            ns.decode::<Training>("missing"),
            Err(ArgweaveError::KeyNotFound(_))
        ));
    }
}

//! The configuration surface: one instance per invocation, owning the
//! generated options, the reconstruction table, and the overlay store.
//!
//! Phases run strictly in order — overlay merges, schema builds, parse,
//! expansion — and the lock on the overlay enforces the first boundary.
//! Building walks each schema recursively through the leaf dispatcher;
//! parsing hands argv to clap and then rewrites the flat result into nested
//! record tables exactly once.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;

use clap::parser::ValueSource;
use toml::{Table, Value};

use crate::dispatch::{self, FieldContext, LeafSpec, OptionSink, ScalarKind};
use crate::error::ArgweaveError;
use crate::expand::{self, Namespace};
use crate::overlay::OverlayStore;
use crate::schema::{RecordSchema, TypeRef};

/// A flat CLI surface synthesized from one or more record schemas.
pub struct Surface {
    name: String,
    about: Option<String>,
    sink: OptionSink,
    overlay: OverlayStore,
    destinations: BTreeSet<String>,
}

impl Surface {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            about: None,
            sink: OptionSink::default(),
            overlay: OverlayStore::new(),
            destinations: BTreeSet::new(),
        }
    }

    /// Program description shown in `--help`.
    pub fn about(mut self, text: &str) -> Self {
        self.about = Some(text.to_string());
        self
    }

    /// Deep-merge externally supplied partial configuration.
    ///
    /// Must precede every [`add_schema`](Self::add_schema) call; fails with
    /// [`ArgweaveError::OverlayLocked`] afterwards.
    pub fn merge_overlay(&mut self, overlay: Table) -> Result<(), ArgweaveError> {
        self.overlay.merge(overlay)
    }

    /// Merge an overlay given as a TOML document.
    pub fn merge_overlay_str(&mut self, text: &str) -> Result<(), ArgweaveError> {
        self.overlay.merge_str(text)
    }

    /// Merge an overlay from a TOML file.
    pub fn merge_overlay_file(&mut self, path: impl AsRef<Path>) -> Result<(), ArgweaveError> {
        self.overlay.merge_file(path.as_ref())
    }

    /// Register a schema under `dest`, generating its options.
    ///
    /// Fields are required unless individually defaulted; an overlay block
    /// named `dest` is deep-merged over the schema defaults first. With
    /// `flatten` the options are unprefixed (`--epochs`); without it every
    /// option carries a `dest.` level (`--train.epochs`), which is what
    /// lets several schemas share one namespace without collision.
    ///
    /// Locks the overlay as a side effect.
    pub fn add_schema(
        &mut self,
        dest: &str,
        schema: &Arc<RecordSchema>,
        flatten: bool,
    ) -> Result<(), ArgweaveError> {
        self.overlay.lock();
        self.destinations.insert(dest.to_string());
        let instance = self.overlay.resolve(dest, schema)?;
        self.bind_root(dest, schema, instance, flatten)
    }

    /// Register a schema with an instance's current field values as
    /// defaults. Incompatible with an overlay block of the same name.
    pub fn add_instance(
        &mut self,
        dest: &str,
        schema: &Arc<RecordSchema>,
        values: Table,
        flatten: bool,
    ) -> Result<(), ArgweaveError> {
        self.overlay.lock();
        if self.overlay.contains(dest) {
            return Err(ArgweaveError::OverlayConflict {
                dest: dest.to_string(),
            });
        }
        self.destinations.insert(dest.to_string());
        self.bind_root(dest, schema, Some(values), flatten)
    }

    fn bind_root(
        &mut self,
        dest: &str,
        schema: &Arc<RecordSchema>,
        instance: Option<Table>,
        flatten: bool,
    ) -> Result<(), ArgweaveError> {
        let cx = FieldContext {
            name: dest.to_string(),
            ty: TypeRef::Record(Arc::clone(schema)),
            help: None,
            prefix: if flatten { None } else { Some(String::new()) },
            heading: None,
        };
        dispatch::bind(instance.map(Value::Table), cx, &mut self.sink)
    }

    /// Overlay blocks no registered schema consumed. Non-empty means a
    /// misspelled or mis-nested block; parsing still proceeds on schema
    /// defaults.
    pub fn unused_overlay_blocks(&self) -> Vec<String> {
        self.overlay.unused()
    }

    /// The generated clap command, rebuilt on demand.
    pub fn command(&self) -> clap::Command {
        let mut cmd = clap::Command::new(self.name.clone());
        if let Some(about) = &self.about {
            cmd = cmd.about(about.clone());
        }
        cmd.args(self.sink.args.iter().cloned())
    }

    /// Parse `std::env::args` and expand the result.
    pub fn parse(&self) -> Result<Namespace, ArgweaveError> {
        self.parse_from(std::env::args_os())
    }

    /// Parse the given argv (first element is the binary name, clap
    /// convention) and expand the flat result into nested record tables.
    pub fn parse_from<I, T>(&self, argv: I) -> Result<Namespace, ArgweaveError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let unused = self.overlay.unused();
        if !unused.is_empty() {
            tracing::warn!(
                unused = ?unused,
                valid = ?self.destinations,
                "overlay blocks were never consumed — did you forget a nesting level?"
            );
        }

        let matches = self.command().try_get_matches_from(argv)?;
        let mut values = BTreeMap::new();
        for leaf in &self.sink.leaves {
            match leaf {
                LeafSpec::Flag {
                    dest,
                    disable_id,
                    default,
                } => {
                    let supplied =
                        |id: &str| matches.value_source(id) == Some(ValueSource::CommandLine);
                    let value = if supplied(disable_id) {
                        false
                    } else if supplied(dest) {
                        true
                    } else {
                        *default
                    };
                    values.insert(dest.clone(), Value::Boolean(value));
                }
                LeafSpec::Scalar { dest, kind } => {
                    let value = match kind {
                        ScalarKind::Int => matches.get_one::<i64>(dest).map(|v| Value::Integer(*v)),
                        ScalarKind::Float => matches.get_one::<f64>(dest).map(|v| Value::Float(*v)),
                        ScalarKind::Str => matches
                            .get_one::<String>(dest)
                            .map(|v| Value::String(v.clone())),
                    };
                    if let Some(value) = value {
                        values.insert(dest.clone(), value);
                    }
                }
            }
        }

        expand::expand(&mut values, &self.sink.table)?;
        Ok(Namespace::new(values))
    }
}

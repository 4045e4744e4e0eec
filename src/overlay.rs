//! Base configuration overlay: externally supplied partial values merged
//! with schema defaults before the CLI surface is built.
//!
//! The store locks the moment the first schema is registered against it —
//! every merge must happen before every build, so defaults resolved during
//! building can never go stale. Consumption is tracked per top-level block
//! so the surface can warn about blocks no schema ever asked for (usually a
//! misspelled or mis-nested key).

use std::collections::BTreeSet;
use std::path::Path;

use toml::{Table, Value};

use crate::error::ArgweaveError;
use crate::schema::RecordSchema;

/// Deep-merge `overlay` onto `base`: tables merge key-by-key recursively,
/// anything else (scalars, arrays) is replaced wholesale by the overlay
/// side.
pub fn deep_merge(mut base: Table, overlay: Table) -> Table {
    for (key, incoming) in overlay {
        let merged = match (base.remove(&key), incoming) {
            (Some(Value::Table(lower)), Value::Table(upper)) => {
                Value::Table(deep_merge(lower, upper))
            }
            (_, upper) => upper,
        };
        base.insert(key, merged);
    }
    base
}

/// Partial configuration keyed by top-level destination name.
#[derive(Debug, Default)]
pub struct OverlayStore {
    table: Table,
    locked: bool,
    consumed: BTreeSet<String>,
}

impl OverlayStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deep-merge a partial configuration into the store.
    ///
    /// Fails with [`ArgweaveError::OverlayLocked`] once any schema has been
    /// registered: all merges must precede all builds.
    pub fn merge(&mut self, overlay: Table) -> Result<(), ArgweaveError> {
        if self.locked {
            return Err(ArgweaveError::OverlayLocked);
        }
        self.table = deep_merge(std::mem::take(&mut self.table), overlay);
        Ok(())
    }

    /// Merge a TOML document.
    pub fn merge_str(&mut self, text: &str) -> Result<(), ArgweaveError> {
        let table: Table = text.parse().map_err(ArgweaveError::OverlaySyntax)?;
        self.merge(table)
    }

    /// Merge a TOML file; read and parse failures carry the path.
    pub fn merge_file(&mut self, path: &Path) -> Result<(), ArgweaveError> {
        let text = std::fs::read_to_string(path).map_err(|source| ArgweaveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table: Table = text.parse().map_err(|source| ArgweaveError::OverlayFile {
            path: path.to_path_buf(),
            source,
        })?;
        self.merge(table)
    }

    /// Refuse further merges. Called by the surface when the first schema
    /// is registered; idempotent.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn contains(&self, dest: &str) -> bool {
        self.table.contains_key(dest)
    }

    /// Resolve the effective defaults for one destination: the schema's
    /// structural defaults with the overlay block deep-merged on top
    /// (overlay wins), marking the block consumed. `None` when the overlay
    /// has nothing for this destination.
    pub fn resolve(
        &mut self,
        dest: &str,
        schema: &RecordSchema,
    ) -> Result<Option<Table>, ArgweaveError> {
        match self.table.get(dest) {
            None => Ok(None),
            Some(Value::Table(block)) => {
                self.consumed.insert(dest.to_string());
                Ok(Some(deep_merge(schema.defaults_table(), block.clone())))
            }
            Some(_) => Err(ArgweaveError::OverlayNotATable(dest.to_string())),
        }
    }

    /// Blocks that were merged but never consumed by any schema build.
    pub fn unused(&self) -> Vec<String> {
        self.table
            .keys()
            .filter(|key| !self.consumed.contains(*key))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TypeRef;
    use std::io::Write;

    fn table(text: &str) -> Table {
        text.parse().unwrap()
    }

    #[test]
    fn tables_merge_recursively_and_overlay_wins() {
        let base = table("[train]\nepochs = 10\nlr = 0.1");
        let overlay = table("[train]\nlr = 0.01");
        let merged = deep_merge(base, overlay);
        let train = merged["train"].as_table().unwrap();
        assert_eq!(train["epochs"].as_integer().unwrap(), 10);
        assert_eq!(train["lr"].as_float().unwrap(), 0.01);
    }

    #[test]
    fn arrays_are_replaced_wholesale() {
        let base = table("tags = [1, 2, 3]");
        let overlay = table("tags = [9]");
        let merged = deep_merge(base, overlay);
        assert_eq!(merged["tags"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn merging_twice_before_any_build_accumulates() {
        let mut store = OverlayStore::new();
        store.merge(table("[train]\nepochs = 5")).unwrap();
        store.merge(table("[train]\nlr = 0.5\n[probe]\nrate = 2")).unwrap();
        assert!(store.contains("train"));
        assert!(store.contains("probe"));
    }

    #[test]
    fn merge_after_lock_fails() {
        let mut store = OverlayStore::new();
        store.lock();
        let err = store.merge(Table::new()).unwrap_err();
        assert!(matches!(err, ArgweaveError::OverlayLocked));
    }

    #[test]
    fn resolve_merges_schema_defaults_under_the_block() {
        let schema = RecordSchema::builder("Training")
            .defaulted("epochs", TypeRef::Int, 10)
            .defaulted("batch", TypeRef::Int, 32)
            .build();
        let mut store = OverlayStore::new();
        store.merge(table("[train]\nepochs = 5")).unwrap();

        let resolved = store.resolve("train", &schema).unwrap().unwrap();
        assert_eq!(resolved["epochs"].as_integer().unwrap(), 5);
        assert_eq!(resolved["batch"].as_integer().unwrap(), 32);
        assert!(store.unused().is_empty());
    }

    #[test]
    fn resolve_misses_leave_the_block_unused() {
        let schema = RecordSchema::builder("Training").build();
        let mut store = OverlayStore::new();
        store.merge(table("[trian]\nepochs = 5")).unwrap();

        assert!(store.resolve("train", &schema).unwrap().is_none());
        assert_eq!(store.unused(), vec!["trian".to_string()]);
    }

    #[test]
    fn non_table_blocks_are_rejected() {
        let schema = RecordSchema::builder("Training").build();
        let mut store = OverlayStore::new();
        store.merge(table("train = 3")).unwrap();
        assert!(matches!(
            store.resolve("train", &schema),
            Err(ArgweaveError::OverlayNotATable(_))
        ));
    }

    #[test]
    fn merge_str_reports_syntax_errors() {
        let mut store = OverlayStore::new();
        assert!(matches!(
            store.merge_str("not == toml"),
            Err(ArgweaveError::OverlaySyntax(_))
        ));
    }

    #[test]
    fn merge_file_loads_and_carries_the_path_on_failure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[train]\nepochs = 7").unwrap();

        let mut store = OverlayStore::new();
        store.merge_file(file.path()).unwrap();
        assert!(store.contains("train"));

        let missing = file.path().with_extension("gone");
        let err = store.merge_file(&missing).unwrap_err();
        assert!(err.to_string().contains("gone"));
    }
}

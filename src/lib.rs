//! Declarative configuration surfaces: describe nested, typed, defaulted
//! record schemas once, get a flat command-line interface generated from
//! them, and receive typed nested configuration objects back after parsing.
//!
//! ```ignore
//! let optimizer = RecordSchema::builder("Optimizer")
//!     .defaulted("name", TypeRef::Str, "sgd")
//!     .field("lr", TypeRef::Float)
//!     .build();
//! let training = RecordSchema::builder("Training")
//!     .defaulted("epochs", TypeRef::Int, 10)
//!     .nested("optimizer", &optimizer)
//!     .build();
//!
//! let mut surface = Surface::new("train");
//! surface.merge_overlay_file("site.toml")?;
//! surface.add_schema("train", &training, false)?;
//!
//! let ns = surface.parse()?;          // --train.epochs, --train.optimizer.lr, ...
//! let config: MyTraining = ns.decode("train")?;
//! ```
//!
//! # How it works
//!
//! Building walks each registered schema recursively. Every leaf field
//! becomes one or two clap options named by its dash-mangled dotted path
//! (`--train.optimizer.learning-rate`); every nested record contributes an
//! option-group heading and one entry in a **reconstruction table** keyed
//! by its mangled prefix. After parsing, the flat result is rewritten in
//! place, longest prefix first, so inner records are rebuilt before the
//! outer record consumes them as plain field values. The caller reads one
//! nested [`toml::Value`] table per destination — or deserializes it into
//! any `serde::Deserialize` struct via [`Namespace::decode`].
//!
//! Leaf binding is a closed type-case over the field's default value (or
//! its declared type when no default exists):
//!
//! - **Booleans** produce a `--name` / `--no-name` pair writing the same
//!   destination; the one supplied last wins.
//! - **Scalars** (int, float, str) produce one valued option, required
//!   exactly when no default exists anywhere in the chain.
//! - **Nested records** recurse with an extended prefix.
//!
//! # Layering
//!
//! Defaults resolve in three layers, lowest first: schema-declared
//! defaults, an externally supplied **overlay** (partial TOML, deep-merged,
//! overlay wins), and finally whatever the user passes on the command
//! line. All overlay merges must precede all schema registrations — the
//! store locks at the first registration — and blocks no schema consumes
//! are reported as a warning rather than an error, since a misspelled
//! block should not take the program down.
//!
//! # Field documentation
//!
//! Help text is not declared through yet another API: attach the schema's
//! declaration source text and the [`docs`] extractor associates comments
//! with fields purely by lexical position — a comment above a field, a
//! trailing comment on its line, or a standalone string literal after it.
//! See the [`docs`] module for the exact (deliberately heuristic) rules.
//!
//! # Errors
//!
//! All fallible operations return [`ArgweaveError`]. Build-time failures
//! (non-record schemas, unsupported leaf types, overlay misuse) surface
//! immediately; a required nested field missing after parsing reads like
//! clap's own missing-required-option error, just deferred to expansion.

pub mod docs;
pub mod error;
pub mod schema;

mod dispatch;
mod expand;
mod overlay;
mod surface;

pub use error::ArgweaveError;
pub use expand::Namespace;
pub use overlay::{OverlayStore, deep_merge};
pub use schema::{FieldDescriptor, RecordSchema, RecordSchemaBuilder, TypeRef};
pub use surface::Surface;

//! Demo: a two-level training schema with documentation source, an overlay
//! file, and typed decoding of the parse result.
//!
//! Try:
//!
//! ```text
//! cargo run --example train_demo -- --help
//! cargo run --example train_demo -- --train.optimizer.lr 0.01
//! cargo run --example train_demo -- --train.epochs 3 --train.optimizer.lr 0.1 --train.no-verbose
//! ```

use argweave::{RecordSchema, Surface, TypeRef};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Optimizer {
    name: String,
    lr: f64,
}

#[derive(Debug, Deserialize)]
struct Training {
    epochs: i64,
    verbose: bool,
    optimizer: Optimizer,
}

const OPTIMIZER_SRC: &str = "\
struct Optimizer {
    name: str = \"sgd\", // Optimizer family
    lr: float, // Peak learning rate
}
";

const TRAINING_SRC: &str = "\
struct Training {
    // Number of passes over the dataset
    epochs: int = 10,
    verbose: bool = true, // Print progress while training
    optimizer: Optimizer,
}
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let optimizer = RecordSchema::builder("Optimizer")
        .label("Optimizer settings")
        .source(OPTIMIZER_SRC)
        .defaulted("name", TypeRef::Str, "sgd")
        .field("lr", TypeRef::Float)
        .build();
    let training = RecordSchema::builder("Training")
        .label("Training parameters")
        .source(TRAINING_SRC)
        .defaulted("epochs", TypeRef::Int, 10)
        .defaulted("verbose", TypeRef::Bool, true)
        .nested("optimizer", &optimizer)
        .build();

    let mut surface = Surface::new("train_demo").about("Configuration surface demo");
    if let Ok(overlay) = std::env::var("TRAIN_OVERLAY") {
        surface.merge_overlay_file(&overlay)?;
    }
    surface.add_schema("train", &training, false)?;

    let ns = surface.parse()?;
    for block in surface.unused_overlay_blocks() {
        eprintln!("warning: overlay block '{block}' was never used");
    }

    let config: Training = ns.decode("train")?;
    println!("{config:#?}");
    Ok(())
}

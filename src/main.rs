use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, bail};
use clap::Parser;
use log::info;
use sclj::config::CompilerConfig;
use sclj::pipeline::Compiler;

#[derive(Parser)]
#[command(name = "sclj")]
#[command(about = "Compile a static Clojure subset to a Java class", long_about = None)]
struct Cli {
    /// Clojure source file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Java file to write; its stem becomes the class name
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Join incompatible types to Object instead of leaving them unknown
    #[arg(long)]
    object_supertype: bool,

    /// Fold single-use lifted functions and void adapters into their caller
    #[arg(long)]
    lambda_drop: bool,
}

/// Times the execution of a closure and logs the elapsed time.
fn time<T, F: FnOnce() -> T>(name: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    info!("{}: {}ms", name, start.elapsed().as_millis());
    result
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let Some(class_name) = cli.output.file_stem().and_then(|s| s.to_str()) else {
        bail!("cannot derive a class name from {}", cli.output.display());
    };
    let config = CompilerConfig::new()
        .with_class_name(class_name)
        .with_object_supertype(cli.object_supertype)
        .with_lambda_drop(cli.lambda_drop);

    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;

    let parsed = time("parse", || Compiler::parse(&source))?;
    let built = time("build", || parsed.build(&config))?;
    let typed = time("infer", || built.infer());
    let lifted = time("lift", || typed.lift())?;
    let specialized = time("specialize", || lifted.specialize());
    let normalized = time("normalize", || specialized.normalize());
    let compilation = time("emit", || normalized.emit())?;

    let reports = &compilation.reports;
    info!(
        "{} closures lifted, {} sequence operations specialized, {} void adapters, {} dropped",
        reports.lifting.lifted.len(),
        reports.specialization.specialized,
        reports.normalization.adapters.len(),
        reports.dropping.dropped.len()
    );

    fs::write(&cli.output, &compilation.java)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;
    info!(
        "wrote class `{}` to {}",
        compilation.class_name,
        cli.output.display()
    );
    Ok(())
}

use std::path::PathBuf;

use clap::Args;

use super::compile;

#[derive(Args)]
pub struct CheckArgs {
    /// Input .cl source file
    pub input: PathBuf,
}

pub fn cmd_check(args: CheckArgs) {
    let (_, program, graph) = compile(&args.input);
    eprintln!("OK: {}", args.input.display());
    eprintln!("{} classes", graph.classes().count());
    let _ = program;
}

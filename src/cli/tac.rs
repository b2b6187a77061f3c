use std::path::PathBuf;

use clap::Args;

use super::compile;

#[derive(Args)]
pub struct TacArgs {
    /// Input .cl source file
    pub input: PathBuf,
}

pub fn cmd_tac(args: TacArgs) {
    let (_, program, graph) = compile(&args.input);
    let tac = cool_core::translate(&program, &graph);
    print!("{}", tac);
}

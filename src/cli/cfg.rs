use clap::Args;

use super::{compile, select_method, MethodSelector};

#[derive(Args)]
pub struct CfgArgs {
    #[command(flatten)]
    pub selector: MethodSelector,
}

pub fn cmd_cfg(args: CfgArgs) {
    let (_, program, graph) = compile(&args.selector.input);
    let tac = cool_core::translate(&program, &graph);
    let method = select_method(&tac, &args.selector.method);
    let cfg = cool_core::build_cfg(method);
    print!("{}", cfg);
}

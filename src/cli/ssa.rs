use clap::Args;

use super::{compile, select_method, MethodSelector};

#[derive(Args)]
pub struct SsaArgs {
    #[command(flatten)]
    pub selector: MethodSelector,
}

pub fn cmd_ssa(args: SsaArgs) {
    let (_, program, graph) = compile(&args.selector.input);
    let tac = cool_core::translate(&program, &graph);
    let method = select_method(&tac, &args.selector.method);
    let cfg = cool_core::build_cfg(method);
    let ssa_method = cool_core::convert_to_ssa(method, &cfg);
    print!("{}", ssa_method);
}

use clap::Args;

use super::{compile, select_method, MethodSelector};

#[derive(Args)]
pub struct ConstPropArgs {
    #[command(flatten)]
    pub selector: MethodSelector,
    /// Skip SSA conversion and run directly on the raw TAC
    #[arg(long)]
    pub no_ssa: bool,
}

pub fn cmd_constprop(args: ConstPropArgs) {
    let (_, program, graph) = compile(&args.selector.input);
    let tac = cool_core::translate(&program, &graph);
    let method = select_method(&tac, &args.selector.method).clone();

    let cfg = cool_core::build_cfg(&method);
    let mut method = if args.no_ssa { method } else { cool_core::convert_to_ssa(&method, &cfg) };
    let cfg = cool_core::build_cfg(&method);

    let (result, changes) = cool_core::run_constant_propagation(&mut method, &cfg);

    for (id, env) in result.block_out.iter().enumerate() {
        if env.is_empty() {
            continue;
        }
        println!("block {}:", id);
        let mut names: Vec<&String> = env.keys().collect();
        names.sort();
        for name in names {
            println!("  {} = {:?}", name, env[name]);
        }
    }
    println!("--- folded ({} change{}) ---", changes, if changes == 1 { "" } else { "s" });
    print!("{}", method);
}

use clap::Args;

use super::{compile, select_method, MethodSelector};

#[derive(Args)]
pub struct LivenessArgs {
    #[command(flatten)]
    pub selector: MethodSelector,
    /// Run dead-code elimination afterward and print the survivors
    #[arg(long)]
    pub dce: bool,
}

pub fn cmd_liveness(args: LivenessArgs) {
    let (_, program, graph) = compile(&args.selector.input);
    let tac = cool_core::translate(&program, &graph);
    let mut method = select_method(&tac, &args.selector.method).clone();
    let cfg = cool_core::build_cfg(&method);

    let liveness = cool_core::run_liveness(&method, &cfg);
    for (id, live_in) in liveness.live_in.iter().enumerate() {
        let mut names: Vec<&String> = live_in.iter().collect();
        names.sort();
        println!("block {} live-in: {:?}", id, names);
    }

    let ranges = cool_core::compute_live_ranges(&method, &cfg, &liveness);
    let graph_iface = cool_core::build_interference_graph(&method, &cfg, &liveness);
    println!("--- {} live range(s), {} interfering pair(s) ---", ranges.ranges.len(), graph_iface.edges.values().map(|s| s.len()).sum::<usize>() / 2);

    if args.dce {
        let removed = cool_core::run_dead_code_elimination(&mut method, &cfg);
        println!("--- removed {} dead instruction{} ---", removed, if removed == 1 { "" } else { "s" });
        print!("{}", method);
    }
}

mod cli;

use clap::{Parser, Subcommand};

use cli::cfg::CfgArgs;
use cli::check::CheckArgs;
use cli::constprop::ConstPropArgs;
use cli::lex::LexArgs;
use cli::liveness::LivenessArgs;
use cli::parse::ParseArgs;
use cli::ssa::SsaArgs;
use cli::tac::TacArgs;

#[derive(Parser)]
#[command(name = "coolc", version, about = "COOL compiler core — lex, parse, analyze, and inspect the middle-end IR")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Tokenize a .cl file and print its lexeme stream
    Lex(LexArgs),
    /// Parse a .cl file and print its AST
    Parse(ParseArgs),
    /// Run semantic analysis and report errors
    Check(CheckArgs),
    /// Lower to three-address code
    Tac(TacArgs),
    /// Build and print a method's control-flow graph
    Cfg(CfgArgs),
    /// Convert a method's CFG to SSA form
    Ssa(SsaArgs),
    /// Run constant propagation (optionally over SSA) and fold the result
    Constprop(ConstPropArgs),
    /// Run liveness analysis, live ranges, interference, and optional DCE
    Liveness(LivenessArgs),
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Lex(args) => cli::lex::cmd_lex(args),
        Command::Parse(args) => cli::parse::cmd_parse(args),
        Command::Check(args) => cli::check::cmd_check(args),
        Command::Tac(args) => cli::tac::cmd_tac(args),
        Command::Cfg(args) => cli::cfg::cmd_cfg(args),
        Command::Ssa(args) => cli::ssa::cmd_ssa(args),
        Command::Constprop(args) => cli::constprop::cmd_constprop(args),
        Command::Liveness(args) => cli::liveness::cmd_liveness(args),
    }
}

//! Compile options: how far to drive the pipeline and which optional
//! passes to run, shared by the library entry points in `lib.rs` and
//! the `coolc` CLI subcommands in `cli/`.

use std::fmt;

/// The last pipeline stage a compilation should execute. Each variant
/// names the pass that *produces* it, matching the `coolc` subcommand of
/// the same name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Lex,
    Parse,
    Analyze,
    Tac,
    Cfg,
    Ssa,
    Dataflow,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Lex => "lex",
            Stage::Parse => "parse",
            Stage::Analyze => "analyze",
            Stage::Tac => "tac",
            Stage::Cfg => "cfg",
            Stage::Ssa => "ssa",
            Stage::Dataflow => "dataflow",
        };
        write!(f, "{}", s)
    }
}

/// Knobs a driver (the CLI, a test harness, a benchmark) uses to decide
/// how much of the pipeline to run and which optional IR passes to
/// apply on top of it.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CompileOptions {
    pub stop_after: Stage,
    /// Convert to SSA before any data-flow analysis runs.
    pub ssa: bool,
    /// Run constant propagation and fold its result back in.
    pub fold: bool,
    /// Run liveness-driven dead code elimination.
    pub dce: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions { stop_after: Stage::Dataflow, ssa: true, fold: true, dce: true }
    }
}

impl CompileOptions {
    pub fn stage_only(stage: Stage) -> Self {
        CompileOptions { stop_after: stage, ssa: false, fold: false, dce: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_runs_the_whole_pipeline() {
        let opts = CompileOptions::default();
        assert_eq!(opts.stop_after, Stage::Dataflow);
        assert!(opts.ssa && opts.fold && opts.dce);
    }

    #[test]
    fn test_stage_ordering() {
        assert!(Stage::Lex < Stage::Parse);
        assert!(Stage::Ssa < Stage::Dataflow);
    }

    #[test]
    fn test_stage_only_disables_optional_passes() {
        let opts = CompileOptions::stage_only(Stage::Cfg);
        assert_eq!(opts.stop_after, Stage::Cfg);
        assert!(!opts.ssa && !opts.fold && !opts.dce);
    }
}

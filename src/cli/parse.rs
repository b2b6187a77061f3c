use std::path::PathBuf;
use std::process;

use clap::Args;

use super::read_source;

#[derive(Args)]
pub struct ParseArgs {
    /// Input .cl source file
    pub input: PathBuf,
}

pub fn cmd_parse(args: ParseArgs) {
    let source = read_source(&args.input);
    let filename = args.input.display().to_string();

    let (_, lex_diags) = cool_core::lex(&source);
    if cool_core::diagnostic::has_fatal(&lex_diags) {
        cool_core::diagnostic::render_diagnostics(&lex_diags, &filename, &source);
        process::exit(1);
    }

    match cool_core::parse(&source) {
        Ok(program) => println!("{:#?}", program),
        Err(diags) => {
            cool_core::diagnostic::render_diagnostics(&diags, &filename, &source);
            process::exit(1);
        }
    }
}

//! Tern runtime CLI
//!
//! Entry point for the runtime. Parses CLI arguments and delegates to the
//! Runtime for execution.

use clap::Parser;
use std::process::ExitCode;
use tern_cli::{init_logging, Cli, CliResult, Command, Runtime};

fn run(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Command::Run {
            file,
            print_bytecode,
        } => {
            let mut runtime = Runtime::new(cli.vm_config()).with_print_bytecode(*print_bytecode);
            let result = runtime.execute_file(file)?;
            if !result.is_null() {
                println!("{result}");
            }
        }
        Command::Disassemble { file } => {
            print!("{}", Runtime::disassemble_file(file)?);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

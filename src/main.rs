//! Spike CLI: execute files or run the REPL.

use std::env;
use std::process;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI command to execute.
enum Command {
    /// Start the REPL
    Repl,
    /// Run a script file
    Run { file: String },
    /// Evaluate a string and print the result
    Eval { code: String },
}

/// CLI options parsed from arguments.
struct Options {
    command: Command,
    disassemble: bool,
}

fn print_usage() {
    eprintln!("Spike {} - Spike Interpreter", VERSION);
    eprintln!();
    eprintln!("Usage: spike [options] [script.spike]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -e <code>       Evaluate code and print the result");
    eprintln!("  --disassemble   Print bytecode before running");
    eprintln!("  --help, -h      Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  spike                     Start the interactive REPL");
    eprintln!("  spike script.spike        Run a script file");
    eprintln!("  spike -e '1 + 2'          Evaluate code directly");
}

fn parse_args() -> Options {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut options = Options {
        command: Command::Repl,
        disassemble: false,
    };

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "--disassemble" => options.disassemble = true,
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            "-e" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("-e requires a code argument");
                    print_usage();
                    process::exit(64);
                }
                options.command = Command::Eval {
                    code: args[i].clone(),
                };
            }
            _ if arg.starts_with('-') => {
                eprintln!("Unknown option: {}", arg);
                print_usage();
                process::exit(64);
            }
            _ => {
                if let Command::Run { .. } = options.command {
                    eprintln!("Only one script file can be specified");
                    print_usage();
                    process::exit(64);
                }
                options.command = Command::Run { file: arg.clone() };
            }
        }
        i += 1;
    }

    options
}

fn main() {
    let options = parse_args();

    match &options.command {
        Command::Repl => spike::repl::Repl::new().run(),
        Command::Run { file } => run_file(file, &options),
        Command::Eval { code } => run_eval(code, &options),
    }
}

fn run_file(path: &str, options: &Options) {
    if let Err(e) = spike::run_file(std::path::Path::new(path), options.disassemble) {
        eprintln!("Error: {}", e);
        process::exit(70);
    }
}

fn run_eval(code: &str, options: &Options) {
    if options.disassemble {
        match spike::compile(code) {
            Ok(bytecode) => {
                print!("{}", spike::disassemble(&bytecode));
                println!("---");
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(70);
            }
        }
    }

    match spike::eval(code) {
        Ok(value) => println!("{}", value),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(70);
        }
    }
}

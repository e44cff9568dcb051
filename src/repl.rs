//! Interactive REPL driving lexer, parser, compiler and VM while keeping
//! definitions alive across input lines.

use std::io::Write;
use std::path::PathBuf;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::bytecode::{Compiler, SymbolTable, Vm};
use crate::error::SpikeError;
use crate::lexer::Lexer;
use crate::object::Object;
use crate::parser::Parser;

const PROMPT: &str = ">> ";
const HISTORY_FILE: &str = ".spike_history";

/// REPL state carried between lines: the compiler's symbol table and
/// constant pool, and the VM's globals array.
pub struct Repl {
    symbol_table: SymbolTable,
    constants: Vec<Object>,
    globals: Vec<Object>,
}

impl Repl {
    pub fn new() -> Self {
        // Seed the symbol table with the builtin definitions.
        let (symbol_table, constants) = Compiler::new().into_state();
        Self {
            symbol_table,
            constants,
            globals: Vec::new(),
        }
    }

    fn history_path() -> PathBuf {
        match dirs::home_dir() {
            Some(home) => home.join(HISTORY_FILE),
            None => PathBuf::from(HISTORY_FILE),
        }
    }

    pub fn run(&mut self) {
        println!("Spike {}", env!("CARGO_PKG_VERSION"));
        println!("Type \"exit\" or press Ctrl+D to quit.\n");

        let mut rl = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(_) => {
                println!("Warning: using basic input (no history or line editing)");
                self.run_basic();
                return;
            }
        };

        let history_path = Self::history_path();
        let _ = rl.load_history(&history_path);

        loop {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if line == "exit" || line == "quit" {
                        break;
                    }
                    let _ = rl.add_history_entry(line);
                    self.execute_and_print(line);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    println!("Error: {}", e);
                    break;
                }
            }
        }

        let _ = rl.save_history(&history_path);
    }

    fn run_basic(&mut self) {
        let stdin = std::io::stdin();
        loop {
            print!("{}", PROMPT);
            let _ = std::io::stdout().flush();

            let mut line = String::new();
            match stdin.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if line == "exit" || line == "quit" {
                        break;
                    }
                    self.execute_and_print(line);
                }
                Err(e) => {
                    println!("Error: {}", e);
                    break;
                }
            }
        }
    }

    fn execute_and_print(&mut self, line: &str) {
        match self.execute(line) {
            Ok(value) => println!("{}", value),
            Err(e) => println!("{}", e),
        }
    }

    /// Run one input line against the retained state and return the last
    /// popped stack element.
    fn execute(&mut self, line: &str) -> Result<Object, SpikeError> {
        let mut parser = Parser::new(Lexer::new(line))?;
        let program = parser.parse_program()?;

        let mut compiler = Compiler::with_state(
            std::mem::take(&mut self.symbol_table),
            std::mem::take(&mut self.constants),
        );
        let compiled = compiler.compile(&program);
        let bytecode = compiler.bytecode();

        // Take the state back even when compilation failed, so builtins and
        // earlier definitions survive the error.
        let (symbol_table, constants) = compiler.into_state();
        self.symbol_table = symbol_table;
        self.constants = constants;
        compiled?;

        let mut vm = Vm::with_globals(bytecode, std::mem::take(&mut self.globals));
        let outcome = vm.run();
        let value = vm.last_popped_stack_element().clone();
        self.globals = vm.into_globals();
        outcome?;

        Ok(value)
    }
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_persists_across_lines() {
        let mut repl = Repl::new();
        repl.execute("let a = 2;").expect("line 1");
        repl.execute("let add = fn(x, y) { x + y };").expect("line 2");
        let value = repl.execute("add(a, 3)").expect("line 3");
        assert_eq!(value, Object::Integer(5));
    }

    #[test]
    fn test_state_survives_errors() {
        let mut repl = Repl::new();
        repl.execute("let a = 40;").expect("line 1");
        assert!(repl.execute("nope").is_err());
        assert!(repl.execute("1 + true").is_err());
        let value = repl.execute("a + 2").expect("line 4");
        assert_eq!(value, Object::Integer(42));
    }

    #[test]
    fn test_builtins_available() {
        let mut repl = Repl::new();
        let value = repl.execute("len(\"hello\")").expect("builtin call");
        assert_eq!(value, Object::Integer(5));
    }
}

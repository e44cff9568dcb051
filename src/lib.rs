//! Spike: a small expression-and-function language.
//!
//! The pipeline has two stages:
//! - frontend: `lexer` + `parser` produce the AST (`ast`)
//! - backend: `bytecode` compiles the AST to a flat instruction string and
//!   executes it on a stack-based virtual machine
//!
//! The runtime value model lives in `object`; `repl` drives the whole
//! pipeline interactively while retaining state across input lines.

pub mod ast;
pub mod bytecode;
pub mod error;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod repl;
pub mod span;

use error::SpikeError;
use object::Object;

/// Parse source code into an AST without executing.
pub fn parse(source: &str) -> Result<ast::Program, SpikeError> {
    let mut parser = parser::Parser::new(lexer::Lexer::new(source))?;
    Ok(parser.parse_program()?)
}

/// Compile source code to bytecode without executing.
pub fn compile(source: &str) -> Result<bytecode::Bytecode, SpikeError> {
    let program = parse(source)?;
    let mut compiler = bytecode::Compiler::new();
    compiler.compile(&program)?;
    Ok(compiler.bytecode())
}

/// Run a Spike program and return the value of its final expression
/// statement (null when the program ends some other way).
pub fn eval(source: &str) -> Result<Object, SpikeError> {
    let bytecode = compile(source)?;
    let mut vm = bytecode::Vm::new(bytecode);
    vm.run()?;
    Ok(vm.last_popped_stack_element().clone())
}

/// Run a Spike program for its effects.
pub fn run(source: &str) -> Result<(), SpikeError> {
    run_with_options(source, false)
}

/// Run a Spike program, optionally printing its disassembly first.
pub fn run_with_options(source: &str, disassemble: bool) -> Result<(), SpikeError> {
    let bytecode = compile(source)?;

    if disassemble {
        print!("{}", bytecode::disassemble(&bytecode));
        println!("---");
    }

    let mut vm = bytecode::Vm::new(bytecode);
    vm.run()?;
    Ok(())
}

/// Run a Spike program from a file.
pub fn run_file(path: &std::path::Path, disassemble: bool) -> Result<(), SpikeError> {
    let source = std::fs::read_to_string(path)?;
    run_with_options(&source, disassemble)
}

/// Disassemble compiled bytecode to a string.
pub fn disassemble(bytecode: &bytecode::Bytecode) -> String {
    bytecode::disassemble(bytecode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_end_to_end() {
        assert_eq!(eval("5 + 5 * 2;").unwrap(), Object::Integer(15));
        assert_eq!(eval("let a = 1; let b = 2; a + b;").unwrap(), Object::Integer(3));
        assert_eq!(
            eval("let twice = fn(f, x) { f(f(x)) }; twice(fn(n) { n * n }, 3);").unwrap(),
            Object::Integer(81)
        );
        assert_eq!(
            eval("let makeAdder = fn(x) { fn(y) { x + y } }; makeAdder(10)(5);").unwrap(),
            Object::Integer(15)
        );
        assert_eq!(eval("\"foo\" + \"bar\"").unwrap().to_string(), "foobar");
    }

    #[test]
    fn test_errors_carry_their_phase() {
        let err = eval("-let;").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parser error: \"let\" is not a valid prefix expression"
        );

        let err = eval("missing").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Compile error: unable to resolve identifier: missing"
        );

        let err = eval("1 + true").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Runtime error: unsupported types for binary operation: Integer Boolean"
        );
    }
}

//! Bytecode disassembler for debugging and the `--disassemble` flag.

use std::fmt::Write;

use crate::object::Object;

use super::compiler::Bytecode;
use super::instruction::{read_operands, Opcode};

/// Disassemble a compiled program: the main instruction string followed by
/// every function in the constant pool.
pub fn disassemble(bytecode: &Bytecode) -> String {
    let mut output = String::new();

    writeln!(&mut output, "== main ==").unwrap();
    disassemble_instructions(&bytecode.instructions, &bytecode.constants, &mut output);

    for (index, constant) in bytecode.constants.iter().enumerate() {
        if let Object::CompiledFunction(function) = constant {
            writeln!(&mut output).unwrap();
            writeln!(
                &mut output,
                "== fn {} (locals: {}, params: {}) ==",
                index, function.locals_count, function.params_count
            )
            .unwrap();
            disassemble_instructions(&function.instructions, &bytecode.constants, &mut output);
        }
    }

    output
}

/// Disassemble one instruction string into human-readable lines.
pub fn disassemble_instructions(instructions: &[u8], constants: &[Object], output: &mut String) {
    let mut offset = 0;
    while offset < instructions.len() {
        offset = disassemble_instruction(instructions, constants, offset, output);
    }
}

/// Disassemble the instruction at `offset`; returns the next offset.
fn disassemble_instruction(
    instructions: &[u8],
    constants: &[Object],
    offset: usize,
    output: &mut String,
) -> usize {
    write!(output, "{:04} ", offset).unwrap();

    let byte = instructions[offset];
    let opcode = match Opcode::from_u8(byte) {
        Some(opcode) => opcode,
        None => {
            writeln!(output, "Unknown opcode {}", byte).unwrap();
            return offset + 1;
        }
    };

    let (operands, read) = read_operands(opcode, &instructions[offset + 1..]);

    match opcode {
        Opcode::Constant => {
            let description = constants
                .get(operands[0])
                .map(|constant| constant.to_string())
                .unwrap_or_else(|| format!("?{}", operands[0]));
            writeln!(output, "{:?} {} ({})", opcode, operands[0], description).unwrap();
        }
        Opcode::Closure => {
            writeln!(output, "{:?} {} {}", opcode, operands[0], operands[1]).unwrap();
        }
        _ => match operands.as_slice() {
            [] => writeln!(output, "{:?}", opcode).unwrap(),
            [operand] => writeln!(output, "{:?} {}", opcode, operand).unwrap(),
            _ => writeln!(output, "{:?} {:?}", opcode, operands).unwrap(),
        },
    }

    offset + 1 + read
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compiler::Compiler;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn disassemble_source(source: &str) -> String {
        let program = Parser::new(Lexer::new(source))
            .expect("lexer error")
            .parse_program()
            .expect("parse error");
        let mut compiler = Compiler::new();
        compiler.compile(&program).expect("compile error");
        disassemble(&compiler.bytecode())
    }

    #[test]
    fn test_disassemble_simple() {
        let output = disassemble_source("let x = 42; x");
        assert!(output.contains("Constant 0 (42)"));
        assert!(output.contains("SetGlobal 0"));
        assert!(output.contains("GetGlobal 0"));
        assert!(output.contains("Pop"));
    }

    #[test]
    fn test_disassemble_function() {
        let output = disassemble_source("let add = fn(a, b) { a + b }; add(1, 2);");
        assert!(output.contains("== fn 0 (locals: 2, params: 2) =="));
        assert!(output.contains("GetLocal 0"));
        assert!(output.contains("Add"));
        assert!(output.contains("ReturnValue"));
        assert!(output.contains("Closure 0 0"));
        assert!(output.contains("Call 2"));
    }

    #[test]
    fn test_offsets_advance_by_instruction_width() {
        let output = disassemble_source("1 + 2");
        let lines: Vec<&str> = output.lines().collect();
        // == main ==, Constant at 0, Constant at 3, Add at 6, Pop at 7
        assert!(lines[1].starts_with("0000 Constant"));
        assert!(lines[2].starts_with("0003 Constant"));
        assert!(lines[3].starts_with("0006 Add"));
        assert!(lines[4].starts_with("0007 Pop"));
    }
}

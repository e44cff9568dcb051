//! Bytecode compiler: lowers the AST into a flat instruction string plus a
//! constant pool.

use std::rc::Rc;

use crate::ast::{Block, Expr, ExprKind, Ident, InfixOp, PrefixOp, Program, Stmt, StmtKind};
use crate::error::CompileError;
use crate::object::{CompiledFunction, Object, BUILTINS};

use super::instruction::{make, Opcode};
use super::symbol_table::{Symbol, SymbolScope, SymbolTable};

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Jump operand emitted before the target is known; rewritten by
/// `change_operand` once the landing position exists.
const PLACEHOLDER_JUMP_TARGET: usize = 0xFFFF;

/// The finished product of a compilation: the top-level instruction string
/// and the constant pool it references.
#[derive(Debug, Clone)]
pub struct Bytecode {
    pub instructions: Vec<u8>,
    pub constants: Vec<Object>,
}

/// Bookkeeping for the instruction emitted last and the one before it,
/// enough for the peephole fixups (`removeLastInstruction`,
/// `replace_last_pop_with_return`).
#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: Opcode,
    position: usize,
}

/// Per-function buffer of emitted instructions. The compiler keeps a stack
/// of these mirroring nested function literals.
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Vec<u8>,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

/// The bytecode compiler.
pub struct Compiler {
    constants: Vec<Object>,
    symbol_table: SymbolTable,
    scopes: Vec<CompilationScope>,
    scope_index: usize,
}

impl Compiler {
    /// Create a compiler with a fresh symbol table seeded with the builtin
    /// functions.
    pub fn new() -> Self {
        let mut symbol_table = SymbolTable::new();
        for (index, builtin) in BUILTINS.iter().enumerate() {
            symbol_table.define_builtin(index, builtin.name);
        }

        Self {
            constants: Vec::new(),
            symbol_table,
            scopes: vec![CompilationScope::default()],
            scope_index: 0,
        }
    }

    /// Create a compiler that continues from previous state. The REPL uses
    /// this to keep definitions and constants alive across input lines.
    pub fn with_state(symbol_table: SymbolTable, constants: Vec<Object>) -> Self {
        let mut compiler = Self::new();
        compiler.symbol_table = symbol_table;
        compiler.constants = constants;
        compiler
    }

    /// Release the symbol table and constant pool for reuse via
    /// `with_state`.
    pub fn into_state(self) -> (SymbolTable, Vec<Object>) {
        (self.symbol_table, self.constants)
    }

    /// Compile a program into the main scope. Aborts on the first error;
    /// partial bytecode is never returned to callers.
    pub fn compile(&mut self, program: &Program) -> CompileResult<()> {
        for statement in &program.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    /// Snapshot the compiled program.
    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.scopes[self.scope_index].instructions.clone(),
            constants: self.constants.clone(),
        }
    }

    fn compile_statement(&mut self, statement: &Stmt) -> CompileResult<()> {
        match &statement.kind {
            StmtKind::Expression(expr) => {
                self.compile_expression(expr)?;
                self.emit(Opcode::Pop, &[]);
            }

            StmtKind::Let { name, value } => {
                // The binding must exist before the value is compiled so a
                // function body can refer to itself.
                let symbol = self.symbol_table.define(&name.name);

                if let ExprKind::Function { parameters, body } = &value.kind {
                    self.compile_function(parameters, body, Some(&name.name))?;
                } else {
                    self.compile_expression(value)?;
                }

                match symbol.scope {
                    SymbolScope::Global => self.emit(Opcode::SetGlobal, &[symbol.index]),
                    _ => self.emit(Opcode::SetLocal, &[symbol.index]),
                };
            }

            StmtKind::Return(result) => {
                self.compile_expression(result)?;
                self.emit(Opcode::ReturnValue, &[]);
            }
        }

        Ok(())
    }

    fn compile_block(&mut self, block: &Block) -> CompileResult<()> {
        for statement in &block.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    fn compile_expression(&mut self, expr: &Expr) -> CompileResult<()> {
        match &expr.kind {
            ExprKind::Identifier(name) => {
                let symbol = self
                    .symbol_table
                    .resolve(name)
                    .ok_or_else(|| CompileError::unresolved_identifier(name.as_str(), expr.span))?;
                self.load_symbol(&symbol);
            }

            ExprKind::IntLiteral(n) => {
                let index = self.add_constant(Object::Integer(*n));
                self.emit(Opcode::Constant, &[index]);
            }

            ExprKind::StringLiteral(s) => {
                let index = self.add_constant(Object::String(Rc::new(s.clone())));
                self.emit(Opcode::Constant, &[index]);
            }

            ExprKind::BoolLiteral(true) => {
                self.emit(Opcode::True, &[]);
            }
            ExprKind::BoolLiteral(false) => {
                self.emit(Opcode::False, &[]);
            }

            ExprKind::Prefix { op, right } => {
                self.compile_expression(right)?;
                match op {
                    PrefixOp::Not => self.emit(Opcode::Bang, &[]),
                    PrefixOp::Negate => self.emit(Opcode::Minus, &[]),
                };
            }

            ExprKind::Infix { op, left, right } => {
                // The VM has no LessThan: `<` and `<=` compile their
                // operands swapped against the mirrored opcode.
                if matches!(op, InfixOp::Less | InfixOp::LessEqual) {
                    self.compile_expression(right)?;
                    self.compile_expression(left)?;
                    let opcode = if *op == InfixOp::Less {
                        Opcode::GreaterThan
                    } else {
                        Opcode::GreaterEqual
                    };
                    self.emit(opcode, &[]);
                    return Ok(());
                }

                self.compile_expression(left)?;
                self.compile_expression(right)?;

                let opcode = match op {
                    InfixOp::Add => Opcode::Add,
                    InfixOp::Subtract => Opcode::Sub,
                    InfixOp::Multiply => Opcode::Mul,
                    InfixOp::Divide => Opcode::Div,
                    InfixOp::Equal => Opcode::Equal,
                    InfixOp::NotEqual => Opcode::NotEqual,
                    InfixOp::Greater => Opcode::GreaterThan,
                    InfixOp::GreaterEqual => Opcode::GreaterEqual,
                    InfixOp::And => Opcode::And,
                    InfixOp::Or => Opcode::Or,
                    InfixOp::Less | InfixOp::LessEqual => unreachable!("handled above"),
                };
                self.emit(opcode, &[]);
            }

            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.compile_expression(condition)?;
                let jump_not_true_pos =
                    self.emit(Opcode::JumpNotTrue, &[PLACEHOLDER_JUMP_TARGET]);

                self.compile_block(then_branch)?;
                if self.last_instruction_is(Opcode::Pop) {
                    self.remove_last_instruction();
                }

                match else_branch {
                    None => {
                        // No else: the condition's false path produces null.
                        let jump_pos = self.emit(Opcode::Jump, &[PLACEHOLDER_JUMP_TARGET]);
                        let after_then = self.current_position();
                        self.emit(Opcode::Null, &[]);
                        let after_null = self.current_position();

                        self.change_operand(jump_not_true_pos, after_then);
                        self.change_operand(jump_pos, after_null);
                    }
                    Some(else_branch) => {
                        let jump_pos = self.emit(Opcode::Jump, &[PLACEHOLDER_JUMP_TARGET]);
                        let after_then = self.current_position();
                        self.change_operand(jump_not_true_pos, after_then);

                        self.compile_block(else_branch)?;
                        if self.last_instruction_is(Opcode::Pop) {
                            self.remove_last_instruction();
                        }

                        let after_else = self.current_position();
                        self.change_operand(jump_pos, after_else);
                    }
                }
            }

            ExprKind::Array(elements) => {
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(Opcode::Array, &[elements.len()]);
            }

            ExprKind::Hash(pairs) => {
                // Sort keys by their printed form so identical programs
                // always produce identical bytecode.
                let mut pairs: Vec<_> = pairs.iter().collect();
                pairs.sort_by_cached_key(|(key, _)| key.to_string());

                for (key, value) in &pairs {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(Opcode::Hash, &[pairs.len() * 2]);
            }

            ExprKind::Index { collection, index } => {
                self.compile_expression(collection)?;
                self.compile_expression(index)?;
                self.emit(Opcode::Index, &[]);
            }

            ExprKind::Function { parameters, body } => {
                self.compile_function(parameters, body, None)?;
            }

            ExprKind::Call { callee, arguments } => {
                self.compile_expression(callee)?;
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                self.emit(Opcode::Call, &[arguments.len()]);
            }
        }

        Ok(())
    }

    /// Compile a function literal into a CompiledFunction constant and emit
    /// the Closure instruction that builds it at runtime. `name` is the
    /// binding name when the literal is the value of a `let`, registered so
    /// the body can call itself through `CurrentClosure`.
    fn compile_function(
        &mut self,
        parameters: &[Ident],
        body: &Block,
        name: Option<&str>,
    ) -> CompileResult<()> {
        self.enter_scope();

        if let Some(name) = name {
            self.symbol_table.define_function_name(name);
        }
        for parameter in parameters {
            self.symbol_table.define(&parameter.name);
        }

        self.compile_block(body)?;

        // The body's final expression statement becomes the return value;
        // a body ending some other way returns null.
        if self.last_instruction_is(Opcode::Pop) {
            self.replace_last_pop_with_return();
        }
        if !self.last_instruction_is(Opcode::ReturnValue) {
            self.emit(Opcode::Return, &[]);
        }

        let free_symbols = self.symbol_table.free_symbols.clone();
        let locals_count = self.symbol_table.num_definitions;
        let instructions = self.leave_scope();

        // Load each captured value in the enclosing scope, in capture
        // order, immediately before the Closure that consumes them. The
        // loads use the symbols' original bindings out here, not their
        // Free indices inside the function.
        for symbol in &free_symbols {
            self.load_symbol(symbol);
        }

        let function = Object::CompiledFunction(Rc::new(CompiledFunction {
            instructions,
            locals_count,
            params_count: parameters.len(),
        }));
        let index = self.add_constant(function);
        self.emit(Opcode::Closure, &[index, free_symbols.len()]);

        Ok(())
    }

    fn load_symbol(&mut self, symbol: &Symbol) {
        match symbol.scope {
            SymbolScope::Global => self.emit(Opcode::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(Opcode::GetLocal, &[symbol.index]),
            SymbolScope::Builtin => self.emit(Opcode::GetBuiltin, &[symbol.index]),
            SymbolScope::Free => self.emit(Opcode::GetFreeVar, &[symbol.index]),
            SymbolScope::Function => self.emit(Opcode::CurrentClosure, &[]),
        };
    }

    // ===== Emission =====

    fn add_constant(&mut self, constant: Object) -> usize {
        self.constants.push(constant);
        self.constants.len() - 1
    }

    /// Append an instruction to the current scope; returns its position.
    fn emit(&mut self, opcode: Opcode, operands: &[usize]) -> usize {
        let instruction = make(opcode, operands);
        let scope = &mut self.scopes[self.scope_index];

        let position = scope.instructions.len();
        scope.instructions.extend_from_slice(&instruction);

        scope.previous_instruction = scope.last_instruction;
        scope.last_instruction = Some(EmittedInstruction { opcode, position });

        position
    }

    fn current_position(&self) -> usize {
        self.scopes[self.scope_index].instructions.len()
    }

    fn last_instruction_is(&self, opcode: Opcode) -> bool {
        self.scopes[self.scope_index]
            .last_instruction
            .is_some_and(|last| last.opcode == opcode)
    }

    /// Discard the trailing instruction and restore `last` to the one
    /// before it, keeping subsequent peeks coherent.
    fn remove_last_instruction(&mut self) {
        let scope = &mut self.scopes[self.scope_index];
        if let Some(last) = scope.last_instruction {
            scope.instructions.truncate(last.position);
            scope.last_instruction = scope.previous_instruction;
            scope.previous_instruction = None;
        }
    }

    /// Overwrite a same-width instruction in place.
    fn replace_instruction(&mut self, position: usize, instruction: &[u8]) {
        let scope = &mut self.scopes[self.scope_index];
        scope.instructions[position..position + instruction.len()].copy_from_slice(instruction);
    }

    /// Rewrite the operand of the instruction at `position` (jump patching).
    fn change_operand(&mut self, position: usize, operand: usize) {
        let byte = self.scopes[self.scope_index].instructions[position];
        let opcode = match Opcode::from_u8(byte) {
            Some(opcode) => opcode,
            None => panic!("tried to patch a non-instruction byte at offset {}", position),
        };
        let instruction = make(opcode, &[operand]);
        self.replace_instruction(position, &instruction);
    }

    fn replace_last_pop_with_return(&mut self) {
        let position = match self.scopes[self.scope_index].last_instruction {
            Some(last) => last.position,
            None => return,
        };
        let instruction = make(Opcode::ReturnValue, &[]);
        self.replace_instruction(position, &instruction);

        if let Some(last) = &mut self.scopes[self.scope_index].last_instruction {
            last.opcode = Opcode::ReturnValue;
        }
    }

    // ===== Scope management =====

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        self.scope_index += 1;

        let outer = std::mem::take(&mut self.symbol_table);
        self.symbol_table = SymbolTable::enclosed(outer);
    }

    fn leave_scope(&mut self) -> Vec<u8> {
        let scope = self.scopes.pop().unwrap_or_default();
        self.scope_index -= 1;

        let table = std::mem::take(&mut self.symbol_table);
        self.symbol_table = table.into_outer().unwrap_or_default();

        scope.instructions
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

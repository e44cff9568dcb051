//! Stack-based virtual machine for executing bytecode.

use std::mem::discriminant;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::RuntimeError;
use crate::object::{Closure, CompiledFunction, HashKey, Object, BUILTINS, FALSE, NULL, TRUE};

use super::compiler::Bytecode;
use super::frame::Frame;
use super::instruction::{read_u16, Opcode};

/// Operand stack capacity.
pub const STACK_SIZE: usize = 2048;
/// Globals array capacity; global indices are u16 operands.
pub const GLOBALS_SIZE: usize = 65536;
/// Call depth limit.
pub const MAX_FRAMES: usize = 1024;

/// Result type for VM operations.
pub type VmResult<T> = Result<T, RuntimeError>;

/// The Spike virtual machine. One instance owns its operand stack, frame
/// stack and globals; nothing is shared between instances.
#[derive(Debug)]
pub struct Vm {
    constants: Vec<Object>,
    stack: Vec<Object>,
    /// Next free stack slot. `stack[sp]` is the most recently popped value,
    /// which pops deliberately leave in place.
    sp: usize,
    globals: Vec<Object>,
    frames: Vec<Frame>,
}

impl Vm {
    /// Create a VM over a compiled program with empty globals.
    pub fn new(bytecode: Bytecode) -> Self {
        Self::with_globals(bytecode, vec![NULL; GLOBALS_SIZE])
    }

    /// Create a VM reusing an existing globals array. The REPL threads the
    /// same globals through every line it executes.
    pub fn with_globals(bytecode: Bytecode, mut globals: Vec<Object>) -> Self {
        let main_function = Rc::new(CompiledFunction {
            instructions: bytecode.instructions,
            locals_count: 0,
            params_count: 0,
        });
        let main_closure = Rc::new(Closure {
            function: main_function,
            captured: Vec::new(),
        });

        globals.resize(GLOBALS_SIZE, NULL);

        Self {
            constants: bytecode.constants,
            stack: vec![NULL; STACK_SIZE],
            sp: 0,
            globals,
            frames: vec![Frame::new(main_closure, 0)],
        }
    }

    /// Release the globals array for reuse via `with_globals`.
    pub fn into_globals(self) -> Vec<Object> {
        self.globals
    }

    /// The value most recently popped off the stack. Defined after running
    /// a program that ends in an expression statement; pops never clear
    /// the vacated slot.
    pub fn last_popped_stack_element(&self) -> &Object {
        &self.stack[self.sp]
    }

    /// Execute until the main frame runs off the end of its instructions.
    pub fn run(&mut self) -> VmResult<()> {
        while self.current_frame().ip < self.current_frame().instructions().len() {
            let byte = self.read_byte();
            let op = Opcode::from_u8(byte)
                .ok_or_else(|| RuntimeError::new(format!("invalid opcode: {}", byte)))?;

            match op {
                Opcode::Constant => {
                    let index = self.read_u16_operand();
                    let constant = self.read_constant(index)?;
                    self.push(constant)?;
                }

                Opcode::Pop => {
                    self.pop()?;
                }

                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                    self.execute_binary_operation(op)?;
                }

                Opcode::True => self.push(TRUE)?,
                Opcode::False => self.push(FALSE)?,
                Opcode::Null => self.push(NULL)?,

                Opcode::Equal
                | Opcode::NotEqual
                | Opcode::GreaterThan
                | Opcode::GreaterEqual
                | Opcode::And
                | Opcode::Or => {
                    self.execute_comparison(op)?;
                }

                Opcode::Bang => {
                    let value = self.pop()?;
                    let negated = match value {
                        Object::Boolean(b) => Object::from_bool(!b),
                        Object::Null => TRUE,
                        _ => FALSE,
                    };
                    self.push(negated)?;
                }

                Opcode::Minus => {
                    let value = self.pop()?;
                    match value {
                        Object::Integer(n) => self.push(Object::Integer(-n))?,
                        other => {
                            return Err(RuntimeError::UnsupportedNegation(other.type_name()))
                        }
                    }
                }

                Opcode::Jump => {
                    let target = self.read_u16_operand();
                    self.current_frame_mut().ip = target;
                }

                Opcode::JumpNotTrue => {
                    let target = self.read_u16_operand();
                    let condition = self.pop()?;
                    if !condition.is_truthy() {
                        self.current_frame_mut().ip = target;
                    }
                }

                Opcode::SetGlobal => {
                    let index = self.read_u16_operand();
                    self.globals[index] = self.pop()?;
                }

                Opcode::GetGlobal => {
                    let index = self.read_u16_operand();
                    let value = self.globals[index].clone();
                    self.push(value)?;
                }

                Opcode::SetLocal => {
                    let index = self.read_byte_operand();
                    let base_pointer = self.current_frame().base_pointer;
                    self.stack[base_pointer + index] = self.pop()?;
                }

                Opcode::GetLocal => {
                    let index = self.read_byte_operand();
                    let base_pointer = self.current_frame().base_pointer;
                    let value = self.stack[base_pointer + index].clone();
                    self.push(value)?;
                }

                Opcode::GetBuiltin => {
                    let index = self.read_byte_operand();
                    self.push(Object::Builtin(index))?;
                }

                Opcode::GetFreeVar => {
                    let index = self.read_byte_operand();
                    let value = self.current_frame().closure.captured[index].clone();
                    self.push(value)?;
                }

                Opcode::CurrentClosure => {
                    let closure = self.current_frame().closure.clone();
                    self.push(Object::Closure(closure))?;
                }

                Opcode::Array => {
                    let count = self.read_u16_operand();
                    let elements = self.stack[self.sp - count..self.sp].to_vec();
                    self.sp -= count;
                    self.push(Object::Array(Rc::new(elements)))?;
                }

                Opcode::Hash => {
                    let count = self.read_u16_operand();
                    let values = self.stack[self.sp - count..self.sp].to_vec();
                    self.sp -= count;

                    let mut pairs = IndexMap::with_capacity(count / 2);
                    for pair in values.chunks(2) {
                        let key = HashKey::from_object(&pair[0])
                            .ok_or_else(|| RuntimeError::UnusableHashKey(pair[0].type_name()))?;
                        pairs.insert(key, pair[1].clone());
                    }
                    self.push(Object::Hash(Rc::new(pairs)))?;
                }

                Opcode::Index => {
                    let index = self.pop()?;
                    let collection = self.pop()?;
                    self.execute_index(collection, index)?;
                }

                Opcode::Call => {
                    let argc = self.read_byte_operand();
                    self.execute_call(argc)?;
                }

                Opcode::ReturnValue => {
                    let value = self.pop()?;
                    if self.pop_frame_and_push(value)? {
                        return Ok(());
                    }
                }

                Opcode::Return => {
                    if self.pop_frame_and_push(NULL)? {
                        return Ok(());
                    }
                }

                Opcode::Closure => {
                    let function_index = self.read_u16_operand();
                    let free_count = self.read_byte_operand();
                    self.push_closure(function_index, free_count)?;
                }
            }
        }

        Ok(())
    }

    // ===== Frames =====

    fn current_frame(&self) -> &Frame {
        &self.frames[self.frames.len() - 1]
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// Tear down the current frame and push the returned value in the
    /// caller's context. Returns true when the main frame itself returned,
    /// which ends execution with the value as the last popped element.
    fn pop_frame_and_push(&mut self, value: Object) -> VmResult<bool> {
        let frame = match self.frames.pop() {
            Some(frame) => frame,
            None => return Err(RuntimeError::new("return with no active frame")),
        };

        if self.frames.is_empty() {
            self.sp = frame.base_pointer;
            self.push(value)?;
            self.pop()?;
            return Ok(true);
        }

        // Drop the callee and its locals in one move.
        self.sp = frame.base_pointer - 1;
        self.push(value)?;
        Ok(false)
    }

    // ===== Instruction decoding =====

    fn read_byte(&mut self) -> u8 {
        let frame = self.current_frame_mut();
        let byte = frame.closure.function.instructions[frame.ip];
        frame.ip += 1;
        byte
    }

    fn read_byte_operand(&mut self) -> usize {
        self.read_byte() as usize
    }

    fn read_u16_operand(&mut self) -> usize {
        let frame = self.current_frame_mut();
        let value = read_u16(&frame.closure.function.instructions[frame.ip..]);
        frame.ip += 2;
        value as usize
    }

    fn read_constant(&self, index: usize) -> VmResult<Object> {
        self.constants
            .get(index)
            .cloned()
            .ok_or_else(|| RuntimeError::new(format!("no constant at index {}", index)))
    }

    // ===== Stack =====

    fn push(&mut self, value: Object) -> VmResult<()> {
        if self.sp >= STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> VmResult<Object> {
        if self.sp == 0 {
            return Err(RuntimeError::new("stack underflow"));
        }
        self.sp -= 1;
        Ok(self.stack[self.sp].clone())
    }

    // ===== Operations =====

    fn execute_binary_operation(&mut self, op: Opcode) -> VmResult<()> {
        let right = self.pop()?;
        let left = self.pop()?;

        match (&left, &right) {
            (Object::Integer(l), Object::Integer(r)) => {
                let result = match op {
                    Opcode::Add => l + r,
                    Opcode::Sub => l - r,
                    Opcode::Mul => l * r,
                    Opcode::Div => {
                        if *r == 0 {
                            return Err(RuntimeError::DivisionByZero);
                        }
                        l / r
                    }
                    _ => unreachable!("non-arithmetic opcode {:?}", op),
                };
                self.push(Object::Integer(result))
            }
            (Object::String(l), Object::String(r)) if op == Opcode::Add => {
                self.push(Object::String(Rc::new(format!("{}{}", l, r))))
            }
            _ => Err(RuntimeError::UnsupportedBinaryOperands {
                left: left.type_name(),
                right: right.type_name(),
            }),
        }
    }

    fn execute_comparison(&mut self, op: Opcode) -> VmResult<()> {
        let right = self.pop()?;
        let left = self.pop()?;

        if discriminant(&left) != discriminant(&right) {
            return Err(RuntimeError::ComparisonTypeMismatch {
                left: left.type_name(),
                right: right.type_name(),
            });
        }

        let result = match op {
            Opcode::Equal => left == right,
            Opcode::NotEqual => left != right,
            Opcode::GreaterThan | Opcode::GreaterEqual => match (&left, &right) {
                (Object::Integer(l), Object::Integer(r)) => {
                    if op == Opcode::GreaterThan {
                        l > r
                    } else {
                        l >= r
                    }
                }
                _ => {
                    return Err(RuntimeError::UnsupportedBinaryOperands {
                        left: left.type_name(),
                        right: right.type_name(),
                    })
                }
            },
            Opcode::And | Opcode::Or => match (&left, &right) {
                (Object::Boolean(l), Object::Boolean(r)) => {
                    if op == Opcode::And {
                        *l && *r
                    } else {
                        *l || *r
                    }
                }
                _ => {
                    return Err(RuntimeError::UnsupportedBinaryOperands {
                        left: left.type_name(),
                        right: right.type_name(),
                    })
                }
            },
            _ => unreachable!("non-comparison opcode {:?}", op),
        };

        self.push(Object::from_bool(result))
    }

    fn execute_index(&mut self, collection: Object, index: Object) -> VmResult<()> {
        match (&collection, &index) {
            (Object::Array(elements), Object::Integer(i)) => {
                let element = if *i >= 0 && (*i as usize) < elements.len() {
                    elements[*i as usize].clone()
                } else {
                    NULL
                };
                self.push(element)
            }
            (Object::Hash(pairs), key) => {
                let key = HashKey::from_object(key)
                    .ok_or_else(|| RuntimeError::UnusableHashKey(key.type_name()))?;
                let value = pairs.get(&key).cloned().unwrap_or(NULL);
                self.push(value)
            }
            _ => Err(RuntimeError::UnsupportedIndex(collection.type_name())),
        }
    }

    // ===== Calls =====

    fn execute_call(&mut self, argc: usize) -> VmResult<()> {
        let callee = self.stack[self.sp - 1 - argc].clone();
        match callee {
            Object::Closure(closure) => self.call_closure(closure, argc),
            Object::Builtin(index) => self.call_builtin(index, argc),
            _ => Err(RuntimeError::NotCallable),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, argc: usize) -> VmResult<()> {
        if argc != closure.function.params_count {
            return Err(RuntimeError::wrong_arity(
                closure.function.params_count,
                argc,
            ));
        }
        if self.frames.len() >= MAX_FRAMES {
            return Err(RuntimeError::StackOverflow);
        }

        // Arguments already sit where the first local slots go; reserve the
        // rest above them.
        let base_pointer = self.sp - argc;
        let new_sp = base_pointer + closure.function.locals_count;
        if new_sp > STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }

        self.frames.push(Frame::new(closure, base_pointer));
        self.sp = new_sp;
        Ok(())
    }

    fn call_builtin(&mut self, index: usize, argc: usize) -> VmResult<()> {
        let builtin = BUILTINS
            .get(index)
            .ok_or_else(|| RuntimeError::new(format!("no builtin at index {}", index)))?;

        let args = self.stack[self.sp - argc..self.sp].to_vec();
        let result = (builtin.func)(&args)?;

        // Drop the arguments and the callee, then push the result.
        self.sp -= argc + 1;
        self.push(result)
    }

    fn push_closure(&mut self, function_index: usize, free_count: usize) -> VmResult<()> {
        let function = match self.read_constant(function_index)? {
            Object::CompiledFunction(function) => function,
            other => {
                return Err(RuntimeError::new(format!(
                    "not a function: {}",
                    other.type_name()
                )))
            }
        };

        let captured = self.stack[self.sp - free_count..self.sp].to_vec();
        self.sp -= free_count;

        self.push(Object::Closure(Rc::new(Closure { function, captured })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::bytecode::compiler::Compiler;

    fn run(source: &str) -> Vm {
        try_run(source).expect("runtime error")
    }

    fn try_run(source: &str) -> Result<Vm, RuntimeError> {
        let program = Parser::new(Lexer::new(source))
            .expect("lexer error")
            .parse_program()
            .expect("parse error");
        let mut compiler = Compiler::new();
        compiler.compile(&program).expect("compile error");
        let mut vm = Vm::new(compiler.bytecode());
        vm.run()?;
        Ok(vm)
    }

    fn run_value(source: &str) -> Object {
        run(source).last_popped_stack_element().clone()
    }

    fn run_error(source: &str) -> String {
        try_run(source).expect_err("expected runtime error").to_string()
    }

    fn assert_int(source: &str, expected: i64) {
        assert_eq!(run_value(source), Object::Integer(expected), "source: {}", source);
    }

    fn assert_bool(source: &str, expected: bool) {
        assert_eq!(
            run_value(source),
            Object::Boolean(expected),
            "source: {}",
            source
        );
    }

    fn assert_null(source: &str) {
        assert_eq!(run_value(source), NULL, "source: {}", source);
    }

    fn assert_string(source: &str, expected: &str) {
        match run_value(source) {
            Object::String(s) => assert_eq!(s.as_str(), expected, "source: {}", source),
            other => panic!("expected string, got {:?} for {}", other, source),
        }
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_int("1", 1);
        assert_int("1 + 2", 3);
        assert_int("1 - 2", -1);
        assert_int("4 * 3", 12);
        assert_int("4 / 2", 2);
        assert_int("50 / 2 * 2 + 10 - 5", 55);
        assert_int("5 + 5 * 2;", 15);
        assert_int("-5", -5);
        assert_int("-50 + 100 + -50", 0);
        assert_int("(5 + 10 * 2 + 15 / 3) * 2 + -10", 50);
    }

    #[test]
    fn test_boolean_expressions() {
        assert_bool("true", true);
        assert_bool("false", false);
        assert_bool("1 < 2", true);
        assert_bool("1 > 2", false);
        assert_bool("1 <= 2", true);
        assert_bool("2 <= 2", true);
        assert_bool("3 <= 2", false);
        assert_bool("1 >= 2", false);
        assert_bool("2 >= 2", true);
        assert_bool("1 == 1", true);
        assert_bool("1 != 1", false);
        assert_bool("true == true", true);
        assert_bool("true != false", true);
        assert_bool("(1 < 2) == true", true);
        assert_bool("\"a\" == \"a\"", true);
        assert_bool("\"a\" != \"b\"", true);
        assert_bool("[1, 2] == [1, 2]", true);
        assert_bool("[1, 2] == [1, 3]", false);
    }

    #[test]
    fn test_bang_operator() {
        assert_bool("!true", false);
        assert_bool("!false", true);
        assert_bool("!5", false);
        assert_bool("!!true", true);
        assert_bool("!!5", true);
        assert_bool("!if (false) { 10 }", true);
    }

    #[test]
    fn test_boolean_connectives() {
        assert_bool("true && true", true);
        assert_bool("true && false", false);
        assert_bool("false || true", true);
        assert_bool("false || false", false);
        // AND binds tighter than OR.
        assert_bool("true || false && false", true);
        assert_bool("2 > 3 || 3 < 2 && 2 == 2", false);
        assert_eq!(
            run_error("1 && true"),
            "both operands must have same type, had: Integer and Boolean"
        );
        assert_eq!(
            run_error("1 && 2"),
            "unsupported types for binary operation: Integer Integer"
        );
    }

    #[test]
    fn test_conditionals() {
        assert_int("if (true) { 10 }", 10);
        assert_int("if (true) { 10 } else { 20 }", 10);
        assert_int("if (false) { 10 } else { 20 }", 20);
        assert_int("if (1) { 10 }", 10);
        assert_int("if (1 < 2) { 10 } else { 20 }", 10);
        assert_null("if (false) { 10 }");
        assert_null("if (1 > 2) { 10 }");
        assert_int("if (if (false) { 10 }) { 10 } else { 20 }", 20);
    }

    #[test]
    fn test_global_let_statements() {
        assert_int("let one = 1; one", 1);
        assert_int("let a = 1; let b = 2; a + b;", 3);
        assert_int("let one = 1; let two = one + one; one + two", 3);
    }

    #[test]
    fn test_string_operations() {
        assert_string("\"spike\"", "spike");
        assert_string("\"foo\" + \"bar\"", "foobar");
        assert_string("\"foo\" + \"bar\" + \"baz\"", "foobarbaz");
    }

    #[test]
    fn test_binary_type_errors() {
        assert_eq!(
            run_error("1 + true"),
            "unsupported types for binary operation: Integer Boolean"
        );
        assert_eq!(
            run_error("\"a\" - \"b\""),
            "unsupported types for binary operation: String String"
        );
        assert_eq!(
            run_error("1 == true"),
            "both operands must have same type, had: Integer and Boolean"
        );
        assert_eq!(
            run_error("true > false"),
            "unsupported types for binary operation: Boolean Boolean"
        );
        assert_eq!(run_error("-true"), "unsupported type for negation: Boolean");
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(run_error("5 / 0"), "division by zero");
    }

    #[test]
    fn test_array_literals_and_indexing() {
        assert_eq!(
            run_value("[1, 2 * 2, 3 + 3]"),
            Object::Array(Rc::new(vec![
                Object::Integer(1),
                Object::Integer(4),
                Object::Integer(6),
            ]))
        );
        assert_int("[1, 2, 3][1]", 2);
        assert_int("[[1, 1, 1]][0][0]", 1);
        assert_null("[1, 2, 3][99]");
        assert_null("[1, 2, 3][-1]");
        assert_null("[][0]");
    }

    #[test]
    fn test_hash_literals_and_indexing() {
        assert_string("{1: \"a\"}[1]", "a");
        assert_null("{1: \"a\"}[2]");
        assert_int("{\"one\": 1, \"two\": 2}[\"two\"]", 2);
        assert_int("{true: 10}[true]", 10);
        assert_int("{1 + 1: 2 * 2}[2]", 4);
        assert_null("{}[0]");
        assert_eq!(run_error("{1: 1}[fn() { 1 }]"), "unusable as hash key: Function");
        assert_eq!(run_error("5[0]"), "index operator not supported: Integer");
    }

    #[test]
    fn test_calling_functions() {
        assert_int("let fivePlusTen = fn() { 5 + 10; }; fivePlusTen();", 15);
        assert_int("let a = fn() { 1 }; let b = fn() { a() + 1 }; b();", 2);
        assert_int("fn(x) { x * 2 }(4)", 8);
    }

    #[test]
    fn test_functions_with_return_statements() {
        assert_int("let earlyExit = fn() { return 99; 100; }; earlyExit();", 99);
        assert_int("let earlyExit = fn() { return 99; return 100; }; earlyExit();", 99);
    }

    #[test]
    fn test_functions_without_return_value() {
        assert_null("let noReturn = fn() { }; noReturn();");
        assert_null(
            "let noReturn = fn() { }; let alsoNo = fn() { noReturn(); }; alsoNo();",
        );
    }

    #[test]
    fn test_first_class_functions() {
        assert_int(
            "let twice = fn(f, x) { f(f(x)) }; twice(fn(n) { n * n }, 3);",
            81,
        );
        assert_int(
            "let returnsOne = fn() { 1; }; let wrap = fn() { returnsOne; }; wrap()();",
            1,
        );
    }

    #[test]
    fn test_local_bindings() {
        assert_int("let one = fn() { let one = 1; one }; one();", 1);
        assert_int(
            "let oneAndTwo = fn() { let one = 1; let two = 2; one + two; }; oneAndTwo();",
            3,
        );
        assert_int(
            "let firstFoobar = fn() { let foobar = 50; foobar; };
             let secondFoobar = fn() { let foobar = 100; foobar; };
             firstFoobar() + secondFoobar();",
            150,
        );
        assert_int(
            "let globalSeed = 50;
             let minusOne = fn() { let num = 1; globalSeed - num; };
             let minusTwo = fn() { let num = 2; globalSeed - num; };
             minusOne() + minusTwo();",
            97,
        );
    }

    #[test]
    fn test_calling_with_arguments_and_bindings() {
        assert_int("let identity = fn(a) { a; }; identity(4);", 4);
        assert_int("let sum = fn(a, b) { a + b; }; sum(1, 2);", 3);
        assert_int(
            "let sum = fn(a, b) { let c = a + b; c; }; sum(1, 2) + sum(3, 4);",
            10,
        );
        assert_int(
            "let globalNum = 10;
             let sum = fn(a, b) { let c = a + b; c + globalNum; };
             let outer = fn() { sum(1, 2) + sum(3, 4) + globalNum; };
             outer() + globalNum;",
            50,
        );
    }

    #[test]
    fn test_wrong_argument_count() {
        assert_eq!(
            run_error("fn() { 1; }(1);"),
            "wrong number of arguments: expected 0, got 1"
        );
        assert_eq!(
            run_error("fn(x, y) { x + y; }(1);"),
            "wrong number of arguments: expected 2, got 1"
        );
    }

    #[test]
    fn test_calling_non_functions() {
        assert_eq!(run_error("1(2)"), "cannot call non-function");
        assert_eq!(run_error("let x = 5; x(1)"), "cannot call non-function");
    }

    #[test]
    fn test_builtin_functions() {
        assert_int("len(\"\")", 0);
        assert_int("len(\"hello\")", 5);
        assert_int("len([1, 2])", 2);
        assert_int("first([1, 2])", 1);
        assert_int("last([1, 2])", 2);
        assert_null("first([])");
        assert_eq!(
            run_value("rest([1, 2, 3])"),
            Object::Array(Rc::new(vec![Object::Integer(2), Object::Integer(3)]))
        );
        assert_eq!(
            run_value("push([1], 2)"),
            Object::Array(Rc::new(vec![Object::Integer(1), Object::Integer(2)]))
        );
        assert_eq!(
            run_error("len(1)"),
            "argument to `len` not supported, got Integer"
        );
        assert_eq!(
            run_error("len(\"one\", \"two\")"),
            "wrong number of arguments: expected 1, got 2"
        );
    }

    #[test]
    fn test_closures() {
        assert_int(
            "let adder = fn(x) { fn(y) { x + y } }; let a = adder(2); a(3);",
            5,
        );
        assert_int(
            "let makeAdder = fn(x) { fn(y) { x + y } }; makeAdder(10)(5);",
            15,
        );
        assert_int("let f = fn(a) { fn(b) { fn(c) { a + b + c } } }; f(1)(2)(3);", 6);
    }

    #[test]
    fn test_closures_capture_lexical_bindings_not_globals() {
        assert_int(
            "let x = 100;
             let capture = fn(x) { fn() { x } };
             let get = capture(5);
             get();",
            5,
        );
    }

    #[test]
    fn test_closures_over_locals_and_arguments() {
        assert_int(
            "let newAdderOuter = fn(a, b) {
                 let c = a + b;
                 fn(d) { let e = d + c; fn(f) { e + f; }; };
             };
             let newAdderInner = newAdderOuter(1, 2);
             let adder = newAdderInner(3);
             adder(8);",
            14,
        );
        assert_int(
            "let a = 1;
             let newAdderOuter = fn(b) { fn(c) { fn(d) { a + b + c + d }; }; };
             let newAdderInner = newAdderOuter(2);
             let adder = newAdderInner(3);
             adder(8);",
            14,
        );
    }

    #[test]
    fn test_recursive_functions() {
        assert_int(
            "let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } };
             countDown(1);",
            0,
        );
        assert_int(
            "let f = fn(n) { if (n < 2) { n } else { f(n - 1) + f(n - 2) } }; f(10)",
            55,
        );
    }

    #[test]
    fn test_recursive_function_defined_in_local_scope() {
        assert_int(
            "let wrapper = fn() {
                 let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } };
                 countDown(1);
             };
             wrapper();",
            0,
        );
    }

    #[test]
    fn test_stack_is_clean_after_expression_statement() {
        let vm = run("1 + 2;");
        assert_eq!(vm.sp, 0);
        assert_eq!(vm.last_popped_stack_element(), &Object::Integer(3));

        let vm = run("let a = 1; a + a; [a, a]; {a: a};");
        assert_eq!(vm.sp, 0);
    }

    #[test]
    fn test_stack_overflow_on_runaway_recursion() {
        assert_eq!(run_error("let f = fn() { f() }; f();"), "stack overflow");
    }

    #[test]
    fn test_top_level_return_ends_execution() {
        let vm = run("return 7; 8;");
        assert_eq!(vm.last_popped_stack_element(), &Object::Integer(7));
    }

    #[test]
    fn test_globals_survive_across_runs() {
        let program = Parser::new(Lexer::new("let a = 40;"))
            .expect("lexer error")
            .parse_program()
            .expect("parse error");
        let mut compiler = Compiler::new();
        compiler.compile(&program).expect("compile error");
        let bytecode = compiler.bytecode();
        let (table, constants) = compiler.into_state();

        let mut vm = Vm::new(bytecode);
        vm.run().expect("runtime error");
        let globals = vm.into_globals();

        let program = Parser::new(Lexer::new("a + 2"))
            .expect("lexer error")
            .parse_program()
            .expect("parse error");
        let mut compiler = Compiler::with_state(table, constants);
        compiler.compile(&program).expect("compile error");
        let mut vm = Vm::with_globals(compiler.bytecode(), globals);
        vm.run().expect("runtime error");
        assert_eq!(vm.last_popped_stack_element(), &Object::Integer(42));
    }
}

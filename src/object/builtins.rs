//! Host-provided builtin functions.
//!
//! The table is positional: a builtin's index in `BUILTINS` is the operand
//! of `GetBuiltin` and the payload of `Object::Builtin`. Reordering entries
//! changes compiled programs.

use std::rc::Rc;

use crate::error::RuntimeError;

use super::{Object, NULL};

type BuiltinResult = Result<Object, RuntimeError>;

/// A builtin function entry: name plus host implementation.
pub struct Builtin {
    pub name: &'static str,
    pub func: fn(&[Object]) -> BuiltinResult,
}

/// The canonical builtin table.
pub static BUILTINS: &[Builtin] = &[
    Builtin {
        name: "len",
        func: builtin_len,
    },
    Builtin {
        name: "first",
        func: builtin_first,
    },
    Builtin {
        name: "last",
        func: builtin_last,
    },
    Builtin {
        name: "rest",
        func: builtin_rest,
    },
    Builtin {
        name: "push",
        func: builtin_push,
    },
    Builtin {
        name: "puts",
        func: builtin_puts,
    },
];

fn expect_arity(args: &[Object], expected: usize) -> Result<(), RuntimeError> {
    if args.len() != expected {
        return Err(RuntimeError::wrong_arity(expected, args.len()));
    }
    Ok(())
}

fn expect_array<'a>(args: &'a [Object], name: &str) -> Result<&'a [Object], RuntimeError> {
    match &args[0] {
        Object::Array(elements) => Ok(elements),
        other => Err(RuntimeError::new(format!(
            "argument to `{}` must be an Array, got {}",
            name,
            other.type_name()
        ))),
    }
}

fn builtin_len(args: &[Object]) -> BuiltinResult {
    expect_arity(args, 1)?;
    match &args[0] {
        Object::String(s) => Ok(Object::Integer(s.len() as i64)),
        Object::Array(elements) => Ok(Object::Integer(elements.len() as i64)),
        other => Err(RuntimeError::new(format!(
            "argument to `len` not supported, got {}",
            other.type_name()
        ))),
    }
}

fn builtin_first(args: &[Object]) -> BuiltinResult {
    expect_arity(args, 1)?;
    let elements = expect_array(args, "first")?;
    Ok(elements.first().cloned().unwrap_or(NULL))
}

fn builtin_last(args: &[Object]) -> BuiltinResult {
    expect_arity(args, 1)?;
    let elements = expect_array(args, "last")?;
    Ok(elements.last().cloned().unwrap_or(NULL))
}

fn builtin_rest(args: &[Object]) -> BuiltinResult {
    expect_arity(args, 1)?;
    let elements = expect_array(args, "rest")?;
    if elements.is_empty() {
        return Ok(NULL);
    }
    Ok(Object::Array(Rc::new(elements[1..].to_vec())))
}

fn builtin_push(args: &[Object]) -> BuiltinResult {
    expect_arity(args, 2)?;
    let elements = expect_array(args, "push")?;
    let mut extended = elements.to_vec();
    extended.push(args[1].clone());
    Ok(Object::Array(Rc::new(extended)))
}

fn builtin_puts(args: &[Object]) -> BuiltinResult {
    for arg in args {
        println!("{}", arg);
    }
    Ok(NULL)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array(values: &[i64]) -> Object {
        Object::Array(Rc::new(
            values.iter().copied().map(Object::Integer).collect(),
        ))
    }

    #[test]
    fn test_len() {
        let string = Object::String(Rc::new("hello".to_string()));
        assert_eq!(builtin_len(&[string]).unwrap(), Object::Integer(5));
        assert_eq!(builtin_len(&[array(&[1, 2])]).unwrap(), Object::Integer(2));

        let err = builtin_len(&[Object::Integer(1)]).unwrap_err();
        assert_eq!(err.to_string(), "argument to `len` not supported, got Integer");
    }

    #[test]
    fn test_len_arity() {
        let err = builtin_len(&[]).unwrap_err();
        assert_eq!(err.to_string(), "wrong number of arguments: expected 1, got 0");
    }

    #[test]
    fn test_first_and_last() {
        assert_eq!(builtin_first(&[array(&[1, 2])]).unwrap(), Object::Integer(1));
        assert_eq!(builtin_last(&[array(&[1, 2])]).unwrap(), Object::Integer(2));
        assert_eq!(builtin_first(&[array(&[])]).unwrap(), NULL);
        assert_eq!(builtin_last(&[array(&[])]).unwrap(), NULL);
    }

    #[test]
    fn test_rest() {
        assert_eq!(builtin_rest(&[array(&[1, 2, 3])]).unwrap(), array(&[2, 3]));
        assert_eq!(builtin_rest(&[array(&[1])]).unwrap(), array(&[]));
        assert_eq!(builtin_rest(&[array(&[])]).unwrap(), NULL);
    }

    #[test]
    fn test_push_leaves_original_untouched() {
        let original = array(&[1]);
        let pushed = builtin_push(&[original.clone(), Object::Integer(2)]).unwrap();
        assert_eq!(pushed, array(&[1, 2]));
        assert_eq!(original, array(&[1]));
    }

    #[test]
    fn test_table_order() {
        let names: Vec<_> = BUILTINS.iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["len", "first", "last", "rest", "push", "puts"]);
    }
}

//! Runtime value model for the Spike virtual machine.

pub mod builtins;

pub use builtins::{Builtin, BUILTINS};

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::IndexMap;

/// Shared singletons. Boolean results always reuse these so truthiness
/// checks and comparisons never allocate.
pub const TRUE: Object = Object::Boolean(true);
pub const FALSE: Object = Object::Boolean(false);
pub const NULL: Object = Object::Null;

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Object {
    Integer(i64),
    Boolean(bool),
    String(Rc<String>),
    Null,
    Array(Rc<Vec<Object>>),
    Hash(Rc<IndexMap<HashKey, Object>>),
    CompiledFunction(Rc<CompiledFunction>),
    Closure(Rc<Closure>),
    /// Position into the builtin table.
    Builtin(usize),
}

impl Object {
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Integer(_) => "Integer",
            Object::Boolean(_) => "Boolean",
            Object::String(_) => "String",
            Object::Null => "Null",
            Object::Array(_) => "Array",
            Object::Hash(_) => "Hash",
            Object::CompiledFunction(_) => "Function",
            Object::Closure(_) => "Function",
            Object::Builtin(_) => "Builtin",
        }
    }

    /// Only `false` and `null` are not truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Object::Boolean(b) => *b,
            Object::Null => false,
            _ => true,
        }
    }

    pub fn from_bool(value: bool) -> Object {
        if value {
            TRUE
        } else {
            FALSE
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::Integer(a), Object::Integer(b)) => a == b,
            (Object::Boolean(a), Object::Boolean(b)) => a == b,
            (Object::String(a), Object::String(b)) => a == b,
            (Object::Null, Object::Null) => true,
            (Object::Array(a), Object::Array(b)) => a == b,
            (Object::Hash(a), Object::Hash(b)) => a == b,
            (Object::CompiledFunction(a), Object::CompiledFunction(b)) => Rc::ptr_eq(a, b),
            (Object::Closure(a), Object::Closure(b)) => Rc::ptr_eq(a, b),
            (Object::Builtin(a), Object::Builtin(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Integer(n) => write!(f, "{}", n),
            Object::Boolean(b) => write!(f, "{}", b),
            Object::String(s) => write!(f, "{}", s),
            Object::Null => write!(f, "null"),
            Object::Array(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            Object::Hash(pairs) => {
                write!(f, "{{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Object::CompiledFunction(_) | Object::Closure(_) => write!(f, "<fn>"),
            Object::Builtin(index) => match BUILTINS.get(*index) {
                Some(builtin) => write!(f, "<builtin {}>", builtin.name),
                None => write!(f, "<builtin {}>", index),
            },
        }
    }
}

/// A hashable key for use in hash values. Only integers, booleans and
/// strings can be keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashKey {
    Int(i64),
    Bool(bool),
    Str(Rc<String>),
}

impl Hash for HashKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            HashKey::Int(n) => n.hash(state),
            HashKey::Bool(b) => b.hash(state),
            HashKey::Str(s) => s.hash(state),
        }
    }
}

impl HashKey {
    /// Convert an Object to a HashKey if possible.
    pub fn from_object(value: &Object) -> Option<HashKey> {
        match value {
            Object::Integer(n) => Some(HashKey::Int(*n)),
            Object::Boolean(b) => Some(HashKey::Bool(*b)),
            Object::String(s) => Some(HashKey::Str(s.clone())),
            _ => None,
        }
    }

    /// Convert back to an Object.
    pub fn to_object(&self) -> Object {
        match self {
            HashKey::Int(n) => Object::Integer(*n),
            HashKey::Bool(b) => Object::Boolean(*b),
            HashKey::Str(s) => Object::String(s.clone()),
        }
    }
}

impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashKey::Int(n) => write!(f, "{}", n),
            HashKey::Bool(b) => write!(f, "{}", b),
            HashKey::Str(s) => write!(f, "{}", s),
        }
    }
}

/// A compiled function: flat bytecode plus the frame layout the VM needs to
/// call it.
#[derive(Debug)]
pub struct CompiledFunction {
    pub instructions: Vec<u8>,
    /// Number of local slots to reserve above the base pointer, parameters
    /// included.
    pub locals_count: usize,
    pub params_count: usize,
}

/// A compiled function paired with the values captured for its free
/// variables, in capture order.
#[derive(Debug)]
pub struct Closure {
    pub function: Rc<CompiledFunction>,
    pub captured: Vec<Object>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        assert_eq!(Object::Integer(5), Object::Integer(5));
        assert_ne!(Object::Integer(5), Object::Integer(6));
        assert_ne!(Object::Integer(1), Object::Boolean(true));
        assert_eq!(
            Object::String(Rc::new("a".to_string())),
            Object::String(Rc::new("a".to_string()))
        );
        assert_eq!(
            Object::Array(Rc::new(vec![Object::Integer(1), Object::Integer(2)])),
            Object::Array(Rc::new(vec![Object::Integer(1), Object::Integer(2)]))
        );
    }

    #[test]
    fn test_singletons_compare_structurally() {
        assert_eq!(TRUE, Object::Boolean(true));
        assert_eq!(FALSE, Object::Boolean(false));
        assert_eq!(NULL, Object::Null);
    }

    #[test]
    fn test_truthiness() {
        assert!(Object::Integer(0).is_truthy());
        assert!(Object::String(Rc::new(String::new())).is_truthy());
        assert!(TRUE.is_truthy());
        assert!(!FALSE.is_truthy());
        assert!(!NULL.is_truthy());
    }

    #[test]
    fn test_hash_key_roundtrip() {
        let key = HashKey::from_object(&Object::Integer(3)).expect("hashable");
        assert_eq!(key.to_object(), Object::Integer(3));
        assert!(HashKey::from_object(&Object::Array(Rc::new(vec![]))).is_none());
        assert!(HashKey::from_object(&NULL).is_none());
    }

    #[test]
    fn test_display() {
        let array = Object::Array(Rc::new(vec![Object::Integer(1), Object::Integer(2)]));
        assert_eq!(array.to_string(), "[1, 2]");

        let mut map = IndexMap::new();
        map.insert(HashKey::Int(1), Object::String(Rc::new("a".to_string())));
        assert_eq!(Object::Hash(Rc::new(map)).to_string(), "{1: a}");
    }
}

//! Lexical scope chain used during compilation.

use std::collections::HashMap;

/// Where a resolved name lives at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    /// Top-level binding, addressed into the globals array.
    Global,
    /// Function-local binding, addressed relative to the frame base pointer.
    Local,
    /// Captured from an enclosing function, addressed into the closure's
    /// captured values.
    Free,
    /// Entry in the builtin table.
    Builtin,
    /// The name of the function currently being compiled; loads as the
    /// running closure itself.
    Function,
}

/// A resolved name. `index` is dense within the symbol's scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// One scope in the chain. `outer` points at the enclosing function's table
/// and only exists during compilation.
#[derive(Debug, Default)]
pub struct SymbolTable {
    outer: Option<Box<SymbolTable>>,
    store: HashMap<String, Symbol>,
    /// Number of Global/Local definitions made in this table; becomes the
    /// compiled function's locals count.
    pub num_definitions: usize,
    /// Symbols of enclosing scopes captured by this one, in capture order.
    /// A Free symbol's index is its position here.
    pub free_symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enclosed(outer: SymbolTable) -> Self {
        Self {
            outer: Some(Box::new(outer)),
            ..Self::default()
        }
    }

    pub fn is_global(&self) -> bool {
        self.outer.is_none()
    }

    /// Take back the enclosing table when a function scope ends.
    pub fn into_outer(self) -> Option<SymbolTable> {
        self.outer.map(|outer| *outer)
    }

    /// Bind a name in this scope, assigning the next dense index.
    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.outer.is_none() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };
        let symbol = Symbol {
            name: name.to_string(),
            scope,
            index: self.num_definitions,
        };
        self.num_definitions += 1;
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Bind a builtin at its table position. Does not consume a local slot.
    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Builtin,
            index,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Bind the name of the function being compiled so its body can refer
    /// to itself without capturing. Does not consume a local slot.
    pub fn define_function_name(&mut self, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Function,
            index: 0,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Resolve a name, promoting it to Free in this table when it is found
    /// in an enclosing function scope. The promotion repeats in every
    /// intervening table, so each function's capture list carries the chain
    /// one level outward.
    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.store.get(name) {
            return Some(symbol.clone());
        }

        let symbol = self.outer.as_mut()?.resolve(name)?;
        match symbol.scope {
            SymbolScope::Global | SymbolScope::Builtin => Some(symbol),
            _ => Some(self.define_free(symbol)),
        }
    }

    fn define_free(&mut self, original: Symbol) -> Symbol {
        let symbol = Symbol {
            name: original.name.clone(),
            scope: SymbolScope::Free,
            index: self.free_symbols.len(),
        };
        self.free_symbols.push(original);
        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }
}

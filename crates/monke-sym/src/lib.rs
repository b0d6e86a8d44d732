//! Nested symbol tables with free-variable promotion (spec.md §4.4).
//!
//! Each level owns a name-keyed map and a free-symbols list; `resolve`
//! walks outward through `outer` and, on finding a non-global,
//! non-builtin symbol defined further out, installs a `Free`-scoped
//! alias in every intervening scope so closures capture by a chain of
//! single-hop lookups rather than reaching across frames directly.

use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
    Free,
    Function,
    Builtin,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

pub struct SymbolTable {
    outer: Option<Box<SymbolTable>>,
    store: HashMap<String, Symbol>,
    pub num_definitions: usize,
    pub free_symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self { outer: None, store: HashMap::new(), num_definitions: 0, free_symbols: Vec::new() }
    }

    /// Pushes a new scope enclosing `self`; the caller gets the new
    /// scope back and must later call `leave` to pop it and recover
    /// `self`.
    pub fn enter(self) -> Self {
        Self { outer: Some(Box::new(self)), store: HashMap::new(), num_definitions: 0, free_symbols: Vec::new() }
    }

    /// Pops back to the enclosing scope, discarding this one.
    pub fn leave(self) -> Self {
        *self.outer.expect("leave called on the outermost symbol table")
    }

    pub fn is_global(&self) -> bool {
        self.outer.is_none()
    }

    /// Defines `name` in the current scope: `Global` at the root,
    /// `Local` otherwise.
    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.is_global() { SymbolScope::Global } else { SymbolScope::Local };
        let symbol = Symbol { name: name.to_string(), scope, index: self.num_definitions };
        self.num_definitions += 1;
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Installs `name` as a builtin at the given fixed index, regardless
    /// of current nesting.
    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol { name: name.to_string(), scope: SymbolScope::Builtin, index };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Installs a `Function`-scoped self-symbol for the function
    /// currently being compiled, so named recursion resolves.
    pub fn define_function_name(&mut self, name: &str) -> Symbol {
        let symbol = Symbol { name: name.to_string(), scope: SymbolScope::Function, index: 0 };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Resolves `name`, promoting it to a `Free` symbol in every scope
    /// between its definition and the current one if it was found
    /// further out than a non-global, non-builtin scope.
    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.store.get(name) {
            return Some(symbol.clone());
        }

        let outer = self.outer.as_mut()?;
        let resolved = outer.resolve(name)?;

        match resolved.scope {
            SymbolScope::Global | SymbolScope::Builtin => Some(resolved),
            _ => Some(self.define_free(resolved)),
        }
    }

    fn define_free(&mut self, original: Symbol) -> Symbol {
        let index = self.free_symbols.len();
        self.free_symbols.push(original);
        let symbol = Symbol { name: self.free_symbols[index].name.clone(), scope: SymbolScope::Free, index };
        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

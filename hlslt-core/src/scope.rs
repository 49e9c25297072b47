use crate::ty::SymbolId;
use std::collections::HashMap;

/// A single scope mapping names to symbol handles. A name may carry
/// several handles at once (function overload sets).
#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: HashMap<String, Vec<SymbolId>>,
}

impl Scope {
    pub fn new() -> Self {
        Scope {
            bindings: HashMap::new(),
        }
    }

    pub fn insert(&mut self, name: String, symbol: SymbolId) {
        self.bindings.entry(name).or_default().push(symbol);
    }

    pub fn get(&self, name: &str) -> Option<&[SymbolId]> {
        self.bindings.get(name).map(|v| v.as_slice())
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }
}

/// A stack-based scope manager that tracks nested block scopes.
#[derive(Debug, Clone)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    /// Create a new scope stack with a global scope.
    pub fn new() -> Self {
        ScopeStack {
            scopes: vec![Scope::new()],
        }
    }

    /// Push a new scope onto the stack.
    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    /// Pop the current scope from the stack.
    /// Returns None if trying to pop the global scope.
    pub fn pop_scope(&mut self) -> Option<Scope> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    /// Insert a binding in the current (innermost) scope.
    pub fn insert(&mut self, name: String, symbol: SymbolId) {
        if let Some(current_scope) = self.scopes.last_mut() {
            current_scope.insert(name, symbol);
        }
    }

    /// Insert a binding in the global (outermost) scope.
    pub fn insert_global(&mut self, name: String, symbol: SymbolId) {
        self.scopes[0].insert(name, symbol);
    }

    /// Look up the innermost binding for a name. With shadowing, the
    /// latest handle of the innermost defining scope wins.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        for scope in self.scopes.iter().rev() {
            if let Some(symbols) = scope.get(name) {
                return symbols.last().copied();
            }
        }
        None
    }

    /// All handles bound to a name in the innermost scope that defines
    /// it (the full overload set for functions).
    pub fn lookup_all(&self, name: &str) -> Option<&[SymbolId]> {
        for scope in self.scopes.iter().rev() {
            if let Some(symbols) = scope.get(name) {
                return Some(symbols);
            }
        }
        None
    }

    /// Check if a name is defined in the current scope (not outer scopes).
    pub fn is_defined_in_current_scope(&self, name: &str) -> bool {
        self.scopes
            .last()
            .map(|scope| scope.contains_key(name))
            .unwrap_or(false)
    }

    /// Current scope depth (0 = global scope).
    pub fn depth(&self) -> usize {
        self.scopes.len().saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_scope_operations() {
        let mut scope_stack = ScopeStack::new();

        scope_stack.insert("x".to_string(), SymbolId(1));
        assert_eq!(scope_stack.lookup("x"), Some(SymbolId(1)));

        // Push new scope and shadow the variable.
        scope_stack.push_scope();
        scope_stack.insert("x".to_string(), SymbolId(2));
        scope_stack.insert("y".to_string(), SymbolId(3));

        assert_eq!(scope_stack.lookup("x"), Some(SymbolId(2)));
        assert_eq!(scope_stack.lookup("y"), Some(SymbolId(3)));

        // Pop scope.
        scope_stack.pop_scope();
        assert_eq!(scope_stack.lookup("x"), Some(SymbolId(1)));
        assert_eq!(scope_stack.lookup("y"), None);
    }

    #[test]
    fn test_overload_sets() {
        let mut scope_stack = ScopeStack::new();
        scope_stack.insert("f".to_string(), SymbolId(1));
        scope_stack.insert("f".to_string(), SymbolId(2));

        let all = scope_stack.lookup_all("f").unwrap();
        assert_eq!(all, &[SymbolId(1), SymbolId(2)]);
    }

    #[test]
    fn test_current_scope_queries() {
        let mut scope_stack = ScopeStack::new();
        scope_stack.insert("x".to_string(), SymbolId(1));
        assert!(scope_stack.is_defined_in_current_scope("x"));

        scope_stack.push_scope();
        assert!(!scope_stack.is_defined_in_current_scope("x"));
        assert_eq!(scope_stack.depth(), 1);
    }

    #[test]
    fn test_global_scope_cannot_pop() {
        let mut scope_stack = ScopeStack::new();
        assert!(scope_stack.pop_scope().is_none());
        assert_eq!(scope_stack.depth(), 0);
    }
}

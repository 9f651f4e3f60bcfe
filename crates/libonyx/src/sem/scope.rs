//! Hierarchical scopes for symbol resolution.
//!
//! Scopes form a tree rooted at the program's global scope: package scopes
//! hang off the root, and each function, block and for-loop may own a local
//! scope. Lookup searches upward until a match or the root. Scopes live in a
//! [`ScopeArena`] and refer to their parent by index, so there are no owning
//! cycles.

use indexmap::IndexMap;

use crate::ast::{FuncId, GlobalId, LocalId, OverloadId, TypeExprId};
use crate::program::PackageId;

/// Index of a scope in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub usize);

impl ScopeId {
    pub const UNDEFINED: Self = ScopeId(usize::MAX);
}

/// What an identifier binds to inside a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Local(LocalId),
    Global(GlobalId),
    Function(FuncId),
    Overload(OverloadId),
    Package(PackageId),
    /// A type name, bound to its (possibly pre-resolved) type expression.
    Type(TypeExprId),
}

/// One scope: a symbol table plus the parent link.
#[derive(Debug, Clone)]
pub struct Scope {
    pub symbols: IndexMap<String, Symbol>,
    pub parent: Option<ScopeId>,
    /// Locals declared directly in this scope, in declaration order. The
    /// collapse pass hoists these to the enclosing function.
    pub locals: Vec<LocalId>,
    pub location: ScopeId,
}

/// Arena of all scopes in a compilation.
#[derive(Debug, Clone, Default)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let location = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            symbols: IndexMap::new(),
            parent,
            locals: Vec::new(),
            location,
        });
        location
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0]
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Binds `name` in `scope`. A rebinding of the same name in the same
    /// scope replaces the previous entry; shadowing across scopes is simply
    /// a nearer binding.
    pub fn introduce(&mut self, scope: ScopeId, name: impl Into<String>, symbol: Symbol) {
        let entry = self.get_mut(scope);
        entry.symbols.insert(name.into(), symbol);
        if let Symbol::Local(local) = symbol {
            entry.locals.push(local);
        }
    }

    /// Looks `name` up starting at `scope` and walking parent links to the
    /// root.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<Symbol> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let entry = self.get(id);
            if let Some(symbol) = entry.symbols.get(name) {
                return Some(*symbol);
            }
            current = entry.parent;
        }
        None
    }

    /// Looks `name` up in exactly `scope`, without walking parents.
    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<Symbol> {
        self.get(scope).symbols.get(name).copied()
    }

    /// Merges every binding of `source` into `target`. The first binding
    /// wins: a name already present in `target` keeps its existing binding
    /// and the duplicate is ignored without a diagnostic.
    pub fn include(&mut self, target: ScopeId, source: ScopeId) {
        let bindings: Vec<(String, Symbol)> = self
            .get(source)
            .symbols
            .iter()
            .map(|(name, symbol)| (name.clone(), *symbol))
            .collect();

        let entry = self.get_mut(target);
        for (name, symbol) in bindings {
            entry.symbols.entry(name).or_insert(symbol);
        }
    }
}

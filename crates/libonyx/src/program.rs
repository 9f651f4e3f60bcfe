//! The program container handed from the parser to the semantic pass.
//!
//! A [`Program`] owns the AST arenas, the type table, the scope arena, the
//! package registry and the ordered entity list that drives every pass.

use indexmap::IndexMap;

use crate::ast::{Ast, ExprId, ForeignBlockId, FuncId, GlobalId, OverloadId, StrLitId, StructId, UsePackageId};
use crate::sem::scope::{ScopeArena, ScopeId};
use crate::types::TypeTable;

/// Index of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackageId(pub usize);

/// A package: a name, its owning scope and the include scope that
/// `use package` items populate.
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    pub id: PackageId,
    pub scope: ScopeId,
    pub include_scope: ScopeId,
}

/// Top-level item kinds the pass driver dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Function(FuncId),
    OverloadedFunction(OverloadId),
    Global(GlobalId),
    Expression(ExprId),
    Struct(StructId),
    StringLiteral(StrLitId),
    UsePackage(UsePackageId),
    ForeignBlock(ForeignBlockId),
}

/// A top-level program item with its owning package.
#[derive(Debug, Clone, Copy)]
pub struct Entity {
    pub kind: EntityKind,
    pub package: PackageId,
}

/// Everything one compilation operates on.
#[derive(Debug, Clone)]
pub struct Program {
    pub ast: Ast,
    pub types: TypeTable,
    pub scopes: ScopeArena,
    pub packages: Vec<Package>,
    package_names: IndexMap<String, PackageId>,
    pub entities: Vec<Entity>,
    pub global_scope: ScopeId,
    pub foreign_func_count: u32,
    pub foreign_global_count: u32,
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl Program {
    pub fn new() -> Self {
        let mut scopes = ScopeArena::new();
        let global_scope = scopes.create(None);
        Self {
            ast: Ast::new(),
            types: TypeTable::new(),
            scopes,
            packages: Vec::new(),
            package_names: IndexMap::new(),
            entities: Vec::new(),
            global_scope,
            foreign_func_count: 0,
            foreign_global_count: 0,
        }
    }

    /// Registers a package, creating its scope and include scope. Lookups
    /// from the package scope fall through to the include scope (where
    /// `use package` items install bindings) and from there to the global
    /// scope.
    pub fn add_package(&mut self, name: impl Into<String>) -> PackageId {
        let name = name.into();
        if let Some(existing) = self.package_names.get(&name) {
            return *existing;
        }
        let id = PackageId(self.packages.len());
        let include_scope = self.scopes.create(Some(self.global_scope));
        let scope = self.scopes.create(Some(include_scope));
        self.packages.push(Package { name: name.clone(), id, scope, include_scope });
        self.package_names.insert(name, id);
        id
    }

    /// Introduces a top-level name into a package's scope. The parser calls
    /// this as it registers declarations.
    pub fn introduce(&mut self, package: PackageId, name: impl Into<String>, symbol: crate::sem::scope::Symbol) {
        let scope = self.packages[package.0].scope;
        self.scopes.introduce(scope, name, symbol);
    }

    pub fn package(&self, id: PackageId) -> &Package {
        &self.packages[id.0]
    }

    pub fn lookup_package(&self, name: &str) -> Option<PackageId> {
        self.package_names.get(name).copied()
    }

    /// Appends a top-level entity. Function entities get their package back
    /// pointer set here.
    pub fn add_entity(&mut self, kind: EntityKind, package: PackageId) {
        if let EntityKind::Function(func) = kind {
            self.ast.function_mut(func).package = Some(package);
        }
        self.entities.push(Entity { kind, package });
    }
}

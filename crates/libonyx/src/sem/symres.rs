//! Symbol resolution.
//!
//! Walks the entity list, entering each entity's package scope, and rewrites
//! every unresolved identifier node in place to a reference to its
//! declaration. Type expressions are resolved to concrete type nodes at the
//! same time. Resolution failures record a diagnostic and continue, so one
//! run surfaces every unresolved name.

use crate::ast::{
    BlockId, DeclRef, ExprId, ExprKind, ForeignBlockId, FuncId, Global, GlobalId, LocalId, NodeFlags, OverloadId,
    StmtId, StmtKind, StructId, TypeExpr, TypeExprId, TypeExprKind, UnaryOp, UsePackageId,
};
use crate::error::SemError;
use crate::program::EntityKind;
use crate::sem::scope::Symbol;
use crate::sem::SemPass;
use crate::span::{Ident, Span};
use crate::types::BasicKind;

/// The builtin names seeded into the global scope before resolution starts.
const BUILTIN_TYPES: [(&str, BasicKind); 13] = [
    ("void", BasicKind::Void),
    ("bool", BasicKind::Bool),
    ("i8", BasicKind::I8),
    ("u8", BasicKind::U8),
    ("i16", BasicKind::I16),
    ("u16", BasicKind::U16),
    ("i32", BasicKind::I32),
    ("u32", BasicKind::U32),
    ("i64", BasicKind::I64),
    ("u64", BasicKind::U64),
    ("f32", BasicKind::F32),
    ("f64", BasicKind::F64),
    ("rawptr", BasicKind::Rawptr),
];

impl<'p> SemPass<'p> {
    pub(crate) fn resolve_symbols(&mut self) {
        self.curr_scope = self.program.global_scope;
        self.seed_builtins();

        for index in 0..self.program.entities.len() {
            let entity = self.program.entities[index];
            let package_scope = self.program.package(entity.package).scope;
            self.scope_enter(package_scope);
            self.curr_package = Some(entity.package);

            match entity.kind {
                EntityKind::UsePackage(item) => self.resolve_use_package(item),
                EntityKind::Function(func) => self.resolve_function(func),
                EntityKind::OverloadedFunction(set) => self.resolve_overloaded_function(set),
                EntityKind::Global(global) => self.resolve_global(global),
                EntityKind::Expression(expr) => self.resolve_expression(expr),
                EntityKind::Struct(decl) => self.resolve_struct_decl(decl),
                EntityKind::ForeignBlock(block) => self.resolve_foreign_block(block),
                EntityKind::StringLiteral(_) => {}
            }

            self.scope_leave();
        }
    }

    /// Installs the basic type names and the `__heap_start` constant into
    /// the global scope. Idempotent, so resolving twice creates no new
    /// bindings.
    fn seed_builtins(&mut self) {
        let global = self.program.global_scope;
        if self.program.scopes.lookup_local(global, "void").is_some() {
            return;
        }

        for (name, kind) in BUILTIN_TYPES {
            let ty = self.program.types.basic(kind);
            let node = self.program.ast.push_type_expr(TypeExpr {
                kind: TypeExprKind::Basic(ty),
                span: Span::builtin(),
                flags: NodeFlags::TypeResolved,
            });
            self.program.scopes.introduce(global, name, Symbol::Type(node));
        }

        let rawptr = self.program.types.basic(BasicKind::Rawptr);
        let heap_start = self.program.ast.push_global(Global {
            name: Ident::synthetic("__heap_start"),
            type_expr: None,
            ty: Some(rawptr),
            flags: NodeFlags::Const,
            exported_name: None,
        });
        self.program.scopes.introduce(global, "__heap_start", Symbol::Global(heap_start));
    }

    /// Resolves a type expression, returning the node the owning field
    /// should now point at. Symbolic forms collapse to the declaration's
    /// type node; structural forms resolve their components in place.
    pub(crate) fn resolve_type(&mut self, te: TypeExprId) -> Option<TypeExprId> {
        let kind = self.program.ast.type_expr(te).kind.clone();
        match kind {
            TypeExprKind::Symbol(ident) => match self.lookup(&ident.text) {
                Some(Symbol::Type(target)) => Some(target),
                Some(_) => {
                    self.error(SemError::literal("symbol does not name a type", &ident.span));
                    None
                }
                None => {
                    self.error(SemError::unresolved_symbol(&ident.text, &ident.span));
                    None
                }
            },

            TypeExprKind::Qualified { package, name } => {
                let Some(Symbol::Package(pkg)) = self.lookup(&package.text) else {
                    self.error(SemError::literal("field access did not result in a type", &package.span));
                    return None;
                };
                let pkg_scope = self.program.package(pkg).scope;
                match self.program.scopes.lookup(pkg_scope, &name.text) {
                    Some(Symbol::Type(target)) => Some(target),
                    _ => {
                        self.error(SemError::literal("field access did not result in a type", &name.span));
                        None
                    }
                }
            }

            // Already resolved.
            TypeExprKind::Basic(_) => Some(te),

            TypeExprKind::Pointer { elem } => {
                if let Some(resolved) = self.resolve_type(elem) {
                    self.program.ast.type_expr_mut(te).kind = TypeExprKind::Pointer { elem: resolved };
                }
                Some(te)
            }

            TypeExprKind::Function { params, ret } => {
                let resolved_ret = self.resolve_type(ret).unwrap_or(ret);
                let resolved_params: Vec<TypeExprId> = params
                    .iter()
                    .map(|param| self.resolve_type(*param).unwrap_or(*param))
                    .collect();
                self.program.ast.type_expr_mut(te).kind =
                    TypeExprKind::Function { params: resolved_params, ret: resolved_ret };
                Some(te)
            }

            TypeExprKind::Struct(decl) => {
                self.resolve_struct_decl(decl);
                Some(te)
            }

            TypeExprKind::Array { elem, count } => {
                if let Some(count_expr) = count {
                    self.resolve_expression(count_expr);
                }
                if let Some(resolved) = self.resolve_type(elem) {
                    self.program.ast.type_expr_mut(te).kind = TypeExprKind::Array { elem: resolved, count };
                }
                Some(te)
            }

            TypeExprKind::Slice { elem } => {
                if let Some(resolved) = self.resolve_type(elem) {
                    self.program.ast.type_expr_mut(te).kind = TypeExprKind::Slice { elem: resolved };
                }
                Some(te)
            }

            TypeExprKind::DynArray { elem } => {
                if let Some(resolved) = self.resolve_type(elem) {
                    self.program.ast.type_expr_mut(te).kind = TypeExprKind::DynArray { elem: resolved };
                }
                Some(te)
            }
        }
    }

    fn resolve_struct_decl(&mut self, decl: StructId) {
        if self.program.ast.struct_decl(decl).flags.contains(NodeFlags::TypeResolved) {
            return;
        }
        self.program.ast.struct_decl_mut(decl).flags |= NodeFlags::TypeResolved;

        for index in 0..self.program.ast.struct_decl(decl).members.len() {
            let member_te = self.program.ast.struct_decl(decl).members[index].type_expr;
            if let Some(resolved) = self.resolve_type(member_te) {
                self.program.ast.struct_decl_mut(decl).members[index].type_expr = resolved;
            }
        }
    }

    fn resolve_local(&mut self, local: LocalId) {
        if let Some(te) = self.program.ast.local(local).type_expr {
            let resolved = self.resolve_type(te);
            self.program.ast.local_mut(local).type_expr = resolved.or(Some(te));
        }

        if let Some(func) = self.curr_function {
            self.program.ast.function_mut(func).locals.push(local);
        }

        let name = self.program.ast.local(local).name.text.clone();
        self.program.scopes.introduce(self.curr_scope, name, Symbol::Local(local));
    }

    fn resolve_call(&mut self, expr: ExprId) {
        let ExprKind::Call { callee, args } = self.program.ast.expr(expr).kind.clone() else {
            return;
        };
        self.resolve_expression(callee);

        // Uniform call syntax: a call through a field access becomes a plain
        // call of the member function with the receiver prepended as an
        // implicit first argument.
        if let ExprKind::FieldAccess { base, field } = self.program.ast.expr(callee).kind.clone() {
            match self.lookup(&field.text) {
                Some(symbol) => {
                    let decl = self.symbol_to_decl(symbol);
                    self.program.ast.expr_mut(callee).kind = ExprKind::Decl(decl);
                }
                None => {
                    self.error(SemError::unresolved_symbol(&field.text, &field.span));
                }
            }

            let mut new_args = Vec::with_capacity(args.len() + 1);
            new_args.push(base);
            new_args.extend(args.iter().copied());
            if let ExprKind::Call { args: call_args, .. } = &mut self.program.ast.expr_mut(expr).kind {
                *call_args = new_args;
            }
        }

        let ExprKind::Call { args, .. } = self.program.ast.expr(expr).kind.clone() else {
            return;
        };
        for arg in args {
            self.resolve_expression(arg);
        }
    }

    fn resolve_field_access(&mut self, expr: ExprId) {
        let ExprKind::FieldAccess { base, field } = self.program.ast.expr(expr).kind.clone() else {
            return;
        };
        self.resolve_expression(base);

        // Package-qualified name collapse: `pkg.thing` becomes the symbol
        // resolved inside the package's scope.
        if let ExprKind::Decl(DeclRef::Package(pkg)) = self.program.ast.expr(base).kind {
            let pkg_scope = self.program.package(pkg).scope;
            if let Some(symbol) = self.program.scopes.lookup(pkg_scope, &field.text) {
                let decl = self.symbol_to_decl(symbol);
                self.program.ast.expr_mut(expr).kind = ExprKind::Decl(decl);
            }
        }
    }

    pub(crate) fn resolve_expression(&mut self, expr: ExprId) {
        let kind = self.program.ast.expr(expr).kind.clone();
        match kind {
            ExprKind::Binary { left, right, .. } => {
                self.resolve_expression(left);
                self.resolve_expression(right);
            }

            ExprKind::Unary { op, expr: operand } => {
                if op == UnaryOp::Cast {
                    if let Some(te) = self.program.ast.expr(expr).type_expr {
                        let resolved = self.resolve_type(te);
                        self.program.ast.expr_mut(expr).type_expr = resolved.or(Some(te));
                    }
                }
                self.resolve_expression(operand);
            }

            ExprKind::Call { .. } => self.resolve_call(expr),

            ExprKind::Symbol(ident) => match self.lookup(&ident.text) {
                Some(symbol) => {
                    let decl = self.symbol_to_decl(symbol);
                    self.program.ast.expr_mut(expr).kind = ExprKind::Decl(decl);
                }
                None => {
                    self.error(SemError::unresolved_symbol(&ident.text, &ident.span));
                }
            },

            ExprKind::NumLit(_) | ExprKind::StrLit(_) => {
                if let Some(te) = self.program.ast.expr(expr).type_expr {
                    let resolved = self.resolve_type(te);
                    self.program.ast.expr_mut(expr).type_expr = resolved.or(Some(te));
                }
            }

            ExprKind::AddressOf { expr: inner } => self.resolve_expression(inner),
            ExprKind::Deref { expr: inner } => self.resolve_expression(inner),
            ExprKind::FieldAccess { .. } => self.resolve_field_access(expr),

            ExprKind::SizeOf { target, .. } => {
                if let Some(resolved) = self.resolve_type(target) {
                    if let ExprKind::SizeOf { target: t, .. } = &mut self.program.ast.expr_mut(expr).kind {
                        *t = resolved;
                    }
                }
            }

            ExprKind::ArrayAccess { base, index, .. } => {
                self.resolve_expression(base);
                self.resolve_expression(index);
            }

            // Already resolved.
            ExprKind::Decl(_) | ExprKind::IntrinsicCall { .. } => {}
        }
    }

    fn symbol_to_decl(&self, symbol: Symbol) -> DeclRef {
        match symbol {
            Symbol::Local(id) => DeclRef::Local(id),
            Symbol::Global(id) => DeclRef::Global(id),
            Symbol::Function(id) => DeclRef::Function(id),
            Symbol::Overload(id) => DeclRef::Overload(id),
            Symbol::Package(id) => DeclRef::Package(id),
            Symbol::Type(id) => DeclRef::Type(id),
        }
    }

    fn resolve_for(&mut self, stmt: StmtId) {
        let StmtKind::For { var, start, end, step, body, scope } = self.program.ast.stmt(stmt).kind.clone() else {
            return;
        };

        let for_scope = match scope {
            Some(existing) => existing,
            None => self.program.scopes.create(Some(self.curr_scope)),
        };
        if let StmtKind::For { scope: slot, .. } = &mut self.program.ast.stmt_mut(stmt).kind {
            *slot = Some(for_scope);
        }
        self.scope_enter(for_scope);

        if let Some(func) = self.curr_function {
            self.program.ast.function_mut(func).locals.push(var);
        }
        let name = self.program.ast.local(var).name.text.clone();
        self.program.scopes.introduce(self.curr_scope, name, Symbol::Local(var));

        self.resolve_expression(start);
        self.resolve_expression(end);
        if let Some(step) = step {
            self.resolve_expression(step);
        }

        self.resolve_statement(body);
        self.scope_leave();
    }

    /// Returns true when the statement should be removed from its block,
    /// which is the case for local declarations once introduced.
    fn resolve_statement(&mut self, stmt: StmtId) -> bool {
        let kind = self.program.ast.stmt(stmt).kind.clone();
        match kind {
            StmtKind::Local(local) => {
                self.resolve_local(local);
                true
            }
            StmtKind::Return { expr } => {
                if let Some(expr) = expr {
                    self.resolve_expression(expr);
                }
                false
            }
            StmtKind::If { cond, then_stmt, else_stmt } => {
                self.resolve_expression(cond);
                self.resolve_statement(then_stmt);
                if let Some(else_stmt) = else_stmt {
                    self.resolve_statement(else_stmt);
                }
                false
            }
            StmtKind::While { cond, body } => {
                self.resolve_expression(cond);
                self.resolve_statement(body);
                false
            }
            StmtKind::For { .. } => {
                self.resolve_for(stmt);
                false
            }
            StmtKind::Block(block) => {
                self.resolve_block(block);
                false
            }
            StmtKind::Expr(expr) => {
                self.resolve_expression(expr);
                false
            }
            StmtKind::Break | StmtKind::Continue => false,
        }
    }

    pub(crate) fn resolve_block(&mut self, block: BlockId) {
        let scope = match self.program.ast.block(block).scope {
            Some(existing) => existing,
            None => {
                let created = self.program.scopes.create(Some(self.curr_scope));
                self.program.ast.block_mut(block).scope = Some(created);
                created
            }
        };
        self.scope_enter(scope);

        let body = self.program.ast.block(block).body.clone();
        let mut removed = Vec::new();
        for stmt in body {
            if self.resolve_statement(stmt) {
                removed.push(stmt);
            }
        }
        if !removed.is_empty() {
            self.program.ast.block_mut(block).body.retain(|stmt| !removed.contains(stmt));
        }

        self.scope_leave();
    }

    pub(crate) fn resolve_function(&mut self, func: FuncId) {
        let scope = match self.program.ast.function(func).scope {
            Some(existing) => existing,
            None => {
                let created = self.program.scopes.create(Some(self.curr_scope));
                self.program.ast.function_mut(func).scope = Some(created);
                created
            }
        };
        self.scope_enter(scope);

        for index in 0..self.program.ast.function(func).params.len() {
            let param = self.program.ast.function(func).params[index];
            if let Some(te) = self.program.ast.local(param).type_expr {
                let resolved = self.resolve_type(te);
                self.program.ast.local_mut(param).type_expr = resolved.or(Some(te));
            }
            let name = self.program.ast.local(param).name.text.clone();
            self.program.scopes.introduce(self.curr_scope, name, Symbol::Local(param));
        }

        let return_te = self.program.ast.function(func).return_type;
        if return_te != crate::ast::TypeExprId::UNDEFINED {
            if let Some(resolved) = self.resolve_type(return_te) {
                self.program.ast.function_mut(func).return_type = resolved;
            }
        }

        let previous_function = self.curr_function;
        self.curr_function = Some(func);
        if let Some(body) = self.program.ast.function(func).body {
            self.resolve_block(body);
        }
        self.curr_function = previous_function;

        self.scope_leave();
    }

    fn resolve_global(&mut self, global: GlobalId) {
        if let Some(te) = self.program.ast.global(global).type_expr {
            let resolved = self.resolve_type(te);
            self.program.ast.global_mut(global).type_expr = resolved.or(Some(te));
        }
    }

    fn resolve_overloaded_function(&mut self, set: OverloadId) {
        for index in 0..self.program.ast.overload(set).overloads.len() {
            let overload = self.program.ast.overload(set).overloads[index];
            if matches!(self.program.ast.expr(overload).kind, ExprKind::Symbol(_)) {
                self.resolve_expression(overload);
            }
        }
    }

    fn resolve_foreign_block(&mut self, block: ForeignBlockId) {
        for index in 0..self.program.ast.foreign_block(block).funcs.len() {
            let func = self.program.ast.foreign_block(block).funcs[index];
            self.resolve_function(func);
        }
    }

    fn resolve_use_package(&mut self, item: UsePackageId) {
        let use_item = self.program.ast.use_package(item).clone();

        let Some(target) = self.program.lookup_package(&use_item.package.text) else {
            self.error(SemError::unresolved_package(&use_item.package.text, &use_item.package.span));
            return;
        };
        let target_scope = self.program.package(target).scope;
        if target_scope == self.curr_scope {
            return;
        }

        let package = self.curr_package.expect("use-package entity outside a package");
        let include_scope = self.program.package(package).include_scope;

        if let Some(alias) = &use_item.alias {
            self.program
                .scopes
                .introduce(include_scope, alias.text.clone(), Symbol::Package(target));
        }

        if !use_item.only.is_empty() {
            for ident in &use_item.only {
                match self.program.scopes.lookup(target_scope, &ident.text) {
                    Some(symbol) => {
                        self.program.scopes.introduce(include_scope, ident.text.clone(), symbol);
                    }
                    None => {
                        self.error(SemError::literal("not found in package", &ident.span));
                        return;
                    }
                }
            }
        }

        if use_item.alias.is_none() && use_item.only.is_empty() {
            self.program.scopes.include(include_scope, target_scope);
        }
    }
}

//! Type checking.
//!
//! Every typed node either gets its `type` filled consistently with the
//! rules below, or a diagnostic is recorded. A failed check returns up the
//! call chain to the entity driver, which advances to the next entity so
//! that independent errors all surface in one run.

use crate::ast::{
    BinaryOp, BlockId, DeclRef, ExprId, ExprKind, FuncId, GlobalId, LocalId, NodeFlags, OverloadId, StmtId,
    StmtKind, UnaryOp,
};
use crate::error::SemError;
use crate::intrinsics::Intrinsic;
use crate::program::EntityKind;
use crate::sem::scope::Symbol;
use crate::sem::SemPass;
use crate::span::Span;
use crate::types::{type_from_expr, BasicKind, TypeId, TypeKind};

/// Marker for a failed check; the diagnostic is already on the log.
pub(crate) struct CheckFailed;

type CheckResult = Result<(), CheckFailed>;

impl<'p> SemPass<'p> {
    pub(crate) fn check_types(&mut self) {
        for index in 0..self.program.entities.len() {
            let entity = self.program.entities[index];
            self.curr_package = Some(entity.package);

            match entity.kind {
                EntityKind::Function(func) => {
                    if self.program.ast.function(func).flags.contains(NodeFlags::Foreign) {
                        self.program.foreign_func_count += 1;
                    }
                    let _ = self.check_function(func);
                }
                EntityKind::OverloadedFunction(set) => {
                    let _ = self.check_overloaded_function(set);
                }
                EntityKind::Global(global) => {
                    if self.program.ast.global(global).flags.contains(NodeFlags::Foreign) {
                        self.program.foreign_global_count += 1;
                    }
                    let _ = self.check_global(global);
                }
                EntityKind::Expression(expr) => {
                    let _ = self.check_expression(expr);
                }
                EntityKind::ForeignBlock(block) => {
                    for fn_index in 0..self.program.ast.foreign_block(block).funcs.len() {
                        let func = self.program.ast.foreign_block(block).funcs[fn_index];
                        self.program.foreign_func_count += 1;
                        let _ = self.check_function(func);
                    }
                }
                EntityKind::StringLiteral(_) | EntityKind::Struct(_) | EntityKind::UsePackage(_) => {}
            }
        }
    }

    fn fill_expr_type(&mut self, expr: ExprId) {
        if self.program.ast.expr(expr).ty.is_some() {
            return;
        }
        if let Some(te) = self.program.ast.expr(expr).type_expr {
            let ty = type_from_expr(&mut self.program.ast, &mut self.program.types, te);
            self.program.ast.expr_mut(expr).ty = ty;
        }
    }

    fn fill_local_type(&mut self, local: LocalId) {
        if self.program.ast.local(local).ty.is_some() {
            return;
        }
        if let Some(te) = self.program.ast.local(local).type_expr {
            let ty = type_from_expr(&mut self.program.ast, &mut self.program.types, te);
            self.program.ast.local_mut(local).ty = ty;
        }
    }

    fn fill_global_type(&mut self, global: GlobalId) {
        if self.program.ast.global(global).ty.is_some() {
            return;
        }
        if let Some(te) = self.program.ast.global(global).type_expr {
            let ty = type_from_expr(&mut self.program.ast, &mut self.program.types, te);
            self.program.ast.global_mut(global).ty = ty;
        }
    }

    /// Builds the function's type from its parameter and return type
    /// expressions.
    fn fill_function_type(&mut self, func: FuncId) {
        if self.program.ast.function(func).ty.is_some() {
            return;
        }

        let params = self.program.ast.function(func).params.clone();
        let mut param_types = Vec::with_capacity(params.len());
        for param in params {
            self.fill_local_type(param);
            match self.program.ast.local(param).ty {
                Some(ty) => param_types.push(ty),
                None => return,
            }
        }

        let return_te = self.program.ast.function(func).return_type;
        if return_te == crate::ast::TypeExprId::UNDEFINED {
            return;
        }
        let Some(ret) = type_from_expr(&mut self.program.ast, &mut self.program.types, return_te) else {
            return;
        };

        let has_vararg = false;
        let ty = self.program.types.intern(TypeKind::Function { params: param_types, ret, has_vararg });
        self.program.ast.function_mut(func).ty = Some(ty);
    }

    /// The node's type, looking through declaration references.
    fn expr_type(&self, expr: ExprId) -> Option<TypeId> {
        self.program.ast.expr(expr).ty
    }

    /// Flags of the declaration an expression refers to, or the node's own
    /// flags.
    fn expr_decl_flags(&self, expr: ExprId) -> NodeFlags {
        match self.program.ast.expr(expr).kind {
            ExprKind::Decl(DeclRef::Local(local)) => self.program.ast.local(local).flags,
            ExprKind::Decl(DeclRef::Global(global)) => self.program.ast.global(global).flags,
            _ => self.program.ast.expr(expr).flags,
        }
    }

    /// Whether the parser marked this value compile-time known, which is
    /// what licenses numeric widening in the compatibility predicate.
    fn expr_is_literal(&self, expr: ExprId) -> bool {
        self.program.ast.expr(expr).flags.contains(NodeFlags::Comptime)
    }

    fn is_lvalue(&self, expr: ExprId) -> bool {
        matches!(
            self.program.ast.expr(expr).kind,
            ExprKind::Decl(DeclRef::Local(_))
                | ExprKind::Decl(DeclRef::Global(_))
                | ExprKind::Deref { .. }
                | ExprKind::ArrayAccess { .. }
        )
    }

    /// Sets an expression's type and mirrors it onto the declaration the
    /// expression refers to, so later uses of the same declaration see it.
    fn set_expr_type(&mut self, expr: ExprId, ty: TypeId) {
        self.program.ast.expr_mut(expr).ty = Some(ty);
        match self.program.ast.expr(expr).kind {
            ExprKind::Decl(DeclRef::Local(local)) => {
                if self.program.ast.local(local).ty.is_none() {
                    self.program.ast.local_mut(local).ty = Some(ty);
                }
            }
            ExprKind::Decl(DeclRef::Global(global)) => {
                if self.program.ast.global(global).ty.is_none() {
                    self.program.ast.global_mut(global).ty = Some(ty);
                }
            }
            _ => {}
        }
    }

    fn type_name(&self, ty: Option<TypeId>) -> String {
        match ty {
            Some(ty) => self.program.types.name_of(ty),
            None => "<unknown>".to_string(),
        }
    }

    fn check_return(&mut self, expr: Option<ExprId>, span: &Span) -> CheckResult {
        let expected = self.expected_return_type;
        match expr {
            Some(expr) => {
                self.check_expression(expr)?;

                let actual = self.expr_type(expr);
                let literal = self.expr_is_literal(expr);
                let compatible = match (actual, expected) {
                    (Some(actual), Some(expected)) => self.program.types.compatible(actual, expected, literal),
                    _ => false,
                };
                if !compatible {
                    let span = self.program.ast.expr(expr).span.clone();
                    let error = SemError::function_return_mismatch(
                        self.type_name(expected),
                        self.type_name(actual),
                        &span,
                    );
                    self.error(error);
                    return Err(CheckFailed);
                }
                Ok(())
            }
            None => {
                let returns_value = expected
                    .map(|ty| self.program.types.size_of(ty) > 0)
                    .unwrap_or(false);
                if returns_value {
                    self.error(SemError::literal("returning from non-void function without value", span));
                    return Err(CheckFailed);
                }
                Ok(())
            }
        }
    }

    fn check_if(&mut self, cond: ExprId, then_stmt: StmtId, else_stmt: Option<StmtId>) -> CheckResult {
        self.check_expression(cond)?;
        self.expect_bool_condition(cond)?;
        self.check_statement(then_stmt)?;
        if let Some(else_stmt) = else_stmt {
            self.check_statement(else_stmt)?;
        }
        Ok(())
    }

    fn check_while(&mut self, cond: ExprId, body: StmtId) -> CheckResult {
        self.check_expression(cond)?;
        self.expect_bool_condition(cond)?;
        self.check_statement(body)
    }

    fn expect_bool_condition(&mut self, cond: ExprId) -> CheckResult {
        let is_bool = self
            .expr_type(cond)
            .map(|ty| self.program.types.is_bool(ty))
            .unwrap_or(false);
        if !is_bool {
            let span = self.program.ast.expr(cond).span.clone();
            self.error(SemError::literal("expected boolean type for condition", &span));
            return Err(CheckFailed);
        }
        Ok(())
    }

    /// For-loop bounds are pinned to `i32`.
    fn check_for(&mut self, var: LocalId, start: ExprId, end: ExprId, step: Option<ExprId>, body: StmtId) -> CheckResult {
        self.check_expression(start)?;
        self.check_expression(end)?;
        if let Some(step) = step {
            self.check_expression(step)?;
        }

        let i32_id = self.program.types.basic(BasicKind::I32);
        self.fill_local_type(var);
        if self.program.ast.local(var).ty.is_none() {
            self.program.ast.local_mut(var).ty = Some(i32_id);
        }

        for (bound, what) in [
            (Some(start), "expected expression of type i32 for start"),
            (Some(end), "expected expression of type i32 for end"),
            (step, "expected expression of type i32 for step"),
        ] {
            let Some(bound) = bound else { continue };
            let literal = self.expr_is_literal(bound);
            let ok = self
                .expr_type(bound)
                .map(|ty| self.program.types.compatible(ty, i32_id, literal))
                .unwrap_or(false);
            if !ok {
                let span = self.program.ast.expr(bound).span.clone();
                self.error(SemError::literal(what, &span));
                return Err(CheckFailed);
            }
        }

        self.check_statement(body)
    }

    /// Walks the overload set in declaration order and picks the first
    /// overload whose arity matches and whose every parameter type is
    /// compatible with the corresponding argument. No further ranking is
    /// applied.
    fn match_overloaded_function(&mut self, call: ExprId, set: OverloadId, args: &[ExprId]) -> Option<FuncId> {
        let overloads = self.program.ast.overload(set).overloads.clone();
        'overloads: for overload in overloads {
            let ExprKind::Decl(DeclRef::Function(func)) = self.program.ast.expr(overload).kind else {
                continue;
            };
            self.fill_function_type(func);
            let Some(func_ty) = self.program.ast.function(func).ty else {
                continue;
            };
            let TypeKind::Function { params, .. } = self.program.types.get(func_ty).kind.clone() else {
                continue;
            };
            if params.len() != args.len() {
                continue;
            }
            for (param_ty, arg) in params.iter().zip(args.iter()) {
                let Some(arg_ty) = self.expr_type(*arg) else {
                    continue 'overloads;
                };
                if !self.program.types.compatible(arg_ty, *param_ty, self.expr_is_literal(*arg)) {
                    continue 'overloads;
                }
            }
            return Some(func);
        }

        let span = self.program.ast.expr(call).span.clone();
        self.error(SemError::literal("unable to match overloaded function", &span));
        None
    }

    fn check_call(&mut self, expr: ExprId) -> CheckResult {
        let ExprKind::Call { callee, args } = self.program.ast.expr(expr).kind.clone() else {
            return Ok(());
        };
        let call_span = self.program.ast.expr(expr).span.clone();

        if let ExprKind::Symbol(ident) = self.program.ast.expr(callee).kind.clone() {
            self.error(SemError::unresolved_symbol(&ident.text, &ident.span));
            return Err(CheckFailed);
        }

        // Arguments first.
        for arg in &args {
            self.check_expression(*arg)?;
        }

        // Overload resolution rewrites the callee to the chosen overload.
        if let ExprKind::Decl(DeclRef::Overload(set)) = self.program.ast.expr(callee).kind {
            let Some(func) = self.match_overloaded_function(expr, set, &args) else {
                return Err(CheckFailed);
            };
            self.program.ast.expr_mut(callee).kind = ExprKind::Decl(DeclRef::Function(func));
        }

        let func = match self.program.ast.expr(callee).kind {
            ExprKind::Decl(DeclRef::Function(func)) => func,
            _ => {
                let name = self.program.ast.expr(callee).span.text().to_string();
                self.error(SemError::call_non_function(name, &call_span));
                return Err(CheckFailed);
            }
        };

        self.fill_function_type(func);
        let Some(func_ty) = self.program.ast.function(func).ty else {
            let name = self.program.ast.function(func).name.clone();
            self.error(SemError::unresolved_type(&name.text, &name.span));
            return Err(CheckFailed);
        };
        let TypeKind::Function { params: param_types, ret, .. } = self.program.types.get(func_ty).kind.clone() else {
            let name = self.program.ast.function(func).name.text.clone();
            self.error(SemError::call_non_function(name, &call_span));
            return Err(CheckFailed);
        };

        // A call of an intrinsic-flagged function becomes an intrinsic call,
        // selected by the function's intrinsic name token.
        let mut intrinsic = None;
        if self.program.ast.function(func).flags.contains(NodeFlags::Intrinsic) {
            let name = self.program.ast.function(func).intrinsic_name.clone();
            let Some(name) = name else {
                self.error(SemError::literal("intrinsic function without an intrinsic name", &call_span));
                return Err(CheckFailed);
            };
            let op = Intrinsic::lookup(&name.text);
            if op == Intrinsic::Undefined {
                self.error(SemError::literal("unknown intrinsic name", &name.span));
                return Err(CheckFailed);
            }
            intrinsic = Some(op);
        }

        self.program.ast.expr_mut(expr).ty = Some(ret);

        // Arity and argument types against the formal parameter list.
        let func_name = self.program.ast.function(func).name.text.clone();
        let formal_count = param_types.len();
        for (index, (param_ty, arg)) in param_types.iter().zip(args.iter()).enumerate() {
            let arg_ty = self.expr_type(*arg);
            let literal = self.expr_is_literal(*arg);
            let ok = arg_ty
                .map(|ty| self.program.types.compatible(ty, *param_ty, literal))
                .unwrap_or(false);
            if !ok {
                let span = self.program.ast.expr(*arg).span.clone();
                let error = SemError::function_param_mismatch(
                    func_name.clone(),
                    index as u32,
                    self.type_name(Some(*param_ty)),
                    self.type_name(arg_ty),
                    &span,
                );
                self.error(error);
                return Err(CheckFailed);
            }
        }
        if args.len() < formal_count {
            self.error(SemError::literal("too few arguments to function call", &call_span));
            return Err(CheckFailed);
        }
        if args.len() > formal_count {
            self.error(SemError::literal("too many arguments to function call", &call_span));
            return Err(CheckFailed);
        }

        if let Some(op) = intrinsic {
            self.program.ast.expr_mut(expr).kind = ExprKind::IntrinsicCall { op, args };
        }

        Ok(())
    }

    fn check_binaryop(&mut self, expr: ExprId) -> CheckResult {
        let ExprKind::Binary { op, left, right } = self.program.ast.expr(expr).kind.clone() else {
            return Ok(());
        };
        let binop_span = self.program.ast.expr(expr).span.clone();

        self.check_expression(left)?;
        self.check_expression(right)?;

        let mut op = op;
        if op.is_assignment() {
            if !self.is_lvalue(left) {
                let span = self.program.ast.expr(left).span.clone();
                let name = span.text().to_string();
                self.error(SemError::not_lvalue(name, &span));
                return Err(CheckFailed);
            }

            let left_flags = self.expr_decl_flags(left);
            if left_flags.contains(NodeFlags::Const) && self.expr_type(left).is_some() {
                let span = self.program.ast.expr(left).span.clone();
                let name = span.text().to_string();
                self.error(SemError::assign_const(name, &binop_span));
                return Err(CheckFailed);
            }

            if op == BinaryOp::Assign {
                // Raw assignment may give an untyped left side its type.
                if self.expr_type(left).is_none() {
                    if let Some(right_ty) = self.expr_type(right) {
                        self.set_expr_type(left, right_ty);
                    }
                }
            } else {
                // Compound assignment desugars in place into
                // `lhs = lhs op rhs`, preserving the source span.
                let plain = op.desugared().expect("compound assignment always has a plain form");
                let right_ty = self.expr_type(right);
                let inner = self.program.ast.push_expr(crate::ast::Expr {
                    kind: ExprKind::Binary { op: plain, left, right },
                    span: binop_span.clone(),
                    flags: NodeFlags::none(),
                    ty: right_ty,
                    type_expr: None,
                });
                self.program.ast.expr_mut(expr).kind =
                    ExprKind::Binary { op: BinaryOp::Assign, left, right: inner };
                op = BinaryOp::Assign;
            }
        } else {
            // Documented limitation: no binary operations on pointers, not
            // even equality.
            let left_is_ptr = self.expr_type(left).map(|ty| self.program.types.is_pointer(ty)).unwrap_or(false);
            let right_is_ptr = self.expr_type(right).map(|ty| self.program.types.is_pointer(ty)).unwrap_or(false);
            if left_is_ptr || right_is_ptr {
                self.error(SemError::literal(
                    "binary operations are not supported for pointers (yet)",
                    &binop_span,
                ));
                return Err(CheckFailed);
            }
        }

        let ExprKind::Binary { left, right, .. } = self.program.ast.expr(expr).kind.clone() else {
            return Ok(());
        };

        let Some(left_ty) = self.expr_type(left) else {
            let span = self.program.ast.expr(left).span.clone();
            let name = span.text().to_string();
            self.error(SemError::unresolved_type(name, &binop_span));
            return Err(CheckFailed);
        };
        let Some(right_ty) = self.expr_type(right) else {
            let span = self.program.ast.expr(right).span.clone();
            let name = span.text().to_string();
            self.error(SemError::unresolved_type(name, &binop_span));
            return Err(CheckFailed);
        };

        // Widening across the operator is only licensed when one side is a
        // parser-marked literal.
        let literal = self.expr_is_literal(left) || self.expr_is_literal(right);
        if !self.program.types.compatible(left_ty, right_ty, literal) {
            let error = SemError::binop_mismatch(
                self.program.types.name_of(left_ty),
                self.program.types.name_of(right_ty),
                &binop_span,
            );
            self.error(error);
            return Err(CheckFailed);
        }

        let result = if op.is_comparison() {
            self.program.types.basic(BasicKind::Bool)
        } else {
            left_ty
        };
        self.program.ast.expr_mut(expr).ty = Some(result);

        Ok(())
    }

    /// Taking an address is only legal on an array access or a dereference;
    /// the result is a pointer to the operand's type.
    fn check_address_of(&mut self, expr: ExprId, operand: ExprId) -> CheckResult {
        self.check_expression(operand)?;

        let legal = matches!(
            self.program.ast.expr(operand).kind,
            ExprKind::ArrayAccess { .. } | ExprKind::Deref { .. }
        );
        if !legal {
            let span = self.program.ast.expr(expr).span.clone();
            self.error(SemError::literal("cannot take the address of this", &span));
            return Err(CheckFailed);
        }

        let operand_ty = self.expr_type(operand).expect("checked operand has a type");
        let ty = self.program.types.pointer_to(operand_ty);
        self.program.ast.expr_mut(expr).ty = Some(ty);
        Ok(())
    }

    fn check_dereference(&mut self, expr: ExprId, operand: ExprId) -> CheckResult {
        self.check_expression(operand)?;

        let span = self.program.ast.expr(expr).span.clone();
        let Some(operand_ty) = self.expr_type(operand) else {
            self.error(SemError::literal("cannot dereference non-pointer", &span));
            return Err(CheckFailed);
        };
        if self.program.types.is_rawptr(operand_ty) {
            self.error(SemError::literal("cannot dereference rawptr", &span));
            return Err(CheckFailed);
        }
        let TypeKind::Pointer { elem } = self.program.types.get(operand_ty).kind.clone() else {
            self.error(SemError::literal("cannot dereference non-pointer", &span));
            return Err(CheckFailed);
        };

        self.program.ast.expr_mut(expr).ty = Some(elem);
        Ok(())
    }

    fn check_array_access(&mut self, expr: ExprId, base: ExprId, index: ExprId) -> CheckResult {
        self.check_expression(base)?;
        self.check_expression(index)?;

        let span = self.program.ast.expr(expr).span.clone();
        let base_ty = self.expr_type(base);
        let elem = match base_ty.map(|ty| self.program.types.get(ty).kind.clone()) {
            Some(TypeKind::Pointer { elem }) => elem,
            _ => {
                self.error(SemError::literal("expected pointer type for left of array access", &span));
                return Err(CheckFailed);
            }
        };

        let index_ok = match self.expr_type(index).map(|ty| self.program.types.get(ty).kind.clone()) {
            Some(TypeKind::Basic(kind)) => kind.is_integer(),
            _ => false,
        };
        if !index_ok {
            self.error(SemError::literal("expected integer type for index", &span));
            return Err(CheckFailed);
        }

        let elem_size = self.program.types.size_of(elem);
        self.program.ast.expr_mut(expr).ty = Some(elem);
        if let ExprKind::ArrayAccess { elem_size: slot, .. } = &mut self.program.ast.expr_mut(expr).kind {
            *slot = elem_size;
        }
        Ok(())
    }

    pub(crate) fn check_expression(&mut self, expr: ExprId) -> CheckResult {
        self.fill_expr_type(expr);

        let kind = self.program.ast.expr(expr).kind.clone();
        let span = self.program.ast.expr(expr).span.clone();
        match kind {
            ExprKind::Binary { .. } => self.check_binaryop(expr),

            ExprKind::Unary { op, expr: operand } => {
                self.check_expression(operand)?;
                if op == UnaryOp::Cast {
                    if self.program.ast.expr(expr).ty.is_none() {
                        let name = span.text().to_string();
                        self.error(SemError::unresolved_type(name, &span));
                        return Err(CheckFailed);
                    }
                } else {
                    let operand_ty = self.expr_type(operand);
                    self.program.ast.expr_mut(expr).ty = operand_ty;
                }
                Ok(())
            }

            ExprKind::Call { .. } => self.check_call(expr),

            ExprKind::Symbol(ident) => {
                self.error(SemError::unresolved_symbol(&ident.text, &ident.span));
                Err(CheckFailed)
            }

            ExprKind::Decl(DeclRef::Local(local)) => {
                self.fill_local_type(local);
                let ty = self.program.ast.local(local).ty;
                self.program.ast.expr_mut(expr).ty = ty;
                if ty.is_none() {
                    self.error(SemError::literal("local variable with unknown type", &span));
                    return Err(CheckFailed);
                }
                Ok(())
            }

            ExprKind::Decl(DeclRef::Global(global)) => {
                self.fill_global_type(global);
                let ty = self.program.ast.global(global).ty;
                self.program.ast.expr_mut(expr).ty = ty;
                if ty.is_none() {
                    self.error(SemError::literal("global with unknown type", &span));
                    return Err(CheckFailed);
                }
                Ok(())
            }

            ExprKind::Decl(DeclRef::Function(func)) => {
                self.fill_function_type(func);
                let ty = self.program.ast.function(func).ty;
                self.program.ast.expr_mut(expr).ty = ty;
                Ok(())
            }

            ExprKind::Decl(DeclRef::Overload(_)) => Ok(()),

            ExprKind::Decl(DeclRef::Package(_)) => {
                self.error(SemError::literal("package used as part of an expression", &span));
                Err(CheckFailed)
            }

            ExprKind::Decl(DeclRef::Type(_)) => {
                self.error(SemError::literal("type used as part of an expression", &span));
                Err(CheckFailed)
            }

            ExprKind::NumLit(_) => {
                // Literal types are decided in the parser.
                if self.program.ast.expr(expr).ty.is_none() {
                    self.error(SemError::literal("literal without a type", &span));
                    return Err(CheckFailed);
                }
                Ok(())
            }

            ExprKind::StrLit(_) => Ok(()),

            ExprKind::AddressOf { expr: operand } => self.check_address_of(expr, operand),
            ExprKind::Deref { expr: operand } => self.check_dereference(expr, operand),
            ExprKind::ArrayAccess { base, index, .. } => self.check_array_access(expr, base, index),

            ExprKind::SizeOf { target, .. } => {
                let Some(ty) = type_from_expr(&mut self.program.ast, &mut self.program.types, target) else {
                    let name = span.text().to_string();
                    self.error(SemError::unresolved_type(name, &span));
                    return Err(CheckFailed);
                };
                let size = self.program.types.size_of(ty);
                if let ExprKind::SizeOf { size: slot, .. } = &mut self.program.ast.expr_mut(expr).kind {
                    *slot = size;
                }
                let u32_id = self.program.types.basic(BasicKind::U32);
                self.program.ast.expr_mut(expr).ty = Some(u32_id);
                Ok(())
            }

            ExprKind::FieldAccess { .. } => {
                self.error(SemError::literal("field access is not supported in this position", &span));
                Err(CheckFailed)
            }

            // Rewritten calls were checked before rewriting.
            ExprKind::IntrinsicCall { .. } => Ok(()),
        }
    }

    fn check_statement(&mut self, stmt: StmtId) -> CheckResult {
        let kind = self.program.ast.stmt(stmt).kind.clone();
        let span = self.program.ast.stmt(stmt).span.clone();
        match kind {
            StmtKind::Return { expr } => self.check_return(expr, &span),
            StmtKind::If { cond, then_stmt, else_stmt } => self.check_if(cond, then_stmt, else_stmt),
            StmtKind::While { cond, body } => self.check_while(cond, body),
            StmtKind::For { var, start, end, step, body, .. } => self.check_for(var, start, end, step, body),
            StmtKind::Block(block) => self.check_block(block),
            StmtKind::Break | StmtKind::Continue => Ok(()),
            // Introduced locals were spliced out of the block during symbol
            // resolution; one left behind has nothing to check.
            StmtKind::Local(_) => Ok(()),
            StmtKind::Expr(expr) => {
                self.program.ast.expr_mut(expr).flags |= NodeFlags::ExprIgnored;
                self.check_expression(expr)
            }
        }
    }

    pub(crate) fn check_block(&mut self, block: BlockId) -> CheckResult {
        let body = self.program.ast.block(block).body.clone();
        for stmt in body {
            self.check_statement(stmt)?;
        }

        // Every symbol defined in the block's scope must have ended up with
        // a type.
        if let Some(scope) = self.program.ast.block(block).scope {
            let locals: Vec<LocalId> = self
                .program
                .scopes
                .get(scope)
                .symbols
                .values()
                .filter_map(|symbol| match symbol {
                    Symbol::Local(local) => Some(*local),
                    _ => None,
                })
                .collect();
            for local in locals {
                self.fill_local_type(local);
                if self.program.ast.local(local).ty.is_none() {
                    let name = self.program.ast.local(local).name.clone();
                    self.error(SemError::unresolved_type(&name.text, &name.span));
                    return Err(CheckFailed);
                }
            }
        }

        Ok(())
    }

    pub(crate) fn check_function(&mut self, func: FuncId) -> CheckResult {
        let params = self.program.ast.function(func).params.clone();
        for param in params {
            self.fill_local_type(param);
            let span = self.program.ast.local(param).name.span.clone();
            let Some(ty) = self.program.ast.local(param).ty else {
                self.error(SemError::literal("function parameter types must be known", &span));
                return Err(CheckFailed);
            };
            if self.program.types.size_of(ty) == 0 {
                self.error(SemError::literal("function parameters must have non-void types", &span));
                return Err(CheckFailed);
            }
        }

        self.fill_function_type(func);
        let name = self.program.ast.function(func).name.clone();
        let Some(func_ty) = self.program.ast.function(func).ty else {
            self.error(SemError::unresolved_type(&name.text, &name.span));
            return Err(CheckFailed);
        };

        let flags = self.program.ast.function(func).flags;
        if flags.contains(NodeFlags::Exported) {
            if flags.contains(NodeFlags::Foreign) {
                self.error(SemError::literal("exporting a foreign function", &name.span));
                return Err(CheckFailed);
            }
            if flags.contains(NodeFlags::Intrinsic) {
                self.error(SemError::literal("exporting an intrinsic function", &name.span));
                return Err(CheckFailed);
            }
            if flags.contains(NodeFlags::Inline) {
                self.error(SemError::literal("exporting an inlined function", &name.span));
                return Err(CheckFailed);
            }
            if self.program.ast.function(func).exported_name.is_none() {
                self.error(SemError::literal("exporting function without a name", &name.span));
                return Err(CheckFailed);
            }
        }

        let TypeKind::Function { ret, .. } = self.program.types.get(func_ty).kind.clone() else {
            self.error(SemError::call_non_function(name.text.clone(), &name.span));
            return Err(CheckFailed);
        };
        self.expected_return_type = Some(ret);

        if let Some(body) = self.program.ast.function(func).body {
            return self.check_block(body);
        }
        Ok(())
    }

    fn check_overloaded_function(&mut self, set: OverloadId) -> CheckResult {
        let overloads = self.program.ast.overload(set).overloads.clone();
        for overload in overloads {
            let span = self.program.ast.expr(overload).span.clone();
            match self.program.ast.expr(overload).kind {
                ExprKind::Decl(DeclRef::Overload(_)) => {
                    self.error(SemError::literal(
                        "overload option can not be another overloaded function (yet)",
                        &span,
                    ));
                    return Err(CheckFailed);
                }
                ExprKind::Decl(DeclRef::Function(_)) => {}
                _ => {
                    self.error(SemError::literal("overload option not function", &span));
                    return Err(CheckFailed);
                }
            }
        }
        Ok(())
    }

    fn check_global(&mut self, global: GlobalId) -> CheckResult {
        self.fill_global_type(global);
        if self.program.ast.global(global).ty.is_none() {
            let name = self.program.ast.global(global).name.clone();
            self.error(SemError::unresolved_type(&name.text, &name.span));
            return Err(CheckFailed);
        }
        Ok(())
    }
}

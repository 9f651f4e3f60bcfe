//! End-to-end semantic-pass scenarios: build a program the way the parser
//! would, run the pass, inspect the rewritten AST.

mod common;

use common::{file, function, ident, local, named_type, sp, symbol};
use libonyx::ast::{
    BinaryOp, Block, DeclRef, ExprKind, NodeFlags, NumValue, Stmt, StmtKind, UsePackage,
};
use libonyx::error::SemError;
use libonyx::intrinsics::Intrinsic;
use libonyx::program::EntityKind;
use libonyx::sem;
use libonyx::sem::scope::Symbol;
use libonyx::types::{BasicKind, TypeKind};
use libonyx::Program;

#[test]
fn overload_resolution_picks_the_first_compatible_overload() {
    let src = file("add_i :: (a: i32, b: i32) -> i32; add_f :: (a: f32, b: f32) -> f32; add :: {add_i, add_f}; add(1.0, 2.0)");
    let mut program = Program::new();
    let pkg = program.add_package("main");

    let ai = local(&mut program, &src, "a", "i32");
    let bi = local(&mut program, &src, "b", "i32");
    let add_i = function(&mut program, &src, "add_i", vec![ai, bi], "i32", None);

    let af = local(&mut program, &src, "a", "f32");
    let bf = local(&mut program, &src, "b", "f32");
    let add_f = function(&mut program, &src, "add_f", vec![af, bf], "f32", None);

    let option_i = symbol(&mut program, &src, "add_i");
    let option_f = symbol(&mut program, &src, "add_f");
    let set = program.ast.push_overload(libonyx::ast::OverloadSet {
        name: ident(&src, "add"),
        overloads: vec![option_i, option_f],
    });

    program.introduce(pkg, "add_i", Symbol::Function(add_i));
    program.introduce(pkg, "add_f", Symbol::Function(add_f));
    program.introduce(pkg, "add", Symbol::Overload(set));

    let f32_id = program.types.basic(BasicKind::F32);
    let lhs = program.ast.new_num_lit(NumValue::F32(1.0), f32_id, sp(&src, "1.0"));
    let rhs = program.ast.new_num_lit(NumValue::F32(2.0), f32_id, sp(&src, "2.0"));
    let callee = symbol(&mut program, &src, "add");
    let call = program.ast.new_expr(ExprKind::Call { callee, args: vec![lhs, rhs] }, sp(&src, "add(1.0, 2.0)"));

    program.add_entity(EntityKind::Function(add_i), pkg);
    program.add_entity(EntityKind::Function(add_f), pkg);
    program.add_entity(EntityKind::OverloadedFunction(set), pkg);
    program.add_entity(EntityKind::Expression(call), pkg);

    let diagnostics = sem::analyze(&mut program);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.render_plain());

    // The callee was rewritten to the f32 overload and the call takes its
    // return type.
    assert_eq!(program.ast.expr(callee).kind, ExprKind::Decl(DeclRef::Function(add_f)));
    assert_eq!(program.ast.expr(call).ty, Some(f32_id));
}

#[test]
fn compound_assignment_desugars_in_place() {
    let src = file("f :: () -> void { x: i32; y: i32; x += y; }");
    let mut program = Program::new();
    let pkg = program.add_package("main");

    let x = local(&mut program, &src, "x", "i32");
    let y = local(&mut program, &src, "y", "i32");
    let x_ref = program.ast.new_expr(ExprKind::Decl(DeclRef::Local(x)), sp(&src, "x +="));
    let y_ref = program.ast.new_expr(ExprKind::Decl(DeclRef::Local(y)), sp(&src, "y;"));
    let assign = program.ast.new_expr(
        ExprKind::Binary { op: BinaryOp::AssignAdd, left: x_ref, right: y_ref },
        sp(&src, "x += y"),
    );

    let stmt_x = program.ast.push_stmt(Stmt { kind: StmtKind::Local(x), span: sp(&src, "x: i32") });
    let stmt_y = program.ast.push_stmt(Stmt { kind: StmtKind::Local(y), span: sp(&src, "y: i32") });
    let stmt_assign = program.ast.push_stmt(Stmt { kind: StmtKind::Expr(assign), span: sp(&src, "x += y") });

    let func = function(&mut program, &src, "f", vec![], "void", Some(vec![stmt_x, stmt_y, stmt_assign]));
    program.introduce(pkg, "f", Symbol::Function(func));
    program.add_entity(EntityKind::Function(func), pkg);

    let diagnostics = sem::analyze(&mut program);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.render_plain());

    let i32_id = program.types.basic(BasicKind::I32);

    // `x += y` became `x = (x + y)` with the inner binop typed i32.
    let ExprKind::Binary { op, left, right } = program.ast.expr(assign).kind.clone() else {
        panic!("assignment is still a binary node");
    };
    assert_eq!(op, BinaryOp::Assign);
    assert_eq!(left, x_ref);
    let inner = program.ast.expr(right);
    assert!(matches!(inner.kind, ExprKind::Binary { op: BinaryOp::Add, .. }));
    assert_eq!(inner.ty, Some(i32_id));

    // The local declaration statements were spliced out of the block.
    let body = program.ast.function(func).body.unwrap();
    assert_eq!(program.ast.block(body).body, vec![stmt_assign]);
}

#[test]
fn locals_collapse_to_the_function_exactly_once() {
    let src = file("f :: () -> void { a: i32; { b: i32; } while c { d: i32; } }");
    let mut program = Program::new();
    let pkg = program.add_package("main");

    let a = local(&mut program, &src, "a", "i32");
    let b = local(&mut program, &src, "b", "i32");
    let d = local(&mut program, &src, "d", "i32");

    let stmt_a = program.ast.push_stmt(Stmt { kind: StmtKind::Local(a), span: sp(&src, "a: i32") });
    let stmt_b = program.ast.push_stmt(Stmt { kind: StmtKind::Local(b), span: sp(&src, "b: i32") });
    let inner_block = program.ast.push_block(Block { body: vec![stmt_b], scope: None, span: sp(&src, "{ b") });
    let stmt_inner = program.ast.push_stmt(Stmt { kind: StmtKind::Block(inner_block), span: sp(&src, "{ b") });

    let bool_id = program.types.basic(BasicKind::Bool);
    let cond = program.ast.new_num_lit(NumValue::I32(0), bool_id, sp(&src, "c"));
    let stmt_d = program.ast.push_stmt(Stmt { kind: StmtKind::Local(d), span: sp(&src, "d: i32") });
    let while_block = program.ast.push_block(Block { body: vec![stmt_d], scope: None, span: sp(&src, "{ d") });
    let while_body = program.ast.push_stmt(Stmt { kind: StmtKind::Block(while_block), span: sp(&src, "{ d") });
    let stmt_while = program.ast.push_stmt(Stmt { kind: StmtKind::While { cond, body: while_body }, span: sp(&src, "while") });

    let func = function(&mut program, &src, "f", vec![], "void", Some(vec![stmt_a, stmt_inner, stmt_while]));
    program.introduce(pkg, "f", Symbol::Function(func));
    program.add_entity(EntityKind::Function(func), pkg);

    let diagnostics = sem::analyze(&mut program);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.render_plain());

    let locals = &program.ast.function(func).locals;
    for target in [a, b, d] {
        assert_eq!(locals.iter().filter(|id| **id == target).count(), 1, "{target:?} hoisted once");
    }
}

#[test]
fn symbol_resolution_is_idempotent() {
    let src = file("g: i32; f :: () -> void { g; }");
    let mut program = Program::new();
    let pkg = program.add_package("main");

    let g_te = named_type(&mut program, &src, "i32");
    let g = program.ast.push_global(libonyx::ast::Global {
        name: ident(&src, "g"),
        type_expr: Some(g_te),
        ty: None,
        flags: NodeFlags::none(),
        exported_name: None,
    });
    program.introduce(pkg, "g", Symbol::Global(g));

    let g_ref = symbol(&mut program, &src, "g");
    let stmt = program.ast.push_stmt(Stmt { kind: StmtKind::Expr(g_ref), span: sp(&src, "g;") });
    let func = function(&mut program, &src, "f", vec![], "void", Some(vec![stmt]));
    program.introduce(pkg, "f", Symbol::Function(func));

    program.add_entity(EntityKind::Global(g), pkg);
    program.add_entity(EntityKind::Function(func), pkg);

    let first = sem::analyze(&mut program);
    assert!(!first.has_errors());
    let bindings_after_first: usize = (0..program.scopes.len())
        .map(|index| program.scopes.get(libonyx::sem::scope::ScopeId(index)).symbols.len())
        .sum();
    let locals_after_first = program.ast.function(func).locals.clone();

    let second = sem::analyze(&mut program);
    assert!(!second.has_errors());
    let bindings_after_second: usize = (0..program.scopes.len())
        .map(|index| program.scopes.get(libonyx::sem::scope::ScopeId(index)).symbols.len())
        .sum();

    assert_eq!(bindings_after_first, bindings_after_second);
    assert_eq!(locals_after_first, program.ast.function(func).locals);
}

#[test]
fn use_package_merges_and_aliases() {
    let src = file("package core; g: i32; package main; use core; use core as c");
    let mut program = Program::new();
    let core = program.add_package("core");
    let main = program.add_package("main");

    let g_te = named_type(&mut program, &src, "i32");
    let g = program.ast.push_global(libonyx::ast::Global {
        name: ident(&src, "g"),
        type_expr: Some(g_te),
        ty: None,
        flags: NodeFlags::none(),
        exported_name: None,
    });
    program.introduce(core, "g", Symbol::Global(g));

    let plain_use = program.ast.push_use_package(UsePackage {
        package: ident(&src, "core"),
        alias: None,
        only: vec![],
    });
    let alias_use = program.ast.push_use_package(UsePackage {
        package: ident(&src, "core"),
        alias: Some(ident(&src, "c")),
        only: vec![],
    });

    // A reference to `g` from main resolves through the include scope, and
    // `c.g` resolves through the alias.
    let g_ref = symbol(&mut program, &src, "g");
    let c_ref = symbol(&mut program, &src, "c");
    let qualified = program.ast.new_expr(
        ExprKind::FieldAccess { base: c_ref, field: ident(&src, "g") },
        sp(&src, "c"),
    );

    program.add_entity(EntityKind::Global(g), core);
    program.add_entity(EntityKind::UsePackage(plain_use), main);
    program.add_entity(EntityKind::UsePackage(alias_use), main);
    program.add_entity(EntityKind::Expression(g_ref), main);
    program.add_entity(EntityKind::Expression(qualified), main);

    let diagnostics = sem::analyze(&mut program);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.render_plain());

    assert_eq!(program.ast.expr(g_ref).kind, ExprKind::Decl(DeclRef::Global(g)));
    // The package-qualified access collapsed to the global itself.
    assert_eq!(program.ast.expr(qualified).kind, ExprKind::Decl(DeclRef::Global(g)));
}

#[test]
fn duplicate_bindings_keep_the_first_on_merge() {
    let src = file("package a; package b; package main; use a; use b");
    let mut program = Program::new();
    let pkg_a = program.add_package("a");
    let pkg_b = program.add_package("b");
    let main = program.add_package("main");

    let te_a = named_type(&mut program, &src, "i32");
    let from_a = program.ast.push_global(libonyx::ast::Global {
        name: ident(&src, "thing"),
        type_expr: Some(te_a),
        ty: None,
        flags: NodeFlags::none(),
        exported_name: None,
    });
    let te_b = named_type(&mut program, &src, "i32");
    let from_b = program.ast.push_global(libonyx::ast::Global {
        name: ident(&src, "thing"),
        type_expr: Some(te_b),
        ty: None,
        flags: NodeFlags::none(),
        exported_name: None,
    });
    program.introduce(pkg_a, "thing", Symbol::Global(from_a));
    program.introduce(pkg_b, "thing", Symbol::Global(from_b));

    let use_a = program.ast.push_use_package(UsePackage { package: ident(&src, "a"), alias: None, only: vec![] });
    let use_b = program.ast.push_use_package(UsePackage { package: ident(&src, "b"), alias: None, only: vec![] });
    let thing_ref = symbol(&mut program, &src, "thing");

    program.add_entity(EntityKind::Global(from_a), pkg_a);
    program.add_entity(EntityKind::Global(from_b), pkg_b);
    program.add_entity(EntityKind::UsePackage(use_a), main);
    program.add_entity(EntityKind::UsePackage(use_b), main);
    program.add_entity(EntityKind::Expression(thing_ref), main);

    let diagnostics = sem::analyze(&mut program);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.render_plain());

    // First binding wins; the later import does not overwrite it.
    assert_eq!(program.ast.expr(thing_ref).kind, ExprKind::Decl(DeclRef::Global(from_a)));
}

#[test]
fn selective_import_installs_only_the_listed_names() {
    let src = file("package core; one: i32; two: i32; package main; use core { one }; two");
    let mut program = Program::new();
    let core = program.add_package("core");
    let main = program.add_package("main");

    for name in ["one", "two"] {
        let te = named_type(&mut program, &src, "i32");
        let global = program.ast.push_global(libonyx::ast::Global {
            name: ident(&src, name),
            type_expr: Some(te),
            ty: None,
            flags: NodeFlags::none(),
            exported_name: None,
        });
        program.introduce(core, name, Symbol::Global(global));
        program.add_entity(EntityKind::Global(global), core);
    }

    let selective = program.ast.push_use_package(UsePackage {
        package: ident(&src, "core"),
        alias: None,
        only: vec![ident(&src, "one")],
    });
    let two_ref = symbol(&mut program, &src, "two");

    program.add_entity(EntityKind::UsePackage(selective), main);
    program.add_entity(EntityKind::Expression(two_ref), main);

    let diagnostics = sem::analyze(&mut program);
    // `two` was not imported, so it must stay unresolved.
    assert!(diagnostics.has_errors());
    assert!(diagnostics.iter().any(|error| matches!(error, SemError::UnresolvedSymbol(_))));
}

#[test]
fn return_type_mismatch_is_reported() {
    let src = file("f :: () -> i32 { return 1.5; }");
    let mut program = Program::new();
    let pkg = program.add_package("main");

    let f64_id = program.types.basic(BasicKind::F64);
    let value = program.ast.new_num_lit(NumValue::F64(1.5), f64_id, sp(&src, "1.5"));
    let ret = program.ast.push_stmt(Stmt { kind: StmtKind::Return { expr: Some(value) }, span: sp(&src, "return") });
    let func = function(&mut program, &src, "f", vec![], "i32", Some(vec![ret]));
    program.introduce(pkg, "f", Symbol::Function(func));
    program.add_entity(EntityKind::Function(func), pkg);

    let diagnostics = sem::analyze(&mut program);
    assert_eq!(diagnostics.len(), 1);
    assert!(matches!(diagnostics.iter().next(), Some(SemError::FunctionReturnMismatch(_))));
}

#[test]
fn intrinsic_calls_are_rewritten() {
    let src = file("memory_size :: () -> i32 #intrinsic; memory_size()");
    let mut program = Program::new();
    let pkg = program.add_package("main");

    let func = function(&mut program, &src, "memory_size", vec![], "i32", None);
    program.ast.function_mut(func).flags |= NodeFlags::Intrinsic;
    program.ast.function_mut(func).intrinsic_name = Some(ident(&src, "memory_size"));
    program.introduce(pkg, "memory_size", Symbol::Function(func));

    let callee = symbol(&mut program, &src, "memory_size");
    let call = program.ast.new_expr(ExprKind::Call { callee, args: vec![] }, sp(&src, "memory_size()"));

    program.add_entity(EntityKind::Function(func), pkg);
    program.add_entity(EntityKind::Expression(call), pkg);

    let diagnostics = sem::analyze(&mut program);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.render_plain());

    let i32_id = program.types.basic(BasicKind::I32);
    let node = program.ast.expr(call);
    assert!(matches!(node.kind, ExprKind::IntrinsicCall { op: Intrinsic::MemorySize, .. }));
    assert_eq!(node.ty, Some(i32_id));
}

#[test]
fn unknown_intrinsic_names_are_rejected() {
    let src = file("mystery :: () -> i32 #intrinsic; mystery()");
    let mut program = Program::new();
    let pkg = program.add_package("main");

    let func = function(&mut program, &src, "mystery", vec![], "i32", None);
    program.ast.function_mut(func).flags |= NodeFlags::Intrinsic;
    program.ast.function_mut(func).intrinsic_name = Some(ident(&src, "mystery"));
    program.introduce(pkg, "mystery", Symbol::Function(func));

    let callee = symbol(&mut program, &src, "mystery");
    let call = program.ast.new_expr(ExprKind::Call { callee, args: vec![] }, sp(&src, "mystery()"));

    program.add_entity(EntityKind::Function(func), pkg);
    program.add_entity(EntityKind::Expression(call), pkg);

    let diagnostics = sem::analyze(&mut program);
    assert!(diagnostics.has_errors());
}

#[test]
fn for_loops_scope_their_variable_and_pin_i32_bounds() {
    let src = file("f :: () -> void { for i: 0 .. 10 { } }");
    let mut program = Program::new();
    let pkg = program.add_package("main");

    let i32_id = program.types.basic(BasicKind::I32);
    let var = program.ast.push_local(libonyx::ast::Local {
        name: ident(&src, "i"),
        type_expr: None,
        ty: Some(i32_id),
        flags: NodeFlags::none(),
    });
    let start = program.ast.new_num_lit(NumValue::I32(0), i32_id, sp(&src, "0"));
    let end = program.ast.new_num_lit(NumValue::I32(10), i32_id, sp(&src, "10"));
    let body_block = program.ast.push_block(Block { body: vec![], scope: None, span: sp(&src, "{ }") });
    let body = program.ast.push_stmt(Stmt { kind: StmtKind::Block(body_block), span: sp(&src, "{ }") });
    let for_stmt = program.ast.push_stmt(Stmt {
        kind: StmtKind::For { var, start, end, step: None, body, scope: None },
        span: sp(&src, "for"),
    });

    let func = function(&mut program, &src, "f", vec![], "void", Some(vec![for_stmt]));
    program.introduce(pkg, "f", Symbol::Function(func));
    program.add_entity(EntityKind::Function(func), pkg);

    let diagnostics = sem::analyze(&mut program);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.render_plain());

    // The loop variable got its own scope and landed in the function's
    // local list.
    let StmtKind::For { scope, .. } = program.ast.stmt(for_stmt).kind.clone() else {
        panic!("for statement kept its kind");
    };
    assert!(scope.is_some());
    assert!(program.ast.function(func).locals.contains(&var));
}

#[test]
fn float_bounds_are_rejected_for_for_loops() {
    let src = file("f :: () -> void { for i: 0.0 .. 1.0 { } }");
    let mut program = Program::new();
    let pkg = program.add_package("main");

    let i32_id = program.types.basic(BasicKind::I32);
    let f32_id = program.types.basic(BasicKind::F32);
    let var = program.ast.push_local(libonyx::ast::Local {
        name: ident(&src, "i"),
        type_expr: None,
        ty: Some(i32_id),
        flags: NodeFlags::none(),
    });
    let start = program.ast.new_num_lit(NumValue::F32(0.0), f32_id, sp(&src, "0.0"));
    let end = program.ast.new_num_lit(NumValue::F32(1.0), f32_id, sp(&src, "1.0"));
    let body_block = program.ast.push_block(Block { body: vec![], scope: None, span: sp(&src, "{ }") });
    let body = program.ast.push_stmt(Stmt { kind: StmtKind::Block(body_block), span: sp(&src, "{ }") });
    let for_stmt = program.ast.push_stmt(Stmt {
        kind: StmtKind::For { var, start, end, step: None, body, scope: None },
        span: sp(&src, "for"),
    });

    let func = function(&mut program, &src, "f", vec![], "void", Some(vec![for_stmt]));
    program.introduce(pkg, "f", Symbol::Function(func));
    program.add_entity(EntityKind::Function(func), pkg);

    let diagnostics = sem::analyze(&mut program);
    assert!(diagnostics.has_errors());
}

#[test]
fn assignments_to_constants_are_rejected() {
    let src = file("f :: () -> void { __heap_start = 1; }");
    let mut program = Program::new();
    let pkg = program.add_package("main");

    let i32_id = program.types.basic(BasicKind::I32);
    let target = symbol(&mut program, &src, "__heap_start");
    let value = program.ast.new_num_lit(NumValue::I32(1), i32_id, sp(&src, "1"));
    let assign = program.ast.new_expr(
        ExprKind::Binary { op: BinaryOp::Assign, left: target, right: value },
        sp(&src, "__heap_start = 1"),
    );
    let stmt = program.ast.push_stmt(Stmt { kind: StmtKind::Expr(assign), span: sp(&src, "__heap_start = 1") });

    let func = function(&mut program, &src, "f", vec![], "void", Some(vec![stmt]));
    program.introduce(pkg, "f", Symbol::Function(func));
    program.add_entity(EntityKind::Function(func), pkg);

    let diagnostics = sem::analyze(&mut program);
    assert!(diagnostics.iter().any(|error| matches!(error, SemError::AssignConst(_))));
}

#[test]
fn pointer_binary_operations_are_rejected() {
    let src = file("f :: (p: rawptr, q: rawptr) -> void { p == q; }");
    let mut program = Program::new();
    let pkg = program.add_package("main");

    let p = local(&mut program, &src, "p", "rawptr");
    let q = local(&mut program, &src, "q", "rawptr");
    let p_ref = program.ast.new_expr(ExprKind::Decl(DeclRef::Local(p)), sp(&src, "p ="));
    let q_ref = program.ast.new_expr(ExprKind::Decl(DeclRef::Local(q)), sp(&src, "q;"));
    let compare = program.ast.new_expr(
        ExprKind::Binary { op: BinaryOp::Equal, left: p_ref, right: q_ref },
        sp(&src, "p == q"),
    );
    let stmt = program.ast.push_stmt(Stmt { kind: StmtKind::Expr(compare), span: sp(&src, "p == q") });

    let func = function(&mut program, &src, "f", vec![p, q], "void", Some(vec![stmt]));
    program.introduce(pkg, "f", Symbol::Function(func));
    program.add_entity(EntityKind::Function(func), pkg);

    let diagnostics = sem::analyze(&mut program);
    assert!(diagnostics.has_errors());
}

#[test]
fn plain_variables_of_different_widths_do_not_widen() {
    let src = file("f :: (a: i32, b: i64) -> void { a + b; }");
    let mut program = Program::new();
    let pkg = program.add_package("main");

    let a = local(&mut program, &src, "a", "i32");
    let b = local(&mut program, &src, "b", "i64");
    let a_ref = program.ast.new_expr(ExprKind::Decl(DeclRef::Local(a)), sp(&src, "a +"));
    let b_ref = program.ast.new_expr(ExprKind::Decl(DeclRef::Local(b)), sp(&src, "b;"));
    let add = program.ast.new_expr(
        ExprKind::Binary { op: BinaryOp::Add, left: a_ref, right: b_ref },
        sp(&src, "a + b"),
    );
    let stmt = program.ast.push_stmt(Stmt { kind: StmtKind::Expr(add), span: sp(&src, "a + b") });

    let func = function(&mut program, &src, "f", vec![a, b], "void", Some(vec![stmt]));
    program.introduce(pkg, "f", Symbol::Function(func));
    program.add_entity(EntityKind::Function(func), pkg);

    // Neither operand is a parser-marked literal, so no widening applies.
    let diagnostics = sem::analyze(&mut program);
    assert!(diagnostics.iter().any(|error| matches!(error, SemError::BinopMismatch(_))));
}

#[test]
fn literal_operands_widen_to_the_other_side() {
    let src = file("f :: (x: i64) -> void { 1 + x; }");
    let mut program = Program::new();
    let pkg = program.add_package("main");

    let x = local(&mut program, &src, "x", "i64");
    let i32_id = program.types.basic(BasicKind::I32);
    let one = program.ast.new_num_lit(NumValue::I32(1), i32_id, sp(&src, "1"));
    let x_ref = program.ast.new_expr(ExprKind::Decl(DeclRef::Local(x)), sp(&src, "x;"));
    let add = program.ast.new_expr(
        ExprKind::Binary { op: BinaryOp::Add, left: one, right: x_ref },
        sp(&src, "1 + x"),
    );
    let stmt = program.ast.push_stmt(Stmt { kind: StmtKind::Expr(add), span: sp(&src, "1 + x") });

    let func = function(&mut program, &src, "f", vec![x], "void", Some(vec![stmt]));
    program.introduce(pkg, "f", Symbol::Function(func));
    program.add_entity(EntityKind::Function(func), pkg);

    let diagnostics = sem::analyze(&mut program);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.render_plain());
}

#[test]
fn pointer_access_rules_type_their_results() {
    let src = file("f :: (p: ^i32) -> void { p[0] = 1; x: ^i32; x = &p[0]; }");
    let mut program = Program::new();
    let pkg = program.add_package("main");

    let elem_te = named_type(&mut program, &src, "i32");
    let ptr_te = program
        .ast
        .new_type_expr(libonyx::ast::TypeExprKind::Pointer { elem: elem_te }, sp(&src, "^i32"));
    let p = program.ast.push_local(libonyx::ast::Local {
        name: ident(&src, "p"),
        type_expr: Some(ptr_te),
        ty: None,
        flags: NodeFlags::none(),
    });

    let i32_id = program.types.basic(BasicKind::I32);
    let p_ref = program.ast.new_expr(ExprKind::Decl(DeclRef::Local(p)), sp(&src, "p["));
    let index = program.ast.new_num_lit(NumValue::I32(0), i32_id, sp(&src, "0"));
    let access = program.ast.new_expr(
        ExprKind::ArrayAccess { base: p_ref, index, elem_size: 0 },
        sp(&src, "p[0]"),
    );
    let one = program.ast.new_num_lit(NumValue::I32(1), i32_id, sp(&src, "1"));
    let store = program.ast.new_expr(
        ExprKind::Binary { op: BinaryOp::Assign, left: access, right: one },
        sp(&src, "p[0] = 1"),
    );
    let stmt_store = program.ast.push_stmt(Stmt { kind: StmtKind::Expr(store), span: sp(&src, "p[0] = 1") });

    let elem_te2 = named_type(&mut program, &src, "i32");
    let ptr_te2 = program
        .ast
        .new_type_expr(libonyx::ast::TypeExprKind::Pointer { elem: elem_te2 }, sp(&src, "^i32"));
    let x = program.ast.push_local(libonyx::ast::Local {
        name: ident(&src, "x"),
        type_expr: Some(ptr_te2),
        ty: None,
        flags: NodeFlags::none(),
    });
    let stmt_x = program.ast.push_stmt(Stmt { kind: StmtKind::Local(x), span: sp(&src, "x:") });

    let p_ref2 = program.ast.new_expr(ExprKind::Decl(DeclRef::Local(p)), sp(&src, "p[0]"));
    let index2 = program.ast.new_num_lit(NumValue::I32(0), i32_id, sp(&src, "0"));
    let access2 = program.ast.new_expr(
        ExprKind::ArrayAccess { base: p_ref2, index: index2, elem_size: 0 },
        sp(&src, "p[0]"),
    );
    let addr = program.ast.new_expr(ExprKind::AddressOf { expr: access2 }, sp(&src, "&p[0]"));
    let x_ref = program.ast.new_expr(ExprKind::Decl(DeclRef::Local(x)), sp(&src, "x ="));
    let assign = program.ast.new_expr(
        ExprKind::Binary { op: BinaryOp::Assign, left: x_ref, right: addr },
        sp(&src, "x = &p[0]"),
    );
    let stmt_assign = program.ast.push_stmt(Stmt { kind: StmtKind::Expr(assign), span: sp(&src, "x = &p[0]") });

    let func = function(&mut program, &src, "f", vec![p], "void", Some(vec![stmt_store, stmt_x, stmt_assign]));
    program.introduce(pkg, "f", Symbol::Function(func));
    program.add_entity(EntityKind::Function(func), pkg);

    let diagnostics = sem::analyze(&mut program);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.render_plain());

    // The access takes the pointee type and caches the element size.
    let node = program.ast.expr(access);
    assert_eq!(node.ty, Some(i32_id));
    assert!(matches!(node.kind, ExprKind::ArrayAccess { elem_size: 4, .. }));

    // Address-of an array access yields a pointer to the element.
    let ptr_ty = program.ast.expr(addr).ty.unwrap();
    assert!(matches!(
        program.types.get(ptr_ty).kind,
        libonyx::types::TypeKind::Pointer { elem } if elem == i32_id
    ));
}

#[test]
fn dereferencing_rawptr_is_rejected() {
    let src = file("f :: (p: rawptr) -> void { ^p; }");
    let mut program = Program::new();
    let pkg = program.add_package("main");

    let p = local(&mut program, &src, "p", "rawptr");
    let p_ref = program.ast.new_expr(ExprKind::Decl(DeclRef::Local(p)), sp(&src, "p;"));
    let deref = program.ast.new_expr(ExprKind::Deref { expr: p_ref }, sp(&src, "^p"));
    let stmt = program.ast.push_stmt(Stmt { kind: StmtKind::Expr(deref), span: sp(&src, "^p") });

    let func = function(&mut program, &src, "f", vec![p], "void", Some(vec![stmt]));
    program.introduce(pkg, "f", Symbol::Function(func));
    program.add_entity(EntityKind::Function(func), pkg);

    let diagnostics = sem::analyze(&mut program);
    assert!(diagnostics.has_errors());
}

#[test]
fn sizeof_is_u32_with_the_target_size_cached() {
    let src = file("sizeof i64");
    let mut program = Program::new();
    let pkg = program.add_package("main");

    let target = named_type(&mut program, &src, "i64");
    let size_of = program
        .ast
        .new_expr(ExprKind::SizeOf { target, size: 0 }, sp(&src, "sizeof i64"));
    program.add_entity(EntityKind::Expression(size_of), pkg);

    let diagnostics = sem::analyze(&mut program);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.render_plain());

    let u32_id = program.types.basic(BasicKind::U32);
    let node = program.ast.expr(size_of);
    assert_eq!(node.ty, Some(u32_id));
    assert!(matches!(node.kind, ExprKind::SizeOf { size: 8, .. }));
}

#[test]
fn all_reachable_typed_nodes_have_types_after_success() {
    let src = file("f :: (a: i32) -> i32 { x: i32; x = a; return x; }");
    let mut program = Program::new();
    let pkg = program.add_package("main");

    let a = local(&mut program, &src, "a", "i32");
    let x = local(&mut program, &src, "x", "i32");
    let x_ref = program.ast.new_expr(ExprKind::Decl(DeclRef::Local(x)), sp(&src, "x ="));
    let a_ref = program.ast.new_expr(ExprKind::Decl(DeclRef::Local(a)), sp(&src, "a;"));
    let assign = program.ast.new_expr(
        ExprKind::Binary { op: BinaryOp::Assign, left: x_ref, right: a_ref },
        sp(&src, "x = a"),
    );
    let ret_ref = program.ast.new_expr(ExprKind::Decl(DeclRef::Local(x)), sp(&src, "x;"));

    let stmt_x = program.ast.push_stmt(Stmt { kind: StmtKind::Local(x), span: sp(&src, "x: i32") });
    let stmt_assign = program.ast.push_stmt(Stmt { kind: StmtKind::Expr(assign), span: sp(&src, "x = a") });
    let stmt_ret = program.ast.push_stmt(Stmt { kind: StmtKind::Return { expr: Some(ret_ref) }, span: sp(&src, "return") });

    let func = function(&mut program, &src, "f", vec![a], "i32", Some(vec![stmt_x, stmt_assign, stmt_ret]));
    program.introduce(pkg, "f", Symbol::Function(func));
    program.add_entity(EntityKind::Function(func), pkg);

    let diagnostics = sem::analyze(&mut program);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.render_plain());

    for expr in [x_ref, a_ref, assign, ret_ref] {
        assert!(program.ast.expr(expr).ty.is_some(), "expression without a type");
    }
    assert!(program.ast.function(func).ty.is_some());
    for local_id in [a, x] {
        assert!(program.ast.local(local_id).ty.is_some());
    }
}

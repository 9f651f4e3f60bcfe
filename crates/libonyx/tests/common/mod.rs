//! Builders shared by the integration tests. They play the role of the
//! parser: constructing source-located AST nodes and registering entities.

// Each integration test binary compiles its own copy and uses a subset.
#![allow(dead_code)]

use libonyx::ast::{
    Block, ExprId, ExprKind, Function, Local, LocalId, NodeFlags, StmtId, TypeExprId, TypeExprKind,
};
use libonyx::file::SourceFile;
use libonyx::program::Program;
use libonyx::span::{Ident, Span};

pub fn file(code: &str) -> SourceFile {
    SourceFile::new("test.onyx", code)
}

/// Span of the first occurrence of `text` in the file.
pub fn sp(file: &SourceFile, text: &str) -> Span {
    match file.code.find(text) {
        Some(start) => Span::new(start..start + text.len(), file.clone()),
        None => Span::new(0..0, file.clone()),
    }
}

pub fn ident(file: &SourceFile, text: &str) -> Ident {
    Ident::new(text, sp(file, text))
}

/// An unresolved named type expression, as the parser produces them.
pub fn named_type(program: &mut Program, file: &SourceFile, name: &str) -> TypeExprId {
    let ident = ident(file, name);
    let span = ident.span.clone();
    program.ast.new_type_expr(TypeExprKind::Symbol(ident), span)
}

/// A typed parameter or local declaration.
pub fn local(program: &mut Program, file: &SourceFile, name: &str, type_name: &str) -> LocalId {
    let te = named_type(program, file, type_name);
    program.ast.push_local(Local {
        name: ident(file, name),
        type_expr: Some(te),
        ty: None,
        flags: NodeFlags::none(),
    })
}

/// A function declaration with an optional body block.
pub fn function(
    program: &mut Program,
    file: &SourceFile,
    name: &str,
    params: Vec<LocalId>,
    return_type: &str,
    body: Option<Vec<StmtId>>,
) -> libonyx::ast::FuncId {
    let return_te = named_type(program, file, return_type);
    let body = body.map(|stmts| {
        program.ast.push_block(Block { body: stmts, scope: None, span: sp(file, name) })
    });
    program.ast.push_function(Function {
        name: ident(file, name),
        params,
        return_type: return_te,
        ty: None,
        body,
        scope: None,
        locals: Vec::new(),
        flags: NodeFlags::none(),
        exported_name: None,
        foreign_name: None,
        intrinsic_name: None,
        tags: Vec::new(),
        package: None,
    })
}

/// A reference to a name, to be resolved by the semantic pass.
pub fn symbol(program: &mut Program, file: &SourceFile, name: &str) -> ExprId {
    let ident = ident(file, name);
    let span = ident.span.clone();
    program.ast.new_expr(ExprKind::Symbol(ident), span)
}

//! Local collapsing.
//!
//! The WASM target only has function-level locals, so after type checking
//! every local declared in a nested scope is hoisted into the enclosing
//! function's local list. Traversal is breadth-first over blocks, if
//! branches, while bodies and for bodies. Other backends could skip this
//! pass.

use std::collections::VecDeque;

use crate::ast::{BlockId, StmtId, StmtKind};
use crate::program::Program;

pub(crate) fn collapse_scopes(program: &mut Program) {
    for func_index in 0..program.ast.functions.len() {
        let Some(body) = program.ast.functions[func_index].body else {
            continue;
        };
        let top_scope = program.ast.block(body).scope;

        let mut queue: VecDeque<BlockId> = VecDeque::new();
        queue.push_back(body);

        while let Some(block_id) = queue.pop_front() {
            let scope = program.ast.block(block_id).scope;
            if scope != top_scope {
                if let Some(scope) = scope {
                    let locals = program.scopes.get(scope).locals.clone();
                    let function = &mut program.ast.functions[func_index];
                    for local in locals {
                        if !function.locals.contains(&local) {
                            function.locals.push(local);
                        }
                    }
                }
            }

            let body = program.ast.block(block_id).body.clone();
            for stmt in body {
                enqueue_nested(program, stmt, &mut queue);
            }
        }
    }
}

fn enqueue_nested(program: &Program, stmt: StmtId, queue: &mut VecDeque<BlockId>) {
    match program.ast.stmt(stmt).kind.clone() {
        StmtKind::Block(block) => queue.push_back(block),
        StmtKind::While { body, .. } => enqueue_nested(program, body, queue),
        StmtKind::For { body, .. } => enqueue_nested(program, body, queue),
        StmtKind::If { then_stmt, else_stmt, .. } => {
            enqueue_nested(program, then_stmt, queue);
            if let Some(else_stmt) = else_stmt {
                enqueue_nested(program, else_stmt, queue);
            }
        }
        _ => {}
    }
}

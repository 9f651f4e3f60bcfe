//! The semantic pass: symbol resolution, type checking, local collapsing.
//!
//! The pass driver runs the three phases in order over the program's entity
//! list and stops at the first phase boundary with errors, leaving all
//! already-recorded diagnostics intact:
//!
//! 1. **Symbol resolution** ([`symres`]) binds every identifier to its
//!    declaration and fills type expressions with concrete type references.
//! 2. **Type checking** ([`check`]) fills every typed node's type, proves
//!    the typing rules and rewrites overload and intrinsic calls.
//! 3. **Local collapsing** ([`collapse`]) hoists locals from nested scopes
//!    to the function level, which the WASM target requires.
//!
//! All pass state (current scope, current function, current package,
//! expected return type, the diagnostic log) lives on [`SemPass`] and is
//! passed explicitly; there are no process-wide singletons.

use crate::error::{Diagnostics, SemError};
use crate::program::{PackageId, Program};
use crate::types::TypeId;

pub mod scope;

mod check;
mod collapse;
mod symres;

use scope::ScopeId;

/// Mutable state shared by the resolver and the checker.
pub struct SemPass<'p> {
    pub(crate) program: &'p mut Program,
    pub(crate) errors: Diagnostics,
    pub(crate) curr_scope: ScopeId,
    pub(crate) curr_function: Option<crate::ast::FuncId>,
    pub(crate) curr_package: Option<PackageId>,
    pub(crate) expected_return_type: Option<TypeId>,
}

impl<'p> SemPass<'p> {
    pub fn new(program: &'p mut Program) -> Self {
        let global_scope = program.global_scope;
        Self {
            program,
            errors: Diagnostics::new(),
            curr_scope: global_scope,
            curr_function: None,
            curr_package: None,
            expected_return_type: None,
        }
    }

    pub(crate) fn error(&mut self, error: SemError) {
        log::debug!("semantic error: {error}");
        self.errors.push(error);
    }

    /// Pushes `scope`, setting its parent to the current scope if it has
    /// none yet.
    pub(crate) fn scope_enter(&mut self, scope: ScopeId) {
        if self.program.scopes.get(scope).parent.is_none() && scope != self.program.global_scope {
            self.program.scopes.get_mut(scope).parent = Some(self.curr_scope);
        }
        self.curr_scope = scope;
    }

    pub(crate) fn scope_leave(&mut self) {
        self.curr_scope = self
            .program
            .scopes
            .get(self.curr_scope)
            .parent
            .unwrap_or(self.program.global_scope);
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<scope::Symbol> {
        self.program.scopes.lookup(self.curr_scope, name)
    }

    pub fn finish(self) -> Diagnostics {
        self.errors
    }
}

/// Runs the whole semantic pass over `program` and returns the accumulated
/// diagnostics. The program compiled successfully iff the result is empty.
pub fn analyze(program: &mut Program) -> Diagnostics {
    let mut pass = SemPass::new(program);

    pass.resolve_symbols();
    if pass.errors.has_errors() {
        return pass.finish();
    }

    pass.check_types();
    if pass.errors.has_errors() {
        return pass.finish();
    }

    collapse::collapse_scopes(pass.program);
    pass.finish()
}

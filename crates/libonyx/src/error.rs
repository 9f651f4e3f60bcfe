//! Semantic-pass diagnostics.
//!
//! Every diagnostic is a payload struct carrying a source span and the file
//! text, wrapped into the [`SemError`] enum. Errors are never thrown out of a
//! pass; they accumulate on a [`Diagnostics`] log and the pass driver checks
//! `has_errors` at each phase boundary, so one run surfaces as many
//! independent problems as possible.

use miette::{Diagnostic, NamedSource, SourceSpan};
use strum_macros::EnumDiscriminants;

use crate::span::Span;

/// A name that did not resolve to any declaration in scope.
#[derive(Debug, Clone, thiserror::Error, Diagnostic)]
#[error("unresolved symbol '{name}'")]
#[diagnostic(code("onyx::sem::unresolved_symbol"))]
pub struct UnresolvedSymbol {
    pub name: String,

    #[label("no declaration with this name is in scope")]
    pub position: SourceSpan,

    #[source_code]
    pub code: NamedSource<String>,
}

/// A node whose type could not be determined.
#[derive(Debug, Clone, thiserror::Error, Diagnostic)]
#[error("unable to resolve type of '{name}'")]
#[diagnostic(code("onyx::sem::unresolved_type"))]
pub struct UnresolvedType {
    pub name: String,

    #[label("the type of this is not known")]
    pub position: SourceSpan,

    #[source_code]
    pub code: NamedSource<String>,
}

/// A `use package` statement naming a package that is not part of the
/// program.
#[derive(Debug, Clone, thiserror::Error, Diagnostic)]
#[error("package '{name}' not found in included source files")]
#[diagnostic(code("onyx::sem::unresolved_package"))]
pub struct UnresolvedPackage {
    pub name: String,

    #[label("no package with this name")]
    pub position: SourceSpan,

    #[source_code]
    pub code: NamedSource<String>,
}

/// A call whose callee is not a function.
#[derive(Debug, Clone, thiserror::Error, Diagnostic)]
#[error("attempted to call '{name}', which is not a function")]
#[diagnostic(code("onyx::sem::call_non_function"))]
pub struct CallNonFunction {
    pub name: String,

    #[label("this is not callable")]
    pub position: SourceSpan,

    #[source_code]
    pub code: NamedSource<String>,
}

/// An argument whose type is not compatible with the formal parameter.
#[derive(Debug, Clone, thiserror::Error, Diagnostic)]
#[error("argument {index} to '{function}' expected type '{expected}', got '{actual}'")]
#[diagnostic(code("onyx::sem::function_param_mismatch"))]
pub struct FunctionParamMismatch {
    pub function: String,
    pub index: u32,
    pub expected: String,
    pub actual: String,

    #[label("this argument has the wrong type")]
    pub position: SourceSpan,

    #[source_code]
    pub code: NamedSource<String>,
}

/// A return expression whose type does not match the declared return type.
#[derive(Debug, Clone, thiserror::Error, Diagnostic)]
#[error("returning '{actual}' from a function declared to return '{expected}'")]
#[diagnostic(code("onyx::sem::function_return_mismatch"))]
pub struct FunctionReturnMismatch {
    pub expected: String,
    pub actual: String,

    #[label("this value has the wrong type")]
    pub position: SourceSpan,

    #[source_code]
    pub code: NamedSource<String>,
}

/// Binary operands of incompatible types.
#[derive(Debug, Clone, thiserror::Error, Diagnostic)]
#[error("mismatched types for binary operation: '{left}' and '{right}'")]
#[diagnostic(code("onyx::sem::binop_mismatch"))]
pub struct BinopMismatch {
    pub left: String,
    pub right: String,

    #[label("operand types do not agree")]
    pub position: SourceSpan,

    #[source_code]
    pub code: NamedSource<String>,
}

/// Assignment to something that is not an l-value.
#[derive(Debug, Clone, thiserror::Error, Diagnostic)]
#[error("cannot assign to '{name}'")]
#[diagnostic(code("onyx::sem::not_lvalue"))]
pub struct NotLvalue {
    pub name: String,

    #[label("this is not an l-value")]
    pub position: SourceSpan,

    #[source_code]
    pub code: NamedSource<String>,
}

/// Assignment to a constant.
#[derive(Debug, Clone, thiserror::Error, Diagnostic)]
#[error("attempted to assign to constant '{name}'")]
#[diagnostic(code("onyx::sem::assign_const"))]
pub struct AssignConst {
    pub name: String,

    #[label("declared constant")]
    pub position: SourceSpan,

    #[source_code]
    pub code: NamedSource<String>,
}

/// Catch-all diagnostic carrying a static message.
#[derive(Debug, Clone, thiserror::Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code("onyx::sem::error"))]
pub struct Literal {
    pub message: &'static str,

    #[label("here")]
    pub position: SourceSpan,

    #[source_code]
    pub code: NamedSource<String>,
}

/// All diagnostics the semantic pass can produce.
#[derive(Debug, Clone, thiserror::Error, Diagnostic, EnumDiscriminants)]
pub enum SemError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    UnresolvedSymbol(Box<UnresolvedSymbol>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    UnresolvedType(Box<UnresolvedType>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    UnresolvedPackage(Box<UnresolvedPackage>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    CallNonFunction(Box<CallNonFunction>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    FunctionParamMismatch(Box<FunctionParamMismatch>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    FunctionReturnMismatch(Box<FunctionReturnMismatch>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    BinopMismatch(Box<BinopMismatch>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    NotLvalue(Box<NotLvalue>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    AssignConst(Box<AssignConst>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Literal(Box<Literal>),
}

impl SemError {
    pub fn unresolved_symbol(name: impl Into<String>, span: &Span) -> Self {
        SemError::UnresolvedSymbol(Box::new(UnresolvedSymbol {
            name: name.into(),
            position: span.into(),
            code: (&span.file).into(),
        }))
    }

    pub fn unresolved_type(name: impl Into<String>, span: &Span) -> Self {
        SemError::UnresolvedType(Box::new(UnresolvedType {
            name: name.into(),
            position: span.into(),
            code: (&span.file).into(),
        }))
    }

    pub fn unresolved_package(name: impl Into<String>, span: &Span) -> Self {
        SemError::UnresolvedPackage(Box::new(UnresolvedPackage {
            name: name.into(),
            position: span.into(),
            code: (&span.file).into(),
        }))
    }

    pub fn call_non_function(name: impl Into<String>, span: &Span) -> Self {
        SemError::CallNonFunction(Box::new(CallNonFunction {
            name: name.into(),
            position: span.into(),
            code: (&span.file).into(),
        }))
    }

    pub fn function_param_mismatch(
        function: impl Into<String>,
        index: u32,
        expected: impl Into<String>,
        actual: impl Into<String>,
        span: &Span,
    ) -> Self {
        SemError::FunctionParamMismatch(Box::new(FunctionParamMismatch {
            function: function.into(),
            index,
            expected: expected.into(),
            actual: actual.into(),
            position: span.into(),
            code: (&span.file).into(),
        }))
    }

    pub fn function_return_mismatch(
        expected: impl Into<String>,
        actual: impl Into<String>,
        span: &Span,
    ) -> Self {
        SemError::FunctionReturnMismatch(Box::new(FunctionReturnMismatch {
            expected: expected.into(),
            actual: actual.into(),
            position: span.into(),
            code: (&span.file).into(),
        }))
    }

    pub fn binop_mismatch(left: impl Into<String>, right: impl Into<String>, span: &Span) -> Self {
        SemError::BinopMismatch(Box::new(BinopMismatch {
            left: left.into(),
            right: right.into(),
            position: span.into(),
            code: (&span.file).into(),
        }))
    }

    pub fn not_lvalue(name: impl Into<String>, span: &Span) -> Self {
        SemError::NotLvalue(Box::new(NotLvalue {
            name: name.into(),
            position: span.into(),
            code: (&span.file).into(),
        }))
    }

    pub fn assign_const(name: impl Into<String>, span: &Span) -> Self {
        SemError::AssignConst(Box::new(AssignConst {
            name: name.into(),
            position: span.into(),
            code: (&span.file).into(),
        }))
    }

    pub fn literal(message: &'static str, span: &Span) -> Self {
        SemError::Literal(Box::new(Literal {
            message,
            position: span.into(),
            code: (&span.file).into(),
        }))
    }
}

/// The message log errors accumulate on.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    errors: Vec<SemError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: SemError) {
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SemError> {
        self.errors.iter()
    }

    pub fn into_vec(self) -> Vec<SemError> {
        self.errors
    }

    /// Renders every diagnostic as a `file:line:col: message` line, the
    /// plain form the CLI prints to stdout.
    pub fn render_plain(&self) -> Vec<String> {
        self.errors.iter().map(SemError::render_plain).collect()
    }
}

impl SemError {
    fn location(&self) -> (&SourceSpan, &NamedSource<String>) {
        match self {
            SemError::UnresolvedSymbol(e) => (&e.position, &e.code),
            SemError::UnresolvedType(e) => (&e.position, &e.code),
            SemError::UnresolvedPackage(e) => (&e.position, &e.code),
            SemError::CallNonFunction(e) => (&e.position, &e.code),
            SemError::FunctionParamMismatch(e) => (&e.position, &e.code),
            SemError::FunctionReturnMismatch(e) => (&e.position, &e.code),
            SemError::BinopMismatch(e) => (&e.position, &e.code),
            SemError::NotLvalue(e) => (&e.position, &e.code),
            SemError::AssignConst(e) => (&e.position, &e.code),
            SemError::Literal(e) => (&e.position, &e.code),
        }
    }

    /// `file:line:col: message` form of this diagnostic.
    pub fn render_plain(&self) -> String {
        let (position, code) = self.location();
        let offset = position.offset();
        let mut line = 1u32;
        let mut col = 1u32;
        for (idx, ch) in code.inner().char_indices() {
            if idx >= offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        format!("{}:{}:{}: {}", code.name(), line, col, self)
    }
}

//! Source spans and identifier tokens.
//!
//! A `Span` is a byte range paired with the file it came from; it has no
//! lifetime dependency on the source text, so AST nodes and diagnostics can
//! hold it freely.

use std::fmt;
use std::ops::Range;

use miette::SourceSpan;

use crate::file::SourceFile;

/// A region of source code: a byte range plus the owning file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub position: Range<usize>,
    pub file: SourceFile,
}

impl Span {
    pub fn new(position: Range<usize>, file: SourceFile) -> Self {
        Self { position, file }
    }

    /// Span for compiler-synthesised nodes.
    pub fn builtin() -> Self {
        Self::new(0..0, SourceFile::builtin())
    }

    pub fn to_range(&self) -> Range<usize> {
        self.position.clone()
    }

    /// The source text this span covers, empty for synthesised spans.
    pub fn text(&self) -> &str {
        self.file.code.get(self.position.clone()).unwrap_or("")
    }

    /// 1-based line/column of the span start.
    pub fn line_col(&self) -> (u32, u32) {
        self.file.line_col(self.position.start)
    }
}

impl From<&Span> for SourceSpan {
    fn from(span: &Span) -> Self {
        span.position.clone().into()
    }
}

/// An identifier token: its text and where it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub text: String,
    pub span: Span,
}

impl Ident {
    pub fn new(text: impl Into<String>, span: Span) -> Self {
        Self { text: text.into(), span }
    }

    /// An identifier with a builtin span, used for synthesised declarations.
    pub fn synthetic(text: impl Into<String>) -> Self {
        Self::new(text, Span::builtin())
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

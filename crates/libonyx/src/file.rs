//! Source file representation shared by spans and diagnostics.
//!
//! The compiler core never reads files from disk itself; the driver hands it
//! `SourceFile` values and every span keeps a cheap handle back to the file it
//! came from.

use std::sync::Arc;

use miette::NamedSource;

/// A source file with its path and contents.
///
/// Cloning is cheap: both fields are shared behind `Arc`, so a `SourceFile`
/// can be attached to every span and diagnostic without copying the text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFile {
    /// Display path of the file
    pub path: Arc<String>,
    /// Full source text
    pub code: Arc<String>,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            path: Arc::new(path.into()),
            code: Arc::new(code.into()),
        }
    }

    /// A placeholder file for nodes that do not originate from user source,
    /// such as the builtin type symbols.
    pub fn builtin() -> Self {
        Self::new("<builtin>", "")
    }

    /// Converts a byte offset into a 1-based `(line, column)` pair.
    pub fn line_col(&self, offset: usize) -> (u32, u32) {
        let mut line = 1u32;
        let mut col = 1u32;
        for (idx, ch) in self.code.char_indices() {
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
        (line, col)
    }
}

impl From<&SourceFile> for NamedSource<String> {
    fn from(file: &SourceFile) -> Self {
        NamedSource::new(file.path.as_str(), file.code.to_string())
    }
}

impl From<SourceFile> for NamedSource<String> {
    fn from(file: SourceFile) -> Self {
        (&file).into()
    }
}

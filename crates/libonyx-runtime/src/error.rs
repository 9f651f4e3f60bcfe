//! Loader error types.

use thiserror::Error;

/// Everything that can go wrong between a byte buffer and a finished
/// `_start` invocation.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("bad magic bytes for Onyx binary")]
    BadMagic,

    #[error("failed to configure the WASM engine: {message}")]
    Engine { message: String },

    #[error("failed to parse the WASM module: {message}")]
    ModuleParse { message: String },

    #[error("couldn't find import {module}.{name}")]
    ImportNotFound { module: String, name: String },

    #[error("error loading library {name}: {message}")]
    LibraryLoad { name: String, message: String },

    #[error("error resolving '{symbol}' in library {name}: {message}")]
    LibrarySymbol { name: String, symbol: String, message: String },

    #[error("module does not export a _start function")]
    MissingStart,

    #[error("the module trapped: {message}")]
    Trap { message: String },
}

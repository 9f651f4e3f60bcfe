//! Host foreign-library loading.
//!
//! A library named `foo` in the `_onyx_libs` section is searched as
//! `foo.so` (or `foo.dll`) under the working directory and the section's
//! search paths. Its entry symbol `onyx_library_foo` receives the runtime
//! descriptor and returns a null-terminated table of linkable function
//! definitions.

use std::path::{Path, PathBuf};

use libloading::Library;

use crate::abi::{LibraryEntry, RuntimeDescriptor, WasmFuncDefinition};
use crate::error::RuntimeError;

#[cfg(windows)]
const LIBRARY_SUFFIX: &str = ".dll";
#[cfg(not(windows))]
const LIBRARY_SUFFIX: &str = ".so";

/// A loaded host library together with its function-definition table. The
/// `Library` handle must stay alive as long as any definition is callable.
#[derive(Debug)]
pub struct HostLibrary {
    pub name: String,
    funcs: *const *const WasmFuncDefinition,
    _library: Library,
}

impl HostLibrary {
    /// Walks the null-terminated definition table.
    pub fn definitions(&self) -> impl Iterator<Item = &WasmFuncDefinition> {
        let mut cursor = self.funcs;
        std::iter::from_fn(move || {
            if cursor.is_null() {
                return None;
            }
            // The table is null terminated; each entry is a valid pointer
            // for the lifetime of the library.
            unsafe {
                let entry = *cursor;
                if entry.is_null() {
                    return None;
                }
                cursor = cursor.add(1);
                Some(&*entry)
            }
        })
    }
}

/// The file-name component after the last separator; the entry symbol is
/// derived from it.
fn library_basename(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Searches the working directory and every section path for the library
/// file.
fn locate_library(paths: &[PathBuf], name: &str) -> Option<PathBuf> {
    let file_name = format!("{name}{LIBRARY_SUFFIX}");
    let mut candidates = vec![Path::new(".").join(&file_name)];
    for dir in paths {
        candidates.push(dir.join(&file_name));
    }
    candidates.into_iter().find(|candidate| candidate.exists())
}

/// Loads one host library and calls its entry symbol with the runtime
/// descriptor.
pub fn load_library(
    paths: &[PathBuf],
    name: &str,
    descriptor: *const RuntimeDescriptor,
) -> Result<HostLibrary, RuntimeError> {
    let basename = library_basename(name);
    let entry_symbol = format!("onyx_library_{basename}");

    let path = locate_library(paths, name).ok_or_else(|| RuntimeError::LibraryLoad {
        name: name.to_string(),
        message: format!("no {name}{LIBRARY_SUFFIX} under the configured library paths"),
    })?;

    log::debug!("loading host library {} from {}", name, path.display());

    // Loading and calling into a foreign library is inherently unchecked;
    // the entry symbol's signature is fixed by the host ABI.
    unsafe {
        let library = Library::new(&path).map_err(|error| RuntimeError::LibraryLoad {
            name: name.to_string(),
            message: error.to_string(),
        })?;

        let funcs = {
            let entry: libloading::Symbol<'_, LibraryEntry> =
                library
                    .get(entry_symbol.as_bytes())
                    .map_err(|error| RuntimeError::LibrarySymbol {
                        name: name.to_string(),
                        symbol: entry_symbol.clone(),
                        message: error.to_string(),
                    })?;
            entry(descriptor)
        };

        Ok(HostLibrary {
            name: name.to_string(),
            funcs,
            _library: library,
        })
    }
}

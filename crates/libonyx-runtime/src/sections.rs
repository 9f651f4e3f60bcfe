//! Custom-section scanning.
//!
//! Two reserved custom sections matter to the loader: `_onyx_libs` names the
//! foreign libraries a module links against (and where to look for them),
//! and `_onyx_func_offsets` maps function indices to names for trap
//! symbolication. Unknown custom sections are skipped.

use std::path::PathBuf;

use wasmparser::{Parser, Payload};

/// Section name carrying library search paths and library names.
pub const LIBS_SECTION: &str = "_onyx_libs";
/// Section name carrying the function-index-to-name table.
pub const FUNC_OFFSETS_SECTION: &str = "_onyx_func_offsets";

/// Library paths are clamped to this many bytes.
const MAX_PATH_LEN: u64 = 512;
/// Library names are clamped to this many bytes.
const MAX_NAME_LEN: u64 = 256;

/// Contents of the `_onyx_libs` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryInfo {
    /// Search paths, separator-normalised for the host platform.
    pub paths: Vec<PathBuf>,
    /// Module names of the libraries to load.
    pub names: Vec<String>,
}

/// Reads a uleb128 value, advancing the cursor. Returns `None` on a
/// truncated buffer.
fn read_uleb128(data: &[u8], cursor: &mut usize) -> Option<u64> {
    let mut result = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *data.get(*cursor)?;
        *cursor += 1;
        result |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Some(result);
        }
        shift += 7;
        if shift >= 64 {
            return None;
        }
    }
}

fn read_clamped_string(data: &[u8], cursor: &mut usize, clamp: u64) -> Option<String> {
    let declared = read_uleb128(data, cursor)?;
    let len = declared.min(clamp) as usize;
    let bytes = data.get(*cursor..*cursor + len)?;
    *cursor += declared as usize;
    Some(String::from_utf8_lossy(bytes).into_owned())
}

/// Replaces foreign path separators with the platform's.
fn normalize_separators(path: &str) -> String {
    #[cfg(windows)]
    {
        path.replace('/', "\\")
    }
    #[cfg(not(windows))]
    {
        path.replace('\\', "/")
    }
}

/// Decodes the payload of a `_onyx_libs` section: a length-prefixed vector
/// of search paths followed by a length-prefixed vector of library names.
pub fn parse_library_payload(data: &[u8]) -> LibraryInfo {
    let mut info = LibraryInfo::default();
    let mut cursor = 0usize;

    let Some(path_count) = read_uleb128(data, &mut cursor) else {
        return info;
    };
    for _ in 0..path_count {
        let Some(path) = read_clamped_string(data, &mut cursor, MAX_PATH_LEN) else {
            return info;
        };
        info.paths.push(PathBuf::from(normalize_separators(&path)));
    }

    let Some(name_count) = read_uleb128(data, &mut cursor) else {
        return info;
    };
    for _ in 0..name_count {
        let Some(name) = read_clamped_string(data, &mut cursor, MAX_NAME_LEN) else {
            return info;
        };
        info.names.push(name);
    }

    info
}

/// Finds a custom section by name and returns its payload.
pub fn find_custom_section<'a>(bytes: &'a [u8], name: &str) -> Option<&'a [u8]> {
    for payload in Parser::new(0).parse_all(bytes) {
        let Ok(Payload::CustomSection(reader)) = payload else {
            continue;
        };
        if reader.name() == name {
            return Some(reader.data());
        }
    }
    None
}

/// Scans the module for the `_onyx_libs` section.
pub fn scan_library_section(bytes: &[u8]) -> Option<LibraryInfo> {
    find_custom_section(bytes, LIBS_SECTION).map(parse_library_payload)
}

/// The function-index-to-name table from `_onyx_func_offsets`: for each
/// function index, a 32-bit offset (relative to the end of the section
/// name) to a NUL-terminated UTF-8 name.
#[derive(Debug, Clone, Copy)]
pub struct FuncOffsetTable<'a> {
    data: &'a [u8],
}

impl<'a> FuncOffsetTable<'a> {
    pub fn find(bytes: &'a [u8]) -> Option<Self> {
        find_custom_section(bytes, FUNC_OFFSETS_SECTION).map(|data| Self { data })
    }

    /// Resolves a function index to its name.
    pub fn name(&self, func_index: u32) -> Option<&'a str> {
        let entry = func_index as usize * 4;
        let offset_bytes = self.data.get(entry..entry + 4)?;
        let offset = u32::from_le_bytes(offset_bytes.try_into().ok()?) as usize;

        let tail = self.data.get(offset..)?;
        let end = tail.iter().position(|byte| *byte == 0)?;
        std::str::from_utf8(&tail[..end]).ok()
    }
}

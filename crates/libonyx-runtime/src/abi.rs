//! The C ABI between the loader and host foreign libraries.
//!
//! Each native library exports one entry symbol, `onyx_library_<name>`,
//! with the signature `fn(*const RuntimeDescriptor) -> *const *const
//! WasmFuncDefinition`. The returned table is null terminated. The
//! [`RuntimeDescriptor`] handed to the entry point is the *only* contract
//! host libraries may call through; its function pointers are immutable
//! after initialisation.

use std::ffi::{c_char, c_void};

/// Value kind numbering of the canonical wasm-c-api.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WasmValkind {
    I32 = 0,
    I64 = 1,
    F32 = 2,
    F64 = 3,
}

/// A borrowed list of value kinds, C layout.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct WasmValkindList {
    pub count: u32,
    pub kinds: *const WasmValkind,
}

impl WasmValkindList {
    /// # Safety
    /// `kinds` must point at `count` readable elements.
    pub unsafe fn as_slice(&self) -> &[WasmValkind] {
        if self.count == 0 || self.kinds.is_null() {
            return &[];
        }
        std::slice::from_raw_parts(self.kinds, self.count as usize)
    }
}

/// The value payload union, matching `wasm_val_t`'s storage.
#[repr(C)]
#[derive(Clone, Copy)]
pub union WasmValueData {
    pub i32_: i32,
    pub i64_: i64,
    pub f32_: f32,
    pub f64_: f64,
}

/// One value crossing the host-function boundary.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct WasmValue {
    pub kind: WasmValkind,
    pub of: WasmValueData,
}

impl WasmValue {
    pub fn zero(kind: WasmValkind) -> Self {
        WasmValue { kind, of: WasmValueData { i64_: 0 } }
    }
}

/// The host callback invoked for a linked import.
pub type WasmFunc = unsafe extern "C" fn(
    params: *const WasmValue,
    param_count: u32,
    results: *mut WasmValue,
    result_count: u32,
);

/// One linkable function a host library provides.
#[repr(C)]
pub struct WasmFuncDefinition {
    pub module_name: *const c_char,
    pub import_name: *const c_char,
    pub params: WasmValkindList,
    pub results: WasmValkindList,
    pub func: WasmFunc,
}

/// Signature of the library entry symbol.
pub type LibraryEntry =
    unsafe extern "C" fn(runtime: *const RuntimeDescriptor) -> *const *const WasmFuncDefinition;

/// The function-pointer table the loader exposes to host libraries. Every
/// function takes the opaque `context` the descriptor carries.
#[repr(C)]
pub struct RuntimeDescriptor {
    /// Opaque loader state, passed back on every call.
    pub context: *mut c_void,
    /// Base address of the instance's linear memory, or null before
    /// instantiation.
    pub wasm_memory_data: unsafe extern "C" fn(context: *mut c_void) -> *mut u8,
    /// Size of the linear memory in bytes.
    pub wasm_memory_size: unsafe extern "C" fn(context: *mut c_void) -> usize,
    /// Looks up an exported function by name; returns a non-negative handle
    /// or -1.
    pub wasm_extern_lookup_by_name: unsafe extern "C" fn(context: *mut c_void, name: *const c_char) -> i32,
    /// Calls an exported function by handle. Returns 0 on success.
    pub wasm_func_call: unsafe extern "C" fn(
        context: *mut c_void,
        handle: i32,
        params: *const WasmValue,
        param_count: u32,
        results: *mut WasmValue,
        result_count: u32,
    ) -> i32,
    /// Prints a trap message through the loader's reporting path.
    pub onyx_print_trap: unsafe extern "C" fn(message: *const c_char),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valkind_numbering_matches_the_c_api() {
        assert_eq!(WasmValkind::I32 as u8, 0);
        assert_eq!(WasmValkind::I64 as u8, 1);
        assert_eq!(WasmValkind::F32 as u8, 2);
        assert_eq!(WasmValkind::F64 as u8, 3);
    }

    #[test]
    fn empty_kind_list_is_safe() {
        let list = WasmValkindList { count: 0, kinds: std::ptr::null() };
        assert!(unsafe { list.as_slice() }.is_empty());
    }

    #[test]
    fn kind_list_round_trips() {
        let kinds = [WasmValkind::I32, WasmValkind::F64];
        let list = WasmValkindList { count: 2, kinds: kinds.as_ptr() };
        assert_eq!(unsafe { list.as_slice() }, &kinds);
    }
}

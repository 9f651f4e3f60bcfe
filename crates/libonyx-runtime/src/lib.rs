//! Onyx WASM runtime loader.
//!
//! Takes the byte buffer of a compiled Onyx module, discovers and loads the
//! native libraries it references, resolves and binds its imports,
//! instantiates it on the WASM engine and invokes the `_start` entry point.
//! Trap diagnostics are rendered symbolically using the module's embedded
//! function-name table.
//!
//! The engine itself is the `wasmtime` crate; everything Onyx-specific
//! (the magic sentinel, the reserved custom sections, the host-library ABI)
//! lives here.

use std::cell::{Cell, RefCell};
use std::ffi::{c_char, c_void, CStr};

use wasmtime::{
    Config, Engine, Extern, Func, FuncType, Instance, Memory, MemoryType, Module, Store, Strategy, Trap, Val,
    ValType, WasmBacktrace,
};

pub mod abi;
pub mod error;
pub mod library;
pub mod sections;

use abi::{RuntimeDescriptor, WasmFunc, WasmValkind, WasmValue, WasmValueData};
use error::RuntimeError;
use library::HostLibrary;
use sections::FuncOffsetTable;

/// The sentinel the compiler stamps over the WASM magic.
pub const ONYX_MAGIC: &[u8; 4] = b"ONYX";

/// Linear-memory limits for the built-in `onyx.memory` import, in pages.
const MEMORY_MIN_PAGES: u64 = 1024;
const MEMORY_MAX_PAGES: u64 = 65536;

/// Loader options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Enables engine debug info instead of the optimising tier.
    pub debug: bool,
}

/// Mutable runtime state shared with host libraries through the descriptor.
struct RuntimeState {
    store: RefCell<Store<()>>,
    instance: Cell<Option<Instance>>,
    memory: Cell<Option<Memory>>,
    /// Handles handed out by `wasm_extern_lookup_by_name`.
    export_handles: RefCell<Vec<Func>>,
}

unsafe extern "C" fn descriptor_memory_data(context: *mut c_void) -> *mut u8 {
    let state = &*(context as *const RuntimeState);
    match (state.memory.get(), state.store.try_borrow_mut()) {
        (Some(memory), Ok(mut store)) => memory.data_mut(&mut *store).as_mut_ptr(),
        _ => std::ptr::null_mut(),
    }
}

unsafe extern "C" fn descriptor_memory_size(context: *mut c_void) -> usize {
    let state = &*(context as *const RuntimeState);
    match (state.memory.get(), state.store.try_borrow()) {
        (Some(memory), Ok(store)) => memory.data_size(&*store),
        _ => 0,
    }
}

unsafe extern "C" fn descriptor_lookup_extern(context: *mut c_void, name: *const c_char) -> i32 {
    let state = &*(context as *const RuntimeState);
    if name.is_null() {
        return -1;
    }
    let Ok(name) = CStr::from_ptr(name).to_str() else {
        return -1;
    };
    let Some(instance) = state.instance.get() else {
        return -1;
    };
    let Ok(mut store) = state.store.try_borrow_mut() else {
        return -1;
    };
    let Some(func) = instance.get_func(&mut *store, name) else {
        return -1;
    };
    drop(store);

    let mut handles = state.export_handles.borrow_mut();
    handles.push(func);
    (handles.len() - 1) as i32
}

unsafe extern "C" fn descriptor_func_call(
    context: *mut c_void,
    handle: i32,
    params: *const WasmValue,
    param_count: u32,
    results: *mut WasmValue,
    result_count: u32,
) -> i32 {
    let state = &*(context as *const RuntimeState);
    if handle < 0 {
        return 1;
    }
    let Some(func) = state.export_handles.borrow().get(handle as usize).copied() else {
        return 1;
    };
    let Ok(mut store) = state.store.try_borrow_mut() else {
        return 1;
    };

    let params = if params.is_null() {
        &[]
    } else {
        std::slice::from_raw_parts(params, param_count as usize)
    };
    let call_params: Vec<Val> = params.iter().map(val_from_c).collect();
    let mut call_results = vec![Val::I32(0); result_count as usize];

    if func.call(&mut *store, &call_params, &mut call_results).is_err() {
        return 1;
    }

    if !results.is_null() {
        let results = std::slice::from_raw_parts_mut(results, result_count as usize);
        for (slot, value) in results.iter_mut().zip(call_results.iter()) {
            *slot = val_to_c(value);
        }
    }
    0
}

unsafe extern "C" fn descriptor_print_trap(message: *const c_char) {
    if message.is_null() {
        return;
    }
    let message = CStr::from_ptr(message).to_string_lossy();
    println!("TRAP: {message}");
}

fn val_to_c(val: &Val) -> WasmValue {
    match val {
        Val::I32(v) => WasmValue { kind: WasmValkind::I32, of: WasmValueData { i32_: *v } },
        Val::I64(v) => WasmValue { kind: WasmValkind::I64, of: WasmValueData { i64_: *v } },
        Val::F32(bits) => WasmValue { kind: WasmValkind::F32, of: WasmValueData { f32_: f32::from_bits(*bits) } },
        Val::F64(bits) => WasmValue { kind: WasmValkind::F64, of: WasmValueData { f64_: f64::from_bits(*bits) } },
        // Reference values never cross the host ABI.
        _ => WasmValue::zero(WasmValkind::I32),
    }
}

fn val_from_c(value: &WasmValue) -> Val {
    // The union is tagged by `kind`; reading the matching field is sound.
    unsafe {
        match value.kind {
            WasmValkind::I32 => Val::I32(value.of.i32_),
            WasmValkind::I64 => Val::I64(value.of.i64_),
            WasmValkind::F32 => Val::F32(value.of.f32_.to_bits()),
            WasmValkind::F64 => Val::F64(value.of.f64_.to_bits()),
        }
    }
}

fn valtype_of(kind: WasmValkind) -> ValType {
    match kind {
        WasmValkind::I32 => ValType::I32,
        WasmValkind::I64 => ValType::I64,
        WasmValkind::F32 => ValType::F32,
        WasmValkind::F64 => ValType::F64,
    }
}

/// The trap payload of an engine error, or the error text itself.
fn trap_message(error: &wasmtime::Error) -> String {
    match error.downcast_ref::<Trap>() {
        Some(trap) => trap.to_string(),
        None => error.to_string(),
    }
}

/// Prints `TRAP: <message>` and, when the module carries a function-name
/// table, a symbolic `TRACE:` with one line per frame.
pub fn print_trap(error: &wasmtime::Error, module_bytes: &[u8]) {
    println!("TRAP: {}", trap_message(error));

    let Some(table) = FuncOffsetTable::find(module_bytes) else {
        return;
    };
    let Some(backtrace) = error.downcast_ref::<WasmBacktrace>() else {
        return;
    };

    println!("TRACE:");
    for frame in backtrace.frames() {
        let func_index = frame.func_index();
        let module_offset = frame.module_offset().unwrap_or(0);
        let name = table.name(func_index).unwrap_or("<unknown>");
        println!("    func[{func_index}]:{module_offset:#x} at {name}");
    }
}

fn build_engine(options: &RunOptions) -> Result<Engine, RuntimeError> {
    let mut config = Config::new();
    config.wasm_simd(true);
    config.wasm_threads(true);
    config.wasm_bulk_memory(true);

    if options.debug {
        config.debug_info(true);
    } else {
        // Prefer the optimising tier when not debugging.
        config.strategy(Strategy::Cranelift);
    }

    Engine::new(&config).map_err(|error| RuntimeError::Engine { message: error.to_string() })
}

/// Builds a host `Func` that marshals values across the C ABI to a library
/// callback.
fn host_func(
    engine: &Engine,
    store: &mut Store<()>,
    param_kinds: Vec<WasmValkind>,
    result_kinds: Vec<WasmValkind>,
    callback: WasmFunc,
) -> Func {
    let ty = FuncType::new(
        engine,
        param_kinds.iter().copied().map(valtype_of),
        result_kinds.iter().copied().map(valtype_of),
    );
    Func::new(store, ty, move |_caller, params, results| {
        let c_params: Vec<WasmValue> = params.iter().map(val_to_c).collect();
        let mut c_results: Vec<WasmValue> =
            result_kinds.iter().map(|kind| WasmValue::zero(*kind)).collect();

        // The definition promised this callback for exactly these kinds.
        unsafe {
            callback(
                c_params.as_ptr(),
                c_params.len() as u32,
                c_results.as_mut_ptr(),
                c_results.len() as u32,
            );
        }

        for (slot, value) in results.iter_mut().zip(c_results.iter()) {
            *slot = val_from_c(value);
        }
        Ok(())
    })
}

/// Resolves every import of the module, in declaration order: the built-in
/// `onyx.memory` first, then the loaded libraries' definition tables. An
/// unresolvable import aborts instantiation.
fn link_imports(
    engine: &Engine,
    state: &RuntimeState,
    module: &Module,
    libraries: &[HostLibrary],
) -> Result<Vec<Extern>, RuntimeError> {
    let mut imports: Vec<Extern> = Vec::new();

    'imports: for import in module.imports() {
        let module_name = import.module();
        let import_name = import.name();

        if module_name == "onyx" && import_name == "memory" {
            if state.memory.get().is_none() {
                let ty = MemoryType::new(MEMORY_MIN_PAGES as u32, Some(MEMORY_MAX_PAGES as u32));
                let memory = Memory::new(&mut *state.store.borrow_mut(), ty)
                    .map_err(|error| RuntimeError::Engine { message: error.to_string() })?;
                state.memory.set(Some(memory));
            }
            imports.push(state.memory.get().expect("memory was just created").into());
            continue;
        }

        for library in libraries {
            for definition in library.definitions() {
                // Names in the definition table are NUL-terminated C strings
                // owned by the library.
                let (def_module, def_name) = unsafe {
                    (
                        CStr::from_ptr(definition.module_name).to_string_lossy(),
                        CStr::from_ptr(definition.import_name).to_string_lossy(),
                    )
                };
                if def_module == module_name && def_name == import_name {
                    let param_kinds = unsafe { definition.params.as_slice() }.to_vec();
                    let result_kinds = unsafe { definition.results.as_slice() }.to_vec();
                    let func = host_func(
                        engine,
                        &mut state.store.borrow_mut(),
                        param_kinds,
                        result_kinds,
                        definition.func,
                    );
                    imports.push(func.into());
                    continue 'imports;
                }
            }
        }

        println!("Couldn't find import {module_name}.{import_name}.");
        return Err(RuntimeError::ImportNotFound {
            module: module_name.to_string(),
            name: import_name.to_string(),
        });
    }

    Ok(imports)
}

/// Loads and runs a compiled Onyx module. Returns `Ok(())` iff `_start`
/// completed without a trap.
pub fn run_wasm(mut bytes: Vec<u8>, options: &RunOptions) -> Result<(), RuntimeError> {
    if bytes.len() < 8 || &bytes[0..4] != ONYX_MAGIC {
        println!("Bad magic bytes for Onyx binary.");
        return Err(RuntimeError::BadMagic);
    }
    // Rewrite the sentinel to the canonical WASM magic before the engine
    // sees the bytes.
    bytes[0..4].copy_from_slice(b"\0asm");

    let engine = build_engine(options)?;
    let store = Store::new(&engine, ());

    let state = Box::new(RuntimeState {
        store: RefCell::new(store),
        instance: Cell::new(None),
        memory: Cell::new(None),
        export_handles: RefCell::new(Vec::new()),
    });

    // The descriptor's pointers are fixed for the whole run; host libraries
    // must not call them after `run_wasm` returns.
    let descriptor = Box::new(RuntimeDescriptor {
        context: &*state as *const RuntimeState as *mut c_void,
        wasm_memory_data: descriptor_memory_data,
        wasm_memory_size: descriptor_memory_size,
        wasm_extern_lookup_by_name: descriptor_lookup_extern,
        wasm_func_call: descriptor_func_call,
        onyx_print_trap: descriptor_print_trap,
    });

    let mut libraries = Vec::new();
    if let Some(info) = sections::scan_library_section(&bytes) {
        for name in &info.names {
            match library::load_library(&info.paths, name, &*descriptor) {
                Ok(library) => libraries.push(library),
                Err(error) => println!("{error}"),
            }
        }
    }

    let module = Module::from_binary(&engine, &bytes)
        .map_err(|error| RuntimeError::ModuleParse { message: error.to_string() })?;

    let imports = link_imports(&engine, &state, &module, &libraries)?;

    let instance = match Instance::new(&mut *state.store.borrow_mut(), &module, &imports) {
        Ok(instance) => instance,
        Err(error) => {
            print_trap(&error, &bytes);
            return Err(RuntimeError::Trap { message: trap_message(&error) });
        }
    };
    state.instance.set(Some(instance));

    let start = {
        let mut store = state.store.borrow_mut();
        instance.get_func(&mut *store, "_start")
    };
    let Some(start) = start else {
        return Err(RuntimeError::MissingStart);
    };

    let result = {
        let mut store = state.store.borrow_mut();
        start.call(&mut *store, &[], &mut [])
    };

    // Instance, store and engine unwind in reverse construction order when
    // `state` drops.
    match result {
        Ok(()) => Ok(()),
        Err(error) => {
            print_trap(&error, &bytes);
            Err(RuntimeError::Trap { message: trap_message(&error) })
        }
    }
}

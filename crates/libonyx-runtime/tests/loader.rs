//! End-to-end loader tests: real modules, real engine, no host libraries.

use libonyx_runtime::error::RuntimeError;
use libonyx_runtime::sections::FUNC_OFFSETS_SECTION;
use libonyx_runtime::{run_wasm, RunOptions, ONYX_MAGIC};

/// Stamps the Onyx sentinel over the WASM magic, as the compiler does when
/// writing the module to disk.
fn onyxify(mut bytes: Vec<u8>) -> Vec<u8> {
    bytes[0..4].copy_from_slice(ONYX_MAGIC);
    bytes
}

fn uleb(value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    let mut value = value;
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
    out
}

fn append_custom_section(module: &mut Vec<u8>, name: &str, payload: &[u8]) {
    let mut content = Vec::new();
    content.extend(uleb(name.len() as u64));
    content.extend(name.as_bytes());
    content.extend_from_slice(payload);

    module.push(0);
    module.extend(uleb(content.len() as u64));
    module.extend(content);
}

#[test]
fn memory_import_is_provided_by_the_loader() {
    let bytes = wat::parse_str(
        r#"
        (module
            (import "onyx" "memory" (memory 1024 65536))
            (func (export "_start")))
        "#,
    )
    .unwrap();

    run_wasm(onyxify(bytes), &RunOptions::default()).unwrap();
}

#[test]
fn missing_import_aborts_instantiation() {
    let bytes = wat::parse_str(
        r#"
        (module
            (import "onyx" "memory" (memory 1024 65536))
            (import "env" "missing" (func $missing))
            (func (export "_start") (call $missing)))
        "#,
    )
    .unwrap();

    let error = run_wasm(onyxify(bytes), &RunOptions::default()).unwrap_err();
    match error {
        RuntimeError::ImportNotFound { module, name } => {
            assert_eq!(module, "env");
            assert_eq!(name, "missing");
        }
        other => panic!("expected ImportNotFound, got {other}"),
    }
}

#[test]
fn module_without_start_is_reported() {
    let bytes = wat::parse_str(r#"(module (func (export "main")))"#).unwrap();

    let error = run_wasm(onyxify(bytes), &RunOptions::default()).unwrap_err();
    assert!(matches!(error, RuntimeError::MissingStart));
}

#[test]
fn trap_in_start_is_returned() {
    let bytes = wat::parse_str(
        r#"
        (module
            (func $do_thing unreachable)
            (func (export "_start") (call $do_thing)))
        "#,
    )
    .unwrap();

    // Function-name table: index 0 -> "do_thing", index 1 -> "start".
    let mut payload = Vec::new();
    payload.extend(8u32.to_le_bytes());
    payload.extend(17u32.to_le_bytes());
    payload.extend(b"do_thing\0");
    payload.extend(b"start\0");

    let mut bytes = bytes;
    append_custom_section(&mut bytes, FUNC_OFFSETS_SECTION, &payload);

    let error = run_wasm(onyxify(bytes), &RunOptions::default()).unwrap_err();
    match error {
        RuntimeError::Trap { message } => {
            assert!(message.contains("unreachable"), "unexpected trap message: {message}");
        }
        other => panic!("expected Trap, got {other}"),
    }
}

#[test]
fn garbage_after_the_magic_fails_module_parse() {
    let mut bytes = b"ONYX".to_vec();
    bytes.extend([1, 0, 0, 0, 0xff, 0xff, 0xff]);

    let error = run_wasm(bytes, &RunOptions::default()).unwrap_err();
    assert!(matches!(error, RuntimeError::ModuleParse { .. }));
}

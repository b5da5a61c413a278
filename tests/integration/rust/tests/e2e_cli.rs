//! End-to-end tests through the tern_cli Runtime
//!
//! Prototypes are serialized to disk, loaded back and executed the way the
//! `tern` binary does it.

use integration_tests::programs;
use interpreter::VmConfig;
use memory_manager::GcConfig;
use std::path::PathBuf;
use tempfile::TempDir;
use tern_cli::{CliError, Runtime};

fn write(dir: &TempDir, name: &str, proto: &bytecode_system::Prototype) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, proto.to_json().unwrap()).unwrap();
    path
}

#[test]
fn test_e2e_factorial_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "fact.json", &programs::factorial(6));

    let mut runtime = Runtime::new(VmConfig::default());

    assert_eq!(runtime.execute_file(&path).unwrap().as_int(), Some(720));
}

#[test]
fn test_e2e_class_program_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "classes.json", &programs::inherited_get());

    let mut runtime = Runtime::new(VmConfig::default());

    assert_eq!(runtime.execute_file(&path).unwrap().as_int(), Some(1));
}

#[test]
fn test_e2e_loaded_closures_share_outer() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "counter.json", &programs::shared_counter());
    let mut runtime = Runtime::new(VmConfig::default());

    let result = runtime.execute_file(&path).unwrap();
    let core_types::Value::Array(arr) = &result else {
        panic!("expected array");
    };
    let inc = arr.items()[0].clone();
    let get = arr.items()[1].clone();

    runtime.vm_mut().call(&inc, &[]).unwrap();
    assert_eq!(runtime.vm_mut().call(&get, &[]).unwrap().as_int(), Some(1));
}

#[test]
fn test_e2e_depth_limit_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "deep.json", &programs::factorial(50));
    let mut runtime = Runtime::new(VmConfig::default().max_call_depth(8));

    let err = runtime.execute_file(&path).unwrap_err();

    let CliError::Script(vm_err) = err else {
        panic!("expected script error");
    };
    assert_eq!(vm_err.kind, core_types::ErrorKind::StackOverflow);
}

#[test]
fn test_e2e_cycle_garbage_collected_by_runtime_vm() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "cycle.json", &programs::instance_cycle());
    let mut runtime = Runtime::new(VmConfig::default().gc(GcConfig::manual()));

    let result = runtime.execute_file(&path).unwrap();
    drop(result);

    assert_eq!(runtime.vm_mut().collect_garbage(), 4);
}

#[test]
fn test_e2e_disassemble_shows_nested_functions() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "classes.json", &programs::inherited_get());

    let listing = Runtime::disassemble_file(&path).unwrap();

    assert!(listing.contains("function main"));
    assert!(listing.contains("function get"));
    assert!(listing.contains("GETK"));
}

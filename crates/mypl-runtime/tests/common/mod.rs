//! Shared test utilities
//!
//! Runs programs through the full generate-validate-execute pipeline with
//! console output captured in memory.
#![allow(dead_code)]

use mypl_runtime::ast::Program;
use mypl_runtime::io::string_reader;
use mypl_runtime::{
    Execution, MyplError, OutputWriter, Runtime, RuntimeConfig, RuntimeErrorKind, TypeTable,
    VmConfig,
};
use std::io::Write;
use std::sync::{Arc, Mutex};

// Re-export testing utilities
pub use pretty_assertions::{assert_eq, assert_ne};

/// In-memory Write impl for capturing print() output
pub struct CaptureWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Create a capture buffer and the corresponding OutputWriter
pub fn capture_output() -> (Arc<Mutex<Vec<u8>>>, OutputWriter) {
    let buf: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let writer: OutputWriter = Arc::new(Mutex::new(Box::new(CaptureWriter { buf: buf.clone() })));
    (buf, writer)
}

fn captured(buf: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8(buf.lock().unwrap().clone()).expect("output is not UTF-8")
}

/// Install a `RUST_LOG`-driven subscriber once per test binary
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(EnvFilter::from_default_env())
        .try_init();
}

/// Run with custom settings; returns the run outcome and everything printed
pub fn run_configured(
    program: &Program,
    input: &str,
    vm: VmConfig,
    profiling: bool,
) -> (Result<Execution, MyplError>, String) {
    init_tracing();
    let types = TypeTable::from_program(program);
    let (buf, writer) = capture_output();
    let config = RuntimeConfig::new()
        .with_output(writer)
        .with_input(string_reader(input))
        .with_vm_config(vm)
        .with_profiling(profiling);

    let result = Runtime::new(config).run(program, &types);
    (result, captured(&buf))
}

/// Run a program and return its output
pub fn run_program(program: &Program) -> Result<String, MyplError> {
    let (result, output) = run_configured(program, "", VmConfig::default(), false);
    result.map(|_| output)
}

/// Run with profiling on; panics on failure
pub fn run_profiled(program: &Program) -> (Execution, String) {
    let (result, output) = run_configured(program, "", VmConfig::default(), true);
    (result.expect("program failed"), output)
}

/// Assert a program prints exactly `expected`
pub fn assert_output(program: &Program, expected: &str) {
    match run_program(program) {
        Ok(output) => assert_eq!(output, expected),
        Err(err) => panic!("Expected output {:?}, got error: {}", expected, err),
    }
}

/// Assert a program fails at runtime with the given kind
pub fn assert_runtime_error(program: &Program, kind: RuntimeErrorKind) {
    match run_program(program) {
        Err(MyplError::Runtime(err)) => {
            assert_eq!(err.kind, kind, "unexpected error: {}", err);
            assert!(err.location.is_some(), "runtime error was not located: {}", err);
        }
        Err(other) => panic!("Expected runtime error {:?}, got {} error: {}", kind, other.kind(), other),
        Ok(output) => panic!("Expected runtime error {:?}, program printed {:?}", kind, output),
    }
}

//! Embedding API
//!
//! `Runtime` ties the code generator and the engine together: it lowers a
//! validated program, checks the generated blueprints, and runs the entry
//! point with the configured console and engine settings.
//!
//! # Examples
//!
//! ```
//! use mypl_runtime::ast::{Expr, Program, Stmt};
//! use mypl_runtime::{Runtime, RuntimeConfig, TypeTable};
//!
//! let program = Program::with_main(vec![Stmt::print(Expr::string("hi"))]);
//! let types = TypeTable::from_program(&program);
//!
//! let runtime = Runtime::new(RuntimeConfig::new());
//! runtime.execute(&program, &types).unwrap();
//! ```

use crate::ast::Program;
use crate::bytecode::{validate, Bytecode};
use crate::compiler;
use crate::error::MyplError;
use crate::io::{stdin_reader, stdout_writer, InputReader, OutputWriter};
use crate::types::TypeTable;
use crate::value::Value;
use crate::vm::{Profiler, VM};
use mypl_config::VmConfig;
use tracing::debug;

/// Settings for a `Runtime`
#[derive(Clone)]
pub struct RuntimeConfig {
    /// Sink for `print`
    pub output: OutputWriter,
    /// Source for `read`
    pub input: InputReader,
    /// Engine settings
    pub vm: VmConfig,
    /// Collect execution statistics
    pub profiling: bool,
}

impl RuntimeConfig {
    /// Defaults: stdout, stdin, default engine settings, no profiling
    pub fn new() -> Self {
        Self {
            output: stdout_writer(),
            input: stdin_reader(),
            vm: VmConfig::default(),
            profiling: false,
        }
    }

    pub fn with_output(mut self, output: OutputWriter) -> Self {
        self.output = output;
        self
    }

    pub fn with_input(mut self, input: InputReader) -> Self {
        self.input = input;
        self
    }

    pub fn with_vm_config(mut self, vm: VmConfig) -> Self {
        self.vm = vm;
        self
    }

    pub fn with_profiling(mut self, enabled: bool) -> Self {
        self.profiling = enabled;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a completed run
#[derive(Debug)]
pub struct Execution {
    /// Value returned by the entry point
    pub value: Value,
    /// Objects still live when the entry point returned
    pub live_objects: usize,
    /// Statistics, when profiling was enabled
    pub profile: Option<Profiler>,
}

/// Code generator plus execution engine
pub struct Runtime {
    config: RuntimeConfig,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Lower a program to blueprints and check them
    pub fn compile(&self, program: &Program, types: &TypeTable) -> Result<Bytecode, MyplError> {
        let bytecode = compiler::compile(program, types)?;
        validate(&bytecode).map_err(MyplError::InvalidBytecode)?;
        debug!(blueprints = bytecode.len(), "program compiled");
        Ok(bytecode)
    }

    /// Compile and run, discarding the entry point's return value
    pub fn execute(&self, program: &Program, types: &TypeTable) -> Result<(), MyplError> {
        self.run(program, types).map(|_| ())
    }

    /// Compile and run, reporting what the run left behind
    pub fn run(&self, program: &Program, types: &TypeTable) -> Result<Execution, MyplError> {
        let bytecode = self.compile(program, types)?;
        self.launch(bytecode)
    }

    /// Check and run blueprints produced elsewhere
    pub fn run_bytecode(&self, bytecode: Bytecode) -> Result<Execution, MyplError> {
        validate(&bytecode).map_err(MyplError::InvalidBytecode)?;
        self.launch(bytecode)
    }

    fn launch(&self, bytecode: Bytecode) -> Result<Execution, MyplError> {
        self.config.vm.validate()?;

        let mut vm = if self.config.profiling {
            VM::with_profiling(bytecode, self.config.vm.clone())
        } else {
            VM::new(bytecode, self.config.vm.clone())
        };
        vm.set_output_writer(self.config.output.clone());
        vm.set_input_reader(self.config.input.clone());

        let value = vm.run()?;
        Ok(Execution {
            value,
            live_objects: vm.heap().live_count(),
            profile: vm.profiler().cloned(),
        })
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

//! Stack-based execution engine
//!
//! Runs Frame Blueprints starting from the configured entry point. Each
//! call pushes a fresh `Activation`; VRET pops it and hands the returned
//! value to the caller's operand stack. Record objects live in a heap
//! owned by the engine.

mod frame;
pub mod ops;
mod profiler;

pub use frame::Activation;
pub use profiler::Profiler;

use crate::bytecode::{Blueprint, Bytecode, Instruction, Opcode, Operand};
use crate::heap::Heap;
use crate::io::{stdin_reader, stdout_writer, InputReader, OutputWriter};
use crate::value::{ErrorLocation, RuntimeError, RuntimeErrorKind, Value};
use mypl_config::VmConfig;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, trace};

/// Execution engine
pub struct VM {
    /// Blueprints by function name
    bytecode: Bytecode,
    /// Live activations, innermost last
    frames: Vec<Activation>,
    /// Record objects
    heap: Heap,
    /// Engine settings
    config: VmConfig,
    /// Sink for WRITE (and trace blocks)
    output: OutputWriter,
    /// Source for READ
    input: InputReader,
    /// Optional profiler
    profiler: Option<Profiler>,
}

impl VM {
    /// Create a new VM over compiled blueprints
    pub fn new(bytecode: Bytecode, config: VmConfig) -> Self {
        Self {
            bytecode,
            frames: Vec::new(),
            heap: Heap::new(config.heap_base_id),
            config,
            output: stdout_writer(),
            input: stdin_reader(),
            profiler: None,
        }
    }

    /// Create a new VM with profiling enabled
    pub fn with_profiling(bytecode: Bytecode, config: VmConfig) -> Self {
        let mut vm = Self::new(bytecode, config);
        vm.profiler = Some(Profiler::enabled());
        vm
    }

    /// Redirect WRITE output
    pub fn set_output_writer(&mut self, writer: OutputWriter) {
        self.output = writer;
    }

    /// Redirect READ input
    pub fn set_input_reader(&mut self, reader: InputReader) {
        self.input = reader;
    }

    pub fn enable_profiling(&mut self) {
        self.profiler = Some(Profiler::enabled());
    }

    pub fn profiler(&self) -> Option<&Profiler> {
        self.profiler.as_ref()
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn bytecode(&self) -> &Bytecode {
        &self.bytecode
    }

    /// Number of live activations (0 once a run has completed)
    pub fn call_depth(&self) -> usize {
        self.frames.len()
    }

    /// Execute the entry point to completion
    ///
    /// Returns the entry function's VRET value. The first runtime error
    /// aborts the run, located at the instruction that raised it.
    pub fn run(&mut self) -> Result<Value, RuntimeError> {
        let entry = self.config.entry_point.clone();
        let blueprint = self
            .bytecode
            .get(&entry)
            .cloned()
            .ok_or_else(|| {
                RuntimeError::new(
                    RuntimeErrorKind::NoEntryPoint,
                    format!("no function named '{}'", entry),
                )
            })?;
        if blueprint.param_count != 0 {
            return Err(RuntimeError::new(
                RuntimeErrorKind::NoEntryPoint,
                format!(
                    "entry point '{}' must take no parameters, found {}",
                    entry, blueprint.param_count
                ),
            ));
        }

        debug!(entry = %entry, blueprints = self.bytecode.len(), "vm run start");
        self.frames.clear();
        self.frames.push(Activation::new(blueprint, Vec::new()));

        let result = self.execute_loop();
        match &result {
            Ok(value) => debug!(result = %value, live_objects = self.heap.live_count(), "vm run end"),
            Err(err) => debug!(error = %err, "vm run aborted"),
        }
        result
    }

    fn execute_loop(&mut self) -> Result<Value, RuntimeError> {
        loop {
            let (blueprint, pc) = {
                let frame = self.current_frame()?;
                (Arc::clone(&frame.blueprint), frame.pc)
            };
            let instruction = blueprint.instructions.get(pc).ok_or_else(|| {
                RuntimeError::new(
                    RuntimeErrorKind::MalformedInstruction,
                    format!("fell off the end of '{}' at {}", blueprint.name, pc),
                )
            })?;
            self.current_frame_mut()?.pc += 1;

            if self.config.trace_execution {
                self.trace_instruction(&blueprint, pc, instruction)?;
            }

            // Record instruction for profiling (zero overhead when disabled)
            if let Some(ref mut profiler) = self.profiler {
                if profiler.is_enabled() {
                    let stack_depth = self.frames.last().map_or(0, |f| f.stack.len());
                    profiler.record_instruction_at(instruction.opcode, &blueprint.name, pc);
                    profiler.update_stack_depth(stack_depth);
                    profiler.update_call_depth(self.frames.len());
                }
            }

            let step = self.execute_instruction(instruction).map_err(|err| {
                err.at(ErrorLocation {
                    function: blueprint.name.clone(),
                    pc,
                    instruction: instruction.to_string(),
                })
            })?;
            if let Some(value) = step {
                return Ok(value);
            }
        }
    }

    /// Execute one instruction; `Some` once the entry activation returns
    fn execute_instruction(&mut self, instruction: &Instruction) -> Result<Option<Value>, RuntimeError> {
        match instruction.opcode {
            // ===== Constants & Variables =====
            Opcode::Push => {
                let value = value_operand(instruction)?.clone();
                self.push(value)?;
            }
            Opcode::Pop => {
                self.pop()?;
            }
            Opcode::Load => {
                let slot = slot_operand(instruction)?;
                let frame = self.current_frame_mut()?;
                let value = frame.load(slot)?;
                frame.push(value);
            }
            Opcode::Store => {
                let slot = slot_operand(instruction)?;
                let frame = self.current_frame_mut()?;
                let value = frame.pop()?;
                frame.store(slot, value);
            }

            // ===== Arithmetic =====
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod => {
                self.binary_op(|a, b| ops::arithmetic(instruction.opcode, a, b))?;
            }
            Opcode::Neg => self.unary_op(ops::negate)?,

            // ===== Logical =====
            Opcode::And | Opcode::Or => {
                self.binary_op(|a, b| ops::logic(instruction.opcode, a, b))?;
            }
            Opcode::Not => self.unary_op(ops::not)?,

            // ===== Comparison =====
            Opcode::CmpLt
            | Opcode::CmpLe
            | Opcode::CmpGt
            | Opcode::CmpGe
            | Opcode::CmpEq
            | Opcode::CmpNe => {
                self.binary_op(|a, b| ops::compare(instruction.opcode, a, b))?;
            }

            // ===== Control Flow =====
            Opcode::Jmp => {
                let target = address_operand(instruction)?;
                self.current_frame_mut()?.pc = target;
            }
            Opcode::Jmpf => {
                let target = address_operand(instruction)?;
                match self.pop()? {
                    Value::Bool(false) => self.current_frame_mut()?.pc = target,
                    Value::Bool(true) => {}
                    other => {
                        return Err(RuntimeError::type_mismatch(format!(
                            "JMPF expects a bool condition, found {}",
                            other.type_name()
                        )))
                    }
                }
            }
            Opcode::Nop => {}

            // ===== Functions =====
            Opcode::Call => {
                let name = name_operand(instruction)?;
                self.call(name)?;
            }
            Opcode::Vret => return self.ret(),

            // ===== Built-ins =====
            Opcode::Write => {
                let value = self.pop()?;
                self.write_output(&value.to_string())?;
            }
            Opcode::Read => {
                let line = self.read_line()?;
                self.push(Value::string(line))?;
            }
            Opcode::Len => self.unary_op(ops::length)?,
            Opcode::GetChr => {
                let string = self.pop()?;
                let index = self.pop()?;
                let ch = ops::char_at(index, string)?;
                self.push(ch)?;
            }
            Opcode::ToInt => self.unary_op(ops::to_int)?,
            Opcode::ToDbl => self.unary_op(ops::to_double)?,
            Opcode::ToStr => self.unary_op(ops::to_string)?,

            // ===== Heap =====
            Opcode::Alloc => {
                let fields = fields_operand(instruction)?;
                let id = self.heap.alloc(fields)?;
                self.push(Value::ObjectRef(id))?;
            }
            Opcode::Free => {
                let target = self.pop()?;
                let id = object_id(&target, "FREE")?;
                self.heap.free(id)?;
            }
            Opcode::SetFld => {
                let field = name_operand(instruction)?;
                let value = self.pop()?;
                let target = self.pop()?;
                let id = object_id(&target, "SETFLD")?;
                self.heap.set_field(id, field, value)?;
            }
            Opcode::GetFld => {
                let field = name_operand(instruction)?;
                let target = self.pop()?;
                let id = object_id(&target, "GETFLD")?;
                let value = self.heap.get_field(id, field)?;
                self.push(value)?;
            }

            // ===== Stack Manipulation =====
            Opcode::Dup => {
                let frame = self.current_frame_mut()?;
                let top = frame.peek()?.clone();
                frame.push(top);
            }
            Opcode::Swap => {
                let frame = self.current_frame_mut()?;
                let b = frame.pop()?;
                let a = frame.pop()?;
                frame.push(b);
                frame.push(a);
            }
        }
        Ok(None)
    }

    // ===== Helper Methods =====

    fn current_frame(&self) -> Result<&Activation, RuntimeError> {
        self.frames.last().ok_or_else(no_frame)
    }

    fn current_frame_mut(&mut self) -> Result<&mut Activation, RuntimeError> {
        self.frames.last_mut().ok_or_else(no_frame)
    }

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        self.current_frame_mut()?.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.current_frame_mut()?.pop()
    }

    /// Pop one operand, push `op(a)`
    fn unary_op<F>(&mut self, op: F) -> Result<(), RuntimeError>
    where
        F: FnOnce(Value) -> Result<Value, RuntimeError>,
    {
        let a = self.pop()?;
        let result = op(a)?;
        self.push(result)
    }

    /// Pop `b` then `a`, push `op(a, b)`
    fn binary_op<F>(&mut self, op: F) -> Result<(), RuntimeError>
    where
        F: FnOnce(Value, Value) -> Result<Value, RuntimeError>,
    {
        let b = self.pop()?;
        let a = self.pop()?;
        let result = op(a, b)?;
        self.push(result)
    }

    /// Start a new activation of `name` with arguments taken from the caller
    fn call(&mut self, name: &str) -> Result<(), RuntimeError> {
        let callee: Arc<Blueprint> = self.bytecode.get(name).cloned().ok_or_else(|| {
            RuntimeError::new(
                RuntimeErrorKind::UnknownFunction,
                format!("no function named '{}'", name),
            )
        })?;

        if let Some(max) = self.config.max_call_depth {
            if self.frames.len() >= max {
                return Err(RuntimeError::new(
                    RuntimeErrorKind::CallDepthExceeded,
                    format!("calling '{}' would exceed {} activations", name, max),
                ));
            }
        }

        let args = self.current_frame_mut()?.pop_n(callee.param_count)?;
        trace!(function = %name, depth = self.frames.len() + 1, "call");
        self.frames.push(Activation::new(callee, args));
        Ok(())
    }

    /// Pop the current activation, passing its top value to the caller
    fn ret(&mut self) -> Result<Option<Value>, RuntimeError> {
        let value = self.pop()?;
        let finished = self.frames.pop().ok_or_else(no_frame)?;
        trace!(function = %finished.name(), depth = self.frames.len(), "return");

        match self.frames.last_mut() {
            Some(caller) => {
                caller.push(value);
                Ok(None)
            }
            None => Ok(Some(value)),
        }
    }

    fn write_output(&self, text: &str) -> Result<(), RuntimeError> {
        let mut out = self
            .output
            .lock()
            .map_err(|_| RuntimeError::new(RuntimeErrorKind::Io, "output writer lock poisoned"))?;
        out.write_all(text.as_bytes()).map_err(RuntimeError::io)?;
        out.flush().map_err(RuntimeError::io)
    }

    /// One line of input without its terminator; empty at end of input
    fn read_line(&self) -> Result<String, RuntimeError> {
        let mut input = self
            .input
            .lock()
            .map_err(|_| RuntimeError::new(RuntimeErrorKind::Io, "input reader lock poisoned"))?;
        let mut line = String::new();
        input.read_line(&mut line).map_err(RuntimeError::io)?;
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(line)
    }

    /// Emit the per-instruction trace event and block
    fn trace_instruction(
        &self,
        blueprint: &Blueprint,
        pc: usize,
        instruction: &Instruction,
    ) -> Result<(), RuntimeError> {
        let frame = self.current_frame()?;
        let stack = format_stack(&frame.stack);
        trace!(
            function = %blueprint.name,
            pc,
            instruction = %instruction,
            stack = %stack,
            "execute"
        );

        let block = format!(
            "\n\t FRAME........: {}\n\t PC...........: {}\n\t INSTRUCTION..: {}\n\t OPERAND STACK: {}\n\t HEAP.........: {}\n",
            blueprint.name, pc, instruction, stack, self.heap
        );
        self.write_output(&block)
    }
}

fn no_frame() -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::MalformedInstruction, "no active frame")
}

fn format_stack(stack: &[Value]) -> String {
    let items: Vec<String> = stack.iter().map(Value::to_string).collect();
    format!("[{}]", items.join(", "))
}

/// Object id carried by a GETFLD/SETFLD/FREE target
fn object_id(target: &Value, op: &str) -> Result<u64, RuntimeError> {
    match target {
        Value::ObjectRef(id) => Ok(*id),
        Value::Nil => Err(RuntimeError::new(
            RuntimeErrorKind::NilReference,
            format!("{} on nil", op),
        )),
        other => Err(RuntimeError::type_mismatch(format!(
            "{} expects an object, found {}",
            op,
            other.type_name()
        ))),
    }
}

fn malformed(instruction: &Instruction) -> RuntimeError {
    RuntimeError::new(
        RuntimeErrorKind::MalformedInstruction,
        format!("{} expects a {:?} operand", instruction.opcode, instruction.opcode.operand_kind()),
    )
}

fn value_operand(instruction: &Instruction) -> Result<&Value, RuntimeError> {
    match &instruction.operand {
        Some(Operand::Value(value)) => Ok(value),
        _ => Err(malformed(instruction)),
    }
}

fn slot_operand(instruction: &Instruction) -> Result<usize, RuntimeError> {
    match instruction.operand {
        Some(Operand::Slot(slot)) => Ok(slot),
        _ => Err(malformed(instruction)),
    }
}

fn address_operand(instruction: &Instruction) -> Result<usize, RuntimeError> {
    match instruction.operand {
        Some(Operand::Address(address)) => Ok(address),
        _ => Err(malformed(instruction)),
    }
}

fn name_operand(instruction: &Instruction) -> Result<&str, RuntimeError> {
    match &instruction.operand {
        Some(Operand::Name(name)) => Ok(name),
        _ => Err(malformed(instruction)),
    }
}

fn fields_operand(instruction: &Instruction) -> Result<&[String], RuntimeError> {
    match &instruction.operand {
        Some(Operand::Fields(fields)) => Ok(fields),
        _ => Err(malformed(instruction)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::string_reader;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    struct CaptureWriter {
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

    fn blueprint(name: &str, params: usize, instructions: Vec<Instruction>) -> Blueprint {
        let mut bp = Blueprint::new(name, params);
        for instr in instructions {
            bp.emit(instr);
        }
        bp
    }

    fn main_only(instructions: Vec<Instruction>) -> Bytecode {
        let mut bytecode = Bytecode::new();
        bytecode.insert(blueprint("main", 0, instructions));
        bytecode
    }

    fn run_capture(vm: &mut VM) -> (Result<Value, RuntimeError>, String) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        vm.set_output_writer(Arc::new(Mutex::new(Box::new(CaptureWriter { buf: buf.clone() }))));
        let result = vm.run();
        let output = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        (result, output)
    }

    fn ret_nil() -> Vec<Instruction> {
        vec![Instruction::push(Value::Nil), Instruction::simple(Opcode::Vret)]
    }

    #[test]
    fn test_push_add_write() {
        let mut instrs = vec![
            Instruction::push(Value::Int(3)),
            Instruction::push(Value::Int(4)),
            Instruction::simple(Opcode::Add),
            Instruction::simple(Opcode::Write),
        ];
        instrs.extend(ret_nil());
        let mut vm = VM::new(main_only(instrs), VmConfig::default());

        let (result, output) = run_capture(&mut vm);
        assert_eq!(result.unwrap(), Value::Nil);
        assert_eq!(output, "7");
        assert_eq!(vm.call_depth(), 0);
    }

    #[test]
    fn test_call_passes_arguments_in_order() {
        let mut bytecode = Bytecode::new();
        bytecode.insert(blueprint(
            "sub",
            2,
            vec![
                Instruction::load(0),
                Instruction::load(1),
                Instruction::simple(Opcode::Sub),
                Instruction::simple(Opcode::Vret),
            ],
        ));
        bytecode.insert(blueprint(
            "main",
            0,
            vec![
                Instruction::push(Value::Int(10)),
                Instruction::push(Value::Int(3)),
                Instruction::call("sub"),
                Instruction::simple(Opcode::Vret),
            ],
        ));
        let mut vm = VM::new(bytecode, VmConfig::default());
        assert_eq!(vm.run().unwrap(), Value::Int(7));
    }

    #[test]
    fn test_swap_and_dup() {
        let mut vm = VM::new(
            main_only(vec![
                Instruction::push(Value::Int(1)),
                Instruction::push(Value::Int(2)),
                Instruction::simple(Opcode::Swap),
                Instruction::simple(Opcode::Dup),
                Instruction::simple(Opcode::Sub),
                Instruction::simple(Opcode::Add),
                Instruction::simple(Opcode::Vret),
            ]),
            VmConfig::default(),
        );
        // [1, 2] -> [2, 1] -> [2, 1, 1] -> [2, 0] -> [2]
        assert_eq!(vm.run().unwrap(), Value::Int(2));
    }

    #[test]
    fn test_jmpf_requires_bool() {
        let mut vm = VM::new(
            main_only(vec![
                Instruction::push(Value::Int(1)),
                Instruction::jmpf(2),
                Instruction::simple(Opcode::Nop),
            ]),
            VmConfig::default(),
        );
        let err = vm.run().unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::TypeMismatch);
        assert_eq!(
            err.location,
            Some(ErrorLocation {
                function: "main".to_string(),
                pc: 1,
                instruction: "JMPF 2".to_string(),
            })
        );
    }

    #[test]
    fn test_heap_field_round_trip() {
        let mut instrs = vec![
            Instruction::alloc(vec!["x".to_string()]),
            Instruction::store(0),
            Instruction::load(0),
            Instruction::push(Value::Int(5)),
            Instruction::setfld("x"),
            Instruction::load(0),
            Instruction::getfld("x"),
            Instruction::simple(Opcode::Write),
        ];
        instrs.extend(ret_nil());
        let mut vm = VM::new(main_only(instrs), VmConfig::default());

        let (result, output) = run_capture(&mut vm);
        result.unwrap();
        assert_eq!(output, "5");
        assert_eq!(vm.heap().live_count(), 1);
        assert_eq!(vm.heap().get_field(1111, "x").unwrap(), Value::Int(5));
    }

    #[test]
    fn test_getfld_on_nil() {
        let mut vm = VM::new(
            main_only(vec![Instruction::push(Value::Nil), Instruction::getfld("x")]),
            VmConfig::default(),
        );
        assert_eq!(vm.run().unwrap_err().kind, RuntimeErrorKind::NilReference);
    }

    #[test]
    fn test_missing_entry_point() {
        let mut vm = VM::new(Bytecode::new(), VmConfig::default());
        assert_eq!(vm.run().unwrap_err().kind, RuntimeErrorKind::NoEntryPoint);
    }

    #[test]
    fn test_custom_entry_point_and_heap_base() {
        let mut bytecode = Bytecode::new();
        bytecode.insert(blueprint(
            "start",
            0,
            vec![
                Instruction::alloc(vec![]),
                Instruction::simple(Opcode::Vret),
            ],
        ));
        let config = VmConfig::default()
            .with_entry_point("start")
            .with_heap_base_id(1);
        let mut vm = VM::new(bytecode, config);
        assert_eq!(vm.run().unwrap(), Value::ObjectRef(1));
    }

    #[test]
    fn test_call_depth_limit() {
        let mut bytecode = Bytecode::new();
        bytecode.insert(blueprint("loop", 0, vec![Instruction::call("loop"), Instruction::simple(Opcode::Vret)]));
        bytecode.insert(blueprint("main", 0, vec![Instruction::call("loop"), Instruction::simple(Opcode::Vret)]));
        let mut vm = VM::new(bytecode, VmConfig::default().with_max_call_depth(16));

        let err = vm.run().unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::CallDepthExceeded);
        assert_eq!(vm.call_depth(), 16);
    }

    #[test]
    fn test_falling_off_the_end() {
        let mut vm = VM::new(main_only(vec![Instruction::simple(Opcode::Nop)]), VmConfig::default());
        assert_eq!(
            vm.run().unwrap_err().kind,
            RuntimeErrorKind::MalformedInstruction
        );
    }

    #[test]
    fn test_read_strips_line_terminator() {
        let mut instrs = vec![
            Instruction::simple(Opcode::Read),
            Instruction::simple(Opcode::Read),
            Instruction::simple(Opcode::Add),
            Instruction::simple(Opcode::Read),
            Instruction::simple(Opcode::Add),
            Instruction::simple(Opcode::Write),
        ];
        instrs.extend(ret_nil());
        let mut vm = VM::new(main_only(instrs), VmConfig::default());
        vm.set_input_reader(string_reader("ab\r\ncd\n"));

        let (result, output) = run_capture(&mut vm);
        result.unwrap();
        assert_eq!(output, "abcd");
    }

    #[test]
    fn test_trace_block_written_before_each_instruction() {
        let mut vm = VM::new(main_only(ret_nil()), VmConfig::default().with_trace(true));
        let (result, output) = run_capture(&mut vm);
        result.unwrap();
        assert_eq!(
            output,
            "\n\t FRAME........: main\n\t PC...........: 0\n\t INSTRUCTION..: PUSH nil\n\t OPERAND STACK: []\n\t HEAP.........: {}\n\
             \n\t FRAME........: main\n\t PC...........: 1\n\t INSTRUCTION..: VRET\n\t OPERAND STACK: [nil]\n\t HEAP.........: {}\n"
        );
    }

    #[test]
    fn test_profiler_counts_instructions() {
        let mut vm = VM::with_profiling(main_only(ret_nil()), VmConfig::default());
        vm.run().unwrap();
        let profiler = vm.profiler().unwrap();
        assert_eq!(profiler.total_instructions(), 2);
        assert_eq!(profiler.count_at("main", 1), 1);
        assert_eq!(profiler.max_call_depth(), 1);
    }
}

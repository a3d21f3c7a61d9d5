#![forbid(unsafe_code)]

mod error;
mod ops;
mod value;
mod vm;

pub use error::RuntimeError;
pub use value::{shape_text, ElemKind, Value};
pub use vm::{ExecOutcome, MemoryEntry, ProbeReport, Vm, VmConfig};

/// Run `program` to completion or to its first runtime error.
pub fn execute(program: &quantel_ast::Program) -> ExecOutcome {
    execute_with(program, VmConfig::default())
}

pub fn execute_with(program: &quantel_ast::Program, cfg: VmConfig) -> ExecOutcome {
    let mut vm = Vm::new(cfg);
    let error = vm.run(program).err();
    vm.into_outcome(error)
}

use std::collections::HashMap;

use crate::bus::Bus;
use crate::error::{Error, Result};
use crate::register::RegisterFile;

/// What kind of value an instruction's operand slot accepts, and whether a trailing omission in
/// source can fall back to a default. `can_default` / `default` are consulted by the assembler
/// when padding a short argument list, never by the processor at execution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgType {
    Register { default: Option<i128> },
    Constant { default: Option<i128> },
}

impl ArgType {
    pub fn register() -> ArgType {
        ArgType::Register { default: None }
    }

    pub fn constant() -> ArgType {
        ArgType::Constant { default: None }
    }

    pub fn default(&self) -> Option<i128> {
        match self {
            ArgType::Register { default } => *default,
            ArgType::Constant { default } => *default,
        }
    }
}

/// A decoded operand, already resolved from the word stream: a register operand carries its
/// index, a constant operand carries its literal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Register(usize),
    Constant(i128),
}

impl Operand {
    pub fn as_register(&self) -> Result<usize> {
        match self {
            Operand::Register(i) => Ok(*i),
            Operand::Constant(_) => Err(Error::Arithmetic(
                "expected a register operand but got a constant".to_string(),
            )),
        }
    }

    pub fn as_constant(&self) -> i128 {
        match self {
            Operand::Register(i) => *i as i128,
            Operand::Constant(c) => *c,
        }
    }
}

type Executor = Box<dyn Fn(&mut RegisterFile, &mut Bus, &mut Bus, &[Operand]) -> Result<()>>;

/// A single opcode's mnemonic, arity, argument typing and executor. Executors are boxed
/// closures over the register file and both buses rather than methods on a trait object, which
/// keeps instruction tables data rather than a menagerie of small structs.
pub struct Instruction {
    mnemonic: String,
    opcode: i128,
    arg_types: Vec<ArgType>,
    exec: Executor,
}

impl Instruction {
    pub fn new(
        mnemonic: impl Into<String>,
        opcode: i128,
        arg_types: Vec<ArgType>,
        exec: Executor,
    ) -> Instruction {
        Instruction {
            mnemonic: mnemonic.into(),
            opcode,
            arg_types,
            exec,
        }
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn opcode(&self) -> i128 {
        self.opcode
    }

    pub fn arity(&self) -> usize {
        self.arg_types.len()
    }

    pub fn arg_types(&self) -> &[ArgType] {
        &self.arg_types
    }

    pub fn execute(
        &self,
        registers: &mut RegisterFile,
        mem_bus: &mut Bus,
        dev_bus: &mut Bus,
        operands: &[Operand],
    ) -> Result<()> {
        (self.exec)(registers, mem_bus, dev_bus, operands)
    }
}

/// The opcode→instruction table, keyed by both opcode (for decode) and mnemonic (for assembly).
#[derive(Default)]
pub struct InstructionSet {
    by_opcode: HashMap<i128, Instruction>,
    mnemonic_to_opcode: HashMap<String, i128>,
}

impl InstructionSet {
    pub fn new() -> InstructionSet {
        InstructionSet::default()
    }

    pub fn register(&mut self, instruction: Instruction) -> Result<()> {
        if self.mnemonic_to_opcode.contains_key(instruction.mnemonic()) {
            return Err(Error::Setup(format!(
                "mnemonic '{}' is already registered",
                instruction.mnemonic()
            )));
        }
        self.mnemonic_to_opcode
            .insert(instruction.mnemonic().to_string(), instruction.opcode());
        self.by_opcode.insert(instruction.opcode(), instruction);
        Ok(())
    }

    pub fn by_opcode(&self, opcode: i128) -> Option<&Instruction> {
        self.by_opcode.get(&opcode)
    }

    pub fn by_mnemonic(&self, mnemonic: &str) -> Option<&Instruction> {
        let opcode = self.mnemonic_to_opcode.get(mnemonic)?;
        self.by_opcode.get(opcode)
    }

    pub fn len(&self) -> usize {
        self.by_opcode.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_opcode.is_empty()
    }
}

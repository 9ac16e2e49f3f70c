mod bus;
mod catalog;
mod device;
mod error;
mod instruction;
mod interrupt;
mod processor;
mod register;
mod word;

pub use bus::Bus;
pub use device::{AccessMode, Device};
pub use error::{Error, Result};
pub use instruction::{ArgType, Instruction, InstructionSet, Operand};
pub use interrupt::{add_autoreset, add_counter, Interrupt};
pub use processor::Processor;
pub use register::{Register, RegisterFile, RegisterKey, ECR_INDEX, ENGINE_STOP_BIT, PC_INDEX, SP_INDEX};
pub use word::Word;

pub mod catalogs {
    pub use crate::catalog::{accumulator, basic};
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("setup error: {0}")]
    Setup(String),

    #[error("bus error: address {address} is beyond the bus's cumulative device span")]
    Bus { address: u128 },

    #[error("address error: offset {offset} is out of bounds for a device of size {size}")]
    Address { offset: u128, size: usize },

    #[error("write-only violation: device does not permit reads at offset {offset}")]
    WriteOnlyViolation { offset: u128 },

    #[error("read-only violation: device does not permit writes at offset {offset}")]
    ReadOnlyViolation { offset: u128 },

    #[error("segmentation fault: no instruction registered for opcode {opcode} at pc {pc}")]
    SegmentationFault { pc: u128, opcode: i128 },

    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    #[error("register lookup error: {0}")]
    RegisterLookup(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<A> = std::result::Result<A, Error>;

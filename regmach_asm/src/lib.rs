mod assembler;
mod directive;
mod error;
mod literal;

pub use assembler::Assembler;
pub use directive::{ConvertingDirective, Directive, PaddingDirective, ZerosDirective};
pub use error::{Error, Result};
pub use literal::parse_int;

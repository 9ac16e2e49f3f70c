use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("[line {line}]: argument error: {message}")]
    Argument { line: usize, message: String },

    #[error("[line {line}]: reference error: '{name}' already defined at line {first_line}")]
    Reference {
        line: usize,
        first_line: usize,
        name: String,
    },

    #[error("[line {line}]: assemble error: {message}")]
    Assemble { line: usize, message: String },

    #[error(transparent)]
    Core(#[from] regmach_core::Error),
}

pub type Result<A> = std::result::Result<A, Error>;

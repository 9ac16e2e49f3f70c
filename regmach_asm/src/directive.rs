use regmach_core::Word;

use crate::error::{Error, Result};
use crate::literal::parse_int;

/// A pseudo-operation: given the tokens following its name on a source line, it declares how
/// many words it occupies and what those words contain, and whether the label naming it
/// resolves to an absolute offset (`static`) or a PC-relative one.
pub trait Directive {
    fn name(&self) -> &str;
    fn is_static(&self) -> bool;
    fn word_count(&self, line: usize, args: &[String]) -> Result<usize>;
    fn words(&self, line: usize, args: &[String], width: u32) -> Result<Vec<Word>>;
}

fn require_int(line: usize, args: &[String], index: usize, what: &str) -> Result<i128> {
    let token = args.get(index).ok_or_else(|| Error::Argument {
        line,
        message: format!("directive is missing its '{what}' argument"),
    })?;
    parse_int(token).ok_or_else(|| Error::Argument {
        line,
        message: format!("'{token}' is not a valid integer literal for '{what}'"),
    })
}

/// `.zeros n` — fills the next `n` words with zero. Registered as a static directive: the
/// label naming it resolves to an absolute word offset rather than a PC-relative one.
pub struct ZerosDirective;

impl Directive for ZerosDirective {
    fn name(&self) -> &str {
        ".zeros"
    }

    fn is_static(&self) -> bool {
        true
    }

    fn word_count(&self, line: usize, args: &[String]) -> Result<usize> {
        Ok(require_int(line, args, 0, "n")? as usize)
    }

    fn words(&self, line: usize, args: &[String], width: u32) -> Result<Vec<Word>> {
        Ok(vec![Word::new(width); self.word_count(line, args)?])
    }
}

/// `.padd n v` — fills the next `n` words with `v`.
pub struct PaddingDirective;

impl Directive for PaddingDirective {
    fn name(&self) -> &str {
        ".padd"
    }

    fn is_static(&self) -> bool {
        false
    }

    fn word_count(&self, line: usize, args: &[String]) -> Result<usize> {
        Ok(require_int(line, args, 0, "n")? as usize)
    }

    fn words(&self, line: usize, args: &[String], width: u32) -> Result<Vec<Word>> {
        let value = require_int(line, args, 1, "v")?;
        Ok(vec![Word::with_signed(width, value); self.word_count(line, args)?])
    }
}

type ConvertFn = Box<dyn Fn(&[String]) -> Vec<i128>>;

/// A generic directive whose data is produced by an arbitrary `args -> Vec<i128>` conversion,
/// used for packed data like strings. `.string` joins its arguments with spaces and emits one
/// word per character's code point.
pub struct ConvertingDirective {
    name: String,
    convert: ConvertFn,
}

impl ConvertingDirective {
    pub fn new(name: impl Into<String>, convert: ConvertFn) -> ConvertingDirective {
        ConvertingDirective {
            name: name.into(),
            convert,
        }
    }

    pub fn string() -> ConvertingDirective {
        ConvertingDirective::new(
            ".string",
            Box::new(|args: &[String]| args.join(" ").chars().map(|c| c as i128).collect()),
        )
    }
}

impl Directive for ConvertingDirective {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_static(&self) -> bool {
        false
    }

    fn word_count(&self, _line: usize, args: &[String]) -> Result<usize> {
        Ok((self.convert)(args).len())
    }

    fn words(&self, _line: usize, args: &[String], width: u32) -> Result<Vec<Word>> {
        Ok((self.convert)(args)
            .into_iter()
            .map(|v| Word::with_signed(width, v))
            .collect())
    }
}

use std::collections::HashMap;

use regmach_core::{Processor, Word};

use crate::directive::{ConvertingDirective, Directive, PaddingDirective, ZerosDirective};
use crate::error::{Error, Result};
use crate::literal::parse_int;

enum SplitLine {
    Command {
        line: usize,
        mnemonic: String,
        args: Vec<String>,
    },
    Data {
        line: usize,
        directive_name: String,
        args: Vec<String>,
    },
}

enum ArgValue {
    Resolved(i128),
    Symbol(String),
}

enum ArgLine {
    Command {
        line: usize,
        opcode: i128,
        values: Vec<ArgValue>,
    },
    Data {
        words: Vec<Word>,
    },
}

/// Converts a stream of assembly source text to a linear sequence of machine words, resolving
/// labels and named constants against a target processor's instruction, register and constant
/// tables. Reusable across multiple `assemble` calls; each call resets the line/word counters
/// and label tables from scratch.
pub struct Assembler<'a> {
    processor: &'a Processor,
    directives: HashMap<String, Box<dyn Directive>>,
    comment_starts: Vec<String>,
    line_count: usize,
    word_count: usize,
    refs: HashMap<String, (usize, usize)>,
    static_refs: HashMap<String, (usize, usize)>,
}

impl<'a> Assembler<'a> {
    pub fn new(processor: &'a Processor) -> Assembler<'a> {
        let mut directives: HashMap<String, Box<dyn Directive>> = HashMap::new();
        for directive in [
            Box::new(ZerosDirective) as Box<dyn Directive>,
            Box::new(PaddingDirective) as Box<dyn Directive>,
            Box::new(ConvertingDirective::string()) as Box<dyn Directive>,
        ] {
            directives.insert(directive.name().to_string(), directive);
        }

        Assembler {
            processor,
            directives,
            comment_starts: vec![";".to_string()],
            line_count: 0,
            word_count: 0,
            refs: HashMap::new(),
            static_refs: HashMap::new(),
        }
    }

    pub fn with_directive(mut self, directive: Box<dyn Directive>) -> Assembler<'a> {
        self.directives.insert(directive.name().to_string(), directive);
        self
    }

    pub fn with_comment_starts(mut self, comment_starts: Vec<String>) -> Assembler<'a> {
        self.comment_starts = comment_starts;
        self
    }

    /// Names of every directive currently registered, built-in and imported alike.
    pub fn directive_names(&self) -> Vec<&str> {
        self.directives.keys().map(|s| s.as_str()).collect()
    }

    /// Runs the split, argument, dereference and program passes over `source` in sequence and
    /// returns the resulting program image.
    pub fn assemble(&mut self, source: &str) -> Result<Vec<Word>> {
        self.line_count = 0;
        self.word_count = 0;
        self.refs.clear();
        self.static_refs.clear();

        let split = self.split_run(source)?;
        let argument = self.argument_run(split)?;
        let dereferenced = self.dereference_run(argument)?;
        Ok(Self::program_run(dereferenced))
    }

    fn strip_comment<'b>(&self, line: &'b str) -> &'b str {
        let mut cut = line.len();
        for comment_start in &self.comment_starts {
            if let Some(idx) = line.find(comment_start.as_str()) {
                cut = cut.min(idx);
            }
        }
        &line[..cut]
    }

    fn add_ref(&mut self, name: &str) -> Result<()> {
        if let Some(&(_, first_line)) = self.refs.get(name) {
            return Err(Error::Reference {
                line: self.line_count,
                first_line,
                name: name.to_string(),
            });
        }
        self.refs.insert(name.to_string(), (self.word_count, self.line_count));
        Ok(())
    }

    fn handle_directive(&mut self, directive_name: &str, refname: &str, args: Vec<String>) -> Result<SplitLine> {
        let directive = self.directives.get(directive_name).ok_or_else(|| Error::Assemble {
            line: self.line_count,
            message: format!("unknown directive '{directive_name}'"),
        })?;
        let is_static = directive.is_static();
        let count = directive.word_count(self.line_count, &args)?;

        let table = if is_static { &mut self.static_refs } else { &mut self.refs };
        if let Some(&(_, first_line)) = table.get(refname) {
            return Err(Error::Reference {
                line: self.line_count,
                first_line,
                name: refname.to_string(),
            });
        }
        table.insert(refname.to_string(), (self.word_count, self.line_count));
        self.word_count += count;

        Ok(SplitLine::Data {
            line: self.line_count,
            directive_name: directive_name.to_string(),
            args,
        })
    }

    fn split_run(&mut self, source: &str) -> Result<Vec<SplitLine>> {
        let mut lines = Vec::new();
        for raw_line in source.split('\n') {
            self.line_count += 1;
            let stripped = self.strip_comment(raw_line);
            let tokens: Vec<&str> = stripped.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }

            if let Some(name) = tokens[0].strip_suffix(':') {
                self.add_ref(name)?;
                continue;
            }

            if self.directives.contains_key(tokens[0]) {
                let refname = tokens.get(1).ok_or_else(|| Error::Argument {
                    line: self.line_count,
                    message: format!("directive '{}' is missing its label name", tokens[0]),
                })?;
                let args: Vec<String> = tokens[2..].iter().map(|s| s.to_string()).collect();
                lines.push(self.handle_directive(tokens[0], refname, args)?);
                continue;
            }

            let instruction = self.processor.instructions().by_mnemonic(tokens[0]).ok_or_else(|| Error::Assemble {
                line: self.line_count,
                message: format!("unknown mnemonic '{}'", tokens[0]),
            })?;

            let mut args: Vec<String> = tokens[1..].iter().map(|s| s.to_string()).collect();
            let arity = instruction.arity();
            if args.len() > arity {
                return Err(Error::Assemble {
                    line: self.line_count,
                    message: format!(
                        "mnemonic '{}' expects {} arguments, but got {}",
                        tokens[0],
                        arity,
                        args.len()
                    ),
                });
            }
            if args.len() < arity {
                for arg_type in &instruction.arg_types()[args.len()..] {
                    match arg_type.default() {
                        Some(default) => args.push(default.to_string()),
                        None => {
                            return Err(Error::Assemble {
                                line: self.line_count,
                                message: format!(
                                    "mnemonic '{}' expects {} arguments, but got {}",
                                    tokens[0],
                                    arity,
                                    args.len()
                                ),
                            })
                        }
                    }
                }
            }

            self.word_count += 1 + args.len();
            lines.push(SplitLine::Command {
                line: self.line_count,
                mnemonic: tokens[0].to_string(),
                args,
            });
        }
        Ok(lines)
    }

    fn argument_run(&self, lines: Vec<SplitLine>) -> Result<Vec<ArgLine>> {
        let width = self.processor.width();
        let mut out = Vec::with_capacity(lines.len());
        for line in lines {
            match line {
                SplitLine::Data { line, directive_name, args } => {
                    let directive = self.directives.get(&directive_name).expect("directive validated in split_run");
                    let words = directive.words(line, &args, width)?;
                    out.push(ArgLine::Data { words });
                }
                SplitLine::Command { line, mnemonic, args } => {
                    let instruction = self
                        .processor
                        .instructions()
                        .by_mnemonic(&mnemonic)
                        .expect("mnemonic validated in split_run");
                    let mut values = Vec::with_capacity(args.len());
                    for (arg_type, arg) in instruction.arg_types().iter().zip(args.iter()) {
                        values.push(self.convert_arg(line, &mnemonic, arg_type, arg)?);
                    }
                    out.push(ArgLine::Command {
                        line,
                        opcode: instruction.opcode(),
                        values,
                    });
                }
            }
        }
        Ok(out)
    }

    fn convert_arg(
        &self,
        line: usize,
        mnemonic: &str,
        arg_type: &regmach_core::ArgType,
        arg: &str,
    ) -> Result<ArgValue> {
        use regmach_core::ArgType;
        match arg_type {
            ArgType::Register { .. } => {
                let index = self.processor.registers().index_of(arg).ok_or_else(|| Error::Argument {
                    line,
                    message: format!(
                        "command '{mnemonic}' wants an argument of type register, but '{arg}' is not a register"
                    ),
                })?;
                Ok(ArgValue::Resolved(index as i128))
            }
            ArgType::Constant { .. } => {
                if self.processor.registers().index_of(arg).is_some() {
                    return Err(Error::Argument {
                        line,
                        message: format!(
                            "command '{mnemonic}' wants an argument of type const, but '{arg}' is a register"
                        ),
                    });
                }
                if let Some(value) = parse_int(arg) {
                    return Ok(ArgValue::Resolved(value));
                }
                if let Some(value) = self.processor.constants().get(arg) {
                    return Ok(ArgValue::Resolved(*value));
                }
                Ok(ArgValue::Symbol(arg.to_string()))
            }
        }
    }

    fn dereference_run(&self, lines: Vec<ArgLine>) -> Result<Vec<Vec<Word>>> {
        let width = self.processor.width();
        let mut wc = 0usize;
        let mut out = Vec::with_capacity(lines.len());
        for line in lines {
            match line {
                ArgLine::Data { words } => {
                    wc += words.len();
                    out.push(words);
                }
                ArgLine::Command { line, opcode, values } => {
                    let mut resolved = Vec::with_capacity(values.len());
                    for value in values {
                        let v = match value {
                            ArgValue::Resolved(v) => v,
                            ArgValue::Symbol(name) => {
                                if let Some(&(word, _)) = self.static_refs.get(&name) {
                                    word as i128
                                } else if let Some(&(word, _)) = self.refs.get(&name) {
                                    word as i128 - wc as i128
                                } else {
                                    return Err(Error::Argument {
                                        line,
                                        message: format!("'{name}' is neither an int nor a reference"),
                                    });
                                }
                            }
                        };
                        resolved.push(v);
                    }
                    let mut data = Vec::with_capacity(1 + resolved.len());
                    data.push(Word::with_signed(width, opcode));
                    data.extend(resolved.into_iter().map(|v| Word::with_signed(width, v)));
                    wc += data.len();
                    out.push(data);
                }
            }
        }
        Ok(out)
    }

    fn program_run(lines: Vec<Vec<Word>>) -> Vec<Word> {
        lines.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regmach_core::{catalogs, Device};

    fn machine() -> Processor {
        let mut proc = Processor::new(64);
        proc.register_memory_device(Device::rom(64, 64)).unwrap();
        proc.add_register(regmach_core::Register::plain("r0", 64)).unwrap();
        proc.add_register(regmach_core::Register::plain("r1", 64)).unwrap();
        catalogs::basic(&mut proc).unwrap();
        proc.setup_done().unwrap();
        proc
    }

    #[test]
    fn assembles_immediate_and_halt() {
        let proc = machine();
        let mut asm = Assembler::new(&proc);
        let image = asm.assemble("ldi 0b1 ecr\n").unwrap();
        let values: Vec<i128> = image.iter().map(|w| w.get_signed()).collect();
        assert_eq!(values, vec![0x16, 1, 1]);
    }

    #[test]
    fn forward_label_reference_resolves_pc_relative() {
        let proc = machine();
        let mut asm = Assembler::new(&proc);
        let source = "ldi 0 r0\njeq r0 skip\nldi 99 r0\nskip:\nldi 1 ecr\n";
        let image = asm.assemble(source).unwrap();
        let values: Vec<i128> = image.iter().map(|w| w.get_signed()).collect();
        // jeq's opcode is at word 3; wc at that line's start is also 3, and 'skip' lands
        // at word 9, so its 'c' operand resolves to 9 - 3 = 6.
        assert_eq!(values[3], 0x11);
        assert_eq!(values[5], 6);
    }

    #[test]
    fn duplicate_label_is_reference_error() {
        let proc = machine();
        let mut asm = Assembler::new(&proc);
        let source = "loop:\nldi 1 ecr\nloop:\n";
        let err = asm.assemble(source);
        assert!(matches!(err, Err(Error::Reference { .. })));
    }

    #[test]
    fn zeros_directive_is_static_and_resolves_to_absolute_offset() {
        let proc = machine();
        let mut asm = Assembler::new(&proc);
        let source = "ld buf r0\n.zeros buf 4\n";
        let image = asm.assemble(source).unwrap();
        // ld occupies words 0..3; 'buf' is static, so it resolves to its absolute offset: word 3.
        assert_eq!(image[1].get_signed(), 3);
        assert_eq!(image[3].get_signed(), 0);
        assert_eq!(image[4].get_signed(), 0);
        assert_eq!(image[5].get_signed(), 0);
        assert_eq!(image[6].get_signed(), 0);
    }

    #[test]
    fn custom_comment_start_is_honored() {
        let proc = machine();
        let mut asm = Assembler::new(&proc).with_comment_starts(vec!["--".to_string()]);
        let image = asm.assemble("ldi 1 ecr -- halt immediately\n").unwrap();
        assert_eq!(image.iter().map(|w| w.get_signed()).collect::<Vec<_>>(), vec![0x16, 1, 1]);
    }
}

mod machine;

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use log::{error, warn};
use regmach_asm::{Assembler, ConvertingDirective, Directive};
use regmach_core::Word;

/// Assembles and executes programs for a generic register machine.
#[derive(Parser)]
#[command(name = "regmach", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase logging verbosity; repeatable (-v, -vv, -vvv).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Explicit log level (error, warn, info, debug, trace), overrides -v if given.
    #[arg(long, global = true)]
    debug_level: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble a source file into a program image.
    Assemble(AssembleArgs),
    /// Program a machine from an assembled image and run it.
    Execute(ExecuteArgs),
    /// Concatenate section-dump files into one.
    Link(LinkArgs),
}

#[derive(clap::Args)]
struct AssembleArgs {
    /// Path to the assembly source file.
    source: PathBuf,

    /// Instruction catalog to assemble against: "basic" or "accumulator".
    #[arg(short = 'c', long, default_value = "basic")]
    commands: String,

    /// Register/device layout to assemble against: "small" or "gym16".
    #[arg(short = 'm', long, default_value = "small")]
    machine: String,

    /// Comment-start tokens; repeatable. Defaults to `;`.
    #[arg(long = "comment-start", default_value = ";")]
    comment_starts: Vec<String>,

    /// Write the section dump here instead of stdout.
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Section tag the assembled image belongs to: "ROM" or "FLASH".
    #[arg(short = 'S', long, default_value = "ROM")]
    section: String,

    /// Path to a directive manifest to import additional directives from.
    #[arg(long)]
    directive_import: Option<PathBuf>,

    /// Print the names of all registered directives and exit without assembling.
    #[arg(long)]
    list_directives: bool,
}

#[derive(clap::Args)]
struct ExecuteArgs {
    /// Path to a section-dump file produced by `assemble`.
    image: PathBuf,

    /// Instruction catalog to run: "basic" or "accumulator".
    #[arg(short = 'c', long, default_value = "basic")]
    commands: String,

    /// Register/device layout to run: "small" or "gym16".
    #[arg(short = 'm', long, default_value = "small")]
    machine: String,

    /// Run exactly this many cycles instead of running to completion.
    #[arg(short = 's', long)]
    steps: Option<u64>,

    /// Print every register's value after execution.
    #[arg(long = "dump-registers")]
    dump_registers: bool,
}

#[derive(clap::Args)]
struct LinkArgs {
    /// Where to write the combined section dump.
    output: PathBuf,

    /// Section-dump files to concatenate, in order.
    inputs: Vec<PathBuf>,
}

fn init_logging(cli: &Cli) {
    let mut builder = env_logger::Builder::new();
    let level = match cli.debug_level.as_deref() {
        Some(level) => level.parse().unwrap_or(log::LevelFilter::Warn),
        None => match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        },
    };
    builder.filter_level(level).init();
}

/// Parses `[v1, v2, ...]`, the `{:?}` rendering of a `Vec<i128>` produced by `assemble`.
fn parse_word_list(text: &str) -> Result<Vec<i128>> {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .with_context(|| format!("'{trimmed}' is not a bracketed word list"))?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|tok| tok.trim().parse::<i128>().context("word list contains a non-integer token"))
        .collect()
}

fn load_custom_directives(path: &PathBuf) -> Result<Vec<Box<dyn Directive>>> {
    let content = fs::read_to_string(path).with_context(|| format!("reading directive manifest {path:?}"))?;
    let mut directives = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (name, rest) = line
            .split_once(':')
            .with_context(|| format!("directive manifest line {}: expected 'name: v1,v2,...'", lineno + 1))?;
        let values: Vec<i128> = rest
            .split(',')
            .map(|tok| tok.trim().parse::<i128>())
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("directive manifest line {}: non-integer value", lineno + 1))?;
        directives.push(
            Box::new(ConvertingDirective::new(name.trim().to_string(), Box::new(move |_args| values.clone())))
                as Box<dyn Directive>,
        );
    }
    Ok(directives)
}

fn run_assemble(args: &AssembleArgs) -> Result<()> {
    let mut proc = machine::by_name(&args.machine)?;
    machine::register_commands(&mut proc, &args.commands)?;
    proc.setup_done()?;

    let mut assembler = Assembler::new(&proc).with_comment_starts(args.comment_starts.clone());
    if let Some(path) = &args.directive_import {
        for directive in load_custom_directives(path)? {
            assembler = assembler.with_directive(directive);
        }
    }

    if args.list_directives {
        let mut names = assembler.directive_names();
        names.sort_unstable();
        for name in names {
            println!("{name}");
        }
        return Ok(());
    }

    let source = fs::read_to_string(&args.source).with_context(|| format!("reading {:?}", args.source))?;
    let image = assembler.assemble(&source)?;
    let values: Vec<i128> = image.iter().map(|w| w.get_signed()).collect();
    let dump = format!("{}:{:?}\n", args.section, values);

    match &args.output {
        Some(path) => fs::write(path, dump).with_context(|| format!("writing {path:?}"))?,
        None => print!("{dump}"),
    }
    Ok(())
}

fn run_execute(args: &ExecuteArgs) -> Result<()> {
    let mut proc = machine::by_name(&args.machine)?;
    machine::register_commands(&mut proc, &args.commands)?;
    proc.setup_done()?;

    let content = fs::read_to_string(&args.image).with_context(|| format!("reading {:?}", args.image))?;
    if !content.ends_with('\n') {
        warn!("{:?} has no trailing newline; the image might be truncated", args.image);
    }

    let width = proc.width();
    for line in content.lines() {
        if line.is_empty() {
            continue;
        }
        let (section, words) = line.split_once(':').with_context(|| format!("malformed section line '{line}'"))?;
        let words: Vec<Word> = parse_word_list(words)?.into_iter().map(|v| Word::with_signed(width, v)).collect();
        match section {
            "ROM" => proc.mem_bus_mut().program(0, words)?,
            "FLASH" => proc.dev_bus_mut().program(0, words)?,
            other => bail!("unknown section '{other}' (expected 'ROM' or 'FLASH')"),
        }
    }

    match args.steps {
        Some(steps) => {
            for _ in 0..steps {
                proc.do_cycle()?;
            }
        }
        None => proc.run()?,
    }

    if args.dump_registers {
        println!("== registers ==");
        for i in 0..proc.registers().len() {
            if let Some(name) = proc.registers().name_at(i) {
                println!("{name}\t: {}", proc.registers().peek(i)?.get_signed());
            }
        }
    }
    Ok(())
}

fn run_link(args: &LinkArgs) -> Result<()> {
    let mut combined = String::new();
    for path in &args.inputs {
        let mut data = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
        if !data.ends_with('\n') {
            warn!("{path:?} has no trailing newline; the image might be truncated");
            data.push('\n');
        }
        combined.push_str(&data);
    }
    fs::write(&args.output, combined).with_context(|| format!("writing {:?}", args.output))
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    match &cli.command {
        Command::Assemble(args) => run_assemble(args),
        Command::Execute(args) => run_execute(args),
        Command::Link(args) => run_link(args),
    }
}

fn main() {
    if let Err(err) = try_main() {
        error!("{err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

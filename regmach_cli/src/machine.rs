//! Ready-to-use register machine layouts, analogous to a Python register-machine
//! project's `machines` package: each builder wires up buses and registers and returns an
//! unprogrammed `Processor`. The CLI calls `setup_done()` after registering whichever
//! instruction catalog `--commands` names.

use anyhow::{bail, Context, Result};
use regmach_core::{catalogs, Device, Processor, Register};

const WIDTH: u32 = 64;

/// A general-purpose machine: ROM, RAM and a Flash device, an `out0` stream-output register
/// wired to stdout, and fifteen general-purpose registers `r0`..`r14`.
pub fn small(rom_size: usize, ram_size: usize, flash_size: usize) -> Result<Processor> {
    let mut proc = Processor::new(WIDTH);
    proc.register_memory_device(Device::rom(rom_size, WIDTH))?;
    proc.register_memory_device(Device::ram(ram_size, WIDTH))?;
    proc.register_device(Device::flash(flash_size, WIDTH))?;

    proc.add_register(Register::stream_output("out0", WIDTH, Box::new(std::io::stdout())))?;
    for i in 0..15 {
        proc.add_register(Register::plain(format!("r{i}"), WIDTH))?;
    }
    Ok(proc)
}

/// A single-accumulator machine with only a ROM: the `A` register plus `r0`..`r{num_registers-1}`.
pub fn gym16(rom_size: usize, num_registers: usize) -> Result<Processor> {
    let mut proc = Processor::new(WIDTH);
    proc.register_memory_device(Device::rom(rom_size, WIDTH))?;
    for i in 0..num_registers {
        proc.add_register(Register::plain(format!("r{i}"), WIDTH))?;
    }
    Ok(proc)
}

/// Resolves a `--machine` name to a builder with its conventional default sizing.
pub fn by_name(name: &str) -> Result<Processor> {
    match name {
        "small" => small(50, 200, 500),
        "gym16" => gym16(200, 15),
        other => bail!("unknown machine module '{other}' (expected 'small' or 'gym16')"),
    }
}

/// Resolves a `--commands` name to an instruction catalog and registers it on `processor`.
pub fn register_commands(processor: &mut Processor, name: &str) -> Result<()> {
    match name {
        "basic" => catalogs::basic(processor).context("registering the basic instruction set"),
        "accumulator" => catalogs::accumulator(processor).context("registering the accumulator instruction set"),
        other => bail!("unknown commands module '{other}' (expected 'basic' or 'accumulator')"),
    }
}

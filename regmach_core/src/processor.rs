use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Barrier;
use std::time::{Duration, Instant};

use crate::bus::Bus;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::instruction::{ArgType, Instruction, InstructionSet, Operand};
use crate::interrupt::Interrupt;
use crate::register::{Register, RegisterFile, ECR_INDEX, ENGINE_STOP_BIT, PC_INDEX, SP_INDEX};
use crate::word::Word;

/// How `do_cycle`'s pacing step throttles wall-clock speed. Target frequency and a clock
/// barrier are mutually exclusive, enforced at `set_pacing` time.
enum Pacing {
    None,
    Frequency(f64),
    Barrier(Arc<Barrier>),
}

type CycleCallback = Box<dyn FnMut(&mut Processor)>;

/// The fetch/decode/execute engine. Owns both buses, the register file, the instruction table,
/// the ordered list of cycle callbacks, the interrupt list and the assembler-facing named
/// constant table.
pub struct Processor {
    width: u32,
    mem_bus: Bus,
    dev_bus: Bus,
    registers: RegisterFile,
    instructions: InstructionSet,
    cycle_callbacks: Vec<CycleCallback>,
    interrupts: Vec<Interrupt>,
    constants: HashMap<String, i128>,
    cycles: u64,
    push_pc: bool,
    pacing: Pacing,
    epoch: Option<Instant>,
    setup_done: bool,
}

impl Processor {
    pub fn new(width: u32) -> Processor {
        let mut registers = RegisterFile::new();
        registers.add(Register::plain("pc", width)).expect("pc register");
        registers.add(Register::plain("ecr", width)).expect("ecr register");
        registers.add(Register::plain("sp", width)).expect("sp register");

        Processor {
            width,
            mem_bus: Bus::new(width),
            dev_bus: Bus::new(width),
            registers,
            instructions: InstructionSet::new(),
            cycle_callbacks: Vec::new(),
            interrupts: Vec::new(),
            constants: HashMap::new(),
            cycles: 0,
            push_pc: false,
            pacing: Pacing::None,
            epoch: None,
            setup_done: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    pub fn mem_bus(&self) -> &Bus {
        &self.mem_bus
    }

    pub fn dev_bus(&self) -> &Bus {
        &self.dev_bus
    }

    pub fn mem_bus_mut(&mut self) -> &mut Bus {
        &mut self.mem_bus
    }

    pub fn dev_bus_mut(&mut self) -> &mut Bus {
        &mut self.dev_bus
    }

    pub fn instructions(&self) -> &InstructionSet {
        &self.instructions
    }

    pub fn constants(&self) -> &HashMap<String, i128> {
        &self.constants
    }

    pub fn register_memory_device(&mut self, device: Device) -> Result<u128> {
        self.mem_bus.register_device(device)
    }

    pub fn register_device(&mut self, device: Device) -> Result<u128> {
        self.dev_bus.register_device(device)
    }

    pub fn add_register(&mut self, register: Register) -> Result<usize> {
        self.registers.add(register)
    }

    pub fn register_command(&mut self, instruction: Instruction) -> Result<()> {
        self.instructions.register(instruction)
    }

    pub fn register_on_cycle_callback(&mut self, callback: CycleCallback) {
        self.cycle_callbacks.push(callback);
    }

    pub fn add_interrupt(&mut self, interrupt: Interrupt) -> usize {
        self.interrupts.push(interrupt);
        self.interrupts.len() - 1
    }

    pub fn set_target_frequency(&mut self, hz: f64) -> Result<()> {
        if matches!(self.pacing, Pacing::Barrier(_)) {
            return Err(Error::Setup(
                "target frequency and a clock barrier are mutually exclusive".to_string(),
            ));
        }
        self.pacing = Pacing::Frequency(hz);
        Ok(())
    }

    pub fn set_barrier(&mut self, barrier: Arc<Barrier>) -> Result<()> {
        if matches!(self.pacing, Pacing::Frequency(_)) {
            return Err(Error::Setup(
                "target frequency and a clock barrier are mutually exclusive".to_string(),
            ));
        }
        self.pacing = Pacing::Barrier(barrier);
        Ok(())
    }

    pub fn pc(&self) -> Result<u128> {
        self.word_unsigned_at(PC_INDEX)
    }

    pub fn sp(&self) -> Result<u128> {
        self.word_unsigned_at(SP_INDEX)
    }

    pub fn ecr(&self) -> Result<u128> {
        self.word_unsigned_at(ECR_INDEX)
    }

    fn word_unsigned_at(&self, index: usize) -> Result<u128> {
        Ok(self.registers.peek(index)?.get_unsigned())
    }

    fn set_word_at(&mut self, index: usize, value: i128) -> Result<()> {
        let word = Word::with_signed(self.width, value);
        self.registers.write(index, word)
    }

    /// Populates named constants for the assembler (`ROMEND_LOW/HIGH`, optionally
    /// `RAMEND_LOW/HIGH`, optionally `FLASH_START/END`, and one entry per interrupt), and
    /// initializes SP/`push_pc` if a second memory device (RAM) is present. Requires at least
    /// one memory-bus device (the ROM).
    pub fn setup_done(&mut self) -> Result<()> {
        if self.mem_bus.device_count() == 0 {
            return Err(Error::Setup(
                "setup_done requires at least one memory-bus device (the ROM)".to_string(),
            ));
        }

        let rom_end = self.mem_bus.device_size(0).unwrap() as i128 - 1;
        self.insert_split_constant("ROMEND", rom_end);

        if self.mem_bus.device_count() > 1 {
            let ram_start = self.mem_bus.device_start(1).unwrap() as i128;
            let ram_size = self.mem_bus.device_size(1).unwrap() as i128;
            let ram_end = ram_start + ram_size - 1;
            self.insert_split_constant("RAMEND", ram_end);
            self.set_word_at(SP_INDEX, ram_end)?;
            self.push_pc = true;
        }

        if self.dev_bus.device_count() > 0 {
            let flash_start = self.dev_bus.device_start(0).unwrap() as i128;
            let flash_end = flash_start + self.dev_bus.device_size(0).unwrap() as i128 - 1;
            self.constants.insert("FLASH_START".to_string(), flash_start);
            self.constants.insert("FLASH_END".to_string(), flash_end);
        }

        for interrupt in &self.interrupts {
            self.constants.insert(interrupt.name().to_string(), interrupt.address());
        }

        self.registers.lock();
        self.setup_done = true;
        Ok(())
    }

    fn insert_split_constant(&mut self, prefix: &str, value: i128) {
        let mask = (1i128 << self.width) - 1;
        let low = value & mask;
        let high = (value >> self.width) & mask;
        self.constants.insert(format!("{prefix}_LOW"), low);
        self.constants.insert(format!("{prefix}_HIGH"), high);
    }

    /// Reinitializes PC, ECR and the cycle counter to zero, and SP to the top of RAM if a RAM
    /// device is present. Device contents are left untouched.
    pub fn reset(&mut self) -> Result<()> {
        self.set_word_at(PC_INDEX, 0)?;
        self.set_word_at(ECR_INDEX, 0)?;
        self.cycles = 0;
        if self.mem_bus.device_count() > 1 {
            let ram_start = self.mem_bus.device_start(1).unwrap() as i128;
            let ram_size = self.mem_bus.device_size(1).unwrap() as i128;
            self.set_word_at(SP_INDEX, ram_start + ram_size - 1)?;
        }
        self.epoch = None;
        Ok(())
    }

    pub fn interrupt(&mut self, address: i128) -> Result<()> {
        if self.push_pc {
            let pc = self.pc()? as i128;
            let sp = self.sp()?;
            self.mem_bus.write_word(sp, Word::with_signed(self.width, pc))?;
            self.set_word_at(SP_INDEX, sp as i128 - 1)?;
        }
        self.set_word_at(PC_INDEX, address)
    }

    pub fn fire_interrupt(&mut self, index: usize) -> Result<()> {
        let (enabled, address) = {
            let ir = &self.interrupts[index];
            (ir.enabled(), ir.address())
        };
        if enabled {
            self.interrupt(address)?;
        }
        Ok(())
    }

    /// Sets the enable flag of the i-th registered interrupt to bit i of `mask`.
    pub fn enable_disable_interrupts(&mut self, mask: u64) {
        for (i, interrupt) in self.interrupts.iter_mut().enumerate() {
            interrupt.set_enabled((mask >> i) & 1 != 0);
        }
    }

    fn decode_operand(arg_type: &ArgType, word: Word) -> Operand {
        match arg_type {
            ArgType::Register { .. } => Operand::Register(word.get_unsigned() as usize),
            ArgType::Constant { .. } => Operand::Constant(word.get_signed()),
        }
    }

    /// Runs one fetch/decode/execute/callback/pace cycle.
    pub fn do_cycle(&mut self) -> Result<()> {
        if matches!(self.pacing, Pacing::Frequency(_)) && self.cycles == 0 && self.epoch.is_none() {
            self.epoch = Some(Instant::now());
        }

        let pc = self.pc()?;
        let opcode_word = self.mem_bus.read_word(pc)?;
        self.set_word_at(PC_INDEX, pc as i128 + 1)?;

        let opcode = opcode_word.get_signed();
        let arity = {
            let instr = self
                .instructions
                .by_opcode(opcode)
                .ok_or(Error::SegmentationFault { pc, opcode })?;
            instr.arity()
        };

        let mut operands = Vec::with_capacity(arity);
        for slot in 0..arity {
            let pc = self.pc()?;
            let word = self.mem_bus.read_word(pc)?;
            self.set_word_at(PC_INDEX, pc as i128 + 1)?;
            let arg_type = self.instructions.by_opcode(opcode).unwrap().arg_types()[slot].clone();
            operands.push(Self::decode_operand(&arg_type, word));
        }

        {
            let instr = self.instructions.by_opcode(opcode).unwrap();
            instr.execute(&mut self.registers, &mut self.mem_bus, &mut self.dev_bus, &operands)?;
        }

        let mut callbacks = std::mem::take(&mut self.cycle_callbacks);
        for callback in callbacks.iter_mut() {
            callback(self);
        }
        self.cycle_callbacks = callbacks;

        match &self.pacing {
            Pacing::None => {}
            Pacing::Frequency(hz) => {
                if let Some(epoch) = self.epoch {
                    let target = Duration::from_secs_f64((self.cycles + 1) as f64 / hz);
                    let elapsed = epoch.elapsed();
                    if target > elapsed {
                        std::thread::sleep(target - elapsed);
                    }
                }
            }
            Pacing::Barrier(barrier) => {
                barrier.wait();
            }
        }

        self.cycles += 1;
        Ok(())
    }

    /// Repeatedly invokes `do_cycle` until the ECR stop bit is set, or a cycle raises a fatal
    /// error.
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.do_cycle()?;
            if self.ecr()? & ENGINE_STOP_BIT != 0 {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::Word;

    fn halt_instruction() -> Instruction {
        Instruction::new(
            "halt",
            0x00,
            vec![],
            Box::new(|regs, _mem, _dev, _ops| regs.write(ECR_INDEX, Word::with_signed(64, 1))),
        )
    }

    #[test]
    fn cycle_count_increases_by_exactly_one_per_successful_cycle() {
        let mut proc = Processor::new(64);
        proc.register_memory_device(Device::rom(8, 64)).unwrap();
        proc.register_command(halt_instruction()).unwrap();
        proc.setup_done().unwrap();
        proc.mem_bus_mut().program_word(0, Word::with_signed(64, 0)).unwrap();

        proc.do_cycle().unwrap();
        assert_eq!(proc.cycles(), 1);
    }

    #[test]
    fn unknown_opcode_is_segmentation_fault() {
        let mut proc = Processor::new(64);
        proc.register_memory_device(Device::rom(8, 64)).unwrap();
        proc.setup_done().unwrap();

        let err = proc.do_cycle();
        assert!(matches!(err, Err(Error::SegmentationFault { .. })));
    }

    #[test]
    fn setup_done_requires_a_rom() {
        let mut proc = Processor::new(64);
        assert!(matches!(proc.setup_done(), Err(Error::Setup(_))));
    }

    #[test]
    fn run_halts_when_ecr_stop_bit_is_set() {
        let mut proc = Processor::new(64);
        proc.register_memory_device(Device::rom(8, 64)).unwrap();
        proc.register_command(halt_instruction()).unwrap();
        proc.setup_done().unwrap();
        proc.mem_bus_mut().program_word(0, Word::with_signed(64, 0)).unwrap();

        proc.run().unwrap();
        assert_eq!(proc.cycles(), 1);
    }

    #[test]
    fn setup_done_with_ram_initializes_sp_to_ram_top_and_enables_push_pc() {
        let mut proc = Processor::new(64);
        proc.register_memory_device(Device::rom(8, 64)).unwrap();
        proc.register_memory_device(Device::ram(16, 64)).unwrap();
        proc.setup_done().unwrap();
        assert_eq!(proc.sp().unwrap(), 8 + 16 - 1);
    }
}

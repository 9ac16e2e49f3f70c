//! Reference instruction catalogs buildable from the component machinery alone: `basic`
//! matches the two-buses/register-indexed instruction set, `accumulator` matches the
//! single-accumulator alternative with sixteen opcodes.

use crate::error::Error;
use crate::instruction::{ArgType, Instruction};
use crate::processor::Processor;
use crate::register::{ECR_INDEX, PC_INDEX, SP_INDEX};
use crate::word::Word;

fn reg(proc_width: u32, value: i128) -> Word {
    Word::with_signed(proc_width, value)
}

/// Integer floor division, matching Python's `//` (and differing from `div_euclid` whenever the
/// divisor is negative).
fn floor_div(a: i128, b: i128) -> i128 {
    let q = a / b;
    if a % b != 0 && (a < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

/// Registers the basic, two-register-operand instruction set (`mov`..`ret`) on `processor`.
/// `out a b` reads register `a` directly rather than dereferencing it through the memory bus;
/// the whole set assumes a single grow-up stack convention where SP always names the next free
/// slot (`push`/`call`/`scall` write-then-increment, `pop`/`ret` decrement-then-read).
pub fn basic(processor: &mut Processor) -> Result<(), Error> {
    processor.register_command(Instruction::new(
        "mov",
        0x01,
        vec![ArgType::register(), ArgType::register()],
        Box::new(|regs, _mem, _dev, ops| {
            let value = regs.read(ops[0].as_register()?)?;
            regs.write(ops[1].as_register()?, value)
        }),
    ))?;

    processor.register_command(Instruction::new(
        "pld",
        0x02,
        vec![ArgType::register(), ArgType::register()],
        Box::new(|regs, mem, _dev, ops| {
            let from = regs.read(ops[0].as_register()?)?.get_unsigned();
            let word = mem.read_word(from)?;
            regs.write(ops[1].as_register()?, word)
        }),
    ))?;

    processor.register_command(Instruction::new(
        "pst",
        0x03,
        vec![ArgType::register(), ArgType::register()],
        Box::new(|regs, mem, _dev, ops| {
            let value = regs.read(ops[0].as_register()?)?;
            let to = regs.read(ops[1].as_register()?)?.get_unsigned();
            mem.write_word(to, value)
        }),
    ))?;

    processor.register_command(Instruction::new(
        "ld",
        0x04,
        vec![ArgType::constant(), ArgType::register()],
        Box::new(|regs, mem, _dev, ops| {
            let word = mem.read_word(ops[0].as_constant() as u128)?;
            regs.write(ops[1].as_register()?, word)
        }),
    ))?;

    processor.register_command(Instruction::new(
        "st",
        0x05,
        vec![ArgType::register(), ArgType::constant()],
        Box::new(|regs, mem, _dev, ops| {
            let value = regs.read(ops[0].as_register()?)?;
            mem.write_word(ops[1].as_constant() as u128, value)
        }),
    ))?;

    arithmetic(processor, "add", 0x06, |a, b| a.wrapping_add(b))?;
    arithmetic(processor, "sub", 0x07, |a, b| a.wrapping_sub(b))?;
    arithmetic(processor, "mul", 0x08, |a, b| a.wrapping_mul(b))?;

    processor.register_command(Instruction::new(
        "div",
        0x09,
        vec![ArgType::register(), ArgType::register()],
        Box::new(|regs, _mem, _dev, ops| {
            let a = regs.read(ops[0].as_register()?)?.get_signed();
            let b_idx = ops[1].as_register()?;
            let b = regs.read(b_idx)?.get_signed();
            if b == 0 {
                return Err(Error::Arithmetic("division by zero in 'div'".to_string()));
            }
            let width = regs.peek(b_idx)?.width();
            regs.write(b_idx, reg(width, floor_div(a, b)))
        }),
    ))?;

    processor.register_command(Instruction::new(
        "jmp",
        0x0a,
        vec![ArgType::constant()],
        Box::new(|regs, _mem, _dev, ops| {
            let pc = regs.peek(PC_INDEX)?;
            let width = pc.width();
            let target = pc.get_signed() + ops[0].as_constant() - 2;
            regs.write(PC_INDEX, reg(width, target))
        }),
    ))?;

    processor.register_command(Instruction::new(
        "in",
        0x0b,
        vec![ArgType::register(), ArgType::register()],
        Box::new(|regs, _mem, dev, ops| {
            let from = regs.read(ops[0].as_register()?)?.get_unsigned();
            let word = dev.read_word(from)?;
            regs.write(ops[1].as_register()?, word)
        }),
    ))?;

    processor.register_command(Instruction::new(
        "out",
        0x0c,
        vec![ArgType::register(), ArgType::register()],
        Box::new(|regs, _mem, dev, ops| {
            let value = regs.read(ops[0].as_register()?)?;
            let to = regs.read(ops[1].as_register()?)?.get_unsigned();
            dev.write_word(to, value)
        }),
    ))?;

    processor.register_command(Instruction::new(
        "inc",
        0x0d,
        vec![ArgType::register()],
        Box::new(|regs, _mem, _dev, ops| {
            let idx = ops[0].as_register()?;
            let w = regs.read(idx)?;
            let width = w.width();
            regs.write(idx, reg(width, w.get_signed() + 1))
        }),
    ))?;

    processor.register_command(Instruction::new(
        "dec",
        0x0f,
        vec![ArgType::register()],
        Box::new(|regs, _mem, _dev, ops| {
            let idx = ops[0].as_register()?;
            let w = regs.read(idx)?;
            let width = w.width();
            regs.write(idx, reg(width, w.get_signed() - 1))
        }),
    ))?;

    branch(processor, "jne", 0x10, |x| x != 0)?;
    branch(processor, "jeq", 0x11, |x| x == 0)?;
    branch(processor, "jle", 0x12, |x| x <= 0)?;
    branch(processor, "jlt", 0x13, |x| x < 0)?;
    branch(processor, "jge", 0x14, |x| x >= 0)?;
    branch(processor, "jgt", 0x15, |x| x > 0)?;

    processor.register_command(Instruction::new(
        "ldi",
        0x16,
        vec![ArgType::constant(), ArgType::register()],
        Box::new(|regs, _mem, _dev, ops| {
            let idx = ops[1].as_register()?;
            let width = regs.peek(idx)?.width();
            regs.write(idx, reg(width, ops[0].as_constant()))
        }),
    ))?;

    processor.register_command(Instruction::new(
        "sjmp",
        0x17,
        vec![ArgType::constant()],
        Box::new(|regs, _mem, _dev, ops| {
            let width = regs.peek(PC_INDEX)?.width();
            regs.write(PC_INDEX, reg(width, ops[0].as_constant() - 2))
        }),
    ))?;

    processor.register_command(Instruction::new(
        "push",
        0x18,
        vec![ArgType::register()],
        Box::new(|regs, mem, _dev, ops| {
            let value = regs.read(ops[0].as_register()?)?;
            let sp = regs.peek(SP_INDEX)?;
            let width = sp.width();
            mem.write_word(sp.get_unsigned(), value)?;
            regs.write(SP_INDEX, reg(width, sp.get_signed() + 1))
        }),
    ))?;

    processor.register_command(Instruction::new(
        "pop",
        0x19,
        vec![ArgType::register()],
        Box::new(|regs, mem, _dev, ops| {
            let sp = regs.peek(SP_INDEX)?;
            let width = sp.width();
            let new_sp = sp.get_signed() - 1;
            regs.write(SP_INDEX, reg(width, new_sp))?;
            let word = mem.read_word(reg(width, new_sp).get_unsigned())?;
            regs.write(ops[0].as_register()?, word)
        }),
    ))?;

    processor.register_command(Instruction::new(
        "call",
        0x1a,
        vec![ArgType::constant()],
        Box::new(|regs, mem, _dev, ops| {
            let pc = regs.peek(PC_INDEX)?;
            let width = pc.width();
            let sp = regs.peek(SP_INDEX)?;
            mem.write_word(sp.get_unsigned(), pc)?;
            regs.write(SP_INDEX, reg(width, sp.get_signed() + 1))?;
            let target = pc.get_signed() + ops[0].as_constant() - 2;
            regs.write(PC_INDEX, reg(width, target))
        }),
    ))?;

    processor.register_command(Instruction::new(
        "scall",
        0x1b,
        vec![ArgType::constant()],
        Box::new(|regs, mem, _dev, ops| {
            let pc = regs.peek(PC_INDEX)?;
            let width = pc.width();
            let sp = regs.peek(SP_INDEX)?;
            mem.write_word(sp.get_unsigned(), pc)?;
            regs.write(SP_INDEX, reg(width, sp.get_signed() + 1))?;
            regs.write(PC_INDEX, reg(width, ops[0].as_constant() - 2))
        }),
    ))?;

    processor.register_command(Instruction::new(
        "ret",
        0x1c,
        vec![],
        Box::new(|regs, mem, _dev, _ops| {
            let sp = regs.peek(SP_INDEX)?;
            let width = sp.width();
            let new_sp = sp.get_signed() - 1;
            regs.write(SP_INDEX, reg(width, new_sp))?;
            let pc = mem.read_word(reg(width, new_sp).get_unsigned())?;
            regs.write(PC_INDEX, pc)
        }),
    ))?;

    Ok(())
}

fn arithmetic(
    processor: &mut Processor,
    mnemonic: &'static str,
    opcode: i128,
    f: fn(i128, i128) -> i128,
) -> Result<(), Error> {
    processor.register_command(Instruction::new(
        mnemonic,
        opcode,
        vec![ArgType::register(), ArgType::register()],
        Box::new(move |regs, _mem, _dev, ops| {
            let a = regs.read(ops[0].as_register()?)?.get_signed();
            let b_idx = ops[1].as_register()?;
            let b = regs.read(b_idx)?.get_signed();
            let width = regs.peek(b_idx)?.width();
            regs.write(b_idx, reg(width, f(a, b)))
        }),
    ))
}

fn branch(
    processor: &mut Processor,
    mnemonic: &'static str,
    opcode: i128,
    predicate: fn(i128) -> bool,
) -> Result<(), Error> {
    processor.register_command(Instruction::new(
        mnemonic,
        opcode,
        vec![ArgType::register(), ArgType::constant()],
        Box::new(move |regs, _mem, _dev, ops| {
            let a = regs.read(ops[0].as_register()?)?.get_signed();
            if predicate(a) {
                let pc = regs.peek(PC_INDEX)?;
                let width = pc.width();
                let target = pc.get_signed() + ops[1].as_constant() - 3;
                regs.write(PC_INDEX, reg(width, target))?;
            }
            Ok(())
        }),
    ))
}

/// Registers the alternative accumulator-based instruction set: a single named `A` register,
/// sixteen opcodes, all jumps setting PC directly (no fetch-phase compensation, unlike `basic`).
pub fn accumulator(processor: &mut Processor) -> Result<(), Error> {
    let width = processor.width();
    processor.add_register(crate::register::Register::plain("A", width))?;

    processor.register_command(Instruction::new(
        "DLOAD",
        0x01,
        vec![ArgType::constant()],
        Box::new(|regs, _mem, _dev, ops| {
            let width = regs.peek("A")?.width();
            regs.write("A", reg(width, ops[0].as_constant()))
        }),
    ))?;

    processor.register_command(Instruction::new(
        "LOAD",
        0x02,
        vec![ArgType::register()],
        Box::new(|regs, _mem, _dev, ops| {
            let value = regs.read(ops[0].as_register()?)?;
            regs.write("A", value)
        }),
    ))?;

    processor.register_command(Instruction::new(
        "STORE",
        0x03,
        vec![ArgType::register()],
        Box::new(|regs, _mem, _dev, ops| {
            let value = regs.read("A")?;
            regs.write(ops[0].as_register()?, value)
        }),
    ))?;

    acc_arithmetic(processor, "ADD", 0x04, |a, b| a.wrapping_add(b))?;
    acc_arithmetic(processor, "SUB", 0x05, |a, b| a.wrapping_sub(b))?;
    acc_arithmetic(processor, "MULT", 0x06, |a, b| a.wrapping_mul(b))?;

    processor.register_command(Instruction::new(
        "DIV",
        0x07,
        vec![ArgType::register()],
        Box::new(|regs, _mem, _dev, ops| {
            let a = regs.read("A")?.get_signed();
            let b = regs.read(ops[0].as_register()?)?.get_signed();
            if b == 0 {
                return Err(Error::Arithmetic("division by zero in 'DIV'".to_string()));
            }
            let width = regs.peek("A")?.width();
            regs.write("A", reg(width, floor_div(a, b)))
        }),
    ))?;

    processor.register_command(Instruction::new(
        "JUMP",
        0x08,
        vec![ArgType::constant()],
        Box::new(|regs, _mem, _dev, ops| {
            let width = regs.peek(PC_INDEX)?.width();
            regs.write(PC_INDEX, reg(width, ops[0].as_constant()))
        }),
    ))?;

    processor.register_command(Instruction::new(
        "HALT",
        0x09,
        vec![],
        Box::new(|regs, _mem, _dev, _ops| regs.write(ECR_INDEX, reg(regs.peek(ECR_INDEX)?.width(), 1))),
    ))?;

    acc_branch(processor, "JNE", 0x0a, |x| x != 0)?;
    acc_branch(processor, "JEQ", 0x0b, |x| x == 0)?;
    acc_branch(processor, "JLT", 0x0c, |x| x < 0)?;
    acc_branch(processor, "JLE", 0x0d, |x| x <= 0)?;
    acc_branch(processor, "JGT", 0x0f, |x| x > 0)?;
    acc_branch(processor, "JGE", 0x10, |x| x >= 0)?;

    Ok(())
}

fn acc_arithmetic(
    processor: &mut Processor,
    mnemonic: &'static str,
    opcode: i128,
    f: fn(i128, i128) -> i128,
) -> Result<(), Error> {
    processor.register_command(Instruction::new(
        mnemonic,
        opcode,
        vec![ArgType::register()],
        Box::new(move |regs, _mem, _dev, ops| {
            let a = regs.read("A")?.get_signed();
            let b = regs.read(ops[0].as_register()?)?.get_signed();
            let width = regs.peek("A")?.width();
            regs.write("A", reg(width, f(a, b)))
        }),
    ))
}

fn acc_branch(
    processor: &mut Processor,
    mnemonic: &'static str,
    opcode: i128,
    predicate: fn(i128) -> bool,
) -> Result<(), Error> {
    processor.register_command(Instruction::new(
        mnemonic,
        opcode,
        vec![ArgType::constant()],
        Box::new(move |regs, _mem, _dev, ops| {
            let a = regs.read("A")?.get_signed();
            if predicate(a) {
                let width = regs.peek(PC_INDEX)?.width();
                regs.write(PC_INDEX, reg(width, ops[0].as_constant()))?;
            }
            Ok(())
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Device;

    #[test]
    fn immediate_load_and_halt() {
        let mut proc = Processor::new(64);
        proc.register_memory_device(Device::rom(8, 64)).unwrap();
        basic(&mut proc).unwrap();
        proc.setup_done().unwrap();

        proc.mem_bus_mut().program(0, [reg(64, 0x16), reg(64, 1), reg(64, 1)]).unwrap();
        proc.run().unwrap();
        assert_eq!(proc.cycles(), 1);
    }

    #[test]
    fn sum_of_5_and_minus_3() {
        let mut proc = Processor::new(64);
        proc.register_memory_device(Device::rom(32, 64)).unwrap();
        proc.add_register(crate::register::Register::plain("r0", 64)).unwrap();
        proc.add_register(crate::register::Register::plain("r1", 64)).unwrap();
        basic(&mut proc).unwrap();
        proc.setup_done().unwrap();

        let program = [
            reg(64, 0x16), reg(64, 5), reg(64, 3),
            reg(64, 0x16), reg(64, -3), reg(64, 4),
            reg(64, 0x06), reg(64, 3), reg(64, 4),
            reg(64, 0x16), reg(64, 1), reg(64, 1),
        ];
        proc.mem_bus_mut().program(0, program).unwrap();
        proc.run().unwrap();
        assert_eq!(proc.registers_mut().read(4usize).unwrap().get_signed(), 2);
        assert_eq!(proc.cycles(), 4);
    }

    #[test]
    fn forward_branch_skips_instruction() {
        let mut proc = Processor::new(64);
        proc.register_memory_device(Device::rom(32, 64)).unwrap();
        proc.add_register(crate::register::Register::plain("r0", 64)).unwrap();
        basic(&mut proc).unwrap();
        proc.setup_done().unwrap();

        // ldi 0 r0; jeq r0 skip(3+3=6 words away -> c=9 to land after ldi 99 r0); ldi 99 r0; ldi 1 ECR
        let program = [
            reg(64, 0x16), reg(64, 0), reg(64, 3),
            reg(64, 0x11), reg(64, 3), reg(64, 6),
            reg(64, 0x16), reg(64, 99), reg(64, 3),
            reg(64, 0x16), reg(64, 1), reg(64, 1),
        ];
        proc.mem_bus_mut().program(0, program).unwrap();
        proc.run().unwrap();
        assert_eq!(proc.registers_mut().read(3usize).unwrap().get_signed(), 0);
    }

    #[test]
    fn call_and_ret_restore_stack_pointer() {
        let mut proc = Processor::new(64);
        proc.register_memory_device(Device::rom(32, 64)).unwrap();
        proc.register_memory_device(Device::ram(16, 64)).unwrap();
        proc.add_register(crate::register::Register::plain("r0", 64)).unwrap();
        basic(&mut proc).unwrap();
        proc.setup_done().unwrap();
        let sp_before = proc.sp().unwrap();

        // ldi 7 r0; call addone(@5); ldi 1 ECR; addone: inc r0; ret
        let program = [
            reg(64, 0x16), reg(64, 7), reg(64, 3),
            reg(64, 0x1a), reg(64, 5),
            reg(64, 0x16), reg(64, 1), reg(64, 1),
            reg(64, 0x0d), reg(64, 3),
            reg(64, 0x1c),
        ];
        proc.mem_bus_mut().program(0, program).unwrap();
        proc.run().unwrap();
        assert_eq!(proc.registers_mut().read(3usize).unwrap().get_signed(), 8);
        assert_eq!(proc.sp().unwrap(), sp_before);
    }

    #[test]
    fn divide_by_zero_is_fatal_not_a_panic() {
        let mut proc = Processor::new(64);
        proc.register_memory_device(Device::rom(16, 64)).unwrap();
        proc.add_register(crate::register::Register::plain("r0", 64)).unwrap();
        proc.add_register(crate::register::Register::plain("r1", 64)).unwrap();
        basic(&mut proc).unwrap();
        proc.setup_done().unwrap();

        let program = [
            reg(64, 0x16), reg(64, 0), reg(64, 4),
            reg(64, 0x09), reg(64, 3), reg(64, 4),
        ];
        proc.mem_bus_mut().program(0, program).unwrap();
        let err = proc.run();
        assert!(matches!(err, Err(Error::Arithmetic(_))));
    }

    #[test]
    fn div_floors_toward_negative_infinity_like_python() {
        let mut proc = Processor::new(64);
        proc.register_memory_device(Device::rom(16, 64)).unwrap();
        proc.add_register(crate::register::Register::plain("r0", 64)).unwrap();
        proc.add_register(crate::register::Register::plain("r1", 64)).unwrap();
        basic(&mut proc).unwrap();
        proc.setup_done().unwrap();

        // ldi 7 r0; ldi -2 r1; div r0 r1  =>  r1 = 7 // -2 == -4 (not div_euclid's -3).
        let program = [
            reg(64, 0x16), reg(64, 7), reg(64, 3),
            reg(64, 0x16), reg(64, -2), reg(64, 4),
            reg(64, 0x09), reg(64, 3), reg(64, 4),
            reg(64, 0x16), reg(64, 1), reg(64, 1),
        ];
        proc.mem_bus_mut().program(0, program).unwrap();
        proc.run().unwrap();
        assert_eq!(proc.registers_mut().read(4usize).unwrap().get_signed(), -4);
    }

    #[test]
    fn div_of_two_negatives_floors_like_python() {
        let mut proc = Processor::new(64);
        proc.register_memory_device(Device::rom(16, 64)).unwrap();
        proc.add_register(crate::register::Register::plain("r0", 64)).unwrap();
        proc.add_register(crate::register::Register::plain("r1", 64)).unwrap();
        basic(&mut proc).unwrap();
        proc.setup_done().unwrap();

        // ldi -7 r0; ldi -2 r1; div r0 r1  =>  r1 = -7 // -2 == 3.
        let program = [
            reg(64, 0x16), reg(64, -7), reg(64, 3),
            reg(64, 0x16), reg(64, -2), reg(64, 4),
            reg(64, 0x09), reg(64, 3), reg(64, 4),
            reg(64, 0x16), reg(64, 1), reg(64, 1),
        ];
        proc.mem_bus_mut().program(0, program).unwrap();
        proc.run().unwrap();
        assert_eq!(proc.registers_mut().read(4usize).unwrap().get_signed(), 3);
    }
}

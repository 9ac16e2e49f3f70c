use crate::processor::Processor;

/// A named interrupt: an address to jump to, and an enable flag the processor consults before
/// delivering it. The processor looks interrupts up by their registration index rather than the
/// interrupt holding a reference back to its processor.
pub struct Interrupt {
    name: String,
    address: i128,
    enabled: bool,
}

impl Interrupt {
    pub fn new(name: impl Into<String>, address: i128) -> Interrupt {
        Interrupt {
            name: name.into(),
            address,
            enabled: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> i128 {
        self.address
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

/// Registers a counter: a cycle callback that increments an internal count on every cycle and,
/// once it reaches `threshold`, resets to zero and fires the interrupt registered at `address`.
/// Returns the interrupt's registration index.
pub fn add_counter(processor: &mut Processor, name: impl Into<String>, address: i128, threshold: u64) -> usize {
    let index = processor.add_interrupt(Interrupt::new(name, address));
    let mut count: u64 = 0;
    processor.register_on_cycle_callback(Box::new(move |proc: &mut Processor| {
        count += 1;
        if count >= threshold {
            count = 0;
            let _ = proc.fire_interrupt(index);
        }
    }));
    index
}

/// Same as `add_counter` but always targets address 0.
pub fn add_autoreset(processor: &mut Processor, name: impl Into<String>, threshold: u64) -> usize {
    add_counter(processor, name, 0, threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Device;
    use crate::instruction::Instruction;

    fn nop() -> Instruction {
        Instruction::new("nop", 0x00, vec![], Box::new(|_, _, _, _| Ok(())))
    }

    #[test]
    fn counter_fires_interrupt_after_threshold_cycles() {
        let mut proc = Processor::new(8);
        proc.register_memory_device(Device::rom(16, 8)).unwrap();
        proc.register_command(nop()).unwrap();
        proc.setup_done().unwrap();

        add_counter(&mut proc, "tick", 5, 3);

        proc.do_cycle().unwrap();
        assert_ne!(proc.pc().unwrap(), 5);
        proc.do_cycle().unwrap();
        proc.do_cycle().unwrap();
        assert_eq!(proc.pc().unwrap(), 5);
    }
}

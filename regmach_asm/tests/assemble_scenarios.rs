use regmach_asm::Assembler;
use regmach_core::{catalogs, Device, Processor, Register};

fn basic_machine() -> Processor {
    let mut proc = Processor::new(64);
    proc.register_memory_device(Device::rom(64, 64)).unwrap();
    proc.register_memory_device(Device::ram(16, 64)).unwrap();
    proc.add_register(Register::plain("r0", 64)).unwrap();
    proc.add_register(Register::plain("r1", 64)).unwrap();
    catalogs::basic(&mut proc).unwrap();
    proc.setup_done().unwrap();
    proc
}

#[test]
fn assembled_program_runs_to_completion_on_its_target_processor() {
    let mut proc = basic_machine();
    let mut asm = Assembler::new(&proc);
    let image = asm
        .assemble(
            "ldi 5 r0\n\
             ldi -3 r1\n\
             add r0 r1\n\
             ldi 1 ecr\n",
        )
        .unwrap();

    proc.mem_bus_mut().program(0, image).unwrap();
    proc.run().unwrap();
    assert_eq!(proc.registers_mut().read("r1").unwrap().get_signed(), 2);
}

#[test]
fn call_and_ret_roundtrip_through_a_label() {
    let mut proc = basic_machine();
    let mut asm = Assembler::new(&proc);
    let image = asm
        .assemble(
            "ldi 7 r0\n\
             call addone\n\
             ldi 1 ecr\n\
             addone:\n\
             inc r0\n\
             ret\n",
        )
        .unwrap();

    let sp_before = proc.sp().unwrap();
    proc.mem_bus_mut().program(0, image).unwrap();
    proc.run().unwrap();
    assert_eq!(proc.registers_mut().read("r0").unwrap().get_signed(), 8);
    assert_eq!(proc.sp().unwrap(), sp_before);
}

#[test]
fn duplicate_label_names_both_conflicting_lines() {
    let proc = basic_machine();
    let mut asm = Assembler::new(&proc);
    let err = asm.assemble("start:\nldi 1 ecr\nstart:\n").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("start"));
    assert!(message.contains("already defined at line 1"));
}

#[test]
fn zeros_buffer_reserves_words_addressable_by_absolute_offset() {
    let proc = basic_machine();
    let mut asm = Assembler::new(&proc);
    let image = asm
        .assemble(
            "ld buf r0\n\
             ldi 1 ecr\n\
             .zeros buf 4\n",
        )
        .unwrap();

    // 'ld' occupies words 0..3, 'ldi' occupies words 3..6, so 'buf' starts at word 6.
    assert_eq!(image[1].get_signed(), 6);
    assert_eq!(image.len(), 10);
    assert!(image[6..10].iter().all(|w| w.get_signed() == 0));
}

#[test]
fn unknown_mnemonic_is_rejected_before_any_word_is_emitted() {
    let proc = basic_machine();
    let mut asm = Assembler::new(&proc);
    let err = asm.assemble("bogus r0 r1\n").unwrap_err();
    assert!(err.to_string().contains("unknown mnemonic"));
}

use arch::{EncodeTable, Reg};
use asm::assemble_text;
use asm::error::ErrorKind;
use obj::{Binding, RelocType};

fn assemble(src: &str) -> obj::ObjectFile {
    assemble_text(src, "test.asm").unwrap()
}

#[test]
fn minimal_program() {
    // .text bytes: ldi8 opcode for XH, the immediate, then hlt.
    let object = assemble(".text\nmain:\n  ldi xh, 0xFF\n  hlt\n");
    let table = EncodeTable::global();

    assert_eq!(
        object.sections[0].data,
        vec![
            table.ldi_imm8_opcode(Reg::XH).unwrap(),
            0xFF,
            table.find("hlt", &[]).unwrap().opcode,
        ]
    );
    assert!(object.reloc_entries.is_empty());

    assert_eq!(object.symbols.len(), 1);
    let main = &object.symbols[0];
    assert_eq!(main.name, "main");
    assert_eq!(main.section_index, 0);
    assert_eq!(main.value, 0);
}

#[test]
fn word_in_data_is_big_endian() {
    let object = assemble(".data\nv: .word 0xBEEF\n");
    assert_eq!(object.sections[1].data, vec![0xBE, 0xEF]);
    assert!(object.sections[0].data.is_empty());

    let v = object.symbols.iter().find(|s| s.name == "v").unwrap();
    assert_eq!(v.section_index, 1);
    assert_eq!(v.value, 0);
}

#[test]
fn asciz_appends_nul() {
    let object = assemble(".rodata\nmsg: .asciz \"hi\"\n");
    assert_eq!(object.sections[3].data, vec![0x68, 0x69, 0x00]);

    let msg = object.symbols.iter().find(|s| s.name == "msg").unwrap();
    assert_eq!(msg.section_index, 3);
    assert_eq!(msg.value, 0);
}

#[test]
fn byte_string_escapes() {
    let object = assemble(".rodata\n.byte \"\\n\\0x\"\n");
    assert_eq!(object.sections[3].data, vec![0x0A, 0x00, 0x78]);
}

#[test]
fn unsupported_escape_is_rejected() {
    let err = assemble_text(".rodata\n.byte \"\\q\"\n", "test.asm").unwrap_err();
    assert_eq!(err.kind, ErrorKind::BadEscape);
    assert_eq!(err.loc.line, 2);
}

#[test]
fn extern_reference_emits_zero_and_reloc() {
    let object = assemble(".extern ext\n.text\nmain:\n  jmp ext\n");
    let table = EncodeTable::global();

    let jmp = table.find("jmp", &[arch::OperandType::Imm16]).unwrap();
    assert_eq!(object.sections[0].data, vec![jmp.opcode, 0x00, 0x00]);

    assert_eq!(object.reloc_entries.len(), 1);
    let reloc = &object.reloc_entries[0];
    assert_eq!(reloc.section_index, 0);
    assert_eq!(reloc.offset, 1);
    assert_eq!(reloc.ty, RelocType::Abs16);
    assert_eq!(reloc.addend, 0);

    let sym = &object.symbols[reloc.symbol_index as usize];
    assert_eq!(sym.name, "ext");
    assert_eq!(sym.section_index, -1);
    assert_eq!(sym.bind, u8::from(Binding::Global));
}

#[test]
fn defined_reference_keeps_provisional_address_and_reloc() {
    let object = assemble(".text\nmain:\n  jmp main\n");
    let table = EncodeTable::global();
    let jmp = table.find("jmp", &[arch::OperandType::Imm16]).unwrap();

    // main is at .text offset 0, provisional base 0.
    assert_eq!(object.sections[0].data, vec![jmp.opcode, 0x00, 0x00]);
    assert_eq!(object.reloc_entries.len(), 1);
    let sym = &object.symbols[object.reloc_entries[0].symbol_index as usize];
    assert_eq!(sym.name, "main");
    assert_eq!(sym.section_index, 0);
}

#[test]
fn rodata_label_reference_uses_text_size_as_base() {
    let object = assemble(
        ".rodata\nmsg: .asciz \"hi\"\n.text\nmain:\n  ldi x, msg\n  hlt\n",
    );
    // Provisional .rodata base equals the final .text size (4 bytes).
    assert_eq!(object.sections[0].data.len(), 4);
    assert_eq!(&object.sections[0].data[1..3], &[0x00, 0x04]);
}

#[test]
fn word_symbol_in_rodata_is_zero_placeholder_plus_reloc() {
    let object = assemble(".text\nlabel:\n  hlt\n.rodata\nptr: .word label\n");
    assert_eq!(object.sections[3].data, vec![0x00, 0x00]);

    let reloc = object
        .reloc_entries
        .iter()
        .find(|r| r.section_index == 3)
        .unwrap();
    assert_eq!(reloc.offset, 0);
    let sym = &object.symbols[reloc.symbol_index as usize];
    assert_eq!(sym.name, "label");
}

#[test]
fn inline_text_data_keeps_stream_order() {
    let object = assemble(".text\n  nop\n.byte 0xAA\n  hlt\n.word 0x1234\n");
    let table = EncodeTable::global();
    assert_eq!(
        object.sections[0].data,
        vec![
            table.find("nop", &[]).unwrap().opcode,
            0xAA,
            table.find("hlt", &[]).unwrap().opcode,
            0x12,
            0x34,
        ]
    );
}

#[test]
fn text_word_label_is_relocated() {
    let object = assemble(".text\nstart:\n  nop\n.word start\n");
    assert_eq!(object.sections[0].data.len(), 3);
    assert_eq!(&object.sections[0].data[1..3], &[0x00, 0x00]);
    let reloc = &object.reloc_entries[0];
    assert_eq!((reloc.section_index, reloc.offset), (0, 1));
}

#[test]
fn symbols_are_sorted_by_name() {
    let object = assemble(".text\nzulu:\n  nop\nalpha:\n  nop\nmike:\n  hlt\n");
    let names: Vec<_> = object.symbols.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "mike", "zulu"]);
}

#[test]
fn data_relocs_precede_text_relocs() {
    let object = assemble(
        ".extern ext\n.text\nmain:\n  jmp ext\n.rodata\nptr: .word ext\n",
    );
    let sections: Vec<_> = object
        .reloc_entries
        .iter()
        .map(|r| r.section_index)
        .collect();
    assert_eq!(sections, vec![3, 0]);
}

#[test]
fn object_round_trips_through_container() {
    let object = assemble(
        ".extern ext\n.globl main\n.text\nmain:\n  ldi xh, 1\n  jmp ext\n.data\nv: .word main\n.rodata\nmsg: .ascii \"ok\"\n.bss\nbuf:\n",
    );
    let bytes = obj::to_bytes(&object).unwrap();
    let back = obj::from_bytes(&bytes).unwrap();
    assert_eq!(object, back);
}

#[test]
fn mov_and_register_families() {
    let object = assemble(".text\n  mov ac, xh\n  mov sp, z\n  ld fr, [0x1234]\n  st [0x1234], yl\n  ldi sp, 0x8000\n");
    let table = EncodeTable::global();
    assert_eq!(
        object.sections[0].data,
        vec![
            table.mov_opcode(Reg::AC, Reg::XH).unwrap(),
            table.mov_opcode(Reg::SP, Reg::Z).unwrap(),
            table.ld_abs16_opcode(Reg::FR).unwrap(),
            0x12,
            0x34,
            table.st_abs16_opcode(Reg::YL).unwrap(),
            0x12,
            0x34,
            table.ldi_imm16_opcode(Reg::SP).unwrap(),
            0x80,
            0x00,
        ]
    );
}

#[test]
fn text_size_matches_pass1() {
    // Pass 2 cross-checks emitted bytes against the pass-1 counters;
    // a mix of widths and inline data exercises the bookkeeping.
    let object = assemble(
        ".text\nstart:\n  push pc\n  ldi y, 0x1FF\n  call start\n.ascii \"xyz\"\n  ret\n",
    );
    assert_eq!(object.sections[0].data.len(), 1 + 3 + 3 + 3 + 1);
}

#[test]
fn bss_size_is_recorded_without_bytes() {
    let object = assemble(".bss\nbuf:\nmark:\n");
    assert_eq!(object.sections[2].bss_size, 0);
    assert!(object.sections[2].data.is_empty());
}

#[test]
fn line_markers_relocate_diagnostics() {
    let err = assemble_text("# 40 \"inc.asm\"\nbogus_op\n", "test.asm").unwrap_err();
    assert_eq!(err.loc.file, "inc.asm");
    assert_eq!(err.loc.line, 40);
    assert_eq!(
        err.kind,
        ErrorKind::UnknownInstruction("bogus_op".to_string())
    );
}

use std::process::ExitCode;

use color_print::{cformat, cprintln};
use obj::{bind_name, ObjectFile, FLAG_EXEC, FLAG_READ, FLAG_WRITE};

#[derive(Debug, clap::Parser)]
#[clap(name = "cpu8-objdump", version, about = "Dump a CPU8 relocatable object file")]
struct Args {
    /// Object file to dump
    input: String,
}

fn flags_string(flags: u8) -> String {
    let mut out = String::new();
    out.push(if flags & FLAG_READ != 0 { 'R' } else { '-' });
    out.push(if flags & FLAG_WRITE != 0 { 'W' } else { '-' });
    out.push(if flags & FLAG_EXEC != 0 { 'X' } else { '-' });
    out
}

fn hex_dump(data: &[u8]) {
    for (row, chunk) in data.chunks(16).enumerate() {
        let bytes = chunk
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(" ");
        let ascii: String = chunk
            .iter()
            .map(|&b| {
                if (0x20..0x7F).contains(&b) {
                    b as char
                } else {
                    '.'
                }
            })
            .collect();
        println!("  {:04X}  {bytes:<47}  |{ascii}|", row * 16);
    }
}

fn dump(object: &ObjectFile) {
    cprintln!("<cyan,bold>Sections:</>");
    println!("  {:<8} {:<5} {:>9} {:>9}", "name", "flags", "data", "bss");
    for section in &object.sections {
        println!(
            "  {:<8} {:<5} {:>9} {:>9}",
            section.name,
            flags_string(section.flags),
            section.data.len(),
            section.bss_size
        );
    }

    cprintln!("\n<cyan,bold>Symbols:</> ({})", object.symbols.len());
    for (index, sym) in object.symbols.iter().enumerate() {
        let section = match usize::try_from(sym.section_index) {
            Ok(i) if i < object.sections.len() => object.sections[i].name.as_str(),
            _ => "*UNDEF*",
        };
        println!(
            "  [{index:>3}] 0x{:04X} {:<6} {:<8} {}",
            sym.value,
            bind_name(sym.bind),
            section,
            sym.name
        );
    }

    cprintln!("\n<cyan,bold>Relocations:</> ({})", object.reloc_entries.len());
    for reloc in &object.reloc_entries {
        let section = object
            .sections
            .get(reloc.section_index as usize)
            .map_or("<invalid>", |s| s.name.as_str());
        let symbol = object
            .symbols
            .get(reloc.symbol_index as usize)
            .map_or("<invalid>", |s| s.name.as_str());
        println!(
            "  {section:<8} +0x{:04X} ABS16 {symbol} addend={}",
            reloc.offset, reloc.addend
        );
    }

    for section in &object.sections {
        if section.data.is_empty() {
            continue;
        }
        cprintln!("\n<cyan,bold>Contents of {}:</>", section.name);
        hex_dump(&section.data);
    }
}

fn main() -> ExitCode {
    use clap::Parser;

    let args = Args::parse();
    match obj::read_from_file(&args.input) {
        Ok(object) => {
            println!("{}:", args.input);
            dump(&object);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", cformat!("<red,bold>error</>: {err}"));
            ExitCode::FAILURE
        }
    }
}

use std::process::ExitCode;

use color_print::cformat;
use ld::{link, LinkOptions};

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

/// Accepts decimal, `0x` hex and `0b` binary, like the assembler's
/// own literals.
fn parse_number_arg(s: &str) -> Result<u32, String> {
    let (digits, radix) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
    {
        (hex, 16)
    } else if let Some(bin) = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
        (bin, 2)
    } else {
        (s, 10)
    };
    u32::from_str_radix(digits, radix).map_err(|_| format!("invalid numeric value: '{s}'"))
}

fn parse_fill_arg(s: &str) -> Result<u8, String> {
    let value = parse_number_arg(s)?;
    u8::try_from(value).map_err(|_| format!("ROM fill byte out of range (0-255): '{s}'"))
}

#[derive(Debug, clap::Parser)]
#[clap(name = "cpu8-ld", version, about = "Linker for CPU8 relocatable objects", help_template = HELP_TEMPLATE)]
struct Args {
    /// Output ROM image
    output: String,

    /// Input object files
    #[clap(required = true)]
    inputs: Vec<String>,

    /// Write a map file
    #[clap(long, value_name = "FILE")]
    map: Option<String>,

    /// Entry symbol
    #[clap(long, default_value = "main")]
    entry: String,

    /// ROM image size in bytes (0 disables padding)
    #[clap(long, default_value = "16384", value_parser = parse_number_arg)]
    rom_size: u32,

    /// Fill byte for ROM padding
    #[clap(long, default_value = "0xFF", value_parser = parse_fill_arg)]
    rom_fill: u8,
}

fn run(args: &Args) -> Result<(), String> {
    let mut objects = Vec::with_capacity(args.inputs.len());
    for path in &args.inputs {
        objects.push(obj::read_from_file(path).map_err(|err| err.to_string())?);
    }

    let options = LinkOptions {
        rom_size: args.rom_size,
        rom_fill: args.rom_fill,
        entry_symbol: args.entry.clone(),
        ..LinkOptions::default()
    };

    let image = link(&objects, &options).map_err(|err| err.to_string())?;

    ld::image::write_bin(&args.output, &image.rom).map_err(|err| err.to_string())?;

    if let Some(map_path) = &args.map {
        std::fs::write(map_path, image.render_map())
            .map_err(|err| format!("unable to open map file: {map_path}: {err}"))?;
    }

    println!("Linked OK: {}", args.output);
    println!(
        " .text={} bytes .rodata={} bytes .bss={} bytes (ROM={} bytes)",
        image.text_size,
        image.rodata_size,
        image.bss_size,
        image.rom.len()
    );
    Ok(())
}

fn main() -> ExitCode {
    use clap::Parser;

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}", cformat!("<red,bold>link error</>: {message}"));
            ExitCode::FAILURE
        }
    }
}

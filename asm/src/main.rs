use std::process::{Command, ExitCode};

use color_print::cformat;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, clap::Parser)]
#[clap(name = "cpu8-asm", version, about = "Assembler for the CPU8 ISA", help_template = HELP_TEMPLATE)]
struct Args {
    /// Input assembly file
    input: String,

    /// Output file (alternative to -o)
    output: Option<String>,

    /// Output path (bin or obj)
    #[clap(short = 'o', value_name = "FILE")]
    out: Option<String>,

    /// Emit a relocatable object (.o) instead of a flat ROM image
    #[clap(long)]
    object: bool,

    /// Do not run the external preprocessor
    #[clap(long)]
    no_preprocess: bool,

    /// Print section size summary
    #[clap(long)]
    verbose: bool,
}

const ROM_SIZE: u32 = 16 * 1024;
const ROM_FILL: u8 = 0xFF;

/// Runs `cpp -E` over the input and returns the preprocessed text with
/// its `# <line> "<file>"` markers intact.
fn run_preprocessor(path: &str) -> Result<String, String> {
    let output = Command::new("cpp")
        .arg("-E")
        .arg(path)
        .output()
        .map_err(|err| format!("failed to invoke preprocessor: cpp: {err}"))?;

    if !output.status.success() {
        return Err(format!("preprocessor failed for file: {path}"));
    }
    String::from_utf8(output.stdout)
        .map_err(|_| format!("preprocessor produced non-UTF-8 output for: {path}"))
}

fn run(args: &Args) -> Result<(), String> {
    let output_path = args
        .out
        .clone()
        .or_else(|| args.output.clone())
        .ok_or_else(|| "output file is required".to_string())?;

    let source = if args.no_preprocess {
        std::fs::read_to_string(&args.input)
            .map_err(|err| format!("failed to open file: {}: {err}", args.input))?
    } else {
        run_preprocessor(&args.input)?
    };

    let object = asm::assemble_text(&source, &args.input).map_err(|err| err.to_string())?;

    let text_size = object.sections[0].data.len();
    let rodata_size = object.sections[3].data.len();

    if args.object {
        obj::write_to_file(&output_path, &object).map_err(|err| err.to_string())?;
    } else {
        if !object.reloc_entries.is_empty() {
            return Err("relocations present; use the linker or --object output".to_string());
        }
        let rom = ld::image::make_flat_rom(
            &object.sections[0].data,
            &object.sections[3].data,
            ROM_SIZE,
            ROM_FILL,
        )
        .map_err(|err| err.to_string())?;
        ld::image::write_bin(&output_path, &rom).map_err(|err| err.to_string())?;
    }

    println!("Assembled successfully: {output_path}");
    if args.verbose {
        println!("   .text size: {text_size} bytes, .rodata size: {rodata_size} bytes");
        println!("   Total ROM image: {} bytes", text_size + rodata_size);
    }
    Ok(())
}

fn main() -> ExitCode {
    use clap::Parser;

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}", cformat!("<red,bold>error</>: {message}"));
            ExitCode::FAILURE
        }
    }
}

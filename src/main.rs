use std::fs;

use clap::Parser;
use colored::Colorize;
use miette::{IntoDiagnostic, Result, WrapErr};

use weft::error::Diagnostics;
use weft::{output, preproc, FirstPass};

/// Weft is an assembler toolchain for the w24 24-bit word machine.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Base names to assemble; `<BASE>.as` is read and the `.am`, `.ob`,
    /// `.ext` and `.ent` artifacts are written alongside it
    files: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.files.is_empty() {
        println!("\n~ weft v{VERSION} ~");
        println!("{SHORT_INFO}");
        return Ok(());
    }

    // Files are independent: each gets fresh tables and images, and a failed
    // file does not stop the ones after it.
    for base in &args.files {
        assemble(base)?;
    }
    Ok(())
}

fn assemble(base: &str) -> Result<()> {
    let as_path = format!("{base}.as");
    println!("{:>12} target {}", "Assembling".green().bold(), as_path);

    // Available until end of program
    let source: &'static str = Box::leak(
        fs::read_to_string(&as_path)
            .into_diagnostic()
            .wrap_err(format!("failed to read {as_path}"))?
            .into_boxed_str(),
    );

    let mut diag = Diagnostics::new();

    // Stage one: expand macros. The expanded text is always written, even
    // when it carries diagnostics.
    let expansion = preproc::expand(source, &mut diag);
    let am_path = format!("{base}.am");
    fs::write(&am_path, &expansion.text)
        .into_diagnostic()
        .wrap_err(format!("failed to write {am_path}"))?;
    println!("{:>12} macros into {}", "Expanded".green().bold(), am_path);

    let am_src: &'static str = Box::leak(expansion.text.clone().into_boxed_str());

    // Stage two: classify lines, lay out both images, collect symbols.
    let mut assembly = FirstPass::new(am_src, &expansion.macros).run(&mut diag);

    // Stage three: resolve the deferred operand words.
    assembly
        .air
        .backpatch(&mut assembly.symbols, &mut diag, am_src);

    diag.render();
    if diag.has_errors() {
        println!(
            "{:>12} {} ({} errors, no artifacts)",
            "Skipping".red().bold(),
            base,
            diag.error_count()
        );
        return Ok(());
    }

    output::write_artifacts(base, &assembly.air, &assembly.symbols)?;
    println!("{:>12} {}", "Finished".green().bold(), base);
    Ok(())
}

const SHORT_INFO: &str = r"
Welcome to weft, a two-pass assembler for the w24 24-bit word machine.
Pass one or more base names; each <BASE>.as is expanded and assembled into
<BASE>.am, <BASE>.ob and, when applicable, <BASE>.ext and <BASE>.ent.
Please use `-h` or `--help` to access the usage instructions.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");

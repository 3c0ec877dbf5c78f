//! Artifact emission: the object image plus the externals and entries
//! listings. Formats are fixed; everything here is plain line printing.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use miette::{IntoDiagnostic, Result};

use crate::air::Air;
use crate::ops;
use crate::symbol::{Kind, SymbolTable};

/// Object image: a header carrying both segment sizes, then every word at
/// its absolute address, instructions first and data right behind them.
pub fn write_object(dest: &mut impl Write, air: &Air) -> io::Result<()> {
    writeln!(dest, "     {} {}", air.ic(), air.dc())?;
    let mut addr = ops::LOAD_BASE as usize;
    for word in air.cmd_words().chain(air.data_words()) {
        writeln!(dest, "{addr:07} {word:06X}")?;
        addr += 1;
    }
    Ok(())
}

/// One line per external reference site, symbol-table order first and
/// recording order within each symbol.
pub fn write_externals(dest: &mut impl Write, symbols: &SymbolTable) -> io::Result<()> {
    for sym in symbols.iter() {
        if sym.kinds.contains(Kind::External) {
            for addr in &sym.extern_refs {
                writeln!(dest, "{} {addr:07}", sym.name)?;
            }
        }
    }
    Ok(())
}

/// One line per exported symbol with its resolved address.
pub fn write_entries(dest: &mut impl Write, symbols: &SymbolTable) -> io::Result<()> {
    for sym in symbols.iter() {
        if sym.kinds.contains(Kind::Entry) {
            if let Some(addr) = sym.address {
                writeln!(dest, "{} {addr:07}", sym.name)?;
            }
        }
    }
    Ok(())
}

/// Writes every artifact the assembled unit calls for, next to the base
/// name. The externals and entries listings only exist when non-empty.
pub fn write_artifacts(base: &str, air: &Air, symbols: &SymbolTable) -> Result<()> {
    let mut ob = BufWriter::new(File::create(format!("{base}.ob")).into_diagnostic()?);
    write_object(&mut ob, air).into_diagnostic()?;
    ob.flush().into_diagnostic()?;

    if symbols.has_extern_refs() {
        let mut ext = BufWriter::new(File::create(format!("{base}.ext")).into_diagnostic()?);
        write_externals(&mut ext, symbols).into_diagnostic()?;
        ext.flush().into_diagnostic()?;
    }
    if symbols.has_entries() {
        let mut ent = BufWriter::new(File::create(format!("{base}.ent")).into_diagnostic()?);
        write_entries(&mut ent, symbols).into_diagnostic()?;
        ent.flush().into_diagnostic()?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Diagnostics;
    use crate::parser::FirstPass;
    use crate::preproc;

    fn assemble(src: &'static str) -> (Air, SymbolTable) {
        let mut diag = Diagnostics::new();
        let expansion = preproc::expand(src, &mut diag);
        let am: &'static str = Box::leak(expansion.text.into_boxed_str());
        let mut asm = FirstPass::new(am, &expansion.macros).run(&mut diag);
        asm.air.backpatch(&mut asm.symbols, &mut diag, am);
        assert!(!diag.has_errors());
        (asm.air, asm.symbols)
    }

    fn render(write: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        write(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn object_header_and_rows() {
        let (air, _) = assemble("mov r1, r2\nA: .data 1\n");
        let text = render(|buf| write_object(buf, &air));
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("     1 1"));
        assert_eq!(lines.next(), Some("0000100 033A04"));
        assert_eq!(lines.next(), Some("0000101 000001"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn entry_listing_uses_resolved_address() {
        let (_, symbols) = assemble(".entry LBL\nLBL: .data 1\n");
        let text = render(|buf| write_entries(buf, &symbols));
        assert_eq!(text, "LBL 0000100\n");
    }

    #[test]
    fn externals_follow_recording_order() {
        let (_, symbols) = assemble(".extern X\ncmp X, r1\ncmp X, r2\n");
        let text = render(|buf| write_externals(buf, &symbols));
        assert_eq!(text, "X 0000101\nX 0000103\n");
    }

    #[test]
    fn negative_words_mask_to_24_bits() {
        let (air, _) = assemble("N: .data -1\n");
        let text = render(|buf| write_object(buf, &air));
        assert!(text.contains("0000100 FFFFFF"));
    }
}

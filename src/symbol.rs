use fxhash::FxHashMap;
use miette::Report;

use crate::error::{self, Diagnostics};
use crate::ops;
use crate::preproc::MacroTable;
use crate::scan;
use crate::span::Span;

pub const MAX_NAME_LEN: usize = 31;

/// What a symbol is known to be. A symbol may carry several kinds at once
/// (e.g. an exported data label is both `Data` and `Entry`).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Kind {
    Code = 0,
    Data = 1,
    Entry = 2,
    External = 3,
}

impl Kind {
    fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Set of kinds attached to one symbol.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct KindSet(u8);

impl KindSet {
    pub fn contains(self, kind: Kind) -> bool {
        self.0 & kind.bit() != 0
    }

    fn insert(&mut self, kind: Kind) {
        self.0 |= kind.bit();
    }
}

#[derive(Debug)]
pub struct Symbol {
    pub name: String,
    /// `None` until the defining label is seen. External symbols stay `None`.
    pub address: Option<u32>,
    pub kinds: KindSet,
    /// Absolute addresses of the words referencing this external symbol,
    /// in emission order.
    pub extern_refs: Vec<u32>,
    /// First mention, for diagnostics raised after the defining line is gone.
    pub span: Span,
}

/// Symbol table for one translation unit. Keeps insertion order, which fixes
/// the emission order of the externals and entries listings.
#[derive(Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    index: FxHashMap<String, usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a fresh identifier. Check order mirrors definition priority:
    /// size, presence, reserved words, macro collisions, then shape.
    fn check_name(
        &self,
        name: &str,
        span: Span,
        macros: &MacroTable,
        src: &'static str,
    ) -> Result<(), Report> {
        if name.len() > MAX_NAME_LEN {
            return Err(error::ident_too_long(span, src));
        }
        if name.is_empty() {
            return Err(error::ident_missing(span, src));
        }
        if ops::is_reserved(name) {
            return Err(error::ident_reserved(span, src));
        }
        if macros.contains(name) {
            return Err(error::ident_is_macro(span, src));
        }
        if !scan::is_ident_shaped(name) {
            return Err(error::ident_bad_shape(span, src));
        }
        Ok(())
    }

    /// Inserts a symbol or completes a forward mention of it. Passing an
    /// address is a definition; passing `None` merely attaches a kind.
    pub fn add_name(
        &mut self,
        name: &str,
        span: Span,
        kind: Kind,
        address: Option<u32>,
        macros: &MacroTable,
        src: &'static str,
    ) -> Result<(), Report> {
        if let Some(&i) = self.index.get(name) {
            let sym = &mut self.symbols[i];
            let conflict = (kind == Kind::External && sym.kinds.contains(Kind::Entry))
                || (kind == Kind::Entry && sym.kinds.contains(Kind::External));
            if conflict {
                return Err(error::parse_entry_extern_conflict(span, src));
            }
            if address.is_some() {
                if sym.address.is_some() {
                    return Err(error::parse_duplicate_symbol(span, src));
                }
                if sym.kinds.contains(Kind::External) {
                    return Err(error::parse_extern_redefined(span, src));
                }
                sym.address = address;
            }
            sym.kinds.insert(kind);
            return Ok(());
        }

        self.check_name(name, span, macros, src)?;
        let mut kinds = KindSet::default();
        kinds.insert(kind);
        self.index.insert(name.to_string(), self.symbols.len());
        self.symbols.push(Symbol {
            name: name.to_string(),
            address,
            kinds,
            extern_refs: Vec::new(),
            span,
        });
        Ok(())
    }

    /// Attaches a kind without defining an address, inserting the symbol if
    /// it has not been seen yet.
    pub fn add_kind(
        &mut self,
        name: &str,
        span: Span,
        kind: Kind,
        macros: &MacroTable,
        src: &'static str,
    ) -> Result<(), Report> {
        self.add_name(name, span, kind, None, macros, src)
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn get(&self, i: usize) -> &Symbol {
        &self.symbols[i]
    }

    pub fn record_extern_ref(&mut self, i: usize, addr: u32) {
        self.symbols[i].extern_refs.push(addr);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    pub fn has_extern_refs(&self) -> bool {
        self.symbols.iter().any(|s| !s.extern_refs.is_empty())
    }

    pub fn has_entries(&self) -> bool {
        self.symbols.iter().any(|s| s.kinds.contains(Kind::Entry))
    }

    /// End-of-first-pass address fix-up: code labels shift by the load base,
    /// data labels additionally by the code image size. Entry symbols must be
    /// defined by now.
    pub fn relocate(&mut self, icf: u32, diag: &mut Diagnostics, src: &'static str) {
        for sym in &mut self.symbols {
            if let Some(addr) = sym.address {
                if sym.kinds.contains(Kind::Data) {
                    sym.address = Some(addr + icf + ops::LOAD_BASE);
                } else if sym.kinds.contains(Kind::Code) {
                    sym.address = Some(addr + ops::LOAD_BASE);
                }
            } else if sym.kinds.contains(Kind::Entry) {
                diag.error(error::parse_undefined_entry(sym.span, src));
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn table() -> (SymbolTable, MacroTable) {
        (SymbolTable::new(), MacroTable::default())
    }

    #[test]
    fn define_and_find() {
        let (mut tab, macros) = table();
        tab.add_name("MAIN", Span::dummy(), Kind::Code, Some(4), &macros, "")
            .unwrap();
        let i = tab.find("MAIN").unwrap();
        assert_eq!(tab.get(i).address, Some(4));
        assert!(tab.get(i).kinds.contains(Kind::Code));
        assert!(tab.find("OTHER").is_none());
    }

    #[test]
    fn duplicate_definition_rejected() {
        let (mut tab, macros) = table();
        tab.add_name("X", Span::dummy(), Kind::Code, Some(0), &macros, "")
            .unwrap();
        assert!(tab
            .add_name("X", Span::dummy(), Kind::Data, Some(1), &macros, "")
            .is_err());
    }

    #[test]
    fn forward_entry_is_completed_by_definition() {
        let (mut tab, macros) = table();
        tab.add_kind("LBL", Span::dummy(), Kind::Entry, &macros, "")
            .unwrap();
        tab.add_name("LBL", Span::dummy(), Kind::Data, Some(2), &macros, "")
            .unwrap();
        let sym = tab.get(tab.find("LBL").unwrap());
        assert_eq!(sym.address, Some(2));
        assert!(sym.kinds.contains(Kind::Entry));
        assert!(sym.kinds.contains(Kind::Data));
    }

    #[test]
    fn entry_extern_conflict() {
        let (mut tab, macros) = table();
        tab.add_kind("A", Span::dummy(), Kind::Entry, &macros, "")
            .unwrap();
        assert!(tab
            .add_name("A", Span::dummy(), Kind::External, None, &macros, "")
            .is_err());

        tab.add_name("B", Span::dummy(), Kind::External, None, &macros, "")
            .unwrap();
        assert!(tab.add_kind("B", Span::dummy(), Kind::Entry, &macros, "").is_err());
        // Repeating an extern declaration is harmless.
        assert!(tab
            .add_name("B", Span::dummy(), Kind::External, None, &macros, "")
            .is_ok());
    }

    #[test]
    fn extern_cannot_gain_local_body() {
        let (mut tab, macros) = table();
        tab.add_name("X", Span::dummy(), Kind::External, None, &macros, "")
            .unwrap();
        assert!(tab
            .add_name("X", Span::dummy(), Kind::Data, Some(0), &macros, "")
            .is_err());
    }

    #[test]
    fn name_validation() {
        let (mut tab, mut macros) = table();
        macros.define("body".to_string(), String::new());
        let span = Span::dummy();
        assert!(tab.add_name("mov", span, Kind::Code, Some(0), &macros, "").is_err());
        assert!(tab.add_name("r1", span, Kind::Code, Some(0), &macros, "").is_err());
        assert!(tab.add_name("body", span, Kind::Code, Some(0), &macros, "").is_err());
        assert!(tab.add_name("1st", span, Kind::Code, Some(0), &macros, "").is_err());
        assert!(tab.add_name("no-dash", span, Kind::Code, Some(0), &macros, "").is_err());
        let long = "A".repeat(32);
        assert!(tab.add_name(&long, span, Kind::Code, Some(0), &macros, "").is_err());
        assert!(tab.add_name("ok31", span, Kind::Code, Some(0), &macros, "").is_ok());
    }

    #[test]
    fn relocation_shifts_by_segment() {
        let (mut tab, macros) = table();
        let span = Span::dummy();
        tab.add_name("C", span, Kind::Code, Some(3), &macros, "").unwrap();
        tab.add_name("D", span, Kind::Data, Some(0), &macros, "").unwrap();
        tab.add_name("X", span, Kind::External, None, &macros, "").unwrap();
        let mut diag = Diagnostics::new();
        tab.relocate(7, &mut diag, "");
        assert!(!diag.has_errors());
        assert_eq!(tab.get(tab.find("C").unwrap()).address, Some(103));
        assert_eq!(tab.get(tab.find("D").unwrap()).address, Some(107));
        assert_eq!(tab.get(tab.find("X").unwrap()).address, None);
    }

    #[test]
    fn undefined_entry_detected_at_relocation() {
        let (mut tab, macros) = table();
        tab.add_kind("GHOST", Span::dummy(), Kind::Entry, &macros, "")
            .unwrap();
        let mut diag = Diagnostics::new();
        tab.relocate(0, &mut diag, "");
        assert!(diag.has_errors());
    }
}

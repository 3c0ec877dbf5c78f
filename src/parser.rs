//! First pass: classifies each line of the expanded source, lays out the code
//! and data images, and records symbol definitions. Instructions are sized
//! here once and for all; words that depend on a symbol address become
//! fix-up records consumed by the second pass.

use miette::Report;

use crate::air::{Air, PatchMode};
use crate::error::{self, Diagnostics};
use crate::ops::{self, AddrMode, InstrDesc, ModeSet, OperandPos};
use crate::preproc::MacroTable;
use crate::scan::{self, LineScanner};
use crate::span::Span;
use crate::symbol::{Kind, SymbolTable};

/// Everything the first pass produces for one translation unit.
pub struct Assembly {
    pub air: Air,
    pub symbols: SymbolTable,
    /// Final instruction count; the data segment starts right after it.
    pub icf: usize,
    pub dcf: usize,
}

/// An extra word queued behind an instruction's first word. Immediates are
/// complete; symbol references reserve a placeholder slot.
enum Extra {
    Value(i32),
    Symbol {
        name: String,
        mode: PatchMode,
        span: Span,
    },
}

pub struct FirstPass<'a> {
    src: &'static str,
    macros: &'a MacroTable,
    air: Air,
    symbols: SymbolTable,
}

impl<'a> FirstPass<'a> {
    pub fn new(src: &'static str, macros: &'a MacroTable) -> Self {
        FirstPass {
            src,
            macros,
            air: Air::new(),
            symbols: SymbolTable::new(),
        }
    }

    pub fn run(mut self, diag: &mut Diagnostics) -> Assembly {
        for (base, line) in scan::lines_with_offsets(self.src) {
            if line.trim().is_empty() || line.trim_start().starts_with(';') {
                continue;
            }
            if let Err(report) = self.line(line, base, diag) {
                diag.error(report);
            }
        }
        let icf = self.air.ic();
        let dcf = self.air.dc();
        self.symbols.relocate(icf as u32, diag, self.src);
        Assembly {
            air: self.air,
            symbols: self.symbols,
            icf,
            dcf,
        }
    }

    fn line(&mut self, line: &str, base: u32, diag: &mut Diagnostics) -> Result<(), Report> {
        let mut sc = LineScanner::new(line, base, self.src);
        sc.expect_separators(0)?;
        let Some((tok, span)) = sc.token() else {
            return Ok(());
        };

        // A label is a non-keyword token with the colon glued on.
        if !tok.starts_with('.') && ops::lookup(tok).is_none() && sc.eat_colon() {
            if sc.peek().is_some_and(|c| !c.is_whitespace()) {
                return Err(error::parse_unrecognized(span, self.src));
            }
            return self.labeled(tok, span, &mut sc, diag);
        }

        sc.expect_separators(0)?;
        self.statement(tok, span, &mut sc)
    }

    /// Unlabeled statement dispatch, in classification priority order.
    fn statement(&mut self, tok: &str, span: Span, sc: &mut LineScanner) -> Result<(), Report> {
        match tok {
            ".entry" => self.entry_line(sc),
            ".extern" => self.extern_line(sc),
            ".data" => self.data_line(sc, span),
            ".string" => self.string_line(sc),
            t if t.starts_with('.') => Err(error::parse_unknown_directive(span, self.src)),
            t => match ops::lookup(t) {
                Some(desc) => self.instruction(desc, sc),
                None => Err(error::parse_unrecognized(span, self.src)),
            },
        }
    }

    fn labeled(
        &mut self,
        label: &str,
        label_span: Span,
        sc: &mut LineScanner,
        diag: &mut Diagnostics,
    ) -> Result<(), Report> {
        sc.expect_separators(0)?;
        let Some((tok, span)) = sc.token() else {
            return Err(error::parse_after_label(label_span, self.src));
        };
        sc.expect_separators(0)?;
        match tok {
            ".data" => {
                let dc = self.air.dc() as u32;
                self.symbols
                    .add_name(label, label_span, Kind::Data, Some(dc), self.macros, self.src)?;
                self.data_line(sc, span)
            }
            ".string" => {
                let dc = self.air.dc() as u32;
                self.symbols
                    .add_name(label, label_span, Kind::Data, Some(dc), self.macros, self.src)?;
                self.string_line(sc)
            }
            ".entry" => {
                diag.warning(error::parse_label_ignored(label_span, self.src));
                self.entry_line(sc)
            }
            ".extern" => {
                diag.warning(error::parse_label_ignored(label_span, self.src));
                self.extern_line(sc)
            }
            t => match ops::lookup(t) {
                Some(desc) => {
                    let ic = self.air.ic() as u32;
                    self.symbols
                        .add_name(label, label_span, Kind::Code, Some(ic), self.macros, self.src)?;
                    self.instruction(desc, sc)
                }
                None => Err(error::parse_after_label(span, self.src)),
            },
        }
    }

    fn entry_line(&mut self, sc: &mut LineScanner) -> Result<(), Report> {
        let Some((name, span)) = sc.token() else {
            return Err(error::ident_missing(sc.span_here(), self.src));
        };
        self.symbols
            .add_kind(name, span, Kind::Entry, self.macros, self.src)?;
        sc.expect_line_end("an entry line")
    }

    fn extern_line(&mut self, sc: &mut LineScanner) -> Result<(), Report> {
        let Some((name, span)) = sc.token() else {
            return Err(error::ident_missing(sc.span_here(), self.src));
        };
        self.symbols
            .add_name(name, span, Kind::External, None, self.macros, self.src)?;
        sc.expect_line_end("an extern line")
    }

    fn data_line(&mut self, sc: &mut LineScanner, dir_span: Span) -> Result<(), Report> {
        let mut count = 0usize;
        while let Some((tok, span)) = sc.field(0, 1)? {
            let value = scan::parse_int(tok, span, self.src)?;
            if !(ops::DATA_MIN..=ops::DATA_MAX).contains(&value) {
                return Err(error::parse_data_range(span, self.src, value));
            }
            self.air.push_data(value as i32);
            count += 1;
        }
        if count == 0 {
            return Err(error::parse_data_empty(dir_span, self.src));
        }
        Ok(())
    }

    fn string_line(&mut self, sc: &mut LineScanner) -> Result<(), Report> {
        sc.skip_ws();
        if sc.peek() != Some('"') {
            return Err(error::parse_missing_open_quote(sc.span_here(), self.src));
        }
        let open = sc.span_here();
        sc.bump();
        loop {
            match sc.peek() {
                None => return Err(error::parse_missing_close_quote(open, self.src)),
                Some('"') => {
                    sc.bump();
                    break;
                }
                Some(c) if !c.is_ascii() => {
                    return Err(error::parse_stray_char(sc.span_here(), self.src));
                }
                Some(c) => {
                    self.air.push_data(c as i32);
                    sc.bump();
                }
            }
        }
        sc.expect_line_end("a string line")?;
        self.air.push_data(0);
        Ok(())
    }

    fn instruction(&mut self, desc: &'static InstrDesc, sc: &mut LineScanner) -> Result<(), Report> {
        let owner_ic = self.air.ic();
        let mut word1 = ops::first_word(desc);
        let mut source_extra = None;
        let mut dest_extra = None;

        if let Some(allowed) = desc.source {
            let commas = u32::from(desc.dest.is_some());
            let (tok, span) = sc
                .field(0, commas)?
                .ok_or_else(|| error::parse_missing_operand(sc.span_here(), self.src))?;
            source_extra = self.operand(desc, tok, span, allowed, OperandPos::Source, &mut word1)?;
        }
        if let Some(allowed) = desc.dest {
            let (tok, span) = sc
                .field(0, 0)?
                .ok_or_else(|| error::parse_missing_operand(sc.span_here(), self.src))?;
            dest_extra = self.operand(desc, tok, span, allowed, OperandPos::Dest, &mut word1)?;
        }
        sc.expect_line_end("a command")?;

        self.air.push_word(word1);
        for extra in [source_extra, dest_extra].into_iter().flatten() {
            match extra {
                Extra::Value(word) => self.air.push_word(word),
                Extra::Symbol { name, mode, span } => self.air.defer(name, mode, owner_ic, span),
            }
        }
        Ok(())
    }

    /// Decodes one operand by shape, checks it against the allowed mode set,
    /// fills the first-word fields, and returns the extra word if the mode
    /// produces one. Register pairs share the first word, so two register
    /// operands cost no extra slots at all.
    fn operand(
        &self,
        desc: &'static InstrDesc,
        tok: &str,
        span: Span,
        allowed: ModeSet,
        pos: OperandPos,
        word1: &mut i32,
    ) -> Result<Option<Extra>, Report> {
        if let Some(digits) = tok.strip_prefix('#') {
            self.require_mode(desc, allowed, AddrMode::Immediate, pos, span)?;
            if digits.is_empty() {
                return Err(error::parse_empty_immediate(span, self.src));
            }
            let value = scan::parse_int(digits, span, self.src)?;
            if !(ops::IMM_MIN..=ops::IMM_MAX).contains(&value) {
                return Err(error::parse_imm_range(span, self.src, value));
            }
            ops::set_mode(word1, pos, AddrMode::Immediate);
            return Ok(Some(Extra::Value(ops::imm_word(value as i32))));
        }

        if let Some(name) = tok.strip_prefix('&') {
            self.require_mode(desc, allowed, AddrMode::Relative, pos, span)?;
            if !scan::is_ident_shaped(name) {
                return Err(error::parse_bad_operand(span, self.src));
            }
            ops::set_mode(word1, pos, AddrMode::Relative);
            return Ok(Some(Extra::Symbol {
                name: name.to_string(),
                mode: PatchMode::Relative,
                span,
            }));
        }

        if let Some(digits) = tok.strip_prefix('r') {
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                self.require_mode(desc, allowed, AddrMode::Register, pos, span)?;
                let reg = match digits {
                    "1" => 1,
                    "2" => 2,
                    "3" => 3,
                    "4" => 4,
                    "5" => 5,
                    "6" => 6,
                    "7" => 7,
                    _ => return Err(error::parse_bad_register(span, self.src)),
                };
                ops::set_mode(word1, pos, AddrMode::Register);
                ops::set_reg(word1, pos, reg);
                return Ok(None);
            }
        }

        self.require_mode(desc, allowed, AddrMode::Direct, pos, span)?;
        if !scan::is_ident_shaped(tok) {
            return Err(error::parse_bad_operand(span, self.src));
        }
        ops::set_mode(word1, pos, AddrMode::Direct);
        Ok(Some(Extra::Symbol {
            name: tok.to_string(),
            mode: PatchMode::Direct,
            span,
        }))
    }

    fn require_mode(
        &self,
        desc: &'static InstrDesc,
        allowed: ModeSet,
        mode: AddrMode,
        pos: OperandPos,
        span: Span,
    ) -> Result<(), Report> {
        if allowed.contains(mode) {
            Ok(())
        } else {
            Err(error::parse_mode_not_allowed(
                span,
                self.src,
                desc.mnemonic,
                mode.name(),
                pos.name(),
            ))
        }
    }
}

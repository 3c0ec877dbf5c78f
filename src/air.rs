//! Assembled images and the second pass. The first pass appends finished
//! words and zero placeholders; every placeholder carries a fix-up record,
//! and `backpatch` resolves them once the symbol table is complete.

use crate::error::{self, Diagnostics};
use crate::ops;
use crate::span::Span;
use crate::symbol::{Kind, SymbolTable};

/// How a deferred operand slot resolves against its symbol.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PatchMode {
    Direct,
    Relative,
}

/// A code-image slot awaiting a symbol address.
#[derive(Debug)]
pub struct Fixup {
    /// Index of the placeholder in the code image.
    slot: usize,
    symbol: String,
    mode: PatchMode,
    /// IC of the owning instruction's first word; relative distances are
    /// measured from there.
    owner_ic: usize,
    span: Span,
}

/// The assembled program: code image, data image, and pending fix-ups.
/// Words are stored sign-extended and masked to 24 bits only at emission.
#[derive(Default)]
pub struct Air {
    cmd_code: Vec<i32>,
    data_code: Vec<i32>,
    fixups: Vec<Fixup>,
}

impl Air {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next free slot in the code image.
    pub fn ic(&self) -> usize {
        self.cmd_code.len()
    }

    /// Next free slot in the data image.
    pub fn dc(&self) -> usize {
        self.data_code.len()
    }

    pub fn push_word(&mut self, word: i32) {
        self.cmd_code.push(word);
    }

    pub fn push_data(&mut self, value: i32) {
        self.data_code.push(value);
    }

    /// Reserves a code slot whose value depends on a symbol address.
    pub fn defer(&mut self, symbol: String, mode: PatchMode, owner_ic: usize, span: Span) {
        let slot = self.cmd_code.len();
        self.cmd_code.push(0);
        self.fixups.push(Fixup {
            slot,
            symbol,
            mode,
            owner_ic,
            span,
        });
    }

    /// Code image, masked to the machine word size.
    pub fn cmd_words(&self) -> impl Iterator<Item = u32> + '_ {
        self.cmd_code.iter().map(|w| (w & ops::WORD_MASK) as u32)
    }

    /// Data image, masked to the machine word size.
    pub fn data_words(&self) -> impl Iterator<Item = u32> + '_ {
        self.data_code.iter().map(|w| (w & ops::WORD_MASK) as u32)
    }

    #[cfg(test)]
    pub fn cmd_word(&self, i: usize) -> i32 {
        self.cmd_code[i]
    }

    /// Second pass: resolve every deferred slot. Each failure reports and
    /// moves on so one bad reference does not hide the next.
    pub fn backpatch(
        &mut self,
        symbols: &mut SymbolTable,
        diag: &mut Diagnostics,
        src: &'static str,
    ) {
        let fixups = std::mem::take(&mut self.fixups);
        for fix in fixups {
            let Some(i) = symbols.find(&fix.symbol) else {
                diag.error(error::patch_undefined_symbol(fix.span, src));
                continue;
            };
            let (kinds, address) = {
                let sym = symbols.get(i);
                (sym.kinds, sym.address)
            };

            if kinds.contains(Kind::External) {
                if fix.mode == PatchMode::Relative {
                    diag.error(error::patch_relative_external(fix.span, src));
                    continue;
                }
                self.cmd_code[fix.slot] = ops::E;
                symbols.record_extern_ref(i, ops::LOAD_BASE + fix.slot as u32);
                continue;
            }

            // A symbol mentioned by .entry alone carries no address; the
            // reference is as undefined as a missing symbol.
            let Some(addr) = address else {
                diag.error(error::patch_undefined_symbol(fix.span, src));
                continue;
            };

            match fix.mode {
                PatchMode::Direct => {
                    self.cmd_code[fix.slot] = ops::direct_word(addr);
                }
                PatchMode::Relative => {
                    if kinds.contains(Kind::Data) {
                        diag.error(error::patch_relative_data(fix.span, src));
                        continue;
                    }
                    self.cmd_code[fix.slot] =
                        ops::relative_word(addr, fix.owner_ic as u32 + ops::LOAD_BASE);
                }
            }
        }
    }
}

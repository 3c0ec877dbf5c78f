use std::num::ParseIntError;

use miette::{miette, LabeledSpan, Report, Severity};

use crate::span::Span;

/// Per-file diagnostic collector. Errors invalidate the file, warnings do not;
/// processing always continues so a single run surfaces everything.
#[derive(Default)]
pub struct Diagnostics {
    reports: Vec<Report>,
    errors: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, report: Report) {
        self.errors += 1;
        self.reports.push(report);
    }

    pub fn warning(&mut self, report: Report) {
        self.reports.push(report);
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn render(&self) {
        for report in &self.reports {
            eprintln!("{:?}", report);
        }
    }
}

// Pre-processor errors

pub fn expand_line_too_long(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "expand::line_len",
        help = "source lines are limited to 80 characters; the rest of this line is ignored.",
        labels = vec![LabeledSpan::at(span, "line too long")],
        "Line exceeds the 80 character limit.",
    )
    .with_source_code(src)
}

pub fn expand_misplaced_def(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "expand::mcro_indent",
        help = "remove the leading whitespace before `mcro`.",
        labels = vec![LabeledSpan::at(span, "indented definition")],
        "Macro definitions must start at the beginning of the line.",
    )
    .with_source_code(src)
}

pub fn expand_def_trailing(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "expand::mcro_trailing",
        help = "a definition line is `mcro NAME` with nothing after the name.",
        labels = vec![LabeledSpan::at(span, "unexpected text")],
        "Extra characters after a macro definition.",
    )
    .with_source_code(src)
}

pub fn expand_misplaced_end(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "expand::mcroend_indent",
        help = "remove the leading whitespace before `mcroend`.",
        labels = vec![LabeledSpan::at(span, "indented terminator")],
        "`mcroend` must start at the beginning of the line.",
    )
    .with_source_code(src)
}

pub fn expand_end_trailing(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "expand::mcroend_trailing",
        help = "`mcroend` must be alone on its line.",
        labels = vec![LabeledSpan::at(span, "unexpected text")],
        "Extra characters after `mcroend`.",
    )
    .with_source_code(src)
}

pub fn expand_duplicate_macro(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "expand::duplicate",
        help = "each macro name may be defined only once per file.",
        labels = vec![LabeledSpan::at(span, "duplicate macro")],
        "Macro is already defined.",
    )
    .with_source_code(src)
}

pub fn expand_unterminated(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Warning,
        code = "expand::unterminated",
        help = "close the definition with `mcroend`; everything after this line became macro body.",
        labels = vec![LabeledSpan::at(span, "definition never closed")],
        "Macro definition is still open at end of file.",
    )
    .with_source_code(src)
}

// Identifier errors, shared between macro names and symbols

pub fn ident_missing(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "ident::missing",
        help = "a name was expected here.",
        labels = vec![LabeledSpan::at(span, "missing name")],
        "Missing an identifier.",
    )
    .with_source_code(src)
}

pub fn ident_too_long(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "ident::length",
        help = "identifiers are limited to 31 characters.",
        labels = vec![LabeledSpan::at(span, "name too long")],
        "Identifier exceeds the 31 character limit.",
    )
    .with_source_code(src)
}

pub fn ident_reserved(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "ident::reserved",
        help = "instruction mnemonics, registers, and directive names cannot be redefined.",
        labels = vec![LabeledSpan::at(span, "reserved word")],
        "Identifier is a reserved word.",
    )
    .with_source_code(src)
}

pub fn ident_is_macro(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "ident::macro",
        help = "labels may not share a name with a macro defined in the same file.",
        labels = vec![LabeledSpan::at(span, "macro name")],
        "Identifier collides with a macro.",
    )
    .with_source_code(src)
}

pub fn ident_bad_shape(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "ident::shape",
        help = "identifiers start with a letter followed by letters and digits.",
        labels = vec![LabeledSpan::at(span, "invalid name")],
        "Identifier is not a letter followed by alphanumerics.",
    )
    .with_source_code(src)
}

// First-pass classification errors

pub fn parse_unknown_directive(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::dir",
        help = "available directives are .data, .string, .entry and .extern.",
        labels = vec![LabeledSpan::at(span, "incorrect directive")],
        "Encountered an invalid directive.",
    )
    .with_source_code(src)
}

pub fn parse_unrecognized(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::stmt",
        help = "lines start with an instruction, a directive, or a `LABEL:` definition.",
        labels = vec![LabeledSpan::at(span, "unrecognized token")],
        "First word of the line is not a valid statement.",
    )
    .with_source_code(src)
}

pub fn parse_after_label(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::after_label",
        help = "a label must be followed by an instruction or a data directive.",
        labels = vec![LabeledSpan::at(span, "not a statement")],
        "Label is not followed by a valid statement.",
    )
    .with_source_code(src)
}

pub fn parse_label_ignored(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Warning,
        code = "parse::label_ignored",
        help = ".entry and .extern name symbols themselves; a label in front of them binds nothing.",
        labels = vec![LabeledSpan::at(span, "ignored label")],
        "Label before a symbol directive is meaningless and ignored.",
    )
    .with_source_code(src)
}

// Symbol table errors

pub fn parse_duplicate_symbol(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::duplicate",
        help = "each label may be defined only once per file.",
        labels = vec![LabeledSpan::at(span, "duplicate definition")],
        "Symbol is already defined.",
    )
    .with_source_code(src)
}

pub fn parse_entry_extern_conflict(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::entry_extern",
        help = "a symbol is either exported from this file or imported from another, never both.",
        labels = vec![LabeledSpan::at(span, "conflicting declaration")],
        "Symbol is declared both as entry and as external.",
    )
    .with_source_code(src)
}

pub fn parse_extern_redefined(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::extern_defined",
        help = "external symbols are defined in another file; remove the .extern or the local definition.",
        labels = vec![LabeledSpan::at(span, "local definition")],
        "Symbol declared external is defined locally.",
    )
    .with_source_code(src)
}

pub fn parse_undefined_entry(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::entry_undefined",
        help = "every .entry symbol needs a label definition in this file.",
        labels = vec![LabeledSpan::at(span, "never defined")],
        "Entry symbol has no definition.",
    )
    .with_source_code(src)
}

// Operand errors

pub fn parse_missing_operand(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::operand",
        help = "check the number of operands this instruction takes.",
        labels = vec![LabeledSpan::at(span, "operand expected")],
        "Missing an operand.",
    )
    .with_source_code(src)
}

pub fn parse_mode_not_allowed(
    span: Span,
    src: &'static str,
    mnemonic: &str,
    mode: &str,
    pos: &str,
) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::mode",
        help = "check the addressing modes this instruction accepts for each operand.",
        labels = vec![LabeledSpan::at(span, "unsupported mode")],
        "{mnemonic} does not support {mode} addressing for its {pos} operand.",
    )
    .with_source_code(src)
}

pub fn parse_bad_register(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::register",
        help = "registers are r1 through r7.",
        labels = vec![LabeledSpan::at(span, "invalid register")],
        "Register number is not valid.",
    )
    .with_source_code(src)
}

pub fn parse_bad_operand(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::operand_shape",
        help = "operands are #literals, &labels, registers, or label names.",
        labels = vec![LabeledSpan::at(span, "invalid operand")],
        "Operand is not a valid label reference.",
    )
    .with_source_code(src)
}

pub fn parse_empty_immediate(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::imm_empty",
        help = "immediate operands look like #5 or #-12.",
        labels = vec![LabeledSpan::at(span, "no value")],
        "Missing a number after '#'.",
    )
    .with_source_code(src)
}

pub fn parse_not_integer(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::int",
        help = "numeric values are decimal integers with an optional sign.",
        labels = vec![LabeledSpan::at(span, "not an integer")],
        "Value is not an integer.",
    )
    .with_source_code(src)
}

pub fn parse_bad_literal(span: Span, src: &'static str, e: ParseIntError) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::bad_lit",
        help = "the value does not fit any machine integer.",
        labels = vec![LabeledSpan::at(span, "incorrect literal")],
        "Encountered an invalid literal: {e}",
    )
    .with_source_code(src)
}

pub fn parse_imm_range(span: Span, src: &'static str, value: i64) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::imm_range",
        help = "immediate values range from -1048576 to 1048575.",
        labels = vec![LabeledSpan::at(span, "out-of-range literal")],
        "Immediate value {value} does not fit in 21 bits.",
    )
    .with_source_code(src)
}

pub fn parse_data_range(span: Span, src: &'static str, value: i64) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::data_range",
        help = ".data values range from -8388608 to 8388607.",
        labels = vec![LabeledSpan::at(span, "out-of-range value")],
        "Data value {value} does not fit in 24 bits.",
    )
    .with_source_code(src)
}

pub fn parse_data_empty(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::data_empty",
        help = ".data expects a comma-separated list of integers.",
        labels = vec![LabeledSpan::at(span, "no values")],
        "No numbers in .data declaration.",
    )
    .with_source_code(src)
}

// Comma discipline

pub fn parse_missing_comma(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::comma_missing",
        help = "separate operands and data values with a single comma.",
        labels = vec![LabeledSpan::at(span, "comma expected")],
        "Missing a comma.",
    )
    .with_source_code(src)
}

pub fn parse_extra_comma(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::comma_extra",
        help = "exactly one comma belongs between values, and none before the first.",
        labels = vec![LabeledSpan::at(span, "unexpected comma")],
        "Extra comma.",
    )
    .with_source_code(src)
}

pub fn parse_trailing_comma(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::comma_trailing",
        help = "remove the comma after the last value.",
        labels = vec![LabeledSpan::at(span, "trailing comma")],
        "Comma at the end of the line.",
    )
    .with_source_code(src)
}

pub fn parse_extra_text(span: Span, src: &'static str, after: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::extra_text",
        help = "nothing may follow a complete statement.",
        labels = vec![LabeledSpan::at(span, "unexpected text")],
        "Illegal extra characters after {after}.",
    )
    .with_source_code(src)
}

// String directive errors

pub fn parse_missing_open_quote(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::str_open",
        help = ".string expects a double-quoted literal like \"abc\".",
        labels = vec![LabeledSpan::at(span, "quote expected")],
        "Missing an opening quotation mark.",
    )
    .with_source_code(src)
}

pub fn parse_missing_close_quote(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::str_close",
        help = "close the string literal with a \" character.",
        labels = vec![LabeledSpan::at(span, "unterminated literal")],
        "Missing a closing quotation mark.",
    )
    .with_source_code(src)
}

pub fn parse_stray_char(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::stray",
        help = "string literals may contain printable ASCII only.",
        labels = vec![LabeledSpan::at(span, "invalid character")],
        "Character cannot be encoded in a data word.",
    )
    .with_source_code(src)
}

// Second-pass errors

pub fn patch_undefined_symbol(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "patch::undefined",
        help = "operands referring to labels must be defined locally or declared .extern.",
        labels = vec![LabeledSpan::at(span, "undefined label")],
        "Operand refers to an undefined label.",
    )
    .with_source_code(src)
}

pub fn patch_relative_external(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "patch::rel_external",
        help = "the distance to an external symbol is unknown at assembly time.",
        labels = vec![LabeledSpan::at(span, "external symbol")],
        "Relative addressing cannot target an external symbol.",
    )
    .with_source_code(src)
}

pub fn patch_relative_data(span: Span, src: &'static str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "patch::rel_data",
        help = "relative operands target instruction labels only.",
        labels = vec![LabeledSpan::at(span, "data symbol")],
        "Relative addressing cannot target a data symbol.",
    )
    .with_source_code(src)
}

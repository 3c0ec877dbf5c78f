//! Macro pre-processor: strips comments and blank lines, records
//! `mcro`/`mcroend` definitions, and substitutes whole-line invocations with
//! the recorded body. The expanded text is what both assembler passes read.

use fxhash::FxHashMap;
use miette::Report;

use crate::error::{self, Diagnostics};
use crate::ops;
use crate::scan;
use crate::span::{Idx, Span};
use crate::symbol::MAX_NAME_LEN;

/// Longest legal source line, terminator excluded.
pub const MAX_LINE_LEN: usize = 80;

/// Macros recorded for one translation unit. Bodies are kept verbatim, one
/// `\n`-terminated line after another.
#[derive(Default)]
pub struct MacroTable {
    bodies: FxHashMap<String, String>,
}

impl MacroTable {
    pub fn define(&mut self, name: String, body: String) {
        self.bodies.insert(name, body);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bodies.contains_key(name)
    }

    fn body(&self, name: &str) -> Option<&str> {
        self.bodies.get(name).map(String::as_str)
    }
}

pub struct Expansion {
    /// The expanded source text, written out as the `.am` artifact.
    pub text: String,
    pub macros: MacroTable,
}

/// A definition in progress: name, accumulated body, and the span of the
/// name for the unterminated-definition warning.
struct OpenMacro {
    name: String,
    body: String,
    span: Span,
}

pub fn expand(src: &'static str, diag: &mut Diagnostics) -> Expansion {
    let mut out = String::new();
    let mut macros = MacroTable::default();
    let mut open: Option<OpenMacro> = None;

    for (base, line) in scan::lines_with_offsets(src) {
        let line = clamp_line(line, base, diag, src);

        if open.is_some() {
            if !is_marker(line, "mcroend") {
                if let Some(def) = open.as_mut() {
                    def.body.push_str(line);
                    def.body.push('\n');
                }
                continue;
            }
            // Bad terminator lines are dropped and the definition stays open.
            if line.starts_with(char::is_whitespace) {
                diag.error(error::expand_misplaced_end(line_span(base, line), src));
            } else if !line["mcroend".len()..].trim().is_empty() {
                diag.error(tail_error(line, "mcroend".len(), base, src, error::expand_end_trailing));
            } else if let Some(def) = open.take() {
                macros.define(def.name, def.body);
            }
            continue;
        }

        if line.trim().is_empty() || line.starts_with(';') {
            continue;
        }

        // A definition needs whitespace after `mcro`; a bare `mcro` token is
        // ordinary text for the passes to reject.
        let defines = line
            .trim_start()
            .strip_prefix("mcro")
            .is_some_and(|rest| rest.starts_with(char::is_whitespace));
        if defines {
            if line.starts_with(char::is_whitespace) {
                diag.error(error::expand_misplaced_def(line_span(base, line), src));
                continue;
            }
            if let Some(def) = definition(line, base, &macros, diag, src) {
                open = Some(def);
            }
            continue;
        }

        if let Some(body) = macros.body(line) {
            out.push_str(body);
            continue;
        }

        out.push_str(line);
        out.push('\n');
    }

    if let Some(def) = open {
        diag.warning(error::expand_unterminated(def.span, src));
    }

    Expansion { text: out, macros }
}

/// True when the line is `keyword` followed by whitespace or nothing, after
/// optional indentation. `mcroendx` is ordinary text, not a terminator.
fn is_marker(line: &str, keyword: &str) -> bool {
    line.trim_start()
        .strip_prefix(keyword)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
}

/// Parses the name off a `mcro NAME` line. `None` means a diagnostic was
/// raised and no definition opens.
fn definition(
    line: &str,
    base: u32,
    macros: &MacroTable,
    diag: &mut Diagnostics,
    src: &'static str,
) -> Option<OpenMacro> {
    let after_kw = &line["mcro".len()..];
    let name_part = after_kw.trim_start();
    let Some(name) = name_part.split_whitespace().next() else {
        diag.error(error::ident_missing(line_span(base, line), src));
        return None;
    };
    let name_offs = line.len() - name_part.len();
    let span = Span::new(Idx(base + name_offs as u32), name.len() as u16);

    if !name_part[name.len()..].trim().is_empty() {
        diag.error(tail_error(line, name_offs + name.len(), base, src, error::expand_def_trailing));
        return None;
    }
    if let Err(report) = check_macro_name(name, span, macros, src) {
        diag.error(report);
        return None;
    }
    Some(OpenMacro {
        name: name.to_string(),
        body: String::new(),
        span,
    })
}

fn check_macro_name(
    name: &str,
    span: Span,
    macros: &MacroTable,
    src: &'static str,
) -> Result<(), Report> {
    if name.len() > MAX_NAME_LEN {
        return Err(error::ident_too_long(span, src));
    }
    if ops::is_reserved(name) {
        return Err(error::ident_reserved(span, src));
    }
    if macros.contains(name) {
        return Err(error::expand_duplicate_macro(span, src));
    }
    if !scan::is_ident_shaped(name) {
        return Err(error::ident_bad_shape(span, src));
    }
    Ok(())
}

/// Over-long lines are reported once and truncated for all further stages.
fn clamp_line<'a>(line: &'a str, base: u32, diag: &mut Diagnostics, src: &'static str) -> &'a str {
    match line.char_indices().nth(MAX_LINE_LEN) {
        Some((cut, _)) => {
            diag.error(error::expand_line_too_long(line_span(base, line), src));
            &line[..cut]
        }
        None => line,
    }
}

fn line_span(base: u32, line: &str) -> Span {
    Span::new(Idx(base), line.len().min(u16::MAX as usize) as u16)
}

/// Span over the unexpected text that follows an otherwise complete marker.
fn tail_error(
    line: &str,
    from: usize,
    base: u32,
    src: &'static str,
    build: fn(Span, &'static str) -> Report,
) -> Report {
    let tail = &line[from..];
    let lead = tail.len() - tail.trim_start().len();
    let start = from + lead;
    let span = Span::new(Idx(base + start as u32), tail.trim().len() as u16);
    build(span, src)
}

#[cfg(test)]
mod test {
    use super::*;

    fn run(src: &'static str) -> (Expansion, Diagnostics) {
        let mut diag = Diagnostics::new();
        let exp = expand(src, &mut diag);
        (exp, diag)
    }

    #[test]
    fn plain_lines_pass_through() {
        let (exp, diag) = run("mov r1, r2\nstop\n");
        assert!(!diag.has_errors());
        assert_eq!(exp.text, "mov r1, r2\nstop\n");
    }

    #[test]
    fn comments_and_blanks_are_dropped() {
        let (exp, diag) = run("; header\n\n   \nstop\n");
        assert!(!diag.has_errors());
        assert_eq!(exp.text, "stop\n");
    }

    #[test]
    fn single_macro_round_trip() {
        let (exp, diag) = run("mcro twice\ninc r1\ninc r1\nmcroend\ntwice\nstop\n");
        assert!(!diag.has_errors());
        assert_eq!(exp.text, "inc r1\ninc r1\nstop\n");
        assert!(exp.macros.contains("twice"));
    }

    #[test]
    fn invocation_must_match_whole_line() {
        let (exp, diag) = run("mcro m1\ninc r1\nmcroend\nm1 extra\n");
        assert!(!diag.has_errors());
        // Not an invocation: the line passes through untouched.
        assert_eq!(exp.text, "m1 extra\n");
    }

    #[test]
    fn nested_definition_becomes_body_text() {
        let (exp, diag) = run("mcro outer\nmcro inner\nmcroend\nouter\n");
        assert!(!diag.has_errors());
        assert_eq!(exp.text, "mcro inner\n");
    }

    #[test]
    fn reserved_macro_name_rejected() {
        let (_, diag) = run("mcro mov\nmcroend\n");
        assert!(diag.has_errors());
    }

    #[test]
    fn duplicate_macro_rejected() {
        let (_, diag) = run("mcro m\nstop\nmcroend\nmcro m\nmcroend\n");
        assert!(diag.has_errors());
    }

    #[test]
    fn trailing_text_after_definition() {
        let (_, diag) = run("mcro m extra\nmcroend\n");
        assert!(diag.has_errors());
    }

    #[test]
    fn indented_terminator_rejected() {
        let (_, diag) = run("mcro m\nstop\n  mcroend\nmcroend\n");
        assert!(diag.has_errors());
    }

    #[test]
    fn over_long_line_reported_and_truncated() {
        let long = "x".repeat(90);
        let src: &'static str = Box::leak(format!("{long}\n").into_boxed_str());
        let mut diag = Diagnostics::new();
        let exp = expand(src, &mut diag);
        assert!(diag.has_errors());
        assert_eq!(exp.text.trim_end().len(), MAX_LINE_LEN);
    }

    #[test]
    fn unterminated_macro_warns_without_invalidating() {
        let (_, diag) = run("mcro m\nstop\n");
        assert!(!diag.has_errors());
    }
}

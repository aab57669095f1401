//! Source transforms
//!
//! Pure, idempotent source-to-source rewrites applied before slicing and
//! instrumentation. Transforms compose in a fixed order because later ones
//! assume the normal form of earlier ones. Each transform returns a
//! `LineMap` so witness lines can be traced back to the original file.

use crate::error::StageError;
use lazy_static::lazy_static;
use provex_core::LineMap;
use regex::Regex;
use tracing::debug;

lazy_static! {
    static ref ALWAYS_INLINE: Regex =
        Regex::new(r"__attribute__\s*\(\s*\(\s*always_inline\s*\)\s*\)\s*")
            .expect("ALWAYS_INLINE regex is valid");
    static ref FORCE_INLINE: Regex =
        Regex::new(r"\b__forceinline\s+").expect("FORCE_INLINE regex is valid");
    static ref RAND_CALL: Regex = Regex::new(r"\brand\s*\(\s*\)").expect("RAND_CALL regex is valid");
    static ref RANDOM_CALL: Regex =
        Regex::new(r"\brandom\s*\(\s*\)").expect("RANDOM_CALL regex is valid");
    static ref INFINITE_HEADER: Regex =
        Regex::new(r"while\s*\(\s*(?:1|true)\s*\)|for\s*\(\s*;\s*;\s*\)")
            .expect("INFINITE_HEADER regex is valid");
    static ref EXIT_STMT: Regex =
        Regex::new(r"\b(?:break|return|goto|abort|longjmp)\b|\bexit\s*\(")
            .expect("EXIT_STMT regex is valid");
}

const LOOP_BUDGET_VAR: &str = "__provex_loop_budget";
const LOOP_GUARD: &str = " if (--__provex_loop_budget == 0) exit(0);";

/// A named, idempotent source rewrite
pub trait SourceTransform: Send + Sync {
    /// Name used for artifact naming and logging
    fn name(&self) -> &'static str;

    /// Rewrite `source`, returning the new text and a map from its lines
    /// back to the input's lines. Must not fail on well-formed input.
    fn apply(&self, source: &str) -> Result<(String, LineMap), StageError>;
}

/// The fixed transform chain, in composition order
pub fn default_transforms() -> Vec<Box<dyn SourceTransform>> {
    vec![
        Box::new(RemoveInline),
        Box::new(NormalizeNondet),
        Box::new(BoundInfiniteLoops),
    ]
}

/// Apply a transform chain left-to-right, composing the line maps
pub fn apply_all(
    transforms: &[Box<dyn SourceTransform>],
    source: &str,
) -> Result<(String, LineMap), StageError> {
    let mut text = source.to_string();
    let mut map = LineMap::identity(source.lines().count() as u32);
    for transform in transforms {
        let (next, step_map) = transform.apply(&text)?;
        debug!(transform = transform.name(), lines = step_map.len(), "transform applied");
        map = map.compose(&step_map);
        text = next;
    }
    Ok((text, map))
}

/// Strips force-inline annotations so slicing and instrumentation see
/// un-inlined call sites. Behavior-preserving.
pub struct RemoveInline;

impl SourceTransform for RemoveInline {
    fn name(&self) -> &'static str {
        "remove-inline"
    }

    fn apply(&self, source: &str) -> Result<(String, LineMap), StageError> {
        let text = ALWAYS_INLINE.replace_all(source, "").to_string();
        let text = FORCE_INLINE.replace_all(&text, "").to_string();
        let lines = text.lines().count() as u32;
        Ok((text, LineMap::identity(lines)))
    }
}

/// Rewrites ad-hoc unknown-value idioms into the canonical
/// `__VERIFIER_nondet_*` call convention.
pub struct NormalizeNondet;

impl SourceTransform for NormalizeNondet {
    fn name(&self) -> &'static str {
        "normalize-nondet"
    }

    fn apply(&self, source: &str) -> Result<(String, LineMap), StageError> {
        let text = RAND_CALL
            .replace_all(source, "__VERIFIER_nondet_int()")
            .to_string();
        let text = RANDOM_CALL
            .replace_all(&text, "__VERIFIER_nondet_long()")
            .to_string();
        let lines = text.lines().count() as u32;
        Ok((text, LineMap::identity(lines)))
    }
}

/// Bounds syntactically unbounded loops that have no reachable exit.
///
/// The loop body gets a decrementing budget that silently terminates the
/// program when exhausted, so the back end can explore the loop without
/// making code after it reachable. Loops with any exit statement are left
/// untouched, preserving reachability of existing exits. Inserting the
/// budget declaration shifts all lines down by two, which the returned
/// `LineMap` records.
pub struct BoundInfiniteLoops;

impl SourceTransform for BoundInfiniteLoops {
    fn name(&self) -> &'static str {
        "bound-infinite-loops"
    }

    fn apply(&self, source: &str) -> Result<(String, LineMap), StageError> {
        let mut lines: Vec<String> = source.lines().map(str::to_string).collect();
        let original_len = lines.len() as u32;
        let mut rewrote = false;

        let mut i = 0;
        while i < lines.len() {
            let current = lines[i].clone();
            let Some(m) = INFINITE_HEADER.find(&current) else {
                i += 1;
                continue;
            };
            // a `} while (1);` is a do-while tail, not a loop header
            if current[..m.start()].trim_end().ends_with('}') {
                i += 1;
                continue;
            }

            let after = current[m.end()..].trim_start().to_string();
            if let Some(semi) = empty_body_semicolon(&current, m.end()) {
                lines[i].replace_range(semi..semi + 1, &format!("{{{} }}", LOOP_GUARD.trim_end()));
                rewrote = true;
            } else if let Some((bl, bc)) = body_brace(&lines, i, m.end(), &after) {
                let body = body_text(&lines, bl, bc, self.name())?;
                if !EXIT_STMT.is_match(&body) {
                    lines[bl].insert_str(bc + 1, LOOP_GUARD);
                    rewrote = true;
                }
            }
            i += 1;
        }

        if rewrote && !source.contains(LOOP_BUDGET_VAR) {
            lines.insert(0, "extern void exit(int);".to_string());
            lines.insert(
                1,
                format!("static unsigned long {LOOP_BUDGET_VAR} = 1UL << 20;"),
            );
            let mut table = vec![0, 0];
            table.extend(1..=original_len);
            let text = lines.join("\n") + "\n";
            return Ok((text, LineMap::from_table(table)));
        }

        let text = lines.join("\n") + "\n";
        Ok((text, LineMap::identity(original_len)))
    }
}

/// Column of the `;` when the loop body is empty (`while (1);`)
fn empty_body_semicolon(line: &str, header_end: usize) -> Option<usize> {
    let rest = &line[header_end..];
    let offset = rest.len() - rest.trim_start().len();
    if rest.trim_start().starts_with(';') {
        Some(header_end + offset)
    } else {
        None
    }
}

/// Locate the loop body's opening brace, on the header line or the next
fn body_brace(lines: &[String], i: usize, header_end: usize, after: &str) -> Option<(usize, usize)> {
    if after.starts_with('{') {
        let col = lines[i][header_end..].find('{')? + header_end;
        return Some((i, col));
    }
    if after.is_empty() && i + 1 < lines.len() && lines[i + 1].trim_start().starts_with('{') {
        let col = lines[i + 1].find('{')?;
        return Some((i + 1, col));
    }
    // unbraced single-statement bodies are left alone
    None
}

/// Text between the body's braces, with string and character literals and
/// comments blanked out. Braces inside a literal must not end the scan, and
/// an exit keyword inside a literal or comment is not an exit. Unbalanced
/// braces are a parse error.
fn body_text(
    lines: &[String],
    start_line: usize,
    start_col: usize,
    transform: &'static str,
) -> Result<String, StageError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Lex {
        Code,
        Str,
        Chr,
        LineComment,
        BlockComment,
    }

    let mut state = Lex::Code;
    let mut escaped = false;
    let mut depth = 0usize;
    let mut body = String::new();

    for (li, line) in lines.iter().enumerate().skip(start_line) {
        if state == Lex::LineComment {
            state = Lex::Code;
        }
        let from = if li == start_line { start_col } else { 0 };
        let mut chars = line[from..].chars().peekable();
        while let Some(ch) = chars.next() {
            match state {
                Lex::Str | Lex::Chr => {
                    let closer = if state == Lex::Str { '"' } else { '\'' };
                    if escaped {
                        escaped = false;
                    } else if ch == '\\' {
                        escaped = true;
                    } else if ch == closer {
                        state = Lex::Code;
                    }
                }
                Lex::LineComment => {}
                Lex::BlockComment => {
                    if ch == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        state = Lex::Code;
                    }
                }
                Lex::Code => match ch {
                    '"' => state = Lex::Str,
                    '\'' => state = Lex::Chr,
                    '/' if chars.peek() == Some(&'/') => {
                        chars.next();
                        state = Lex::LineComment;
                    }
                    '/' if chars.peek() == Some(&'*') => {
                        chars.next();
                        state = Lex::BlockComment;
                    }
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(body);
                        }
                    }
                    _ => {
                        if depth > 0 {
                            body.push(ch);
                        }
                    }
                },
            }
        }
        body.push('\n');
    }
    Err(StageError {
        transform,
        message: format!("unbalanced braces in loop body starting at line {}", start_line + 1),
    })
}

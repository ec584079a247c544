//! Environment variable interpolation
//!
//! Rewrites a raw document before it reaches the YAML parser. Recognized forms:
//! - `${NAME}` - braced reference, always resolved
//! - `${NAME|default}` - braced reference with a fallback (may be empty)
//! - `$NAME` / `$NAME|default` - named reference, resolved only when
//!   named parsing is enabled, otherwise left as literal text
//! - `$$` - a literal `$`
//! - `$<digits>` - the literal digits (e.g. `$1` becomes `1`)
//!
//! Substituted values are not rescanned, so a value containing `$` is emitted
//! verbatim.

use crate::environment::Environment;
use crate::error::{Error, Result};
use indexmap::IndexSet;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::sync::LazyLock;

/// Separator used between a variable name and its default value
pub const DEFAULT_SEPARATOR: &str = "|";

// The default pattern is built from a constant separator, so it always compiles.
#[allow(clippy::expect_used)]
static DEFAULT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&pattern_source(DEFAULT_SEPARATOR)).expect("default reference pattern is valid")
});

/// Build the reference pattern for a separator
///
/// Alternatives are tried in order: escapes, braced references, named
/// references. The braced name and default are non-greedy so the first `}`
/// closes the reference; a named default runs to the end of the line.
fn pattern_source(separator: &str) -> String {
    let sep = regex::escape(separator);
    format!(
        concat!(
            r"\$(?:",
            r"(?P<escaped>\$|\d+)",
            r"|\{{(?P<braced>.*?)(?:{sep}(?P<braced_default>.*?))?\}}",
            r"|(?P<named>[\w\-.]+)(?:{sep}(?P<named_default>.*))?",
            r")"
        ),
        sep = sep
    )
}

/// One recognized reference or escape in the source buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// `$$` or `$<digits>`; `literal` is what remains once the `$` is dropped
    Escaped { span: Range<usize>, literal: &'a str },
    /// `${name}` or `${name|default}`
    Braced {
        span: Range<usize>,
        name: &'a str,
        default: Option<&'a str>,
    },
    /// `$name` or `$name|default`
    Named {
        span: Range<usize>,
        name: &'a str,
        default: Option<&'a str>,
    },
}

impl<'a> Token<'a> {
    /// Byte range of the token in the source buffer
    pub fn span(&self) -> Range<usize> {
        match self {
            Token::Escaped { span, .. } | Token::Braced { span, .. } | Token::Named { span, .. } => {
                span.clone()
            }
        }
    }

    /// The exact text the token matched
    pub fn as_str<'s>(&self, source: &'s str) -> &'s str {
        &source[self.span()]
    }

    /// Variable name, for references
    pub fn name(&self) -> Option<&'a str> {
        match self {
            Token::Escaped { .. } => None,
            Token::Braced { name, .. } | Token::Named { name, .. } => Some(*name),
        }
    }

    fn from_captures(caps: &Captures<'a>) -> Option<Self> {
        let whole = caps.get(0)?;
        let span = whole.range();

        if let Some(named) = caps.name("named") {
            return Some(Token::Named {
                span,
                name: named.as_str(),
                default: caps.name("named_default").map(|m| m.as_str()),
            });
        }

        if let Some(braced) = caps.name("braced") {
            // `${}` and `${|x}` name nothing and stay literal text
            if braced.as_str().is_empty() {
                return None;
            }
            return Some(Token::Braced {
                span,
                name: braced.as_str(),
                default: caps.name("braced_default").map(|m| m.as_str()),
            });
        }

        caps.name("escaped").map(|escaped| Token::Escaped {
            span,
            literal: escaped.as_str(),
        })
    }
}

/// Regex-driven scanner producing [`Token`]s
#[derive(Debug, Clone)]
pub struct Tokenizer {
    pattern: Regex,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.clone(),
        }
    }
}

impl Tokenizer {
    /// Create a tokenizer for the given name/default separator
    pub fn new(separator: &str) -> Result<Self> {
        if separator.is_empty() {
            return Err(Error::invalid_options("separator must not be empty")
                .with_help(format!("Use the default separator '{}'", DEFAULT_SEPARATOR)));
        }
        if separator == DEFAULT_SEPARATOR {
            return Ok(Self::default());
        }

        let pattern = Regex::new(&pattern_source(separator)).map_err(|e| {
            Error::invalid_options(format!("separator '{}' is not usable: {}", separator, e))
        })?;
        Ok(Self { pattern })
    }

    /// Scan `input` left to right, yielding non-overlapping tokens
    pub fn tokens<'a>(&'a self, input: &'a str) -> impl Iterator<Item = Token<'a>> + 'a {
        self.pattern
            .captures_iter(input)
            .filter_map(|caps| Token::from_captures(&caps))
    }
}

/// Options controlling interpolation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpolateOptions {
    /// Fail when a reference has neither a value nor a default
    pub strict: bool,
    /// Resolve bare `$NAME` references as well as `${NAME}`
    pub allow_parse_named: bool,
    /// Divides a variable name from its default value
    pub separator: String,
}

impl Default for InterpolateOptions {
    fn default() -> Self {
        Self {
            strict: true,
            allow_parse_named: false,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

impl InterpolateOptions {
    /// Set strict mode
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Enable or disable named (`$NAME`) references
    pub fn allow_parse_named(mut self, allow: bool) -> Self {
        self.allow_parse_named = allow;
        self
    }

    /// Set the name/default separator
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

/// How a single reference was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Value taken from the environment
    Environment,
    /// Variable absent, default used
    Default,
    /// Variable absent and no default; original text kept
    Unresolved,
    /// Named reference while named parsing is disabled; original text kept
    Inert,
}

/// Record of one reference occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Substitution {
    /// Variable name
    pub variable: String,
    /// Whether the reference was braced
    pub braced: bool,
    /// Byte range in the input buffer
    pub source: Range<usize>,
    /// Byte range of the emitted text in the output buffer
    pub output: Range<usize>,
    /// What happened to it
    pub resolution: Resolution,
}

/// Full result of scanning and rewriting one buffer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    /// The rewritten buffer
    pub output: String,
    /// Matched reference text mapped to its replacement
    pub replacements: BTreeMap<String, String>,
    /// Variables with no value and no default
    pub unresolved: BTreeSet<String>,
    /// Every reference occurrence in scan order
    pub substitutions: Vec<Substitution>,
    /// Number of escape sequences unwrapped
    pub escapes: usize,
}

impl Report {
    /// Check if every eligible reference was resolved
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Rewrites buffers by resolving references against an [`Environment`]
#[derive(Debug, Clone, Default)]
pub struct Interpolator {
    options: InterpolateOptions,
    tokenizer: Tokenizer,
}

impl Interpolator {
    /// Create an interpolator, validating the options
    pub fn new(options: InterpolateOptions) -> Result<Self> {
        let tokenizer = Tokenizer::new(&options.separator)?;
        Ok(Self { options, tokenizer })
    }

    /// The options this interpolator was built with
    pub fn options(&self) -> &InterpolateOptions {
        &self.options
    }

    /// Substitute every reference in `buffer`
    ///
    /// In strict mode, fails with every unresolved name and returns no
    /// partial output. Otherwise unresolved references are kept verbatim.
    pub fn interpolate<E: Environment + ?Sized>(&self, buffer: &str, env: &E) -> Result<String> {
        if !buffer.contains('$') {
            return Ok(buffer.to_string());
        }

        let report = self.analyze(buffer, env);
        if !report.unresolved.is_empty() {
            if self.options.strict {
                return Err(Error::unresolved(report.unresolved));
            }
            log::warn!(
                "Leaving unresolved variables untouched: {}",
                report
                    .unresolved
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        Ok(report.output)
    }

    /// Scan and rewrite `buffer` without applying strict mode
    ///
    /// The input is never modified in place: literal gaps, unwrapped escapes
    /// and replacement values are appended to a fresh output buffer, so
    /// escapes can't shift the positions of later references.
    pub fn analyze<E: Environment + ?Sized>(&self, buffer: &str, env: &E) -> Report {
        let mut report = Report {
            output: String::with_capacity(buffer.len()),
            ..Report::default()
        };
        let mut cursor = 0;

        for token in self.tokenizer.tokens(buffer) {
            let span = token.span();
            let matched = token.as_str(buffer);
            report.output.push_str(&buffer[cursor..span.start]);
            cursor = span.end;
            let start = report.output.len();

            let (name, default, braced) = match token {
                Token::Escaped { literal, .. } => {
                    report.output.push_str(literal);
                    report.escapes += 1;
                    continue;
                }
                Token::Named { name, .. } if !self.options.allow_parse_named => {
                    report.output.push_str(matched);
                    report.substitutions.push(Substitution {
                        variable: name.to_string(),
                        braced: false,
                        source: span,
                        output: start..report.output.len(),
                        resolution: Resolution::Inert,
                    });
                    continue;
                }
                Token::Named { name, default, .. } => (name, default, false),
                Token::Braced { name, default, .. } => (name, default, true),
            };

            let resolution = if let Some(value) = report.replacements.get(matched) {
                report.output.push_str(value);
                if env.lookup(name).is_some() {
                    Resolution::Environment
                } else {
                    Resolution::Default
                }
            } else if let Some(value) = env.lookup(name) {
                report.output.push_str(&value);
                report
                    .replacements
                    .insert(matched.to_string(), value.into_owned());
                Resolution::Environment
            } else if let Some(default) = default {
                report.output.push_str(default);
                report
                    .replacements
                    .insert(matched.to_string(), default.to_string());
                Resolution::Default
            } else {
                report.output.push_str(matched);
                report.unresolved.insert(name.to_string());
                Resolution::Unresolved
            };

            log::trace!("{} at {:?} -> {:?}", matched, span, resolution);
            report.substitutions.push(Substitution {
                variable: name.to_string(),
                braced,
                source: span,
                output: start..report.output.len(),
                resolution,
            });
        }

        report.output.push_str(&buffer[cursor..]);
        log::debug!(
            "Interpolated {} references ({} distinct replacements, {} unresolved, {} escapes)",
            report.substitutions.len(),
            report.replacements.len(),
            report.unresolved.len(),
            report.escapes
        );
        report
    }

    /// Distinct variable names referenced by `buffer`, in first-seen order
    ///
    /// Named references are included only when named parsing is enabled.
    pub fn references(&self, buffer: &str) -> Vec<String> {
        let names: IndexSet<&str> = self
            .tokenizer
            .tokens(buffer)
            .filter(|t| match t {
                Token::Escaped { .. } => false,
                Token::Braced { .. } => true,
                Token::Named { .. } => self.options.allow_parse_named,
            })
            .filter_map(|t| t.name())
            .collect();
        names.into_iter().map(str::to_string).collect()
    }
}

/// Interpolate a buffer in one call
pub fn interpolate<E: Environment + ?Sized>(
    buffer: &str,
    env: &E,
    strict: bool,
    allow_named: bool,
    separator: &str,
) -> Result<String> {
    let options = InterpolateOptions::default()
        .strict(strict)
        .allow_parse_named(allow_named)
        .separator(separator);
    Interpolator::new(options)?.interpolate(buffer, env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn test_env() -> HashMap<String, String> {
        env(&[
            ("YAML_TEST_ENV_VAR1", "VAR1"),
            ("YAML_TEST_ENV_VAR2", "VAR2"),
            ("VAR_KEY", "my_key"),
        ])
    }

    fn run(input: &str, strict: bool, named: bool) -> Result<String> {
        interpolate(input, &test_env(), strict, named, DEFAULT_SEPARATOR)
    }

    #[test]
    fn test_tokenize_kinds() {
        let tokenizer = Tokenizer::default();
        let input = "$$ $12 ${A} ${B|x} $C $D|y";
        let tokens: Vec<Token> = tokenizer.tokens(input).collect();

        assert_eq!(
            tokens,
            vec![
                Token::Escaped { span: 0..2, literal: "$" },
                Token::Escaped { span: 3..6, literal: "12" },
                Token::Braced { span: 7..11, name: "A", default: None },
                Token::Braced { span: 12..18, name: "B", default: Some("x") },
                Token::Named { span: 19..21, name: "C", default: None },
                Token::Named { span: 22..26, name: "D", default: Some("y") },
            ]
        );
    }

    #[test]
    fn test_tokenize_first_brace_closes() {
        let tokenizer = Tokenizer::default();
        let tokens: Vec<Token> = tokenizer.tokens("${A|b}c}").collect();
        assert_eq!(
            tokens,
            vec![Token::Braced { span: 0..6, name: "A", default: Some("b") }]
        );
    }

    #[test]
    fn test_tokenize_skips_empty_braced_name() {
        let tokenizer = Tokenizer::default();
        let tokens: Vec<Token> = tokenizer.tokens("${} ${|x}").collect();
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_named_default_runs_to_end_of_line() {
        let tokenizer = Tokenizer::default();
        let tokens: Vec<Token> = tokenizer.tokens("$A|one two\nnext").collect();
        assert_eq!(
            tokens,
            vec![Token::Named { span: 0..10, name: "A", default: Some("one two") }]
        );
    }

    #[test]
    fn test_no_dollar_is_unchanged() {
        let input = "plain: text\nlist: [1, 2]\n";
        for (strict, named) in [(true, true), (true, false), (false, true), (false, false)] {
            assert_eq!(run(input, strict, named).unwrap(), input);
        }
    }

    #[test]
    fn test_empty_buffer() {
        assert_eq!(run("", true, true).unwrap(), "");
    }

    #[test]
    fn test_braced_resolves_from_environment() {
        let env = env(&[("QUOTED", "it's \"raw\"")]);
        let out = interpolate("v: ${QUOTED}", &env, true, false, "|").unwrap();
        assert_eq!(out, "v: it's \"raw\"");
    }

    #[test]
    fn test_braced_default() {
        assert_eq!(run("${MISSING|fallback}", true, false).unwrap(), "fallback");
        assert_eq!(run("[${MISSING|}]", true, false).unwrap(), "[]");
    }

    #[test]
    fn test_environment_wins_over_default() {
        assert_eq!(run("${YAML_TEST_ENV_VAR1|other}", true, false).unwrap(), "VAR1");
    }

    #[test]
    fn test_named_inert_when_disabled() {
        assert_eq!(
            run("$YAML_TEST_ENV_VAR1 $MISSING", true, false).unwrap(),
            "$YAML_TEST_ENV_VAR1 $MISSING"
        );
        assert_eq!(run("$MISSING|dflt", true, false).unwrap(), "$MISSING|dflt");
        assert_eq!(
            run("a: $YAML_TEST_ENV_VAR1|x\nb: $MISSING|", true, false).unwrap(),
            "a: $YAML_TEST_ENV_VAR1|x\nb: $MISSING|"
        );
    }

    #[test]
    fn test_inert_named_default_is_left_opaque() {
        // The named default swallows the rest of the line, braced text included.
        assert_eq!(
            run("a: ${YAML_TEST_ENV_VAR1}\nb: $FOO|${YAML_TEST_ENV_VAR1}", true, false).unwrap(),
            "a: VAR1\nb: $FOO|${YAML_TEST_ENV_VAR1}"
        );
        assert_eq!(
            run("b: $FOO|${MISSING}", true, false).unwrap(),
            "b: $FOO|${MISSING}"
        );
    }

    #[test]
    fn test_named_resolves_when_enabled() {
        assert_eq!(run("$YAML_TEST_ENV_VAR1", true, true).unwrap(), "VAR1");
        assert_eq!(run("$MISSING|dflt", true, true).unwrap(), "dflt");
    }

    #[test]
    fn test_escapes() {
        assert_eq!(run("cost: $$5", true, false).unwrap(), "cost: $5");
        assert_eq!(run("fmt: $42", true, false).unwrap(), "fmt: 42");
        assert_eq!(run("$$YAML_TEST_ENV_VAR1", true, true).unwrap(), "$YAML_TEST_ENV_VAR1");
    }

    #[test]
    fn test_escape_before_reference_keeps_positions() {
        let out = run("$$ $1 ${YAML_TEST_ENV_VAR1} $$ ${YAML_TEST_ENV_VAR2}", true, false).unwrap();
        assert_eq!(out, "$ 1 VAR1 $ VAR2");
    }

    #[test]
    fn test_strict_failure_lists_all_names() {
        let err = run("${ZED} ${ALPHA} ${ZED}", true, false).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::UnresolvedVariables {
                names: vec!["ALPHA".into(), "ZED".into()]
            }
        );
    }

    #[test]
    fn test_strict_ignores_inert_named() {
        assert!(run("$MISSING", true, false).is_ok());
        assert!(run("$MISSING", true, true).is_err());
    }

    #[test]
    fn test_non_strict_keeps_unresolved_text() {
        assert_eq!(
            run("a/${MISSING}/${YAML_TEST_ENV_VAR2}", false, false).unwrap(),
            "a/${MISSING}/VAR2"
        );
    }

    #[test]
    fn test_every_occurrence_replaced() {
        let out = run("${YAML_TEST_ENV_VAR1}-${YAML_TEST_ENV_VAR1}-${YAML_TEST_ENV_VAR1}", true, false)
            .unwrap();
        assert_eq!(out, "VAR1-VAR1-VAR1");
    }

    #[test]
    fn test_prefix_names_do_not_collide() {
        let env = env(&[("NAME", "short"), ("NAME_LONG", "long")]);
        let out = interpolate("$NAME $NAME_LONG ${NAME}${NAME_LONG}", &env, true, true, "|").unwrap();
        assert_eq!(out, "short long shortlong");
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let env = env(&[("OUTER", "${INNER}"), ("INNER", "nope")]);
        assert_eq!(interpolate("${OUTER}", &env, true, false, "|").unwrap(), "${INNER}");
    }

    #[test]
    fn test_idempotent_once_resolved() {
        let input = "a: ${YAML_TEST_ENV_VAR1}\nb: ${NOT_EXIST|abc}\n";
        let once = run(input, true, false).unwrap();
        let twice = run(&once, true, false).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_scenario_named_disabled() {
        let input = r#"test_1/$YAML_TEST_ENV_VAR1/${YAML_TEST_ENV_VAR2}/"${NOT_EXIST|abc}""#;
        assert_eq!(
            run(input, true, false).unwrap(),
            r#"test_1/$YAML_TEST_ENV_VAR1/VAR2/"abc""#
        );
    }

    #[test]
    fn test_scenario_named_enabled() {
        let input = r#"test_1/$YAML_TEST_ENV_VAR1/${YAML_TEST_ENV_VAR2}/"${NOT_EXIST|abc}""#;
        assert_eq!(run(input, true, true).unwrap(), r#"test_1/VAR1/VAR2/"abc""#);
    }

    #[test]
    fn test_scenario_key_position() {
        let input = r#"${VAR_KEY}: test_1/${YAML_TEST_ENV_VAR2}/"${NOT_EXIST|abc}""#;
        assert_eq!(run(input, true, false).unwrap(), r#"my_key: test_1/VAR2/"abc""#);
    }

    #[test]
    fn test_custom_separator() {
        let env = env(&[("SET", "value")]);
        let out = interpolate("${SET:-x} ${UNSET:-fallback} ${UNSET|x}", &env, false, false, ":-")
            .unwrap();
        assert_eq!(out, "value fallback ${UNSET|x}");
    }

    #[test]
    fn test_empty_separator_rejected() {
        let err = Interpolator::new(InterpolateOptions::default().separator("")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOptions);
    }

    #[test]
    fn test_report_tracks_output_spans() {
        let interpolator = Interpolator::new(InterpolateOptions::default()).unwrap();
        let input = "$$${YAML_TEST_ENV_VAR1} ${MISSING}";
        let report = interpolator.analyze(input, &test_env());

        assert_eq!(report.output, "$VAR1 ${MISSING}");
        assert_eq!(report.escapes, 1);
        assert!(!report.is_complete());
        assert_eq!(report.substitutions.len(), 2);

        let first = &report.substitutions[0];
        assert_eq!(first.source, 2..23);
        assert_eq!(&report.output[first.output.clone()], "VAR1");
        assert_eq!(first.resolution, Resolution::Environment);

        let second = &report.substitutions[1];
        assert_eq!(&report.output[second.output.clone()], "${MISSING}");
        assert_eq!(second.resolution, Resolution::Unresolved);
    }

    #[test]
    fn test_report_replacement_table_shared() {
        let interpolator = Interpolator::default();
        let report = interpolator.analyze("${X|1} ${X|1} ${X|2}", &env(&[]));

        assert_eq!(report.output, "1 1 2");
        assert_eq!(report.replacements.len(), 2);
        assert_eq!(report.replacements.get("${X|1}").map(String::as_str), Some("1"));
        assert_eq!(report.substitutions[1].resolution, Resolution::Default);
    }

    #[test]
    fn test_references() {
        let input = "${A} $B ${A|x} $$ $1 ${C}";
        let disabled = Interpolator::default();
        assert_eq!(disabled.references(input), vec!["A", "C"]);

        let enabled =
            Interpolator::new(InterpolateOptions::default().allow_parse_named(true)).unwrap();
        assert_eq!(enabled.references(input), vec!["A", "B", "C"]);
    }
}

//! XSD constraining facets
//!
//! Facets collected from one `xs:restriction` step. Each derivation step
//! carries its own [`Facets`]; a value must satisfy every step on the way to
//! the built-in type.

use std::fmt;

use regex::Regex;

use super::builtins::{parse_decimal, Builtin};
use crate::error::{SchemaError, ValidationError};

/// White space handling modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhiteSpace {
    /// Preserve all white space
    Preserve,
    /// Replace tabs and newlines with spaces
    Replace,
    /// Replace and collapse multiple spaces
    Collapse,
}

impl WhiteSpace {
    /// Parse from the facet value
    pub fn parse(s: &str) -> Result<Self, SchemaError> {
        match s {
            "preserve" => Ok(WhiteSpace::Preserve),
            "replace" => Ok(WhiteSpace::Replace),
            "collapse" => Ok(WhiteSpace::Collapse),
            _ => Err(SchemaError::new(format!(
                "Invalid whiteSpace value: '{}'. Must be 'preserve', 'replace', or 'collapse'",
                s
            ))),
        }
    }

    /// Normalize a string according to this white space mode
    pub fn normalize(&self, s: &str) -> String {
        match self {
            WhiteSpace::Preserve => s.to_string(),
            WhiteSpace::Replace => s.replace(['\t', '\n', '\r'], " "),
            WhiteSpace::Collapse => s.split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }
}

/// A compiled `pattern` facet
#[derive(Debug, Clone)]
pub(crate) struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, SchemaError> {
        let translated = translate_pattern(source);
        let regex = Regex::new(&format!("^(?:{})$", translated))
            .map_err(|e| SchemaError::new(format!("invalid pattern '{}': {}", source, e)))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Rewrite an XSD regular expression in `regex` crate syntax.
///
/// XSD expressions are implicitly anchored, treat `^` and `$` as literals,
/// add the `\i` and `\c` name classes and spell class subtraction `[a-z-[aeiou]]`.
fn translate_pattern(pattern: &str) -> String {
    const NAME_START: &str = r"_:\p{L}";
    const NAME_CHAR: &str = r"\-._:\p{L}\p{N}";

    let mut out = String::with_capacity(pattern.len() + 8);
    let mut depth = 0usize;
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('i') if depth > 0 => out.push_str(NAME_START),
                Some('c') if depth > 0 => out.push_str(NAME_CHAR),
                Some('i') => out.push_str(&format!("[{}]", NAME_START)),
                Some('c') => out.push_str(&format!("[{}]", NAME_CHAR)),
                Some('I') => out.push_str(&format!("[^{}]", NAME_START)),
                Some('C') => out.push_str(&format!("[^{}]", NAME_CHAR)),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push_str(r"\\"),
            },
            '[' => {
                depth += 1;
                out.push('[');
            }
            ']' if depth > 0 => {
                depth -= 1;
                out.push(']');
            }
            '-' if depth > 0 && chars.peek() == Some(&'[') => {
                chars.next();
                depth += 1;
                out.push_str("&&[^");
            }
            '^' | '$' if depth == 0 => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Facets of one restriction step
#[derive(Debug, Clone, Default)]
pub(crate) struct Facets {
    pub white_space: Option<WhiteSpace>,
    pub length: Option<usize>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Patterns of the same step; any one of them may match
    pub patterns: Vec<Pattern>,
    pub enumeration: Vec<String>,
    pub min_inclusive: Option<String>,
    pub max_inclusive: Option<String>,
    pub min_exclusive: Option<String>,
    pub max_exclusive: Option<String>,
    pub total_digits: Option<u32>,
    pub fraction_digits: Option<u32>,
}

fn parse_count<T: std::str::FromStr>(facet: &str, value: &str) -> Result<T, SchemaError> {
    value
        .trim()
        .parse()
        .map_err(|_| SchemaError::new(format!("{} must be a non-negative integer, got '{}'", facet, value)))
}

impl Facets {
    /// Check if `name` is a facet element of `xs:restriction`
    pub fn is_facet(name: &str) -> bool {
        matches!(
            name,
            "whiteSpace"
                | "length"
                | "minLength"
                | "maxLength"
                | "pattern"
                | "enumeration"
                | "minInclusive"
                | "maxInclusive"
                | "minExclusive"
                | "maxExclusive"
                | "totalDigits"
                | "fractionDigits"
        )
    }

    /// Record the facet `name` with `value`
    pub fn add(&mut self, name: &str, value: &str) -> Result<(), SchemaError> {
        match name {
            "whiteSpace" => self.white_space = Some(WhiteSpace::parse(value)?),
            "length" => self.length = Some(parse_count(name, value)?),
            "minLength" => self.min_length = Some(parse_count(name, value)?),
            "maxLength" => self.max_length = Some(parse_count(name, value)?),
            "pattern" => self.patterns.push(Pattern::new(value)?),
            "enumeration" => self.enumeration.push(value.to_string()),
            "minInclusive" => self.min_inclusive = Some(value.to_string()),
            "maxInclusive" => self.max_inclusive = Some(value.to_string()),
            "minExclusive" => self.min_exclusive = Some(value.to_string()),
            "maxExclusive" => self.max_exclusive = Some(value.to_string()),
            "totalDigits" => self.total_digits = Some(parse_count(name, value)?),
            "fractionDigits" => self.fraction_digits = Some(parse_count(name, value)?),
            other => return Err(SchemaError::new(format!("unsupported facet '{}'", other))),
        }
        Ok(())
    }

    /// Check a normalized value.
    ///
    /// `builtin` is the built-in type the step restricts, `None` for list and
    /// union bases. `list` selects item counting for the length facets.
    pub fn check(&self, value: &str, builtin: Option<Builtin>, list: bool) -> Result<(), ValidationError> {
        let fail = |message: String| Err(ValidationError::new(message).with_instance(value));

        let length = if list {
            value.split_whitespace().count()
        } else {
            builtin.map_or_else(|| value.chars().count(), |b| b.length_of(value))
        };
        if let Some(expected) = self.length {
            if length != expected {
                return fail(format!("length must be exactly {}, got {}", expected, length));
            }
        }
        if let Some(min) = self.min_length {
            if length < min {
                return fail(format!("length must be at least {}, got {}", min, length));
            }
        }
        if let Some(max) = self.max_length {
            if length > max {
                return fail(format!("length must be at most {}, got {}", max, length));
            }
        }

        if !self.patterns.is_empty() && !self.patterns.iter().any(|p| p.is_match(value)) {
            let patterns: Vec<String> = self.patterns.iter().map(|p| p.to_string()).collect();
            return fail(format!("value does not match pattern '{}'", patterns.join("' or '")));
        }

        if !self.enumeration.is_empty() && !self.enumeration.iter().any(|e| same_value(e, value, builtin)) {
            return fail(format!(
                "value must be one of [{}]",
                self.enumeration.join(", ")
            ));
        }

        if let Some(builtin) = builtin {
            self.check_bounds(value, builtin).or_else(fail)?;
        }

        if self.total_digits.is_some() || self.fraction_digits.is_some() {
            if let Some(decimal) = parse_decimal(value) {
                let decimal = decimal.normalize();
                let fraction = decimal.scale();
                let integral = decimal.mantissa().unsigned_abs().to_string().len() as u32;
                let total = integral.max(fraction);
                if let Some(max) = self.total_digits {
                    if total > max {
                        return fail(format!("value has more than {} total digits", max));
                    }
                }
                if let Some(max) = self.fraction_digits {
                    if fraction > max {
                        return fail(format!("value has more than {} fraction digits", max));
                    }
                }
            }
        }
        Ok(())
    }

    fn check_bounds(&self, value: &str, builtin: Builtin) -> Result<(), String> {
        let Some(actual) = builtin.ordered(value) else {
            return Ok(());
        };
        let bound = |bound: &Option<String>| bound.as_deref().and_then(|b| builtin.ordered(b));

        if let Some(min) = bound(&self.min_inclusive) {
            if !(actual >= min) {
                return Err(format!("value must be >= {}", self.min_inclusive.as_deref().unwrap_or_default()));
            }
        }
        if let Some(max) = bound(&self.max_inclusive) {
            if !(actual <= max) {
                return Err(format!("value must be <= {}", self.max_inclusive.as_deref().unwrap_or_default()));
            }
        }
        if let Some(min) = bound(&self.min_exclusive) {
            if !(actual > min) {
                return Err(format!("value must be > {}", self.min_exclusive.as_deref().unwrap_or_default()));
            }
        }
        if let Some(max) = bound(&self.max_exclusive) {
            if !(actual < max) {
                return Err(format!("value must be < {}", self.max_exclusive.as_deref().unwrap_or_default()));
            }
        }
        Ok(())
    }
}

/// Enumeration match: literal equality, or equality in the value space
fn same_value(literal: &str, value: &str, builtin: Option<Builtin>) -> bool {
    if literal == value {
        return true;
    }
    match builtin {
        Some(builtin) => match (builtin.ordered(literal.trim()), builtin.ordered(value)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        None => false,
    }
}

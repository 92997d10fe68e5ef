use core::fmt;
use std::borrow::Cow;

use crate::{
    runtime::opcodes,
    value::{Atom, Value},
};

/// Controls how values are rendered back to text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintConfig {
    /// Render single byte atoms below the root as operator keywords
    pub keywords: bool,
    /// Render every atom as bare lowercase hex
    pub only_hex: bool,
    /// `(a b . c)` instead of `(a . (b . c))`
    pub compact_lists: bool,
    /// Text used for the empty atom
    pub nil: Cow<'static, str>,
    /// Pairs nested deeper than this render as `...`; `None` is unlimited
    pub max_depth: Option<usize>,
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            keywords: true,
            only_hex: false,
            compact_lists: true,
            nil: Cow::Borrowed("()"),
            max_depth: None,
        }
    }
}

impl PrintConfig {
    /// Short renderings suitable for error messages
    pub fn errors() -> Self {
        Self {
            max_depth: Some(4),
            ..Self::default()
        }
    }

    /// Exact bytes and exact structure, nothing interpreted
    pub fn raw() -> Self {
        Self {
            keywords: false,
            only_hex: true,
            compact_lists: false,
            nil: Cow::Borrowed("nil"),
            max_depth: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    keywords: bool,
    not_root: bool,
    depth: Option<usize>,
}

impl Frame {
    fn keywords_if(self, keep: bool) -> Self {
        Self {
            keywords: self.keywords && keep,
            ..self
        }
    }
}

/// A value paired with the settings to render it, see [`display`]
pub struct Printed<'a> {
    value: &'a Value,
    config: &'a PrintConfig,
}

pub fn display<'a>(value: &'a Value, config: &'a PrintConfig) -> Printed<'a> {
    Printed { value, config }
}

impl fmt::Display for Printed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frame = Frame {
            keywords: self.config.keywords,
            not_root: false,
            depth: self.config.max_depth,
        };
        write_value(f, self.value, self.config, frame)
    }
}

fn is_printable(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| (b' '..=b'~').contains(b))
}

fn write_atom(
    f: &mut fmt::Formatter<'_>,
    atom: &Atom,
    config: &PrintConfig,
    frame: Frame,
) -> fmt::Result {
    let bytes = atom.as_bytes();
    if bytes.is_empty() {
        return f.write_str(&config.nil);
    }
    if frame.keywords && frame.not_root {
        if let [opcode] = bytes {
            if let Some(operator) = opcodes::operator(*opcode) {
                return f.write_str(operator.keyword);
            }
        }
    }
    if config.only_hex {
        return f.write_str(&hex::encode(bytes));
    }
    if bytes == [0x00] {
        return f.write_str("0x00");
    }
    if bytes.len() <= 2 {
        return write!(f, "{}", atom.as_int());
    }
    if is_printable(bytes) {
        f.write_str("\"")?;
        for byte in bytes {
            write!(f, "{}", char::from(*byte))?;
        }
        return f.write_str("\"");
    }
    write!(f, "0x{}", hex::encode(bytes))
}

// Pending output, processed last in first out
enum Step<'v> {
    Value(&'v Value, Frame),
    // The remainder of a pair whose first element is already written
    Rest(&'v Value, Frame),
    Close,
}

fn write_value(
    f: &mut fmt::Formatter<'_>,
    value: &Value,
    config: &PrintConfig,
    frame: Frame,
) -> fmt::Result {
    let mut steps = vec![Step::Value(value, frame)];
    while let Some(step) = steps.pop() {
        match step {
            Step::Value(Value::Atom(atom), frame) => write_atom(f, atom, config, frame)?,
            Step::Value(Value::Pair(pair), frame) => {
                let depth = match frame.depth {
                    Some(0) => {
                        f.write_str("...")?;
                        continue;
                    }
                    Some(depth) => Some(depth - 1),
                    None => None,
                };
                let inner = Frame {
                    keywords: frame.keywords,
                    not_root: true,
                    depth,
                };
                f.write_str("(")?;
                steps.push(Step::Close);
                steps.push(Step::Rest(pair.rest(), inner));
                steps.push(Step::Value(pair.first(), inner));
            }
            Step::Rest(rest, inner) if config.compact_lists => match rest {
                Value::Atom(atom) if atom.is_empty() => {}
                Value::Pair(next) => {
                    f.write_str(" ")?;
                    let item = next.first();
                    steps.push(Step::Rest(next.rest(), inner));
                    steps.push(Step::Value(item, inner.keywords_if(item.is_pair())));
                }
                Value::Atom(_) => {
                    f.write_str(" . ")?;
                    steps.push(Step::Value(rest, inner.keywords_if(false)));
                }
            },
            Step::Rest(rest, inner) => {
                f.write_str(" . ")?;
                steps.push(Step::Value(rest, inner.keywords_if(rest.is_pair())));
            }
            Step::Close => f.write_str(")")?,
        }
    }
    Ok(())
}

//! Representation of CLVM values
//!
//! Everything the language touches is one of two shapes: an immutable byte
//! string ([`Atom`]) or an ordered pair of values ([`Pair`]). Lists are
//! right-nested pairs terminated by the empty atom.
use core::fmt;
use std::{mem, sync::Arc};

use arbitrary::{Arbitrary, Unstructured};
use bytes::Bytes;

use crate::{
    ir::{self, PrintConfig},
    runtime::{EvalError, EvalErrorKind},
};

/// An immutable byte string.
///
/// Equality is byte-wise: `0x01` and `0x0001` are different atoms even though
/// they denote the same integer.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(Bytes);

impl Atom {
    /// The empty atom, read as nil, false and zero
    pub const NIL: Atom = Atom(Bytes::new());
    /// The canonical true value
    pub const TRUE: Atom = Atom(Bytes::from_static(&[0x01]));

    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shares the underlying buffer, no copy is made
    pub fn slice(&self, range: core::ops::Range<usize>) -> Self {
        Self(self.0.slice(range))
    }
}

impl AsRef<[u8]> for Atom {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Bytes> for Atom {
    fn from(value: Bytes) -> Self {
        Self(value)
    }
}

impl From<Vec<u8>> for Atom {
    fn from(value: Vec<u8>) -> Self {
        Self(value.into())
    }
}

impl From<&'static [u8]> for Atom {
    fn from(value: &'static [u8]) -> Self {
        Self(Bytes::from_static(value))
    }
}

impl<const N: usize> From<[u8; N]> for Atom {
    fn from(value: [u8; N]) -> Self {
        Self::from_slice(&value)
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Atom(0x{})", hex::encode(&self.0))
    }
}

// Pairs own their children by value; the Arc only makes clones cheap.
#[derive(Clone)]
pub enum Value {
    Atom(Atom),
    Pair(Arc<Pair>),
}

pub struct Pair {
    first: Value,
    rest: Value,
}

impl Pair {
    pub fn new(first: Value, rest: Value) -> Self {
        Self { first, rest }
    }

    pub fn first(&self) -> &Value {
        &self.first
    }

    pub fn rest(&self) -> &Value {
        &self.rest
    }
}

// Long lists would otherwise be dropped through one native frame per element.
impl Drop for Pair {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        for child in [mem::take(&mut self.first), mem::take(&mut self.rest)] {
            if let Value::Pair(pair) = child {
                pending.push(pair);
            }
        }
        while let Some(pair) = pending.pop() {
            if let Some(mut pair) = Arc::into_inner(pair) {
                for child in [mem::take(&mut pair.first), mem::take(&mut pair.rest)] {
                    if let Value::Pair(pair) = child {
                        pending.push(pair);
                    }
                }
            }
        }
    }
}

impl fmt::Debug for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pair")
            .field("first", &self.first)
            .field("rest", &self.rest)
            .finish()
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::NIL
    }
}

impl Value {
    pub const NIL: Value = Value::Atom(Atom::NIL);
    pub const TRUE: Value = Value::Atom(Atom::TRUE);

    pub fn atom(atom: impl Into<Atom>) -> Self {
        Self::Atom(atom.into())
    }

    pub fn pair(first: Value, rest: Value) -> Self {
        Self::Pair(Arc::new(Pair::new(first, rest)))
    }

    pub fn bool(value: bool) -> Self {
        if value {
            Self::TRUE
        } else {
            Self::NIL
        }
    }

    /// Builds a proper list, terminated by nil
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::list_with_tail(items, Self::NIL)
    }

    /// Builds a list whose last `rest` is `tail` instead of nil
    pub fn list_with_tail(items: impl IntoIterator<Item = Value>, tail: Value) -> Self {
        let items = items.into_iter().collect::<Vec<_>>();
        items
            .into_iter()
            .rev()
            .fold(tail, |rest, first| Self::pair(first, rest))
    }

    pub fn as_atom(&self) -> Option<&Atom> {
        match self {
            Self::Atom(atom) => Some(atom),
            Self::Pair(_) => None,
        }
    }

    pub fn as_pair(&self) -> Option<&Pair> {
        match self {
            Self::Atom(_) => None,
            Self::Pair(pair) => Some(pair),
        }
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Self::Pair(_))
    }

    /// Only the empty atom is nil; pairs are never nil
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Atom(atom) if atom.is_empty())
    }

    /// Number of elements of a proper list, `None` if some `rest` is a
    /// non-nil atom.
    pub fn list_len(&self) -> Option<usize> {
        let mut len = 0;
        let mut cursor = self;
        loop {
            match cursor {
                Self::Pair(pair) => {
                    len += 1;
                    cursor = pair.rest();
                }
                Self::Atom(atom) if atom.is_empty() => return Some(len),
                Self::Atom(_) => return None,
            }
        }
    }

    /// Iterates the elements of a list, failing once on a malformed tail
    pub fn iter(&self) -> ListIter<'_> {
        ListIter {
            root: self,
            cursor: Some(self),
            index: 0,
        }
    }

    /// Renders this value in the textual IR
    pub fn display<'a>(&'a self, config: &'a PrintConfig) -> ir::Printed<'a> {
        ir::display(self, config)
    }
}

impl From<Atom> for Value {
    fn from(value: Atom) -> Self {
        Self::Atom(value)
    }
}

// Iterative so that comparing deep trees cannot exhaust the native stack.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some((left, right)) = pending.pop() {
            match (left, right) {
                (Self::Atom(left), Self::Atom(right)) => {
                    if left != right {
                        return false;
                    }
                }
                (Self::Pair(left), Self::Pair(right)) => {
                    if Arc::ptr_eq(left, right) {
                        continue;
                    }
                    pending.push((left.rest(), right.rest()));
                    pending.push((left.first(), right.first()));
                }
                _ => return false,
            }
        }
        true
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", ir::display(self, &PrintConfig::default()))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", ir::display(self, &PrintConfig::raw()))
    }
}

pub struct ListIter<'a> {
    root: &'a Value,
    cursor: Option<&'a Value>,
    index: usize,
}

impl<'a> Iterator for ListIter<'a> {
    type Item = Result<&'a Value, EvalError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.cursor.take()? {
            Value::Pair(pair) => {
                self.cursor = Some(pair.rest());
                self.index += 1;
                Some(Ok(pair.first()))
            }
            Value::Atom(atom) if atom.is_empty() => None,
            tail => Some(Err(EvalError::new(EvalErrorKind::MalformedList {
                index: self.index,
            })
            .with("item", tail.clone())
            .with("list", self.root.clone()))),
        }
    }
}

// Bounded so generated trees stay small enough to be useful in property tests
const MAX_ARBITRARY_DEPTH: usize = 12;

fn arbitrary_at_depth(u: &mut Unstructured<'_>, depth: usize) -> arbitrary::Result<Value> {
    if depth < MAX_ARBITRARY_DEPTH && u.arbitrary::<bool>()? {
        let first = arbitrary_at_depth(u, depth + 1)?;
        let rest = arbitrary_at_depth(u, depth + 1)?;
        Ok(Value::pair(first, rest))
    } else {
        let bytes: Vec<u8> = u.arbitrary()?;
        Ok(Value::atom(bytes))
    }
}

impl<'a> Arbitrary<'a> for Value {
    fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
        arbitrary_at_depth(u, 0)
    }
}

//! Field paths and immutable get/set/unset on value trees.
//!
//! A path string such as `users[0].name` parses once into a sequence of
//! segments. Dotted, bracketed and quoted spellings of the same location
//! (`a.b[0]`, `a['b'][0]`, `a.b.0`) produce equal [`Path`]s, and the
//! `Display` form is the canonical spelling used as registry key.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::PathError;
use crate::value::{Map, Value};

/// Largest digit segment read as a list index; larger ones are map keys.
pub const MAX_INDEX: usize = 100_000;

/// One step into a value tree.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Seg {
    /// Map key: `.name`, `['name']`
    Key(String),
    /// List index: `[0]`, `.0`
    Index(usize),
}

impl Seg {
    fn classify(raw: &str) -> Seg {
        if !raw.is_empty()
            && raw.bytes().all(|b| b.is_ascii_digit())
            && let Ok(i) = raw.parse::<usize>()
            && i <= MAX_INDEX
        {
            return Seg::Index(i);
        }
        Seg::Key(raw.to_owned())
    }

    /// The map key this segment addresses when it lands on a map.
    fn map_key(&self) -> String {
        match self {
            Seg::Key(k) => k.clone(),
            Seg::Index(i) => i.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Path(SmallVec<[Seg; 4]>);

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> Result<Path, PathError> {
        if input.is_empty() {
            return Err(PathError::Empty);
        }
        let bytes = input.as_bytes();
        let mut segs = SmallVec::new();
        let mut i = 0;
        // true right after a '.', where a segment must follow
        let mut expect_seg = true;

        while i < bytes.len() {
            match bytes[i] {
                b'.' => {
                    if expect_seg {
                        return Err(PathError::EmptySegment {
                            path: input.to_owned(),
                            at: i,
                        });
                    }
                    expect_seg = true;
                    i += 1;
                }
                b'[' => {
                    let (seg, next) = parse_bracket(input, i)?;
                    segs.push(seg);
                    expect_seg = false;
                    i = next;
                }
                _ => {
                    let start = i;
                    while i < bytes.len() && bytes[i] != b'.' && bytes[i] != b'[' {
                        i += 1;
                    }
                    segs.push(Seg::classify(&input[start..i]));
                    expect_seg = false;
                }
            }
        }
        if expect_seg {
            return Err(PathError::EmptySegment {
                path: input.to_owned(),
                at: input.len(),
            });
        }
        Ok(Path(segs))
    }

    pub fn segments(&self) -> &[Seg] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Parses `[...]` starting at `open`; returns the segment and the byte after `]`.
fn parse_bracket(input: &str, open: usize) -> Result<(Seg, usize), PathError> {
    let bytes = input.as_bytes();
    let mut i = open + 1;
    match bytes.get(i) {
        Some(&quote @ (b'\'' | b'"')) => {
            let quote = quote as char;
            let start = i + 1;
            let mut raw = String::new();
            let mut close = None;
            let mut chars = input[start..].char_indices();
            while let Some((at, c)) = chars.next() {
                match c {
                    '\\' => match chars.next() {
                        Some((_, escaped)) => raw.push(escaped),
                        None => break,
                    },
                    c if c == quote => {
                        close = Some(start + at);
                        break;
                    }
                    c => raw.push(c),
                }
            }
            let Some(end) = close else {
                return Err(PathError::UnterminatedQuote {
                    path: input.to_owned(),
                    at: i,
                });
            };
            if bytes.get(end + 1) != Some(&b']') {
                return Err(PathError::UnclosedBracket {
                    path: input.to_owned(),
                    at: open,
                });
            }
            if raw.is_empty() {
                return Err(PathError::EmptySegment {
                    path: input.to_owned(),
                    at: start,
                });
            }
            Ok((Seg::classify(&raw), end + 2))
        }
        _ => {
            let start = i;
            while i < bytes.len() && bytes[i] != b']' {
                i += 1;
            }
            if i == bytes.len() {
                return Err(PathError::UnclosedBracket {
                    path: input.to_owned(),
                    at: open,
                });
            }
            let raw = input[start..i].trim();
            if raw.is_empty() {
                return Err(PathError::EmptySegment {
                    path: input.to_owned(),
                    at: start,
                });
            }
            Ok((Seg::classify(raw), i + 1))
        }
    }
}

impl std::str::FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, seg) in self.0.iter().enumerate() {
            match seg {
                Seg::Index(i) => write!(f, "[{i}]")?,
                Seg::Key(k) if k.contains(['.', '[', ']']) => write_quoted(f, k)?,
                Seg::Key(k) if n == 0 => write!(f, "{k}")?,
                Seg::Key(k) => write!(f, ".{k}")?,
            }
        }
        Ok(())
    }
}

/// `['key']`, or `["key"]` when only that avoids escaping.
fn write_quoted(f: &mut fmt::Formatter<'_>, key: &str) -> fmt::Result {
    let quote = if key.contains('\'') && !key.contains('"') {
        '"'
    } else {
        '\''
    };
    write!(f, "[{quote}")?;
    for c in key.chars() {
        if c == quote || c == '\\' {
            write!(f, "\\")?;
        }
        write!(f, "{c}")?;
    }
    write!(f, "{quote}]")
}

/// Parses each distinct path string once.
#[derive(Default)]
pub struct PathCache {
    parsed: RefCell<HashMap<Rc<str>, Path>>,
}

impl PathCache {
    pub fn resolve(&self, raw: &str) -> Result<Path, PathError> {
        if let Some(path) = self.parsed.borrow().get(raw) {
            return Ok(path.clone());
        }
        let path = Path::parse(raw)?;
        self.parsed.borrow_mut().insert(Rc::from(raw), path.clone());
        Ok(path)
    }
}

pub fn get<'a>(root: &'a Value, path: &Path) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(root, |current, seg| match (current, seg) {
            (Value::Map(map), seg) => map.get(&seg.map_key()),
            (Value::List(items), Seg::Index(i)) => items.get(*i),
            _ => None,
        })
}

/// Returns a tree with `value` stored at `path`.
///
/// Missing intermediates are created: an index segment makes a list (padded
/// with `Null`), a key segment makes a map. A scalar or a list met by a key
/// segment is replaced. When the tree already holds an equal value at `path`
/// the input is returned as is.
pub fn set(root: &Value, path: &Path, value: Value) -> Value {
    if get(root, path) == Some(&value) {
        return root.clone();
    }
    set_in(root.clone(), path.segments(), value)
}

fn set_in(current: Value, segs: &[Seg], value: Value) -> Value {
    let Some((head, rest)) = segs.split_first() else {
        return value;
    };
    match (current, head) {
        (Value::Map(mut map), seg) => {
            let key = seg.map_key();
            let entries = Rc::make_mut(&mut map);
            let child = entries.remove(&key).unwrap_or_default();
            entries.insert(key, set_in(child, rest, value));
            Value::Map(map)
        }
        (Value::List(mut items), Seg::Index(i)) => {
            let entries = Rc::make_mut(&mut items);
            if entries.len() <= *i {
                entries.resize(i + 1, Value::Null);
            }
            let child = std::mem::take(&mut entries[*i]);
            entries[*i] = set_in(child, rest, value);
            Value::List(items)
        }
        (_, Seg::Key(k)) => {
            let mut map = Map::new();
            map.insert(k.clone(), set_in(Value::Null, rest, value));
            Value::from(map)
        }
        (_, Seg::Index(i)) => {
            let mut entries = vec![Value::Null; i + 1];
            entries[*i] = set_in(Value::Null, rest, value);
            Value::from(entries)
        }
    }
}

/// Returns a tree without the leaf at `path`. Map leaves are removed, list
/// leaves become `Null` so later indices keep their positions. Ancestors
/// are left in place, even when they end up empty.
pub fn unset(root: &Value, path: &Path) -> Value {
    if path.is_empty() || get(root, path).is_none() {
        return root.clone();
    }
    unset_in(root.clone(), path.segments())
}

fn unset_in(current: Value, segs: &[Seg]) -> Value {
    let Some((head, rest)) = segs.split_first() else {
        return current;
    };
    match (current, head) {
        (Value::Map(mut map), seg) => {
            let key = seg.map_key();
            let entries = Rc::make_mut(&mut map);
            if rest.is_empty() {
                entries.remove(&key);
            } else if let Some(child) = entries.remove(&key) {
                entries.insert(key, unset_in(child, rest));
            }
            Value::Map(map)
        }
        (Value::List(mut items), Seg::Index(i)) => {
            let entries = Rc::make_mut(&mut items);
            if let Some(slot) = entries.get_mut(*i) {
                let child = std::mem::take(slot);
                *slot = if rest.is_empty() {
                    Value::Null
                } else {
                    unset_in(child, rest)
                };
            }
            Value::List(items)
        }
        (other, _) => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    #[test]
    fn test_mixed_notations_are_equivalent() {
        let dotted = p("a.b[0].c");
        assert_eq!(dotted, p("a['b'][0].c"));
        assert_eq!(dotted, p("a.b.0.c"));
        assert_eq!(dotted, p(r#"a["b"][0]["c"]"#));
        assert_eq!(dotted.to_string(), "a.b[0].c");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Path::parse(""), Err(PathError::Empty));
        assert!(matches!(Path::parse("a..b"), Err(PathError::EmptySegment { .. })));
        assert!(matches!(Path::parse("a."), Err(PathError::EmptySegment { .. })));
        assert!(matches!(Path::parse("a[0"), Err(PathError::UnclosedBracket { .. })));
        assert!(matches!(Path::parse("a['b"), Err(PathError::UnterminatedQuote { .. })));
        assert!(matches!(Path::parse("a[]"), Err(PathError::EmptySegment { .. })));
    }

    #[test]
    fn test_quoted_keys_keep_dots() {
        let path = p("headers['x.y']");
        assert_eq!(path.segments()[1], Seg::Key("x.y".into()));
        assert_eq!(path.to_string(), "headers['x.y']");
        assert_eq!(p(&path.to_string()), path);
    }

    #[test]
    fn test_quoted_keys_with_quotes_render_back() {
        let path = p(r#"notes["it's.here"]"#);
        assert_eq!(path.segments()[1], Seg::Key("it's.here".into()));
        assert_eq!(path.to_string(), r#"notes["it's.here"]"#);
        assert_eq!(p(&path.to_string()), path);

        let both = p(r#"notes['say \'hi\' "now".']"#);
        assert_eq!(both.segments()[1], Seg::Key(r#"say 'hi' "now"."#.into()));
        assert_eq!(p(&both.to_string()), both);
    }

    #[test]
    fn test_huge_indices_stay_keys() {
        assert_eq!(p("a[100000]").segments()[1], Seg::Index(MAX_INDEX));
        assert_eq!(p("a[100001]").segments()[1], Seg::Key("100001".into()));
        assert_eq!(
            p("a[18446744073709551615]").segments()[1],
            Seg::Key("18446744073709551615".into())
        );

        let next = set(&Value::map(), &p("a[99999999999]"), Value::from("x"));
        assert_eq!(next, Value::from(json!({ "a": { "99999999999": "x" } })));
        assert_eq!(get(&next, &p("a.99999999999")), Some(&Value::from("x")));
    }

    #[test]
    fn test_get_set_round_trip() {
        let root = Value::from(json!({ "name": "jared" }));
        for spelling in ["users[0].name", "users.0.name", "['users'][0]['name']"] {
            let next = set(&root, &p(spelling), Value::from("ian"));
            assert_eq!(get(&next, &p("users[0].name")), Some(&Value::from("ian")));
            assert_eq!(get(&next, &p(spelling)), Some(&Value::from("ian")));
        }
    }

    #[test]
    fn test_set_creates_container_from_next_segment() {
        let next = set(&Value::map(), &p("friends[2].name"), Value::from("sam"));
        assert_eq!(
            next,
            Value::from(json!({ "friends": [null, null, { "name": "sam" }] }))
        );
        let next = set(&Value::map(), &p("address.zip"), Value::from("01234"));
        assert_eq!(next, Value::from(json!({ "address": { "zip": "01234" } })));
    }

    #[test]
    fn test_set_replaces_scalar_intermediate() {
        let root = Value::from(json!({ "a": 1 }));
        let next = set(&root, &p("a.b"), Value::from(true));
        assert_eq!(next, Value::from(json!({ "a": { "b": true } })));
    }

    #[test]
    fn test_set_never_mutates_input() {
        let root = Value::from(json!({ "a": { "b": 1 }, "c": [1, 2] }));
        let before = root.clone();
        let _ = set(&root, &p("a.b"), Value::from(2));
        let _ = set(&root, &p("c[5]"), Value::from(3));
        assert_eq!(root, before);
    }

    #[test]
    fn test_set_shares_untouched_siblings() {
        let root = Value::from(json!({ "a": { "x": 1 }, "b": { "y": 2 } }));
        let next = set(&root, &p("a.x"), Value::from(5));
        let (Value::Map(old), Value::Map(new)) = (&root, &next) else {
            panic!("expected maps");
        };
        let (Value::Map(old_b), Value::Map(new_b)) = (&old["b"], &new["b"]) else {
            panic!("expected maps");
        };
        assert!(Rc::ptr_eq(old_b, new_b));
    }

    #[test]
    fn test_set_same_value_returns_same_tree() {
        let root = Value::from(json!({ "a": { "b": "x" } }));
        let next = set(&root, &p("a.b"), Value::from("x"));
        let (Value::Map(old), Value::Map(new)) = (&root, &next) else {
            panic!("expected maps");
        };
        assert!(Rc::ptr_eq(old, new));
    }

    #[test]
    fn test_unset_keeps_empty_ancestors() {
        let root = Value::from(json!({ "a": { "b": "x" }, "list": ["p", "q"] }));
        let next = unset(&root, &p("a.b"));
        assert_eq!(next, Value::from(json!({ "a": {}, "list": ["p", "q"] })));
        let next = unset(&next, &p("list[0]"));
        assert_eq!(next, Value::from(json!({ "a": {}, "list": [null, "q"] })));
        assert_eq!(unset(&next, &p("missing.path")), next);
    }

    #[test]
    fn test_path_cache_returns_parsed_paths() {
        let cache = PathCache::default();
        assert_eq!(cache.resolve("a[0]").unwrap(), p("a.0"));
        assert_eq!(cache.resolve("a[0]").unwrap(), p("a.0"));
        assert!(cache.resolve("a[").is_err());
    }
}

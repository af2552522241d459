//! Interface description and data types of the box canister.
//!
//! ```text
//! openDirectory   : (text) -> (Directory) query
//! openFile        : (text) -> (File) query
//! readFile        : (text, opt int64, opt int64) -> (blob) query
//! createDirectory : (text) -> (Directory)
//! createFile      : (text, text) -> (File)
//! writeFile       : (text, blob, opt int64) -> ()
//! ```

use std::fmt;

use canister::Interface;
use canister::Type;
use canister::Value;
use canister::idl;
use percent_encoding::AsciiSet;
use percent_encoding::CONTROLS;
use percent_encoding::percent_decode_str;
use percent_encoding::utf8_percent_encode;

/// Bytes escaped when a segment is written out: controls and the characters
/// that would split or truncate the path.
const SEGMENT: &AsciiSet = &CONTROLS.add(b'/').add(b'#').add(b'?');

pub fn interface() -> Interface {
    Interface::new("box")
        .query("openDirectory", [Type::Text], [Directory::idl_type()])
        .query("openFile", [Type::Text], [File::idl_type()])
        .query(
            "readFile",
            [Type::Text, Type::opt(Type::Int64), Type::opt(Type::Int64)],
            [Type::Blob],
        )
        .update("createDirectory", [Type::Text], [Directory::idl_type()])
        .update("createFile", [Type::Text, Type::Text], [File::idl_type()])
        .update("writeFile", [Type::Text, Type::Blob, Type::opt(Type::Int64)], [])
}

/// A `/`-separated path. Empty segments are dropped, so `"/a//b/"` is `a/b`.
///
/// On the wire each segment is percent-encoded, so a name may itself contain
/// `/`, `#` or `?`: `"/a%2Fb"` is the single segment `a/b`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses the wire form, percent-decoding each segment.
    ///
    /// Invalid UTF-8 after decoding is replaced, never rejected.
    pub fn parse(text: &str) -> Self {
        Self {
            segments: text
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
                .collect(),
        }
    }

    /// Builds a path from already decoded segment names. Empty names are
    /// dropped.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments
                .into_iter()
                .map(Into::into)
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Splits off the last segment. `None` for the root.
    pub fn split_last(&self) -> Option<(&[String], &str)> {
        self.segments
            .split_last()
            .map(|(name, parent)| (parent, name.as_str()))
    }

    pub fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

/// The wire form: `/` followed by the percent-encoded segments.
impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}", utf8_percent_encode(segment, SEGMENT))?;
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl From<String> for Path {
    fn from(text: String) -> Self {
        Self::parse(&text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub size: u64,
    pub content_type: String,
}

impl File {
    pub fn idl_type() -> Type {
        Type::record([("size", Type::Nat64), ("contentType", Type::Text)])
    }

    pub fn to_value(&self) -> Value {
        Value::record([
            ("size", Value::Nat64(self.size)),
            ("contentType", Value::text(self.content_type.clone())),
        ])
    }

    pub fn from_value(value: &Value) -> idl::Result<Self> {
        Ok(Self {
            size: value.field("size")?.as_nat64()?,
            content_type: value.field("contentType")?.as_text()?.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File(File),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub kind: EntryKind,
}

impl Entry {
    pub fn idl_type() -> Type {
        Type::record([
            ("name", Type::Text),
            (
                "kind",
                Type::variant([("Directory", Type::Null), ("File", File::idl_type())]),
            ),
        ])
    }

    pub fn to_value(&self) -> Value {
        let kind = match &self.kind {
            EntryKind::Directory => Value::variant("Directory", Value::Null),
            EntryKind::File(file) => Value::variant("File", file.to_value()),
        };
        Value::record([("name", Value::text(self.name.clone())), ("kind", kind)])
    }

    pub fn from_value(value: &Value) -> idl::Result<Self> {
        let kind = match value.field("kind")?.as_variant()? {
            ("Directory", _) => EntryKind::Directory,
            ("File", file) => EntryKind::File(File::from_value(file)?),
            (other, _) => return Err(idl::Error::UnknownCase(other.to_string())),
        };
        Ok(Self {
            name: value.field("name")?.as_text()?.to_string(),
            kind,
        })
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }
}

/// A directory listing, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    pub entries: Vec<Entry>,
}

impl Directory {
    pub fn idl_type() -> Type {
        Type::record([("entries", Type::vec(Entry::idl_type()))])
    }

    pub fn to_value(&self) -> Value {
        Value::record([(
            "entries",
            Value::Vec(self.entries.iter().map(Entry::to_value).collect()),
        )])
    }

    pub fn from_value(value: &Value) -> idl::Result<Self> {
        let entries = value
            .field("entries")?
            .as_vec()?
            .iter()
            .map(Entry::from_value)
            .collect::<idl::Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_parsing() {
        assert_eq!(Path::parse("/a//b/").segments(), ["a", "b"]);
        assert_eq!(Path::parse("a/b").to_string(), "/a/b");
        assert!(Path::parse("///").is_root());
        assert_eq!(Path::root().to_string(), "/");
    }

    #[test]
    fn test_segments_are_percent_decoded() {
        assert_eq!(Path::parse("/a%2Fb").segments(), ["a/b"]);
        assert_eq!(Path::parse("/docs/what%3F%23").segments(), ["docs", "what?#"]);
        assert_eq!(Path::parse("/caf%C3%A9").segments(), ["café"]);
        assert_eq!(Path::parse("/bad%FF").segments(), ["bad\u{FFFD}"]);
    }

    #[test]
    fn test_reserved_characters_survive_the_wire() {
        let path = Path::from_segments(["reports", "q1/q2?#draft", "tab\there"]);
        let text = path.to_string();
        assert_eq!(text, "/reports/q1%2Fq2%3F%23draft/tab%09here");
        assert_eq!(Path::parse(&text), path);

        // Non-ASCII is always encoded, other printable ASCII never.
        assert_eq!(Path::from_segments(["a b", "café", "50%"]).to_string(), "/a b/caf%C3%A9/50%");
        assert_eq!(Path::parse("/a b/caf%C3%A9/50%").segments(), ["a b", "café", "50%"]);
    }
}

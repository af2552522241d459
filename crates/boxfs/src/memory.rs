//! # In-memory box canister
//!
//! A native implementation of the box interface, keeping the whole tree in
//! memory. Useful for local development against a `LocalReplica` and for
//! tests.
//!
//! Files are capped at [`MAX_FILE_SIZE`] bytes. The tree survives upgrades:
//! it is written out with bincode before the swap and read back into the new
//! instance.

use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use canister::Mode;
use canister::Value;
use canister::idl;
use replica::NativeCanister;
use serde::Deserialize;
use serde::Serialize;

use crate::types::Directory;
use crate::types::Entry;
use crate::types::EntryKind;
use crate::types::File;
use crate::types::Path;

/// Largest file a `MemoryFs` holds, 64 MiB.
pub const MAX_FILE_SIZE: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    NotFound(String),
    NotADirectory(String),
    NotAFile(String),
    InvalidRange { start: i64, end: i64, size: u64 },
    NegativeOffset(i64),
    /// A write would end past `MAX_FILE_SIZE`.
    FileTooLarge { offset: i64, len: usize },
    UnknownMethod(String),
    /// State-changing method called as a query.
    QueryNotAllowed(String),
    MissingArgument(usize),
    BadArgument(idl::Error),
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "No such file or directory: {}", path),
            Self::NotADirectory(path) => write!(f, "Not a directory: {}", path),
            Self::NotAFile(path) => write!(f, "Not a file: {}", path),
            Self::InvalidRange { start, end, size } => {
                write!(f, "Invalid range {}..{} for file of {} bytes", start, end, size)
            }
            Self::NegativeOffset(offset) => write!(f, "Negative write offset {}", offset),
            Self::FileTooLarge { offset, len } => write!(
                f,
                "Writing {} bytes at offset {} exceeds the {} byte file size limit",
                len, offset, MAX_FILE_SIZE
            ),
            Self::UnknownMethod(method) => write!(f, "Unknown method '{}'", method),
            Self::QueryNotAllowed(method) => write!(f, "'{}' must be called as an update", method),
            Self::MissingArgument(index) => write!(f, "Missing argument {}", index),
            Self::BadArgument(e) => write!(f, "Bad argument: {}", e),
        }
    }
}

impl std::error::Error for FsError {}

impl From<idl::Error> for FsError {
    fn from(e: idl::Error) -> Self {
        Self::BadArgument(e)
    }
}

pub type Result<T> = std::result::Result<T, FsError>;

#[derive(Serialize, Deserialize)]
struct FileData {
    content_type: String,
    data: Vec<u8>,
}

impl FileData {
    fn info(&self) -> File {
        File {
            size: self.data.len() as u64,
            content_type: self.content_type.clone(),
        }
    }
}

#[derive(Serialize, Deserialize)]
enum Node {
    Dir(Dir),
    File(FileData),
}

/// Children in creation order.
#[derive(Default, Serialize, Deserialize)]
struct Dir {
    entries: Vec<(String, Node)>,
}

impl Dir {
    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }

    fn get(&self, name: &str) -> Option<&Node> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, node)| node)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }

    fn listing(&self) -> Directory {
        Directory {
            entries: self
                .entries
                .iter()
                .map(|(name, node)| Entry {
                    name: name.clone(),
                    kind: match node {
                        Node::Dir(_) => EntryKind::Directory,
                        Node::File(file) => EntryKind::File(file.info()),
                    },
                })
                .collect(),
        }
    }
}

/// In-memory box file system.
#[derive(Default)]
pub struct MemoryFs {
    root: Mutex<Dir>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory for `LocalReplica::register_module`.
    pub fn factory() -> Arc<dyn NativeCanister> {
        Arc::new(Self::new())
    }

    pub fn open_directory(&self, path: &Path) -> Result<Directory> {
        let root = self.lock();
        Ok(walk(&root, path.segments(), path)?.listing())
    }

    pub fn open_file(&self, path: &Path) -> Result<File> {
        let root = self.lock();
        Ok(find_file(&root, path)?.info())
    }

    pub fn read_file(&self, path: &Path, start: Option<i64>, end: Option<i64>) -> Result<Vec<u8>> {
        let root = self.lock();
        let file = find_file(&root, path)?;

        let size = file.data.len() as i64;
        let mut start = start.unwrap_or(0);
        let mut end = end.unwrap_or(size);
        if start < 0 {
            start += size;
        }
        if end < 0 {
            end += size;
        }
        if start < 0 || start > end || end > size {
            return Err(FsError::InvalidRange {
                start,
                end,
                size: size as u64,
            });
        }

        Ok(file.data[start as usize..end as usize].to_vec())
    }

    /// Creates every missing directory along `path` and lists the last one.
    pub fn create_directory(&self, path: &Path) -> Result<Directory> {
        let mut root = self.lock();
        let mut dir: &mut Dir = &mut root;

        for segment in path.segments() {
            let index = match dir.position(segment) {
                Some(index) => index,
                None => {
                    dir.entries.push((segment.clone(), Node::Dir(Dir::default())));
                    dir.entries.len() - 1
                }
            };
            dir = match &mut dir.entries[index].1 {
                Node::Dir(sub) => sub,
                Node::File(_) => return Err(FsError::NotADirectory(path.to_string())),
            };
        }

        Ok(dir.listing())
    }

    /// Creates an empty file, truncating an existing one.
    pub fn create_file(&self, path: &Path, content_type: &str) -> Result<File> {
        let (parent, name) = path
            .split_last()
            .ok_or_else(|| FsError::NotAFile(path.to_string()))?;

        let mut root = self.lock();
        let dir = walk_mut(&mut root, parent, path)?;

        let file = FileData {
            content_type: content_type.to_string(),
            data: Vec::new(),
        };
        let info = file.info();

        match dir.position(name) {
            Some(index) => {
                if let Node::Dir(_) = dir.entries[index].1 {
                    return Err(FsError::NotAFile(path.to_string()));
                }
                dir.entries[index].1 = Node::File(file);
            }
            None => dir.entries.push((name.to_string(), Node::File(file))),
        }

        Ok(info)
    }

    pub fn write_file(&self, path: &Path, data: &[u8], offset: Option<i64>) -> Result<()> {
        let offset = offset.unwrap_or(0);
        if offset < 0 {
            return Err(FsError::NegativeOffset(offset));
        }

        let end = (offset as u64)
            .checked_add(data.len() as u64)
            .filter(|end| *end <= MAX_FILE_SIZE)
            .ok_or(FsError::FileTooLarge {
                offset,
                len: data.len(),
            })?;
        let (start, end) = (offset as usize, end as usize);

        let mut root = self.lock();
        let file = find_file_mut(&mut root, path)?;

        if file.data.len() < end {
            file.data.resize(end, 0);
        }
        file.data[start..end].copy_from_slice(data);
        Ok(())
    }

    /// Encodes the whole tree.
    pub fn snapshot(&self) -> anyhow::Result<Vec<u8>> {
        Ok(bincode::serialize(&*self.lock())?)
    }

    /// Replaces the whole tree with one written by `snapshot`.
    pub fn restore(&self, snapshot: &[u8]) -> anyhow::Result<()> {
        let root: Dir = bincode::deserialize(snapshot)?;
        *self.lock() = root;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Dir> {
        self.root.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn walk<'a>(mut dir: &'a Dir, segments: &[String], path: &Path) -> Result<&'a Dir> {
    for segment in segments {
        dir = match dir.get(segment) {
            Some(Node::Dir(sub)) => sub,
            Some(Node::File(_)) => return Err(FsError::NotADirectory(path.to_string())),
            None => return Err(FsError::NotFound(path.to_string())),
        };
    }
    Ok(dir)
}

fn walk_mut<'a>(mut dir: &'a mut Dir, segments: &[String], path: &Path) -> Result<&'a mut Dir> {
    for segment in segments {
        dir = match dir.get_mut(segment) {
            Some(Node::Dir(sub)) => sub,
            Some(Node::File(_)) => return Err(FsError::NotADirectory(path.to_string())),
            None => return Err(FsError::NotFound(path.to_string())),
        };
    }
    Ok(dir)
}

fn find_file<'a>(root: &'a Dir, path: &Path) -> Result<&'a FileData> {
    let (parent, name) = path
        .split_last()
        .ok_or_else(|| FsError::NotAFile(path.to_string()))?;

    match walk(root, parent, path)?.get(name) {
        Some(Node::File(file)) => Ok(file),
        Some(Node::Dir(_)) => Err(FsError::NotAFile(path.to_string())),
        None => Err(FsError::NotFound(path.to_string())),
    }
}

fn find_file_mut<'a>(root: &'a mut Dir, path: &Path) -> Result<&'a mut FileData> {
    let (parent, name) = path
        .split_last()
        .ok_or_else(|| FsError::NotAFile(path.to_string()))?;

    match walk_mut(root, parent, path)?.get_mut(name) {
        Some(Node::File(file)) => Ok(file),
        Some(Node::Dir(_)) => Err(FsError::NotAFile(path.to_string())),
        None => Err(FsError::NotFound(path.to_string())),
    }
}

fn arg(args: &[Value], index: usize) -> Result<&Value> {
    args.get(index).ok_or(FsError::MissingArgument(index))
}

fn path_arg(args: &[Value], index: usize) -> Result<Path> {
    Ok(Path::parse(arg(args, index)?.as_text()?))
}

fn opt_int_arg(args: &[Value], index: usize) -> Result<Option<i64>> {
    match arg(args, index)?.as_opt()? {
        Some(value) => Ok(Some(value.as_int64()?)),
        None => Ok(None),
    }
}

#[async_trait::async_trait]
impl NativeCanister for MemoryFs {
    async fn handle(&self, method: &str, mode: Mode, args: Vec<Value>) -> anyhow::Result<Vec<Value>> {
        let is_update = matches!(method, "createDirectory" | "createFile" | "writeFile");
        if is_update && mode == Mode::Query {
            return Err(FsError::QueryNotAllowed(method.to_string()).into());
        }

        let reply = match method {
            "openDirectory" => vec![self.open_directory(&path_arg(&args, 0)?)?.to_value()],
            "openFile" => vec![self.open_file(&path_arg(&args, 0)?)?.to_value()],
            "readFile" => {
                let data = self.read_file(
                    &path_arg(&args, 0)?,
                    opt_int_arg(&args, 1)?,
                    opt_int_arg(&args, 2)?,
                )?;
                vec![Value::Blob(data)]
            }
            "createDirectory" => vec![self.create_directory(&path_arg(&args, 0)?)?.to_value()],
            "createFile" => {
                let content_type = arg(&args, 1)?.as_text().map_err(FsError::from)?;
                vec![self.create_file(&path_arg(&args, 0)?, content_type)?.to_value()]
            }
            "writeFile" => {
                let data = arg(&args, 1)?.as_blob().map_err(FsError::from)?;
                self.write_file(&path_arg(&args, 0)?, data, opt_int_arg(&args, 2)?)?;
                vec![]
            }
            other => return Err(FsError::UnknownMethod(other.to_string()).into()),
        };

        Ok(reply)
    }

    fn snapshot(&self) -> anyhow::Result<Vec<u8>> {
        MemoryFs::snapshot(self)
    }

    fn restore(&self, snapshot: &[u8]) -> anyhow::Result<()> {
        MemoryFs::restore(self, snapshot)
    }
}

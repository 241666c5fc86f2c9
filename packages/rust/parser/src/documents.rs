//! Lazy, restartable walk over the XML documents of unpacked archives.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::debug;

use ttabkit_shared::{Result, TtabError};

use crate::xml::EntryReader;

/// Sorted list of `.xml` paths under a root. Files are opened only when
/// their entries are requested, and the set can be iterated any number of times.
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    paths: Vec<PathBuf>,
}

impl DocumentSet {
    /// Collect every `.xml` file under `root`, recursively, in path order.
    pub fn scan(root: &Path) -> Result<Self> {
        let mut paths = Vec::new();
        if root.is_file() {
            if is_xml(root) {
                paths.push(root.to_path_buf());
            }
        } else {
            walk(root, &mut paths)?;
        }
        paths.sort();
        debug!(root = %root.display(), documents = paths.len(), "scanned document set");
        Ok(Self { paths })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Document<'_>> {
        self.paths.iter().map(|p| Document { path: p })
    }
}

fn is_xml(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| TtabError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| TtabError::io(dir, e))?.path();
        if path.is_dir() {
            // Half-extracted staging directories are not documents yet.
            if path
                .extension()
                .is_some_and(|ext| ext == "unpacking")
            {
                continue;
            }
            walk(&path, out)?;
        } else if is_xml(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// One XML file within a [`DocumentSet`].
#[derive(Debug, Clone, Copy)]
pub struct Document<'a> {
    path: &'a Path,
}

impl<'a> Document<'a> {
    pub fn path(&self) -> &'a Path {
        self.path
    }

    /// File name, used as the record's source reference.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Open the file and stream its entries.
    pub fn entries(&self) -> Result<EntryReader<BufReader<File>>> {
        let file = File::open(self.path).map_err(|e| TtabError::io(self.path, e))?;
        Ok(EntryReader::new(BufReader::new(file)))
    }
}

// src/fs/mock.rs

use super::FileSystem;
use anyhow::{Result, anyhow};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
enum Node {
    File(String),
    Dir,
}

/// In-memory tree. Adding a file creates all of its parent directories.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    nodes: Arc<Mutex<BTreeMap<PathBuf, Node>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref();
        let mut nodes = self.nodes.lock().unwrap();
        Self::add_parents(&mut nodes, path);
        nodes.insert(path.to_path_buf(), Node::File(content.into()));
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut nodes = self.nodes.lock().unwrap();
        Self::add_parents(&mut nodes, path);
        nodes.insert(path.to_path_buf(), Node::Dir);
    }

    fn add_parents(nodes: &mut BTreeMap<PathBuf, Node>, path: &Path) {
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            nodes.entry(ancestor.to_path_buf()).or_insert(Node::Dir);
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        match self.nodes.lock().unwrap().get(path) {
            Some(Node::File(content)) => Ok(content.clone()),
            Some(Node::Dir) => Err(anyhow!("{:?} is a directory", path)),
            None => Err(anyhow!("file not found: {:?}", path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.nodes.lock().unwrap().contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.nodes.lock().unwrap().get(path), Some(Node::Dir))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let nodes = self.nodes.lock().unwrap();
        if !matches!(nodes.get(path), Some(Node::Dir)) {
            return Err(anyhow!("directory not found: {:?}", path));
        }
        Ok(nodes
            .keys()
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_create_parent_directories() {
        let fs = MockFileSystem::new();
        fs.add_file("inst/small/a.txt", "1");
        fs.add_file("inst/small/b.txt", "2");

        assert!(fs.is_dir(Path::new("inst")));
        assert_eq!(
            fs.read_dir(Path::new("inst/small")).unwrap(),
            vec![PathBuf::from("inst/small/a.txt"), PathBuf::from("inst/small/b.txt")]
        );
        assert_eq!(fs.read_to_string(Path::new("inst/small/b.txt")).unwrap(), "2");
    }
}

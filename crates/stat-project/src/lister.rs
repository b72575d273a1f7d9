//! Directory listing used to discover headers in include directories.

use std::fs;
use std::io;

/// Source of directory contents for header discovery.
///
/// Implementations return the entry names of `directory` sorted by name.
pub trait DirectoryLister {
    fn list(&self, directory: &str) -> io::Result<Vec<String>>;
}

/// Lists directories on the local filesystem.
///
/// Entries whose names are not valid UTF-8 cannot be spelled as project
/// paths and are left out.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLister;

impl DirectoryLister for FsLister {
    fn list(&self, directory: &str) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(directory)? {
            match entry?.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => {
                    tracing::debug!("Skipping non UTF-8 entry {:?} in {}", raw, directory);
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

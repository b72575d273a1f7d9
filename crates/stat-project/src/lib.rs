//! STAT project model
//!
//! Turns the variable table of a STAT makefile into the file views used by
//! tooling that walks a test product: a tree of sources, a tree of headers,
//! a combined tree, and a flat enumeration of every project file.
//!
//! Headers are resolved by name. Declared dummy interfaces always win, then
//! include directories are searched in order and the first directory that
//! provides a header name owns it.
//!
//! # Example
//!
//! ```no_run
//! use stat_project::ProjectModel;
//!
//! let project = ProjectModel::open("products/simple.mak")?;
//! for file in project.files() {
//!     println!("{}", file?);
//! }
//! # Ok::<(), stat_project::ProjectError>(())
//! ```

mod headers;
mod lister;
mod project;

pub use headers::{HeaderFiles, HeaderRegistry};
pub use lister::{DirectoryLister, FsLister};
pub use project::ProjectModel;

use std::io;

/// Error type for project model operations
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("Failed to read makefile: {0}")]
    Makefile(#[from] stat_makefile::MakefileError),

    #[error("Failed to load STAT attributes: {0}")]
    Attributes(#[from] stat_config::StatConfigError),

    #[error("Failed to list include directory {directory:?}: {source}")]
    Listing {
        directory: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to place file in tree: {0}")]
    Tree(#[from] stat_tree::TreeError),
}

pub type Result<T> = std::result::Result<T, ProjectError>;

//! STAT project tooling
//!
//! Re-exports the pieces needed to load a STAT makefile and walk the files of
//! the test product it describes.

pub use stat_config::{StatAttributes, StatConfigError};
pub use stat_makefile::{MakefileError, StatMakefile};
pub use stat_project::{
    DirectoryLister, FsLister, HeaderFiles, HeaderRegistry, ProjectError,
    ProjectModel, Result,
};
pub use stat_tree::{DirectoryTree, Node, NodeId, NodeKind, TreeError};

/// Makefile keys read by [`ProjectModel`].
pub mod keys {
    pub use stat_makefile::{DEFINES, INCLUDES, INTERFACES, OUTPUT_NAME, SOURCES};
}

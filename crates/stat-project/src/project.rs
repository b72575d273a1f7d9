//! STAT project built from a STAT makefile.

use crate::headers::HeaderFiles;
use crate::lister::{DirectoryLister, FsLister};
use crate::Result;
use once_cell::unsync::OnceCell;
use stat_config::StatAttributes;
use stat_makefile::{StatMakefile, DEFINES, INCLUDES, INTERFACES, OUTPUT_NAME, SOURCES};
use stat_tree::DirectoryTree;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::SplitWhitespace;

/// Project described by a STAT makefile.
///
/// The file trees are built on first access and kept for the lifetime of
/// the model. A failed build leaves the view unbuilt, so a later call tries
/// again.
pub struct ProjectModel {
    makefile_path: PathBuf,
    makefile: StatMakefile,
    attributes: StatAttributes,
    lister: Box<dyn DirectoryLister>,
    tree: OnceCell<DirectoryTree>,
    sources: OnceCell<DirectoryTree>,
    headers: OnceCell<DirectoryTree>,
}

impl ProjectModel {
    /// Load the makefile at `path` with default attributes.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_attributes(path, StatAttributes::default())
    }

    /// Load the makefile at `path` with the attributes configured under
    /// `tool_root`, falling back to defaults when none are saved.
    pub fn open_in(tool_root: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<Self> {
        let attributes = StatAttributes::load_or_default(tool_root)?;
        Self::with_attributes(path, attributes)
    }

    pub fn with_attributes(path: impl AsRef<Path>, attributes: StatAttributes) -> Result<Self> {
        let path = path.as_ref();
        let makefile = StatMakefile::from_path(path)?;
        let mut project = Self::from_parts(makefile, attributes, FsLister);
        project.makefile_path = path.to_path_buf();
        Ok(project)
    }

    /// Build a model from an already parsed makefile and a custom lister.
    pub fn from_parts(
        makefile: StatMakefile,
        attributes: StatAttributes,
        lister: impl DirectoryLister + 'static,
    ) -> Self {
        Self {
            makefile_path: makefile.path.clone(),
            makefile,
            attributes,
            lister: Box::new(lister),
            tree: OnceCell::new(),
            sources: OnceCell::new(),
            headers: OnceCell::new(),
        }
    }

    /// Path of the makefile this project was loaded from.
    pub fn makefile_path(&self) -> &Path {
        &self.makefile_path
    }

    pub fn makefile(&self) -> &StatMakefile {
        &self.makefile
    }

    pub fn attributes(&self) -> &StatAttributes {
        &self.attributes
    }

    pub fn project_name(&self) -> &str {
        &self.makefile.name
    }

    pub fn output_name(&self) -> Option<&str> {
        self.makefile.get(OUTPUT_NAME)
    }

    pub fn definitions(&self) -> Vec<&str> {
        self.makefile.list(DEFINES).collect()
    }

    /// Every source and header file of the project.
    pub fn tree(&self) -> Result<&DirectoryTree> {
        self.tree.get_or_try_init(|| self.build("project", self.files()))
    }

    pub fn sources(&self) -> Result<&DirectoryTree> {
        self.sources
            .get_or_try_init(|| self.build("sources", self.source_files().map(Ok)))
    }

    pub fn headers(&self) -> Result<&DirectoryTree> {
        self.headers
            .get_or_try_init(|| self.build("headers", self.header_files()))
    }

    /// Source paths followed by resolved header paths.
    ///
    /// Nothing is cached; each call starts a fresh resolution.
    pub fn files(&self) -> impl Iterator<Item = Result<String>> + '_ {
        self.source_files()
            .map(|source| Ok(source.to_string()))
            .chain(self.header_files())
    }

    /// Source paths as listed in the makefile.
    pub fn source_files(&self) -> SplitWhitespace<'_> {
        self.makefile.list(SOURCES)
    }

    /// Resolved header paths, dummy interfaces first.
    pub fn header_files(&self) -> HeaderFiles<'_> {
        HeaderFiles::new(
            self.makefile.list(INTERFACES),
            self.makefile.list(INCLUDES),
            &self.attributes,
            self.lister.as_ref(),
        )
    }

    /// Raw makefile value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.makefile.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.makefile.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.makefile.iter()
    }

    fn build<S, I>(&self, view: &str, files: I) -> Result<DirectoryTree>
    where
        S: AsRef<str>,
        I: Iterator<Item = Result<S>>,
    {
        let mut tree = DirectoryTree::new();
        for file in files {
            tree.add_file(file?.as_ref())?;
        }
        tracing::debug!(
            "Built {} tree for {}: {} files",
            view,
            self.project_name(),
            tree.file_count()
        );
        Ok(tree)
    }
}

impl fmt::Debug for ProjectModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectModel")
            .field("makefile_path", &self.makefile_path)
            .field("name", &self.makefile.name)
            .field("attributes", &self.attributes)
            .field("tree_built", &self.tree.get().is_some())
            .field("sources_built", &self.sources.get().is_some())
            .field("headers_built", &self.headers.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProjectError;
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::io;
    use std::rc::Rc;

    #[derive(Default)]
    struct CountingLister {
        directories: HashMap<String, Vec<String>>,
        calls: Rc<Cell<usize>>,
    }

    impl CountingLister {
        fn with(mut self, directory: &str, entries: &[&str]) -> Self {
            self.directories.insert(
                directory.to_string(),
                entries.iter().map(|name| name.to_string()).collect(),
            );
            self
        }
    }

    impl DirectoryLister for CountingLister {
        fn list(&self, directory: &str) -> io::Result<Vec<String>> {
            self.calls.set(self.calls.get() + 1);
            self.directories
                .get(directory)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, directory.to_string()))
        }
    }

    fn project(contents: &str, lister: CountingLister) -> ProjectModel {
        let makefile = StatMakefile::parse("products/simple.mak", contents).unwrap();
        ProjectModel::from_parts(makefile, StatAttributes::default(), lister)
    }

    const SIMPLE: &str = "\
OUTPUT_NAME = simple_tests
SOURCES = a.c b.c
DUMMY_INTERFACES = x.h
INCLUDES = dir1
DEFINES = UNIT_TEST  STAT_SIMPLE
";

    #[test]
    fn pass_through_accessors() {
        let project = project(SIMPLE, CountingLister::default().with("dir1", &[]));
        assert_eq!(project.project_name(), "simple");
        assert_eq!(project.output_name(), Some("simple_tests"));
        assert_eq!(project.makefile_path(), Path::new("products/simple.mak"));
        assert_eq!(project.definitions(), vec!["UNIT_TEST", "STAT_SIMPLE"]);
        assert_eq!(project.get("SOURCES"), Some("a.c b.c"));
        assert_eq!(project.get("UNKNOWN"), None);
        assert_eq!(project.keys().count(), 5);
        assert_eq!(project.iter().next(), Some(("OUTPUT_NAME", "simple_tests")));
    }

    #[test]
    fn files_lists_sources_then_headers() {
        let project = project(
            SIMPLE,
            CountingLister::default().with("dir1", &["x.h", "y.h"]),
        );
        let files = project.files().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(files, vec!["a.c", "b.c", "dummies/x.h", "dir1/y.h"]);
    }

    #[test]
    fn files_restarts_on_each_call() {
        let project = project(SIMPLE, CountingLister::default().with("dir1", &["y.h"]));
        let first = project.files().collect::<Result<Vec<_>>>().unwrap();
        let second = project.files().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn views_are_built_once() {
        let lister = CountingLister::default().with("dir1", &["x.h", "y.h"]);
        let calls = Rc::clone(&lister.calls);
        let project = project(SIMPLE, lister);

        let first = project.headers().unwrap() as *const DirectoryTree;
        let second = project.headers().unwrap() as *const DirectoryTree;
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);

        project.tree().unwrap();
        project.tree().unwrap();
        assert_eq!(calls.get(), 2);
    }

    fn assert_headers_match_files(project: &ProjectModel) {
        let headers = project.headers().unwrap();
        let from_files: Vec<String> = project
            .files()
            .skip(project.source_files().count())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(headers.files().collect::<Vec<_>>(), from_files);

        let tree = project.tree().unwrap();
        for file in project.files() {
            let file = file.unwrap();
            assert!(tree.contains(&file), "{file} missing from tree");
        }
    }

    #[test]
    fn headers_and_files_agree() {
        let project = project(
            SIMPLE,
            CountingLister::default().with("dir1", &["x.h", "y.h", "z.h"]),
        );
        assert_headers_match_files(&project);
    }

    #[test]
    fn headers_and_files_agree_for_absolute_directories() {
        let contents = "\
SOURCES = /work/src/a.c work/src/a.c
DUMMY_INTERFACES = x.h
INCLUDES = /work/inc
";
        let makefile = StatMakefile::parse("abs.mak", contents).unwrap();
        let attributes = StatAttributes::default().with_dummies_directory("/opt/stat/dummies");
        let lister = CountingLister::default().with("/work/inc", &["a.h", "x.h"]);
        let project = ProjectModel::from_parts(makefile, attributes, lister);

        assert_headers_match_files(&project);
        assert_eq!(
            project.headers().unwrap().files().collect::<Vec<_>>(),
            vec!["/opt/stat/dummies/x.h", "/work/inc/a.h"]
        );
        assert_eq!(project.sources().unwrap().file_count(), 2);
    }

    #[test]
    fn conflicting_source_paths_fail_the_build() {
        let contents = "SOURCES = lib/x.c lib\n";
        let project = project(contents, CountingLister::default());
        assert!(matches!(project.sources(), Err(ProjectError::Tree(_))));
        assert_eq!(project.files().count(), 2);
    }

    #[test]
    fn sources_tree_holds_only_sources() {
        let contents = "SOURCES = src/a.c src/a.c test/t.c\n";
        let project = project(contents, CountingLister::default());
        let sources = project.sources().unwrap();
        assert_eq!(sources.files().collect::<Vec<_>>(), vec!["src/a.c", "test/t.c"]);
    }

    #[test]
    fn combined_tree_holds_everything() {
        let project = project(SIMPLE, CountingLister::default().with("dir1", &["x.h", "y.h"]));
        let tree = project.tree().unwrap();
        assert_eq!(tree.file_count(), 4);
        assert!(tree.contains("a.c"));
        assert!(tree.contains("dummies/x.h"));
        assert!(tree.contains("dir1/y.h"));
        assert!(!tree.contains("dir1/x.h"));
    }

    #[test]
    fn empty_makefile_yields_empty_views() {
        let project = project("OUTPUT_NAME = nothing\n", CountingLister::default());
        assert!(project.sources().unwrap().is_empty());
        assert!(project.headers().unwrap().is_empty());
        assert!(project.tree().unwrap().is_empty());
        assert!(project.definitions().is_empty());
        assert_eq!(project.files().count(), 0);
    }

    #[test]
    fn listing_failure_propagates_and_is_not_cached() {
        let project = project(SIMPLE, CountingLister::default());
        let err = project.headers().unwrap_err();
        assert!(matches!(err, ProjectError::Listing { ref directory, .. } if directory == "dir1"));
        assert!(project.headers().is_err());
        assert!(format!("{project:?}").contains("headers_built: false"));

        // Sources never touch include directories.
        assert_eq!(project.sources().unwrap().file_count(), 2);
    }

    #[test]
    fn custom_dummies_directory() {
        let makefile = StatMakefile::parse("p.mak", "DUMMY_INTERFACES = x.h\n").unwrap();
        let attributes = StatAttributes::default().with_dummies_directory("/opt/stat/dummies/");
        let project = ProjectModel::from_parts(makefile, attributes, CountingLister::default());
        let files = project.files().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(files, vec!["/opt/stat/dummies/x.h"]);
    }
}

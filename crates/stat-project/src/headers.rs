//! Header resolution
//!
//! Header files are identified by their base name. Resolution runs in two
//! passes and the first location to claim a name keeps it:
//!
//! 1. every declared dummy interface, located under the dummies directory;
//! 2. every header found in the include directories, in configured order.
//!
//! A later candidate with an already claimed name is dropped without notice,
//! so a real header never replaces its dummy and an earlier include
//! directory shadows later ones.

use crate::lister::DirectoryLister;
use crate::{ProjectError, Result};
use stat_config::StatAttributes;
use std::collections::HashSet;
use std::str::SplitWhitespace;
use std::vec;

/// Header base names in the order they were claimed.
#[derive(Debug, Clone, Default)]
pub struct HeaderRegistry {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl HeaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `name`. Returns `false` if it was claimed before.
    pub fn claim(&mut self, name: &str) -> bool {
        if self.seen.contains(name) {
            return false;
        }
        self.seen.insert(name.to_string());
        self.order.push(name.to_string());
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.seen.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|name| name.as_str())
    }
}

/// Lazy sequence of resolved header paths.
///
/// An include directory is listed only once iteration reaches it. Every
/// entry whose name carries the header suffix is a candidate, whatever its
/// file type. A listing failure is yielded as an error in place of that
/// directory's headers.
pub struct HeaderFiles<'a> {
    interfaces: SplitWhitespace<'a>,
    includes: SplitWhitespace<'a>,
    attributes: &'a StatAttributes,
    lister: &'a dyn DirectoryLister,
    current_directory: &'a str,
    pending: vec::IntoIter<String>,
    registry: HeaderRegistry,
}

impl<'a> HeaderFiles<'a> {
    pub(crate) fn new(
        interfaces: SplitWhitespace<'a>,
        includes: SplitWhitespace<'a>,
        attributes: &'a StatAttributes,
        lister: &'a dyn DirectoryLister,
    ) -> Self {
        Self {
            interfaces,
            includes,
            attributes,
            lister,
            current_directory: "",
            pending: Vec::new().into_iter(),
            registry: HeaderRegistry::new(),
        }
    }

    /// Names claimed so far.
    pub fn registry(&self) -> &HeaderRegistry {
        &self.registry
    }

    fn open_directory(&mut self, directory: &'a str) -> Result<()> {
        let names = self
            .lister
            .list(directory)
            .map_err(|source| ProjectError::Listing {
                directory: directory.to_string(),
                source,
            })?;

        let headers: Vec<String> = names
            .into_iter()
            .filter(|name| self.attributes.is_header(name))
            .collect();
        tracing::trace!("{} header candidates in {}", headers.len(), directory);

        self.current_directory = directory;
        self.pending = headers.into_iter();
        Ok(())
    }
}

impl Iterator for HeaderFiles<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(interface) = self.interfaces.next() {
                let path = join_path(&self.attributes.dummies_directory, interface);
                if self.registry.claim(base_name(&path)) {
                    return Some(Ok(path));
                }
                continue;
            }

            if let Some(header) = self.pending.next() {
                if self.registry.claim(&header) {
                    return Some(Ok(join_path(self.current_directory, &header)));
                }
                continue;
            }

            let directory = self.includes.next()?;
            if let Err(err) = self.open_directory(directory) {
                return Some(Err(err));
            }
        }
    }
}

/// Join `name` onto `directory` with a single `/`; absolute names stand alone.
pub(crate) fn join_path(directory: &str, name: &str) -> String {
    if directory.is_empty() || name.starts_with('/') {
        name.to_string()
    } else if directory.ends_with('/') {
        format!("{directory}{name}")
    } else {
        format!("{directory}/{name}")
    }
}

pub(crate) fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io;

    #[derive(Default)]
    struct MapLister {
        directories: HashMap<String, Vec<String>>,
    }

    impl MapLister {
        fn with(mut self, directory: &str, entries: &[&str]) -> Self {
            self.directories.insert(
                directory.to_string(),
                entries.iter().map(|name| name.to_string()).collect(),
            );
            self
        }
    }

    impl DirectoryLister for MapLister {
        fn list(&self, directory: &str) -> io::Result<Vec<String>> {
            self.directories
                .get(directory)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, directory.to_string()))
        }
    }

    fn headers<'a>(
        interfaces: &'a str,
        includes: &'a str,
        attributes: &'a StatAttributes,
        lister: &'a MapLister,
    ) -> HeaderFiles<'a> {
        HeaderFiles::new(
            interfaces.split_whitespace(),
            includes.split_whitespace(),
            attributes,
            lister,
        )
    }

    fn resolve(interfaces: &str, includes: &str, lister: &MapLister) -> Vec<String> {
        let attributes = StatAttributes::default();
        headers(interfaces, includes, &attributes, lister)
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn interfaces_shadow_include_headers() {
        let lister = MapLister::default().with("inc", &["bar.h", "foo.h"]);
        assert_eq!(
            resolve("foo.h", "inc", &lister),
            vec!["dummies/foo.h", "inc/bar.h"]
        );
    }

    #[test]
    fn first_include_directory_wins() {
        let lister = MapLister::default()
            .with("a", &["bar.h"])
            .with("b", &["bar.h", "baz.h"]);
        assert_eq!(resolve("", "a b", &lister), vec!["a/bar.h", "b/baz.h"]);
    }

    #[test]
    fn only_suffixed_entries_are_taken() {
        let lister = MapLister::default().with("inc", &["notes.txt", "util.c", "util.h"]);
        assert_eq!(resolve("", "inc", &lister), vec!["inc/util.h"]);
    }

    #[test]
    fn any_suffixed_entry_claims_its_name() {
        // `a/foo.h` may be a directory; it still shadows `b/foo.h`.
        let lister = MapLister::default()
            .with("a", &["foo.h"])
            .with("b", &["foo.h"]);
        assert_eq!(resolve("", "a b", &lister), vec!["a/foo.h"]);
    }

    #[test]
    fn configured_suffix_is_used() {
        let lister = MapLister::default().with("inc", &["a.h", "b.hpp"]);
        let attributes = StatAttributes {
            header_suffix: ".hpp".into(),
            ..StatAttributes::default()
        };
        let found = headers("", "inc", &attributes, &lister)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(found, vec!["inc/b.hpp"]);
    }

    #[test]
    fn duplicate_interface_keeps_first() {
        let lister = MapLister::default();
        assert_eq!(
            resolve("foo.h sub/foo.h bar.h", "", &lister),
            vec!["dummies/foo.h", "dummies/bar.h"]
        );
    }

    #[test]
    fn registry_tracks_claim_order() {
        let lister = MapLister::default().with("inc", &["a.h", "b.h"]);
        let attributes = StatAttributes::default();
        let mut headers = headers("z.h", "inc", &attributes, &lister);
        for header in headers.by_ref() {
            header.unwrap();
        }
        assert_eq!(headers.registry().names().collect::<Vec<_>>(), vec!["z.h", "a.h", "b.h"]);
        assert!(headers.registry().contains("a.h"));
    }

    #[test]
    fn listing_failure_is_yielded() {
        let lister = MapLister::default();
        let attributes = StatAttributes::default();
        let mut headers = headers("", "missing", &attributes, &lister);
        match headers.next() {
            Some(Err(ProjectError::Listing { directory, .. })) => assert_eq!(directory, "missing"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(headers.next().is_none());
    }

    #[test]
    fn path_helpers() {
        assert_eq!(join_path("inc/", "a.h"), "inc/a.h");
        assert_eq!(join_path("", "a.h"), "a.h");
        assert_eq!(join_path("inc", "/abs/a.h"), "/abs/a.h");
        assert_eq!(base_name("dummies/sub/a.h"), "a.h");
        assert_eq!(base_name("a.h"), "a.h");
    }
}

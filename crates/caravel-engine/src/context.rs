use semver::Version;

use caravel_catalog::Catalog;

use crate::workspace::Workspace;

/// Everything a run needs, built once per invocation.
///
/// Planning and execution both borrow this; nothing in it is mutated after
/// construction.
pub struct RunContext<'a> {
    pub workspace: Workspace,
    pub catalog: &'a dyn Catalog,
    pub client_version: Version,
}

impl<'a> RunContext<'a> {
    #[must_use]
    pub const fn new(workspace: Workspace, catalog: &'a dyn Catalog, client_version: Version) -> Self {
        Self {
            workspace,
            catalog,
            client_version,
        }
    }
}

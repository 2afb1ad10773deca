use std::collections::{BTreeSet, HashMap};

use caravel_domain::{Installation, InstallationName};

use crate::error::GraphError;

/// Directed dependency graph over the installation set.
///
/// Edges point from a dependency to its dependents. Declaration order is
/// preserved and used as the scheduler tie-break, so the same catalog always
/// produces the same execution order.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    names: Vec<InstallationName>,
    index: HashMap<InstallationName, usize>,
    dependencies: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Build the graph from the catalog's installation list.
    ///
    /// Construction is pure: no I/O, `installations` is not mutated.
    ///
    /// # Errors
    ///
    /// Returns an error when a name appears twice or a declared dependency
    /// does not resolve to a registered installation.
    pub fn build(installations: &[Installation]) -> Result<Self, GraphError> {
        let mut names = Vec::with_capacity(installations.len());
        let mut index = HashMap::with_capacity(installations.len());

        for installation in installations {
            if index
                .insert(installation.name.clone(), names.len())
                .is_some()
            {
                return Err(GraphError::DuplicateInstallation {
                    name: installation.name.clone(),
                });
            }
            names.push(installation.name.clone());
        }

        let mut dependencies = vec![Vec::new(); names.len()];
        let mut dependents = vec![Vec::new(); names.len()];
        let mut missing = Vec::new();

        for (node, installation) in installations.iter().enumerate() {
            for dependency in &installation.dependencies {
                let Some(&dep) = index.get(dependency) else {
                    missing.push(format!(
                        "{} depends on unregistered installation {dependency}",
                        installation.name
                    ));
                    continue;
                };
                dependencies[node].push(dep);
                dependents[dep].push(node);
            }
        }

        if !missing.is_empty() {
            let details = missing.join("\n  - ");
            return Err(GraphError::MissingDependency { details });
        }

        Ok(Self {
            names,
            index,
            dependencies,
            dependents,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[must_use]
    pub fn contains(&self, name: &InstallationName) -> bool {
        self.index.contains_key(name)
    }

    #[must_use]
    pub fn names(&self) -> &[InstallationName] {
        &self.names
    }

    /// Dependency-respecting execution order via Kahn's algorithm.
    ///
    /// Among simultaneously eligible nodes the one declared first wins, so
    /// repeated runs over an unchanged graph produce identical orders —
    /// required for `--from` to stay meaningful across invocations.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::CyclicDependency`] naming every node left on a
    /// cycle; a partial order is never returned.
    pub fn execution_order(&self) -> Result<Vec<InstallationName>, GraphError> {
        let mut indegree: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();

        let mut ready: BTreeSet<usize> = indegree
            .iter()
            .enumerate()
            .filter_map(|(node, &count)| (count == 0).then_some(node))
            .collect();

        let mut order = Vec::with_capacity(self.names.len());
        while let Some(node) = ready.pop_first() {
            order.push(self.names[node].clone());

            for &dependent in &self.dependents[node] {
                let Some(entry) = indegree.get_mut(dependent) else {
                    return Err(GraphError::Invariant {
                        message: "internal graph error: missing dependent indegree".to_string(),
                    });
                };
                if *entry == 0 {
                    continue;
                }
                *entry -= 1;
                if *entry == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() != self.names.len() {
            let leftovers = indegree
                .iter()
                .enumerate()
                .filter(|&(_, &count)| count > 0)
                .map(|(node, _)| self.names[node].to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(GraphError::CyclicDependency { names: leftovers });
        }

        Ok(order)
    }
}

/// Restrict `order` to members of `scope`, preserving relative order.
///
/// Never re-sorts the subgraph: ordering constraints carried through skipped
/// intermediate nodes survive the narrowing.
#[must_use]
pub fn restrict_order(
    order: &[InstallationName],
    scope: &BTreeSet<InstallationName>,
) -> Vec<InstallationName> {
    order
        .iter()
        .filter(|name| scope.contains(*name))
        .cloned()
        .collect()
}

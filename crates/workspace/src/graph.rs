//! Project dependency graph
//!
//! Project dependencies come from a hand-maintained registry, so the graph
//! tolerates unknown names and cycles: ordering never fails, it degrades and
//! warns.

use indexmap::IndexMap;
use ripple_core::Project;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::path::Path;

/// Result of a cycle-aware topological sort
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopoOrder {
    /// Every requested project exactly once
    pub order: Vec<String>,
    /// Projects that could not be ordered because of a cycle, in input order.
    /// They are also the tail of `order`.
    pub unordered: Vec<String>,
}

impl TopoOrder {
    pub fn has_cycle(&self) -> bool {
        !self.unordered.is_empty()
    }
}

/// Problems found by [`ProjectGraph::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphWarning {
    UnknownDependency { project: String, dependency: String },
    MissingTestPath { project: String, path: String },
    Cycle { projects: Vec<String> },
}

impl fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphWarning::UnknownDependency {
                project,
                dependency,
            } => write!(f, "{project} depends on unknown project '{dependency}'"),
            GraphWarning::MissingTestPath { project, path } => {
                write!(f, "{project} declares missing test path '{path}'")
            }
            GraphWarning::Cycle { projects } => {
                write!(f, "dependency cycle between {}", projects.join(", "))
            }
        }
    }
}

/// In-memory view of the project registry
#[derive(Debug, Clone, Default)]
pub struct ProjectGraph {
    projects: IndexMap<String, Project>,
    /// project -> projects that list it in `deps`
    dependents: HashMap<String, Vec<String>>,
}

impl ProjectGraph {
    /// Build the graph. Later duplicates of a name replace earlier ones.
    pub fn new(projects: impl IntoIterator<Item = Project>) -> Self {
        let projects: IndexMap<String, Project> = projects
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();

        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for project in projects.values() {
            for dep in &project.deps {
                let entry = dependents.entry(dep.clone()).or_default();
                if !entry.contains(&project.name) {
                    entry.push(project.name.clone());
                }
            }
        }

        Self {
            projects,
            dependents,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Project> {
        self.projects.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.projects.contains_key(name)
    }

    /// Projects in registry order
    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    /// Project names in registry order
    pub fn names(&self) -> Vec<String> {
        self.projects.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Declared dependencies of a project (unknown names included)
    pub fn dependencies(&self, name: &str) -> &[String] {
        self.projects
            .get(name)
            .map(|p| p.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Projects that directly depend on `name`, in registry order
    pub fn dependents(&self, name: &str) -> &[String] {
        self.dependents
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Reorder `names` so every project follows its in-set dependencies.
    ///
    /// Cycles never fail the sort: the projects that cannot be placed are
    /// appended in input order and a warning is logged.
    pub fn topo_order(&self, names: &[String]) -> Vec<String> {
        let result = self.topo_order_checked(names);
        if result.has_cycle() {
            tracing::warn!(
                projects = %result.unordered.join(", "),
                "dependency cycle detected; ordering these projects by input order"
            );
        }
        result.order
    }

    /// Kahn's algorithm restricted to `names`, emitting each round of free
    /// nodes in lexicographic order.
    pub fn topo_order_checked(&self, names: &[String]) -> TopoOrder {
        let mut seen = HashSet::new();
        let mut remaining: Vec<&str> = names
            .iter()
            .map(String::as_str)
            .filter(|n| seen.insert(*n))
            .collect();
        let in_set: HashSet<&str> = remaining.iter().copied().collect();

        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
        for &name in &remaining {
            let deps: BTreeSet<&str> = self
                .dependencies(name)
                .iter()
                .map(String::as_str)
                .filter(|d| in_set.contains(d))
                .collect();
            in_degree.insert(name, deps.len());
            for dep in deps {
                successors.entry(dep).or_default().push(name);
            }
        }

        let mut order = Vec::with_capacity(remaining.len());
        loop {
            let mut free: Vec<&str> = remaining
                .iter()
                .copied()
                .filter(|n| in_degree.get(n).copied().unwrap_or(0) == 0)
                .collect();
            if free.is_empty() {
                break;
            }
            free.sort_unstable();
            remaining.retain(|n| !free.contains(n));
            for node in free {
                for succ in successors.get(node).map(Vec::as_slice).unwrap_or(&[]) {
                    if let Some(degree) = in_degree.get_mut(succ) {
                        *degree = degree.saturating_sub(1);
                    }
                }
                order.push(node.to_string());
            }
        }

        let unordered: Vec<String> = remaining.iter().map(|n| n.to_string()).collect();
        order.extend(unordered.iter().cloned());
        TopoOrder { order, unordered }
    }

    /// The seed set plus every project whose dependencies transitively
    /// reach a seed member.
    pub fn expand_with_dependents(&self, seed: &BTreeSet<String>) -> BTreeSet<String> {
        let mut result = seed.clone();
        let mut queue: VecDeque<&str> = seed.iter().map(String::as_str).collect();
        while let Some(current) = queue.pop_front() {
            for dependent in self.dependents(current) {
                if result.insert(dependent.clone()) {
                    queue.push_back(dependent);
                }
            }
        }
        result
    }

    /// Transitive dependencies of `name`, nearest first
    pub fn transitive_dependencies(&self, name: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        let mut queue: VecDeque<&str> = VecDeque::from([name]);
        while let Some(current) = queue.pop_front() {
            for dep in self.dependencies(current) {
                if dep != name && seen.insert(dep.as_str()) {
                    result.push(dep.clone());
                    queue.push_back(dep);
                }
            }
        }
        result
    }

    /// Report unknown dependencies, missing test paths and cycles
    pub fn validate(&self, root: &Path) -> Vec<GraphWarning> {
        let mut warnings = Vec::new();
        for project in self.projects.values() {
            for dep in &project.deps {
                if !self.contains(dep) {
                    warnings.push(GraphWarning::UnknownDependency {
                        project: project.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
            for test in &project.tests {
                if !root.join(test).exists() {
                    warnings.push(GraphWarning::MissingTestPath {
                        project: project.name.clone(),
                        path: test.clone(),
                    });
                }
            }
        }

        let sorted = self.topo_order_checked(&self.names());
        let members: Vec<String> = sorted
            .unordered
            .iter()
            .filter(|name| self.reaches_itself(name))
            .cloned()
            .collect();
        if !members.is_empty() {
            warnings.push(GraphWarning::Cycle { projects: members });
        }
        warnings
    }

    fn reaches_itself(&self, start: &str) -> bool {
        let mut seen = HashSet::new();
        let mut stack: Vec<&str> = self.dependencies(start).iter().map(String::as_str).collect();
        while let Some(current) = stack.pop() {
            if current == start {
                return true;
            }
            if seen.insert(current) {
                stack.extend(self.dependencies(current).iter().map(String::as_str));
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn diamond() -> ProjectGraph {
        ProjectGraph::new([
            Project::new("app", "apps/app").with_deps(["ui", "core"]),
            Project::new("ui", "libs/ui").with_deps(["core"]),
            Project::new("core", "libs/core"),
            Project::new("cli", "apps/cli").with_deps(["core"]),
        ])
    }

    #[test]
    fn test_topo_order_places_deps_first() {
        let graph = diamond();
        let order = graph.topo_order(&names(&["app", "ui", "core", "cli"]));
        assert_eq!(order, names(&["core", "cli", "ui", "app"]));
    }

    #[test]
    fn test_topo_order_ignores_out_of_set_deps() {
        let graph = diamond();
        let order = graph.topo_order(&names(&["app", "cli"]));
        assert_eq!(order, names(&["app", "cli"]));
    }

    #[test]
    fn test_topo_order_dedupes_input() {
        let graph = diamond();
        let order = graph.topo_order(&names(&["ui", "core", "ui"]));
        assert_eq!(order, names(&["core", "ui"]));
    }

    #[test]
    fn test_cycle_falls_back_to_input_order() {
        let graph = ProjectGraph::new([
            Project::new("a", "a").with_deps(["b"]),
            Project::new("b", "b").with_deps(["a"]),
            Project::new("c", "c"),
            Project::new("d", "d").with_deps(["a"]),
        ]);
        let result = graph.topo_order_checked(&names(&["d", "b", "a", "c"]));
        assert_eq!(result.order, names(&["c", "d", "b", "a"]));
        assert_eq!(result.unordered, names(&["d", "b", "a"]));
    }

    #[test]
    fn test_expand_with_dependents() {
        let graph = diamond();
        let seed: BTreeSet<String> = ["ui".to_string()].into();
        let expanded = graph.expand_with_dependents(&seed);
        let expected: BTreeSet<String> = ["app", "ui"].iter().map(|s| s.to_string()).collect();
        assert_eq!(expanded, expected);

        let seed: BTreeSet<String> = ["core".to_string()].into();
        assert_eq!(graph.expand_with_dependents(&seed).len(), 4);
    }

    #[test]
    fn test_dependents_and_transitive_dependencies() {
        let graph = diamond();
        assert_eq!(graph.dependents("core"), &names(&["app", "ui", "cli"])[..]);
        assert_eq!(graph.transitive_dependencies("app"), names(&["ui", "core"]));
        assert!(graph.dependents("app").is_empty());
    }

    #[test]
    fn test_validate_reports_problems() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("a/tests")).unwrap();
        let graph = ProjectGraph::new([
            Project::new("a", "a")
                .with_deps(["ghost", "b"])
                .with_tests(["a/tests"]),
            Project::new("b", "b").with_deps(["a"]).with_tests(["b/tests"]),
            Project::new("c", "c").with_deps(["b"]),
        ]);

        let warnings = graph.validate(temp.path());
        assert!(warnings.contains(&GraphWarning::UnknownDependency {
            project: "a".into(),
            dependency: "ghost".into()
        }));
        assert!(warnings.contains(&GraphWarning::MissingTestPath {
            project: "b".into(),
            path: "b/tests".into()
        }));
        assert!(warnings.contains(&GraphWarning::Cycle {
            projects: names(&["a", "b"])
        }));
    }
}

//! Work planning on a petgraph DAG
//!
//! Edges point from an item to each of its dependencies, so an item's
//! outgoing neighbours are the things that must finish before it starts.

use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::{algo, Direction};
use ripple_core::{Error, Result, TaskSpec, WorkItem};
use std::collections::{HashMap, HashSet, VecDeque};

/// Ordered work items grouped into dependency tiers
#[derive(Debug, Clone)]
pub struct WorkPlan {
    graph: DiGraph<WorkItem, ()>,
    index: HashMap<String, NodeIndex>,
}

impl WorkPlan {
    /// Build a plan from items in their requested order.
    ///
    /// Dependencies naming items outside the list are ignored. A repeated
    /// name keeps its first occurrence.
    pub fn new(items: Vec<WorkItem>) -> Self {
        let mut graph = DiGraph::with_capacity(items.len(), items.len());
        let mut index = HashMap::with_capacity(items.len());

        for item in items {
            if index.contains_key(&item.name) {
                tracing::warn!(item = %item.name, "duplicate work item ignored");
                continue;
            }
            let name = item.name.clone();
            let node = graph.add_node(item);
            index.insert(name, node);
        }

        let edges: Vec<(NodeIndex, NodeIndex)> = graph
            .node_indices()
            .flat_map(|node| {
                let index = &index;
                graph[node]
                    .deps
                    .iter()
                    .filter_map(move |dep| index.get(dep).map(|&target| (node, target)))
            })
            .collect();
        for (from, to) in edges {
            if from != to {
                graph.update_edge(from, to, ());
            }
        }

        Self { graph, index }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn get(&self, name: &str) -> Option<&WorkItem> {
        self.index.get(name).map(|&node| &self.graph[node])
    }

    /// Dependencies of `name` that are part of this plan
    pub fn dependencies(&self, name: &str) -> Vec<&str> {
        let Some(&node) = self.index.get(name) else {
            return Vec::new();
        };
        let mut deps: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .collect();
        deps.sort();
        deps.into_iter()
            .map(|dep| self.graph[dep].name.as_str())
            .collect()
    }

    pub fn is_cyclic(&self) -> bool {
        algo::is_cyclic_directed(&self.graph)
    }

    /// Peel the plan into tiers of mutually independent items.
    ///
    /// Every item lands in a later tier than all of its dependencies. Items
    /// keep their input order within a tier. If the remaining items form a
    /// cycle, the first of them in input order is released on its own so the
    /// run always makes progress.
    pub fn tiers(&self) -> Vec<Vec<&WorkItem>> {
        let mut remaining: Vec<NodeIndex> = self.graph.node_indices().collect();
        let mut tiers = Vec::new();

        while !remaining.is_empty() {
            let pending: HashSet<NodeIndex> = remaining.iter().copied().collect();
            let (ready, blocked): (Vec<NodeIndex>, Vec<NodeIndex>) =
                remaining.iter().partition(|&&node| {
                    !self
                        .graph
                        .neighbors_directed(node, Direction::Outgoing)
                        .any(|dep| pending.contains(&dep))
                });

            if ready.is_empty() {
                let Some((&first, rest)) = blocked.split_first() else {
                    break;
                };
                tracing::warn!(
                    item = %self.graph[first].name,
                    waiting = rest.len(),
                    "dependency cycle between work items; releasing first item"
                );
                tiers.push(vec![&self.graph[first]]);
                remaining = rest.to_vec();
                continue;
            }

            tiers.push(ready.iter().map(|&node| &self.graph[node]).collect());
            remaining = blocked;
        }

        tiers
    }

    /// All items in tier order
    pub fn ordered(&self) -> Vec<WorkItem> {
        self.tiers()
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }
}

/// Resolve requested task names to an ordered task list.
///
/// Transitive dependencies are pulled in. An unknown task, an unknown
/// dependency, or a dependency cycle is an error: unlike the project graph,
/// the task graph must be acyclic.
pub fn resolve_tasks(specs: &IndexMap<String, TaskSpec>, requested: &[String]) -> Result<Vec<TaskSpec>> {
    if requested.is_empty() {
        return Err(Error::task_graph("no tasks requested"));
    }

    let mut included: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    for name in requested {
        if !specs.contains_key(name) {
            return Err(Error::task_graph(format!("unknown task '{name}'")));
        }
        queue.push_back(name.as_str());
    }

    while let Some(name) = queue.pop_front() {
        if !included.insert(name) {
            continue;
        }
        let Some(spec) = specs.get(name) else {
            continue;
        };
        for dep in &spec.deps {
            if dep == name {
                return Err(Error::task_graph(format!(
                    "cyclic task graph involving '{name}'"
                )));
            }
            if !specs.contains_key(dep) {
                return Err(Error::task_graph(format!(
                    "task '{name}' depends on unknown task '{dep}'"
                )));
            }
            queue.push_back(dep.as_str());
        }
    }

    let closure: Vec<TaskSpec> = specs
        .values()
        .filter(|spec| included.contains(spec.name.as_str()))
        .cloned()
        .collect();
    let plan = WorkPlan::new(closure);

    if let Err(cycle) = algo::toposort(&plan.graph, None) {
        return Err(Error::task_graph(format!(
            "cyclic task graph involving '{}'",
            plan.graph[cycle.node_id()].name
        )));
    }

    Ok(plan.ordered())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, deps: &[&str]) -> WorkItem {
        TaskSpec::new(name, format!("echo {name}")).with_deps(deps.iter().copied())
    }

    fn names(tiers: &[Vec<&WorkItem>]) -> Vec<Vec<String>> {
        tiers
            .iter()
            .map(|tier| tier.iter().map(|i| i.name.clone()).collect())
            .collect()
    }

    fn specs(items: Vec<TaskSpec>) -> IndexMap<String, TaskSpec> {
        items.into_iter().map(|t| (t.name.clone(), t)).collect()
    }

    #[test]
    fn test_tiers_follow_dependencies() {
        let plan = WorkPlan::new(vec![
            item("A", &[]),
            item("B", &["A"]),
            item("C", &["A"]),
            item("D", &["B", "C"]),
        ]);
        assert_eq!(
            names(&plan.tiers()),
            vec![vec!["A"], vec!["B", "C"], vec!["D"]]
        );
        assert_eq!(plan.dependencies("D"), vec!["B", "C"]);
    }

    #[test]
    fn test_deps_outside_the_plan_are_ignored() {
        let plan = WorkPlan::new(vec![item("B", &["A"]), item("C", &[])]);
        assert_eq!(names(&plan.tiers()), vec![vec!["B", "C"]]);
        assert!(plan.dependencies("B").is_empty());
    }

    #[test]
    fn test_cycles_still_make_progress() {
        let plan = WorkPlan::new(vec![item("X", &["Y"]), item("Y", &["X"]), item("Z", &[])]);
        assert!(plan.is_cyclic());
        let tiers = names(&plan.tiers());
        assert_eq!(tiers, vec![vec!["Z"], vec!["X"], vec!["Y"]]);
    }

    #[test]
    fn test_duplicates_keep_first() {
        let plan = WorkPlan::new(vec![item("A", &[]), TaskSpec::new("A", "other")]);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.get("A").unwrap().command, "echo A");
    }

    #[test]
    fn test_resolve_pulls_in_dependencies() {
        let specs = specs(vec![
            item("build", &["gen"]),
            item("gen", &[]),
            item("lint", &[]),
            item("test", &["build"]),
        ]);
        let ordered: Vec<String> = resolve_tasks(&specs, &["test".to_string()])
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(ordered, vec!["gen", "build", "test"]);
    }

    #[test]
    fn test_resolve_rejects_unknown_tasks() {
        let specs = specs(vec![item("build", &["missing"])]);
        let err = resolve_tasks(&specs, &["nope".to_string()]).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("unknown task 'nope'"));

        let err = resolve_tasks(&specs, &["build".to_string()]).unwrap_err();
        assert!(err.to_string().contains("unknown task 'missing'"));
    }

    #[test]
    fn test_resolve_rejects_cycles() {
        let specs = specs(vec![item("a", &["b"]), item("b", &["a"])]);
        let err = resolve_tasks(&specs, &["a".to_string()]).unwrap_err();
        assert!(matches!(err, Error::TaskGraph { .. }));
        assert!(err.to_string().contains("cyclic"));
    }

    #[test]
    fn test_resolve_rejects_self_dependency() {
        let specs = specs(vec![item("a", &["a"])]);
        let err = resolve_tasks(&specs, &["a".to_string()]).unwrap_err();
        assert!(matches!(err, Error::TaskGraph { .. }));
        assert!(err.to_string().contains("cyclic task graph involving 'a'"));
    }
}

//! Dependency graph checks used by the scheduler.

use std::collections::{HashMap, HashSet};

use crate::domain::models::Task;

/// Resolves task dependencies and detects cycles.
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver;

fn detect_cycle_util<'a>(
    node: &'a str,
    graph: &'a HashMap<&str, Vec<&str>>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> bool {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    if let Some(neighbors) = graph.get(node) {
        for &neighbor in neighbors {
            if !visited.contains(neighbor) {
                if detect_cycle_util(neighbor, graph, visited, rec_stack, path) {
                    return true;
                }
            } else if rec_stack.contains(neighbor) {
                if let Some(cycle_start) = path.iter().position(|&id| id == neighbor) {
                    path.drain(0..cycle_start);
                    return true;
                }
            }
        }
    }

    rec_stack.remove(node);
    path.pop();
    false
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Dependency ids referenced by `task` that do not exist in the list.
    pub fn unknown_dependencies(&self, task: &Task, all_tasks: &[Task]) -> Vec<String> {
        let known: HashSet<&str> = all_tasks.iter().map(|t| t.id.as_str()).collect();
        task.dependencies
            .iter()
            .filter(|dep| !known.contains(dep.as_str()))
            .cloned()
            .collect()
    }

    /// Detect a dependency cycle; returns the task ids forming it.
    pub fn detect_cycle(&self, tasks: &[Task]) -> Option<Vec<String>> {
        let mut graph: HashMap<&str, Vec<&str>> = HashMap::new();
        for task in tasks {
            graph
                .entry(task.id.as_str())
                .or_default()
                .extend(task.dependencies.iter().map(String::as_str));
        }

        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        let mut roots: Vec<&str> = graph.keys().copied().collect();
        roots.sort_unstable();
        for root in roots {
            if !visited.contains(root)
                && detect_cycle_util(root, &graph, &mut visited, &mut rec_stack, &mut path)
            {
                return Some(path.iter().map(|s| (*s).to_string()).collect());
            }
        }
        None
    }

    /// Ids of tasks that sit on any dependency cycle.
    pub fn tasks_in_cycles(&self, tasks: &[Task]) -> HashSet<String> {
        let mut in_cycles = HashSet::new();
        let mut remaining: Vec<Task> = tasks.to_vec();

        // Peel cycles one at a time; tasks on an already-found cycle are
        // excluded so distinct cycles are each reported.
        while let Some(cycle) = self.detect_cycle(&remaining) {
            for id in &cycle {
                in_cycles.insert(id.clone());
            }
            remaining.retain(|t| !in_cycles.contains(&t.id));
        }
        in_cycles
    }
}

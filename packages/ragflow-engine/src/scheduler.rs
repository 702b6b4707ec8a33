//! Execution Scheduler (C3): derives a parallel execution plan from a
//! flow's dependency graph via repeated zero-in-degree extraction (Kahn's
//! algorithm), grouping same-level nodes so the engine can dispatch each
//! group concurrently while keeping strict ordering between groups.

use std::collections::{HashMap, HashSet};

use ragflow_core::{FlowError, FlowInstance, Result};

/// An ordered execution plan: each inner `Vec` is a group of node ids that
/// may run concurrently; groups must run strictly in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub groups: Vec<Vec<String>>,
}

impl ExecutionPlan {
    pub fn node_count(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    /// A human-readable rendering, e.g. `start -> {vector_search ∥ keyword_search} -> merge`.
    pub fn render(&self) -> String {
        self.groups
            .iter()
            .map(|group| {
                if group.len() == 1 {
                    group[0].clone()
                } else {
                    format!("{{{}}}", group.join(" ∥ "))
                }
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Build the level-scheduled execution plan for `flow`.
///
/// Returns `FlowError::CycleDetected` if the dependency graph (induced by
/// `Dynamic` bindings) contains a cycle or references a node that doesn't
/// exist in `flow.nodes`.
pub fn schedule(flow: &FlowInstance) -> Result<ExecutionPlan> {
    let node_ids: Vec<&String> = flow.nodes.keys().collect();
    let mut in_degree: HashMap<&str, usize> = node_ids.iter().map(|id| (id.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = node_ids.iter().map(|id| (id.as_str(), Vec::new())).collect();

    for node in flow.nodes.values() {
        for dep in node.dependencies() {
            if !flow.nodes.contains_key(dep) {
                return Err(FlowError::UnknownBindingTarget {
                    node: node.id.clone(),
                    field: String::new(),
                    ref_node: dep.to_string(),
                });
            }
            *in_degree.get_mut(node.id.as_str()).expect("node present") += 1;
            dependents
                .get_mut(dep)
                .expect("dependency present")
                .push(node.id.as_str());
        }
    }

    let mut processed: HashSet<&str> = HashSet::new();
    let mut groups: Vec<Vec<String>> = Vec::new();

    while processed.len() < node_ids.len() {
        let ready: Vec<&str> = node_ids
            .iter()
            .map(|id| id.as_str())
            .filter(|id| !processed.contains(id) && in_degree[id] == 0)
            .collect();

        if ready.is_empty() {
            return Err(FlowError::CycleDetected);
        }

        for &id in &ready {
            processed.insert(id);
            for &dependent in &dependents[id] {
                if let Some(count) = in_degree.get_mut(dependent) {
                    *count = count.saturating_sub(1);
                }
            }
        }

        let mut group: Vec<String> = ready.into_iter().map(str::to_string).collect();
        group.sort();
        groups.push(group);
    }

    Ok(ExecutionPlan { groups })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragflow_core::{InputBinding, NodeInstance};

    fn flow_with(nodes: Vec<NodeInstance>) -> FlowInstance {
        nodes
            .into_iter()
            .fold(FlowInstance::new("f", "test"), |flow, node| flow.with_node(node))
    }

    #[test]
    fn single_node_is_one_group() {
        let flow = flow_with(vec![NodeInstance::new("a", "start")]);
        let plan = schedule(&flow).unwrap();
        assert_eq!(plan.groups, vec![vec!["a".to_string()]]);
    }

    #[test]
    fn independent_nodes_share_a_group() {
        let flow = flow_with(vec![
            NodeInstance::new("a", "start"),
            NodeInstance::new("b", "start"),
        ]);
        let plan = schedule(&flow).unwrap();
        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.groups[0].len(), 2);
    }

    #[test]
    fn linear_chain_is_sequential_groups() {
        let flow = flow_with(vec![
            NodeInstance::new("a", "start"),
            NodeInstance::new("b", "vector_search")
                .with_binding(InputBinding::dynamic("query", "a", "query")),
            NodeInstance::new("c", "llm").with_binding(InputBinding::dynamic("docs", "b", "docs")),
        ]);
        let plan = schedule(&flow).unwrap();
        assert_eq!(
            plan.groups,
            vec![vec!["a".to_string()], vec!["b".to_string()], vec!["c".to_string()]]
        );
    }

    #[test]
    fn diamond_shape_groups_parallel_branch() {
        let flow = flow_with(vec![
            NodeInstance::new("start", "start"),
            NodeInstance::new("vec", "vector_search")
                .with_binding(InputBinding::dynamic("query", "start", "query")),
            NodeInstance::new("kw", "keyword_search")
                .with_binding(InputBinding::dynamic("query", "start", "query")),
            NodeInstance::new("merge", "merge")
                .with_binding(InputBinding::dynamic("a", "vec", "docs"))
                .with_binding(InputBinding::dynamic("b", "kw", "docs")),
        ]);
        let plan = schedule(&flow).unwrap();
        assert_eq!(plan.groups.len(), 3);
        assert_eq!(plan.groups[1].len(), 2);
        assert_eq!(plan.groups[2], vec!["merge".to_string()]);
    }

    #[test]
    fn cycle_is_detected() {
        let flow = flow_with(vec![
            NodeInstance::new("a", "start").with_binding(InputBinding::dynamic("x", "b", "y")),
            NodeInstance::new("b", "start").with_binding(InputBinding::dynamic("y", "a", "x")),
        ]);
        assert!(matches!(schedule(&flow), Err(FlowError::CycleDetected)));
    }

    #[test]
    fn unknown_dependency_is_reported() {
        let flow = flow_with(vec![
            NodeInstance::new("a", "start").with_binding(InputBinding::dynamic("x", "missing", "y")),
        ]);
        assert!(matches!(
            schedule(&flow),
            Err(FlowError::UnknownBindingTarget { .. })
        ));
    }

    #[test]
    fn render_shows_parallel_groups() {
        let flow = flow_with(vec![
            NodeInstance::new("start", "start"),
            NodeInstance::new("vec", "vector_search")
                .with_binding(InputBinding::dynamic("query", "start", "query")),
            NodeInstance::new("kw", "keyword_search")
                .with_binding(InputBinding::dynamic("query", "start", "query")),
        ]);
        let plan = schedule(&flow).unwrap();
        assert_eq!(plan.render(), "start -> {kw ∥ vec}");
    }
}

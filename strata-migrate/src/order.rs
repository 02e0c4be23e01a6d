//! Dependency ordering for table creation.
//!
//! An edge `A -> B` means A references B, so B's table has to exist first.
//! Edges come from explicit `fk:<Entity>` annotations and from uuid fields
//! named `<Entity>Id` whose stem matches a known entity name
//! (case-insensitive, exact).
//!
//! [`DependencyGraph::try_topological_sort`] reports a cycle instead of
//! guessing; [`DependencyGraph::order_or_fallback`] is the lenient variant
//! that logs the cycle and keeps registration order.

use std::collections::HashMap;

use indexmap::IndexMap;
use strata_schema::{EntityModel, HintSource};
use thiserror::Error;
use tracing::{debug, warn};

use crate::snapshot::ModelSnapshot;

/// A resolved dependency between two entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    /// Referencing entity.
    pub from: String,
    /// Referenced entity.
    pub to: String,
    /// Referencing field.
    pub field: String,
    /// How the reference was found.
    pub source: HintSource,
}

/// A dependency cycle found while sorting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dependency cycle: {}", .cycle.join(" -> "))]
pub struct CycleReport {
    /// Entities on the cycle, starting and ending with the same entity.
    pub cycle: Vec<String>,
}

/// Directed graph of entity references.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    dependencies: IndexMap<String, Vec<String>>,
    edges: Vec<DependencyEdge>,
}

impl DependencyGraph {
    /// Build the graph from entity models, in registration order.
    pub fn from_models<'a>(models: impl IntoIterator<Item = &'a EntityModel>) -> Self {
        let models: Vec<&EntityModel> = models.into_iter().collect();
        let mut graph = Self::with_nodes(models.iter().map(|m| m.name.clone()));
        for model in &models {
            for hint in model.foreign_keys() {
                graph.link(&model.name, &hint.field, &hint.target, hint.source);
            }
        }
        graph
    }

    /// Build the graph from a snapshot; entities are taken in name order.
    pub fn from_snapshot(snapshot: &ModelSnapshot) -> Self {
        let mut graph = Self::with_nodes(snapshot.entities.keys().cloned());
        for entity in snapshot.entities.values() {
            for field in entity.fields.values() {
                if let Some(target) = &field.references {
                    graph.link(&entity.name, &field.name, target, HintSource::Annotation);
                } else if let Some(target) = field.conventional_reference() {
                    graph.link(&entity.name, &field.name, target, HintSource::NamingConvention);
                }
            }
        }
        graph
    }

    fn with_nodes(names: impl Iterator<Item = String>) -> Self {
        let nodes: Vec<String> = names.collect();
        let dependencies = nodes.iter().map(|n| (n.clone(), Vec::new())).collect();
        Self {
            nodes,
            dependencies,
            edges: Vec::new(),
        }
    }

    fn resolve(&self, target: &str) -> Option<&str> {
        self.nodes
            .iter()
            .find(|n| n.eq_ignore_ascii_case(target))
            .map(String::as_str)
    }

    fn link(&mut self, from: &str, field: &str, target: &str, source: HintSource) {
        let Some(to) = self.resolve(target).map(str::to_string) else {
            if source == HintSource::Annotation {
                warn!(entity = from, field, target, "reference to unknown entity ignored");
            }
            return;
        };
        if to == from {
            return;
        }

        debug!(entity = from, field, depends_on = %to, ?source, "dependency");
        if let Some(deps) = self.dependencies.get_mut(from)
            && !deps.contains(&to)
        {
            deps.push(to.clone());
        }
        self.edges.push(DependencyEdge {
            from: from.to_string(),
            to,
            field: field.to_string(),
            source,
        });
    }

    /// Entity names in registration order.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// All resolved edges.
    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Entities `name` depends on.
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.dependencies
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Depth-first topological sort; dependencies come first.
    pub fn try_topological_sort(&self) -> Result<Vec<String>, CycleReport> {
        let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(self.nodes.len());
        let mut stack: Vec<&str> = Vec::new();
        let mut order = Vec::with_capacity(self.nodes.len());

        for node in &self.nodes {
            self.visit(node, &mut marks, &mut stack, &mut order)?;
        }
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        node: &'a str,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
        order: &mut Vec<String>,
    ) -> Result<(), CycleReport> {
        match marks.get(node) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => {
                let start = stack.iter().position(|n| *n == node).unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(node.to_string());
                return Err(CycleReport { cycle });
            }
            None => {}
        }

        marks.insert(node, Mark::InProgress);
        stack.push(node);
        for dep in self.dependencies_of(node) {
            self.visit(dep, marks, stack, order)?;
        }
        stack.pop();
        marks.insert(node, Mark::Done);
        order.push(node.to_string());
        Ok(())
    }

    /// Topological order, or registration order when there is a cycle.
    pub fn order_or_fallback(&self) -> Vec<String> {
        match self.try_topological_sort() {
            Ok(order) => order,
            Err(report) => {
                warn!(%report, "falling back to registration order");
                self.nodes.clone()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

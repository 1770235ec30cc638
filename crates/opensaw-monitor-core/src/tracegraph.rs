//! Trace graph merge model.
//!
//! Nodes are permanent: once an id has been seen it keeps its index (and so
//! its place in the layout simulation) for the rest of the session, even if
//! later snapshots leave it out. Links are the opposite: every snapshot
//! carries the complete edge set, so the list is rebuilt from scratch.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::error::{MonitorError, Result};
use crate::poller::{MergeModel, Progress};
use crate::render::GraphLayout;
use crate::snapshot::{TraceGraphSnapshot, TraceNode};

/// Id of the program entry block; drawn larger than the rest.
pub const ROOT_NODE_ID: &str = "100000000_0";

/// A link whose endpoints are indices into the live node list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedLink {
    pub source: usize,
    pub target: usize,
    pub value: f64,
}

impl ResolvedLink {
    pub fn stroke_width(&self) -> f64 {
        self.value.max(0.0).sqrt()
    }
}

/// What the last successful merge changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphDelta {
    pub new_nodes: usize,
    pub links: usize,
    /// The link count differs from the previous snapshot's.
    pub links_changed: bool,
}

pub struct TraceGraphModel<L> {
    layout: L,
    registry: HashMap<String, usize>,
    nodes: Vec<TraceNode>,
    links: Vec<ResolvedLink>,
    last_delta: GraphDelta,
}

impl<L: GraphLayout> TraceGraphModel<L> {
    pub fn new(layout: L) -> Self {
        Self {
            layout,
            registry: HashMap::new(),
            nodes: Vec::new(),
            links: Vec::new(),
            last_delta: GraphDelta::default(),
        }
    }

    /// Merge nodes, replace links, hand both to the layout and restart it.
    ///
    /// Links are checked before anything is inserted, so an inconsistent
    /// snapshot leaves the graph exactly as it was.
    pub fn apply(&mut self, snapshot: &TraceGraphSnapshot) -> Result<GraphDelta> {
        self.check_links(snapshot)?;

        let before = self.nodes.len();
        for node in &snapshot.nodes {
            if !self.registry.contains_key(&node.id) {
                self.registry.insert(node.id.clone(), self.nodes.len());
                self.nodes.push(node.clone());
            }
        }

        let previous_links = self.links.len();
        self.links.clear();
        for link in &snapshot.links {
            // Presence was established by check_links.
            let (Some(&source), Some(&target)) =
                (self.registry.get(&link.source), self.registry.get(&link.target))
            else {
                continue;
            };
            self.links.push(ResolvedLink {
                source,
                target,
                value: link.value,
            });
        }

        self.layout.set_nodes(&self.nodes);
        self.layout.set_links(&self.links);
        self.layout.restart();

        self.last_delta = GraphDelta {
            new_nodes: self.nodes.len() - before,
            links: self.links.len(),
            links_changed: self.links.len() != previous_links,
        };
        debug!(
            "trace graph merged: {} nodes (+{}), {} links",
            self.nodes.len(),
            self.last_delta.new_nodes,
            self.links.len()
        );
        Ok(self.last_delta)
    }

    fn check_links(&self, snapshot: &TraceGraphSnapshot) -> Result<()> {
        let incoming: HashSet<&str> = snapshot.nodes.iter().map(|n| n.id.as_str()).collect();
        let known = |id: &str| self.registry.contains_key(id) || incoming.contains(id);
        for link in &snapshot.links {
            for id in [&link.source, &link.target] {
                if !known(id.as_str()) {
                    return Err(MonitorError::Consistency(format!(
                        "link {} -> {} references unknown node {id}",
                        link.source, link.target
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn nodes(&self) -> &[TraceNode] {
        &self.nodes
    }

    pub fn links(&self) -> &[ResolvedLink] {
        &self.links
    }

    pub fn node(&self, id: &str) -> Option<&TraceNode> {
        self.registry.get(id).map(|&i| &self.nodes[i])
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.registry.get(id).copied()
    }

    pub fn last_delta(&self) -> GraphDelta {
        self.last_delta
    }

    pub fn layout(&self) -> &L {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut L {
        &mut self.layout
    }
}

impl<L: GraphLayout> MergeModel for TraceGraphModel<L> {
    type Snapshot = TraceGraphSnapshot;

    fn apply(&mut self, snapshot: TraceGraphSnapshot) -> Result<Progress> {
        TraceGraphModel::apply(self, &snapshot)?;
        Ok(Progress::Continue)
    }
}

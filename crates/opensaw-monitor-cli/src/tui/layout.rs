//! Force-directed layout for the trace graph tab.
//!
//! Verlet integration with link springs, pairwise charge and a weak pull
//! towards the centre. Each body stores its current and previous position;
//! velocity is their difference. `restart` re-heats the simulation and it
//! cools geometrically until `alpha` drops below [`ALPHA_MIN`].

use opensaw_monitor_core::{GraphLayout, ROOT_NODE_ID, ResolvedLink, TraceNode};

pub const ALPHA_START: f64 = 0.1;
pub const ALPHA_MIN: f64 = 0.005;
const ALPHA_DECAY: f64 = 0.99;

const LINK_DISTANCE: f64 = 20.0;
const CHARGE: f64 = -30.0;
const GRAVITY: f64 = 0.1;
const FRICTION: f64 = 0.9;

/// One node's place in the simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub id: String,
    pub group: i64,
    pub x: f64,
    pub y: f64,
    px: f64,
    py: f64,
}

impl Body {
    pub fn is_root(&self) -> bool {
        self.id == ROOT_NODE_ID
    }
}

#[derive(Debug, Clone)]
pub struct ForceLayout {
    width: f64,
    height: f64,
    bodies: Vec<Body>,
    links: Vec<ResolvedLink>,
    alpha: f64,
    restarts: u64,
}

impl ForceLayout {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            bodies: Vec::new(),
            links: Vec::new(),
            alpha: 0.0,
            restarts: 0,
        }
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn links(&self) -> &[ResolvedLink] {
        &self.links
    }

    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    pub fn is_settled(&self) -> bool {
        self.alpha < ALPHA_MIN
    }

    /// Bounding box of all bodies as `(x0, x1, y0, y1)`, or the nominal
    /// canvas when empty.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        if self.bodies.is_empty() {
            return (0.0, self.width, 0.0, self.height);
        }
        self.bodies.iter().fold(
            (f64::MAX, f64::MIN, f64::MAX, f64::MIN),
            |(x0, x1, y0, y1), b| (x0.min(b.x), x1.max(b.x), y0.min(b.y), y1.max(b.y)),
        )
    }

    /// Advance one step. Returns `false` once the simulation has cooled.
    pub fn tick(&mut self) -> bool {
        if self.is_settled() {
            self.alpha = 0.0;
            return false;
        }
        self.alpha *= ALPHA_DECAY;
        let alpha = self.alpha;

        let mut degree = vec![0usize; self.bodies.len()];
        for link in &self.links {
            degree[link.source] += 1;
            degree[link.target] += 1;
        }

        for link in &self.links {
            let (s, t) = (link.source, link.target);
            if s == t {
                continue;
            }
            let mut dx = self.bodies[t].x - self.bodies[s].x;
            let mut dy = self.bodies[t].y - self.bodies[s].y;
            let dist = (dx * dx + dy * dy).sqrt();
            if dist == 0.0 {
                continue;
            }
            let l = alpha * (dist - LINK_DISTANCE) / dist;
            dx *= l;
            dy *= l;
            let (ws, wt) = (degree[s] as f64, degree[t] as f64);
            let k = ws / (ws + wt);
            self.bodies[t].x -= dx * k;
            self.bodies[t].y -= dy * k;
            self.bodies[s].x += dx * (1.0 - k);
            self.bodies[s].y += dy * (1.0 - k);
        }

        let (cx, cy) = (self.width / 2.0, self.height / 2.0);
        let g = alpha * GRAVITY;
        for body in &mut self.bodies {
            body.x += (cx - body.x) * g;
            body.y += (cy - body.y) * g;
        }

        let charge = alpha * CHARGE;
        for i in 0..self.bodies.len() {
            let (x, y) = (self.bodies[i].x, self.bodies[i].y);
            let (mut kx, mut ky) = (0.0, 0.0);
            for (j, other) in self.bodies.iter().enumerate() {
                if i == j {
                    continue;
                }
                let dx = other.x - x;
                let dy = other.y - y;
                let d2 = dx * dx + dy * dy;
                if d2 > 0.0 {
                    let k = charge / d2;
                    kx += dx * k;
                    ky += dy * k;
                }
            }
            self.bodies[i].px -= kx;
            self.bodies[i].py -= ky;
        }

        for body in &mut self.bodies {
            let (x, y) = (body.x, body.y);
            body.x -= (body.px - x) * FRICTION;
            body.y -= (body.py - y) * FRICTION;
            body.px = x;
            body.py = y;
        }
        true
    }

    // Golden-angle spiral around the centre so new bodies never coincide.
    fn spawn_position(&self, index: usize) -> (f64, f64) {
        let radius = 10.0 * (0.5 + index as f64).sqrt();
        let angle = index as f64 * std::f64::consts::PI * (3.0 - 5f64.sqrt());
        (
            self.width / 2.0 + radius * angle.cos(),
            self.height / 2.0 + radius * angle.sin(),
        )
    }
}

impl GraphLayout for ForceLayout {
    fn set_nodes(&mut self, nodes: &[TraceNode]) {
        for (index, node) in nodes.iter().enumerate().skip(self.bodies.len()) {
            let (x, y) = self.spawn_position(index);
            self.bodies.push(Body {
                id: node.id.clone(),
                group: node.group,
                x,
                y,
                px: x,
                py: y,
            });
        }
    }

    fn set_links(&mut self, links: &[ResolvedLink]) {
        let n = self.bodies.len();
        self.links = links
            .iter()
            .filter(|l| l.source < n && l.target < n)
            .copied()
            .collect();
    }

    fn restart(&mut self) {
        self.alpha = ALPHA_START;
        self.restarts += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> TraceNode {
        TraceNode {
            id: id.to_string(),
            group: 0,
            instructions: None,
        }
    }

    fn distance(a: &Body, b: &Body) -> f64 {
        ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
    }

    #[test]
    fn cools_down_after_restart() {
        let mut layout = ForceLayout::new(900.0, 900.0);
        layout.set_nodes(&[node("a"), node("b")]);
        assert!(!layout.tick(), "never started");

        layout.restart();
        let mut ticks = 0;
        while layout.tick() {
            ticks += 1;
            assert!(ticks < 1000);
        }
        assert!(ticks > 100);
        assert_eq!(layout.alpha, 0.0);
    }

    #[test]
    fn existing_bodies_keep_their_place() {
        let mut layout = ForceLayout::new(900.0, 900.0);
        layout.set_nodes(&[node("a"), node("b")]);
        let before = layout.bodies()[1].clone();

        layout.set_nodes(&[node("a"), node("b"), node("c")]);
        assert_eq!(layout.bodies().len(), 3);
        assert_eq!(layout.bodies()[1], before);
        assert_ne!(
            (layout.bodies()[2].x, layout.bodies()[2].y),
            (before.x, before.y)
        );
    }

    #[test]
    fn links_pull_distant_bodies_together() {
        let mut layout = ForceLayout::new(900.0, 900.0);
        layout.set_nodes(&[node("a"), node("b")]);
        layout.bodies[0].x = 100.0;
        layout.bodies[0].px = 100.0;
        layout.bodies[1].x = 800.0;
        layout.bodies[1].px = 800.0;
        layout.set_links(&[ResolvedLink {
            source: 0,
            target: 1,
            value: 1.0,
        }]);
        let start = distance(&layout.bodies()[0], &layout.bodies()[1]);

        layout.restart();
        for _ in 0..50 {
            layout.tick();
        }
        assert!(distance(&layout.bodies()[0], &layout.bodies()[1]) < start);
    }

    #[test]
    fn charge_separates_close_bodies() {
        let mut layout = ForceLayout::new(900.0, 900.0);
        layout.set_nodes(&[node("a"), node("b")]);
        for (i, x) in [449.0, 451.0].into_iter().enumerate() {
            layout.bodies[i].x = x;
            layout.bodies[i].px = x;
            layout.bodies[i].y = 450.0;
            layout.bodies[i].py = 450.0;
        }
        layout.restart();
        layout.tick();
        assert!(distance(&layout.bodies()[0], &layout.bodies()[1]) > 2.0);
    }

    #[test]
    fn root_is_recognised() {
        let mut layout = ForceLayout::new(900.0, 900.0);
        layout.set_nodes(&[node(ROOT_NODE_ID), node("x")]);
        assert!(layout.bodies()[0].is_root());
        assert!(!layout.bodies()[1].is_root());
    }
}

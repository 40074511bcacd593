//! Timed style transitions.
//!
//! When a style rule with a transition changes the target value of a property
//! on an already-styled control, the change is scheduled here instead of being
//! applied at once. [`TransitionScheduler::advance`] moves every active
//! transition forward and reports the interpolated values.

use std::f64::consts::PI;

use crate::dom::NodeId;
use crate::property::PropertyPath;
use crate::registry::Value;

/// Easing function of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Interpolation {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    SineIn,
    SineOut,
    SineInOut,
}

impl Interpolation {
    const ALL: [Interpolation; 7] = [
        Interpolation::Linear,
        Interpolation::EaseIn,
        Interpolation::EaseOut,
        Interpolation::EaseInOut,
        Interpolation::SineIn,
        Interpolation::SineOut,
        Interpolation::SineInOut,
    ];

    /// Integer code, matching the `Interpolation` enum table.
    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    /// Map linear progress `t` in `0..=1` to eased progress.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Interpolation::Linear => t,
            Interpolation::EaseIn => t * t,
            Interpolation::EaseOut => t * (2.0 - t),
            Interpolation::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Interpolation::SineIn => 1.0 - (t * PI / 2.0).cos(),
            Interpolation::SineOut => (t * PI / 2.0).sin(),
            Interpolation::SineInOut => -((PI * t).cos() - 1.0) / 2.0,
        }
    }
}

/// Transition attached to a style rule property.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionSpec {
    /// Duration in seconds.
    pub duration: f64,
    pub function: Interpolation,
}

impl TransitionSpec {
    pub fn new(duration: f64, function: Interpolation) -> Self {
        Self { duration, function }
    }
}

/// One running transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub node: NodeId,
    pub path: PropertyPath,
    pub from: Value,
    pub to: Value,
    pub spec: TransitionSpec,
    pub elapsed: f64,
}

impl Transition {
    fn progress(&self) -> f64 {
        if self.spec.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.spec.duration).min(1.0)
        }
    }

    /// The value at the current elapsed time.
    pub fn current(&self) -> Value {
        let t = self.spec.function.apply(self.progress());
        self.from
            .interpolate(&self.to, t)
            .unwrap_or_else(|| self.to.clone())
    }

    pub fn is_finished(&self) -> bool {
        self.progress() >= 1.0
    }
}

/// Active transitions, at most one per (node, property).
#[derive(Debug, Default)]
pub struct TransitionScheduler {
    active: Vec<Transition>,
}

impl TransitionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a transition, replacing any running one on the same property.
    pub fn schedule(&mut self, transition: Transition) {
        tracing::trace!(
            path = ?transition.path,
            duration = transition.spec.duration,
            "transition scheduled"
        );
        self.cancel(transition.node, transition.path);
        self.active.push(transition);
    }

    /// Stop a running transition without applying its end value.
    pub fn cancel(&mut self, node: NodeId, path: PropertyPath) -> Option<Transition> {
        let pos = self
            .active
            .iter()
            .position(|t| t.node == node && t.path == path)?;
        Some(self.active.remove(pos))
    }

    pub fn cancel_node(&mut self, node: NodeId) {
        self.active.retain(|t| t.node != node);
    }

    pub fn get(&self, node: NodeId, path: PropertyPath) -> Option<&Transition> {
        self.active.iter().find(|t| t.node == node && t.path == path)
    }

    pub fn is_animating(&self, node: NodeId, path: PropertyPath) -> bool {
        self.get(node, path).is_some()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Advance every transition by `dt` seconds. Returns the new value of each
    /// animated property; finished transitions report their end value and are
    /// dropped.
    pub fn advance(&mut self, dt: f64) -> Vec<(NodeId, PropertyPath, Value)> {
        let mut updates = Vec::with_capacity(self.active.len());
        for transition in &mut self.active {
            transition.elapsed += dt;
            updates.push((transition.node, transition.path, transition.current()));
        }
        self.active.retain(|t| !t.is_finished());
        updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Color;
    use slotmap::SlotMap;

    fn node() -> NodeId {
        let mut ids: SlotMap<NodeId, ()> = SlotMap::with_key();
        ids.insert(())
    }

    fn fade(node: NodeId, function: Interpolation) -> Transition {
        Transition {
            node,
            path: PropertyPath::Name,
            from: Value::Float(0.0),
            to: Value::Float(1.0),
            spec: TransitionSpec::new(0.4, function),
            elapsed: 0.0,
        }
    }

    #[test]
    fn easing_endpoints() {
        for f in Interpolation::ALL {
            assert!((f.apply(0.0)).abs() < 1e-9, "{f:?} at 0");
            assert!((f.apply(1.0) - 1.0).abs() < 1e-9, "{f:?} at 1");
        }
        assert_eq!(Interpolation::EaseIn.apply(0.5), 0.25);
        assert_eq!(Interpolation::EaseOut.apply(0.5), 0.75);
    }

    #[test]
    fn codes_round_trip() {
        assert_eq!(Interpolation::from_code(3), Some(Interpolation::EaseInOut));
        assert_eq!(Interpolation::SineOut.code(), 5);
        assert_eq!(Interpolation::from_code(-1), None);
        assert_eq!(Interpolation::from_code(7), None);
    }

    #[test]
    fn advance_interpolates_then_finishes() {
        let n = node();
        let mut scheduler = TransitionScheduler::new();
        scheduler.schedule(fade(n, Interpolation::Linear));

        let updates = scheduler.advance(0.1);
        assert_eq!(updates, vec![(n, PropertyPath::Name, Value::Float(0.25))]);
        assert!(scheduler.is_animating(n, PropertyPath::Name));

        let updates = scheduler.advance(0.5);
        assert_eq!(updates[0].2, Value::Float(1.0));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn schedule_replaces_running() {
        let n = node();
        let mut scheduler = TransitionScheduler::new();
        scheduler.schedule(fade(n, Interpolation::Linear));
        scheduler.schedule(fade(n, Interpolation::EaseIn));
        assert_eq!(scheduler.len(), 1);
        assert_eq!(
            scheduler.get(n, PropertyPath::Name).unwrap().spec.function,
            Interpolation::EaseIn
        );
    }

    #[test]
    fn color_transition_midpoint() {
        let n = node();
        let t = Transition {
            node: n,
            path: PropertyPath::CustomClass,
            from: Value::Color(Color::WHITE),
            to: Value::Color(Color::RED),
            spec: TransitionSpec::new(0.3, Interpolation::Linear),
            elapsed: 0.15,
        };
        let Value::Color(c) = t.current() else {
            panic!("expected color");
        };
        assert!((c.g - 0.5).abs() < 1e-9);
        assert!(!t.is_finished());
    }

    #[test]
    fn zero_duration_finishes_immediately() {
        let n = node();
        let mut scheduler = TransitionScheduler::new();
        let mut t = fade(n, Interpolation::Linear);
        t.spec.duration = 0.0;
        scheduler.schedule(t);
        let updates = scheduler.advance(0.0);
        assert_eq!(updates[0].2, Value::Float(1.0));
        assert!(scheduler.is_empty());
    }
}

//! Proximity groups of people with join/leave hysteresis.

use std::collections::{BTreeSet, HashMap};

use nalgebra::Point2;
use serde::Serialize;
use tracing::{debug, trace};

use crate::tracker::config::TrackerConfig;
use crate::tracker::matching::{jaccard_distance, linear_assignment};

/// A set of people currently considered together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub id: u64,
    /// Sorted member identities
    pub members: Vec<u64>,
    /// Elapsed time at which the group formed
    pub created_at: f64,
    pub centroid: Point2<f64>,
    /// Largest distance between two members
    pub diameter: f64,
}

impl Group {
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Time since the group formed.
    pub fn life(&self, elapsed: f64) -> f64 {
        elapsed - self.created_at
    }
}

/// Change in group structure during one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GroupEvent {
    Formed { id: u64, members: Vec<u64> },
    Changed { id: u64, members: Vec<u64> },
    Dissolved { id: u64 },
}

/// Tracks the "together" relation between pairs of people and the groups it
/// induces.
#[derive(Debug, Clone, Serialize)]
pub struct GroupTracker {
    group_dist: f64,
    ungroup_dist: f64,
    /// Pairs `(a, b)` with `a < b` currently together
    together: BTreeSet<(u64, u64)>,
    groups: Vec<Group>,
    next_group_id: u64,
    last_elapsed: Option<f64>,
}

impl GroupTracker {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            group_dist: config.group_dist,
            ungroup_dist: config.ungroup_dist,
            together: BTreeSet::new(),
            groups: Vec::new(),
            next_group_id: 1,
            last_elapsed: None,
        }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Group id and size for a person. An ungrouped person is reported as a
    /// group of one under its own identity.
    pub fn membership(&self, id: u64) -> (u64, usize) {
        self.groups
            .iter()
            .find(|g| g.members.binary_search(&id).is_ok())
            .map_or((id, 1), |g| (g.id, g.size()))
    }

    pub fn are_together(&self, a: u64, b: u64) -> bool {
        self.together.contains(&(a.min(b), a.max(b)))
    }

    /// Recompute groups from the current positions of the active people.
    pub fn update(&mut self, people: &[(u64, Point2<f64>)], elapsed: f64) -> Vec<GroupEvent> {
        let dt = self.last_elapsed.map_or(0.0, |last| elapsed - last);
        self.last_elapsed = Some(elapsed);

        let present: HashMap<u64, usize> = people.iter().enumerate().map(|(i, (id, _))| (*id, i)).collect();
        self.together
            .retain(|(a, b)| present.contains_key(a) && present.contains_key(b));

        for (i, (a, pa)) in people.iter().enumerate() {
            for (b, pb) in &people[i + 1..] {
                let key = ((*a).min(*b), (*a).max(*b));
                let dist = (pa - pb).norm();
                if self.together.contains(&key) {
                    if dist > self.ungroup_dist {
                        self.together.remove(&key);
                        trace!(a = key.0, b = key.1, dist, "Pair apart");
                    }
                } else if dist < self.group_dist {
                    self.together.insert(key);
                    trace!(a = key.0, b = key.1, dist, "Pair together");
                }
            }
        }

        let components = self.components(people, &present);
        let events = self.reconcile(components, people, &present, elapsed);
        if !events.is_empty() {
            debug!(dt, groups = self.groups.len(), events = events.len(), "Groups changed");
        }
        events
    }

    /// Connected components of the together relation with two or more
    /// members, each sorted.
    fn components(&self, people: &[(u64, Point2<f64>)], present: &HashMap<u64, usize>) -> Vec<Vec<u64>> {
        let mut parent: Vec<usize> = (0..people.len()).collect();
        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }
        for (a, b) in &self.together {
            let (ia, ib) = (present[a], present[b]);
            let (ra, rb) = (find(&mut parent, ia), find(&mut parent, ib));
            if ra != rb {
                parent[ra.max(rb)] = ra.min(rb);
            }
        }

        let mut by_root: HashMap<usize, Vec<u64>> = HashMap::new();
        for (i, (id, _)) in people.iter().enumerate() {
            let root = find(&mut parent, i);
            by_root.entry(root).or_default().push(*id);
        }
        let mut components: Vec<Vec<u64>> = by_root
            .into_values()
            .filter(|m| m.len() >= 2)
            .map(|mut m| {
                m.sort_unstable();
                m
            })
            .collect();
        components.sort();
        components
    }

    /// Carry group identities over from the previous tick.
    fn reconcile(
        &mut self,
        components: Vec<Vec<u64>>,
        people: &[(u64, Point2<f64>)],
        present: &HashMap<u64, usize>,
        elapsed: f64,
    ) -> Vec<GroupEvent> {
        let previous: Vec<Vec<u64>> = self.groups.iter().map(|g| g.members.clone()).collect();
        let cost = jaccard_distance(&previous, &components);
        let result = linear_assignment(&cost, 1.0);

        let mut events = Vec::new();
        let mut next = Vec::with_capacity(components.len());

        for (ip, ic) in result.matches {
            let old = &self.groups[ip];
            let members = components[ic].clone();
            if members != old.members {
                events.push(GroupEvent::Changed {
                    id: old.id,
                    members: members.clone(),
                });
            }
            next.push(self.describe(old.id, members, old.created_at, people, present));
        }
        for ip in result.unmatched_previous {
            events.push(GroupEvent::Dissolved { id: self.groups[ip].id });
        }
        for ic in result.unmatched_current {
            let id = self.next_group_id;
            self.next_group_id += 1;
            let members = components[ic].clone();
            events.push(GroupEvent::Formed {
                id,
                members: members.clone(),
            });
            next.push(self.describe(id, members, elapsed, people, present));
        }

        next.sort_by_key(|g| g.id);
        self.groups = next;
        events
    }

    fn describe(
        &self,
        id: u64,
        members: Vec<u64>,
        created_at: f64,
        people: &[(u64, Point2<f64>)],
        present: &HashMap<u64, usize>,
    ) -> Group {
        let positions: Vec<Point2<f64>> = members.iter().map(|m| people[present[m]].1).collect();
        let sum = positions.iter().fold(nalgebra::Vector2::zeros(), |acc, p| acc + p.coords);
        let centroid = Point2::from(sum / positions.len() as f64);
        let mut diameter: f64 = 0.0;
        for (i, a) in positions.iter().enumerate() {
            for b in &positions[i + 1..] {
                diameter = diameter.max((a - b).norm());
            }
        }
        Group {
            id,
            members,
            created_at,
            centroid,
            diameter,
        }
    }
}

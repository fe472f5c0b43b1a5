//! Values published after each tick.
//!
//! All distances are in metres, speeds in metres per second and headings in
//! degrees counter-clockwise from the world x axis.

use nalgebra::{Point2, Vector2};
use serde::Serialize;

use crate::tracker::assignment::Assignments;
use crate::tracker::group::{Group, GroupEvent};
use crate::tracker::leg::Leg;
use crate::tracker::person::Person;
use crate::tracker::stats::heading_degrees;

/// A person became active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntryEvent {
    pub id: u64,
    pub channel: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegReport {
    pub position: Point2<f64>,
    /// Standard deviation of the position estimate
    pub sigma: f64,
    pub speed: f64,
    pub heading: f64,
    pub consecutive_invisible: u32,
}

impl From<&Leg> for LegReport {
    fn from(leg: &Leg) -> Self {
        Self {
            position: leg.position,
            sigma: leg.posvar.sqrt(),
            speed: leg.speed(),
            heading: heading_degrees(leg.velocity.x, leg.velocity.y),
            consecutive_invisible: leg.consecutive_invisible,
        }
    }
}

/// Per-tick state of one active person.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonUpdate {
    pub id: u64,
    pub channel: u32,
    pub age: u32,
    pub position: Point2<f64>,
    pub velocity: Vector2<f64>,
    pub group_id: u64,
    pub group_size: usize,
    pub diameter: f64,
    pub leg_separation: f64,
    pub consecutive_invisible: u32,
    pub legs: [LegReport; 2],
}

impl PersonUpdate {
    pub fn new(person: &Person, (group_id, group_size): (u64, usize)) -> Self {
        let [a, b] = person.legs();
        Self {
            id: person.id(),
            channel: person.channel(),
            age: person.age(),
            position: person.position(),
            velocity: person.velocity(),
            group_id,
            group_size,
            diameter: person.diameter(),
            leg_separation: person.leg_stats().sep,
            consecutive_invisible: person.consecutive_invisible(),
            legs: [LegReport::from(a), LegReport::from(b)],
        }
    }
}

/// Where a person stands relative to the crowd and the tracked area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoReport {
    pub id: u64,
    /// Distance to the centroid of all active people
    pub center_dist: f64,
    /// Distance to the nearest other active person, `None` when alone
    pub other_dist: Option<f64>,
    /// Distance to leave the tracked area, either out of range or behind
    /// the sensor plane
    pub exit_dist: f64,
}

/// A group as published.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupReport {
    pub id: u64,
    pub members: Vec<u64>,
    pub life: f64,
    pub centroid: Point2<f64>,
    pub diameter: f64,
}

impl GroupReport {
    pub fn new(group: &Group, elapsed: f64) -> Self {
        Self {
            id: group.id,
            members: group.members.clone(),
            life: group.life(elapsed),
            centroid: group.centroid,
            diameter: group.diameter,
        }
    }
}

/// Everything downstream consumers need from one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameReport {
    pub frame: u32,
    pub elapsed: f64,
    pub entries: Vec<EntryEvent>,
    pub exits: Vec<u64>,
    /// New active count, present only when it changed
    pub active_count: Option<usize>,
    pub updates: Vec<PersonUpdate>,
    pub groups: Vec<GroupReport>,
    pub group_events: Vec<GroupEvent>,
    pub geo: Vec<GeoReport>,
    /// Persons whose leg points were split this tick
    pub leg_splits: usize,
    /// Persons whose leg roles were swapped after a split
    pub leg_swaps: usize,
}

/// Full tracker state for offline inspection.
#[derive(Debug, Clone, Serialize)]
pub struct WorldSnapshot {
    pub frame: u32,
    pub next_id: u64,
    pub bglike: Vec<f64>,
    pub assignments: Assignments,
    pub persons: Vec<Person>,
    pub groups: Vec<Group>,
}

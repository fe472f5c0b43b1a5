//! Frame-by-frame orchestration of the tracker.

use std::collections::BTreeSet;

use nalgebra::{Point2, Vector2};
use tracing::{debug, info};

use crate::tracker::assignment::{Assignments, entry_likelihood, make_assignments, resolve_leg_split};
use crate::tracker::background::BackgroundModel;
use crate::tracker::config::TrackerConfig;
use crate::tracker::error::Result;
use crate::tracker::group::GroupTracker;
use crate::tracker::person::Person;
use crate::tracker::report::{EntryEvent, FrameReport, GeoReport, GroupReport, PersonUpdate, WorldSnapshot};
use crate::tracker::scan::ScanFrame;

/// Owns every track and the background model for one tracking session.
pub struct World {
    config: TrackerConfig,
    persons: Vec<Person>,
    background: BackgroundModel,
    groups: GroupTracker,
    /// Identity for the next person; never reissued
    next_id: u64,
    last_frame: Option<u32>,
    frames_seen: u32,
    /// Active identities as of the last report
    announced: BTreeSet<u64>,
    bglike: Vec<f64>,
    assignments: Assignments,
}

impl World {
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            persons: Vec::new(),
            background: BackgroundModel::new(&config),
            groups: GroupTracker::new(&config),
            next_id: 1,
            last_frame: None,
            frames_seen: 0,
            announced: BTreeSet::new(),
            bglike: Vec::new(),
            assignments: Assignments::default(),
            config,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Persons in creation order.
    pub fn persons(&self) -> &[Person] {
        &self.persons
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn last_frame(&self) -> Option<u32> {
        self.last_frame
    }

    pub fn background(&self) -> &BackgroundModel {
        &self.background
    }

    pub fn groups(&self) -> &GroupTracker {
        &self.groups
    }

    /// Labels from the most recent tick.
    pub fn assignments(&self) -> &Assignments {
        &self.assignments
    }

    /// Background likelihoods from the most recent tick.
    pub fn bglike(&self) -> &[f64] {
        &self.bglike
    }

    /// Process one scan. `elapsed` is the session time in seconds.
    ///
    /// An error means an internal invariant failed; the returned report is
    /// then missing and the tick must not be published.
    pub fn track(&mut self, frame: &ScanFrame, elapsed: f64) -> Result<FrameReport> {
        let frame_id = frame.frame_id();
        let nsteps = match self.last_frame {
            Some(last) => frame_id.saturating_sub(last),
            None => 1,
        };
        self.last_frame = Some(frame_id);
        self.frames_seen = self.frames_seen.saturating_add(1);

        for person in &mut self.persons {
            person.predict(nsteps, &self.config);
        }

        let mut entry_like = entry_likelihood(&self.config, nsteps, frame.len());
        self.bglike = self.background.score(frame);
        self.assignments = make_assignments(frame, &self.bglike, &self.persons, entry_like, &self.config);

        if self.frames_seen > self.config.bg_init_frames {
            if let Some(person) = self.spawn(frame) {
                self.persons.push(person);
                // Points near the new track are now much more likely entries
                entry_like += self.config.entry_boost.ln();
                self.assignments =
                    make_assignments(frame, &self.bglike, &self.persons, entry_like, &self.config);
            }
        }

        // Fallback when too few points look like background
        let use_all = self.assignments.use_all_points_for_background();
        self.background
            .update(frame, &self.assignments.labels, use_all);

        let (leg_splits, leg_swaps) = self.update_persons(frame, nsteps)?;

        self.prune();

        let active: Vec<(u64, Point2<f64>)> = self
            .persons
            .iter()
            .filter(|p| p.is_active())
            .map(|p| (p.id(), p.position()))
            .collect();
        let group_events = self.groups.update(&active, elapsed);

        let mut report = self.publish(frame_id, elapsed);
        report.group_events = group_events;
        report.leg_splits = leg_splits;
        report.leg_swaps = leg_swaps;
        Ok(report)
    }

    /// Repair each person's leg partition and update it. Returns how many
    /// persons had their points split and how many of those were swapped.
    fn update_persons(&mut self, frame: &ScanFrame, nsteps: u32) -> Result<(usize, usize)> {
        let by_person = self.assignments.points_by_person(self.persons.len());
        let (mut splits, mut swaps) = (0, 0);
        for (person, points) in self.persons.iter_mut().zip(by_person) {
            let (points, outcome) = resolve_leg_split(frame, person, points, &self.config);
            splits += usize::from(outcome.split);
            swaps += usize::from(outcome.swapped);
            person.update(frame, &self.bglike, &points, nsteps, &self.config)?;
        }
        Ok((splits, swaps))
    }

    /// Try to start a track from two unassigned points spaced like a pair
    /// of legs. At most one track is started per call.
    fn spawn(&mut self, frame: &ScanFrame) -> Option<Person> {
        // Dropouts have no usable position
        let unassigned: Vec<usize> = self
            .assignments
            .unassigned()
            .into_iter()
            .filter(|&i| {
                let p = frame.point(i);
                p.x.is_finite() && p.y.is_finite()
            })
            .collect();
        if unassigned.is_empty() {
            return None;
        }
        if unassigned.len() < self.config.min_create_hits {
            debug!(
                unassigned = unassigned.len(),
                needed = self.config.min_create_hits,
                "Too few unassigned points for a new track"
            );
            return None;
        }

        let sep = self.config.mean_leg_sep;
        let mut best: Option<(usize, usize, f64)> = None;
        for (k, &i) in unassigned.iter().enumerate() {
            for &j in &unassigned[k + 1..] {
                let dist = (frame.point(i) - frame.point(j)).norm();
                let closer = best.is_none_or(|(_, _, d)| (dist - sep).abs() < (d - sep).abs());
                if closer {
                    best = Some((i, j, dist));
                }
            }
        }

        let (i, j, dist) = best?;
        if !dist.is_finite() || (dist - sep).abs() >= 2.0 * self.config.leg_sep_sigma {
            debug!(best_sep = dist, "No unassigned pair spaced like legs");
            return None;
        }

        // Leg centres sit behind the first echo
        let origin = frame.origin();
        let push_out = |p: Point2<f64>| {
            let ray: Vector2<f64> = p - origin;
            let range = ray.norm();
            if range > 0.0 {
                p + ray * (self.config.initial_leg_diameter / 2.0 / range)
            } else {
                p
            }
        };
        let first = push_out(frame.point(i));
        let second = push_out(frame.point(j));

        let id = self.next_id;
        self.next_id += 1;
        let channel = self.free_channel();
        info!(id, channel, scan_a = i, scan_b = j, sep = dist, "New person");
        Some(Person::new(id, channel, first, second, &self.config))
    }

    /// Lowest output channel, starting at 1, not held by a live person.
    fn free_channel(&self) -> u32 {
        let used: BTreeSet<u32> = self.persons.iter().map(|p| p.channel()).collect();
        (1..).find(|c| !used.contains(c)).unwrap_or(1)
    }

    fn prune(&mut self) {
        let (alive, dead): (Vec<Person>, Vec<Person>) = std::mem::take(&mut self.persons)
            .into_iter()
            .partition(|p| !p.is_dead(&self.config));
        for mut person in dead {
            person.mark_removed();
            info!(
                id = person.id(),
                age = person.age(),
                visible = person.total_visible(),
                "Person removed"
            );
        }
        self.persons = alive;
    }

    fn publish(&mut self, frame: u32, elapsed: f64) -> FrameReport {
        let prior_count = self.announced.len();
        let mut exits = self.announced.clone();
        let mut report = FrameReport {
            frame,
            elapsed,
            ..Default::default()
        };

        let active: Vec<&Person> = self.persons.iter().filter(|p| p.is_active()).collect();
        for person in &active {
            exits.remove(&person.id());
            if self.announced.insert(person.id()) {
                report.entries.push(EntryEvent {
                    id: person.id(),
                    channel: person.channel(),
                });
            }
        }
        for id in &exits {
            self.announced.remove(id);
        }
        report.exits = exits.into_iter().collect();
        if active.len() != prior_count {
            report.active_count = Some(active.len());
        }

        report.updates = active
            .iter()
            .map(|p| PersonUpdate::new(p, self.groups.membership(p.id())))
            .collect();
        report.groups = self
            .groups
            .groups()
            .iter()
            .map(|g| GroupReport::new(g, elapsed))
            .collect();
        report.geo = geo_reports(&active, &self.config);
        report
    }

    /// Full state for offline inspection.
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            frame: self.last_frame.unwrap_or(0),
            next_id: self.next_id,
            bglike: self.bglike.clone(),
            assignments: self.assignments.clone(),
            persons: self.persons.clone(),
            groups: self.groups.groups().to_vec(),
        }
    }
}

fn geo_reports(active: &[&Person], config: &TrackerConfig) -> Vec<GeoReport> {
    if active.is_empty() {
        return Vec::new();
    }
    let positions: Vec<Point2<f64>> = active.iter().map(|p| p.position()).collect();
    let sum = positions.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords);
    let center = Point2::from(sum / positions.len() as f64);

    active
        .iter()
        .zip(&positions)
        .map(|(person, pos)| {
            let other_dist = positions
                .iter()
                .map(|q| (q - pos).norm())
                .filter(|d| *d > 0.001)
                .fold(None, |best: Option<f64>, d| Some(best.map_or(d, |b| b.min(d))));
            let mut exit_dist = (config.max_range - pos.coords.norm()).max(0.0);
            // The sensor sees toward +y; crossing y = 0 leaves the field of view
            if pos.y < exit_dist {
                exit_dist = pos.y.max(0.0);
            }
            GeoReport {
                id: person.id(),
                center_dist: (pos - center).norm(),
                other_dist,
                exit_dist,
            }
        })
        .collect()
}

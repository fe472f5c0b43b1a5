//! Per-point data association and leg split/swap resolution.

use serde::Serialize;
use tracing::{debug, trace};

use crate::tracker::config::TrackerConfig;
use crate::tracker::person::Person;
use crate::tracker::scan::ScanFrame;

/// Label given to one scan point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PointLabel {
    Background,
    /// Unexplained; candidate for a new track
    Entry,
    /// Leg `leg` of the person at `index` in the world's person list
    Person { index: usize, leg: usize },
}

/// Labels for every point of one frame.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Assignments {
    pub labels: Vec<PointLabel>,
    /// Score of the winning hypothesis per point
    pub best_like: Vec<f64>,
    pub n_assigned: usize,
    pub n_background: usize,
    pub n_entry: usize,
}

impl Assignments {
    /// Indices of points labelled [`PointLabel::Entry`], in scan order.
    pub fn unassigned(&self) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter_map(|(i, l)| (*l == PointLabel::Entry).then_some(i))
            .collect()
    }

    /// Points of each person split by leg, in scan order.
    pub fn points_by_person(&self, num_persons: usize) -> Vec<[Vec<usize>; 2]> {
        let mut out = vec![[Vec::new(), Vec::new()]; num_persons];
        for (i, label) in self.labels.iter().enumerate() {
            if let PointLabel::Person { index, leg } = *label {
                if let Some(slot) = out.get_mut(index) {
                    slot[leg].push(i);
                }
            }
        }
        out
    }

    /// Too few points look like background for a normal update: the whole
    /// frame should be folded into the background model.
    pub fn use_all_points_for_background(&self) -> bool {
        self.n_background < self.n_assigned + self.n_entry
    }
}

/// Log-likelihood that a point is a new arrival, from a Poisson entry rate
/// spread over the points of the scan.
pub fn entry_likelihood(config: &TrackerConfig, nsteps: u32, num_points: usize) -> f64 {
    let entry_prob = 1.0 - (-config.entry_rate / 60.0 * f64::from(nsteps) / config.frame_rate).exp();
    (entry_prob / num_points.max(1) as f64 * config.expected_hits_per_entry).ln()
}

/// Label every point with its most likely explanation.
///
/// Hypotheses are tried in the order entry, background, then each person's
/// legs. A later hypothesis wins only with a strictly higher score.
pub fn make_assignments(
    frame: &ScanFrame,
    bglike: &[f64],
    persons: &[Person],
    entry_like: f64,
    config: &TrackerConfig,
) -> Assignments {
    let origin = frame.origin();
    let mut out = Assignments {
        labels: Vec::with_capacity(frame.len()),
        best_like: Vec::with_capacity(frame.len()),
        ..Default::default()
    };

    for (f, pt) in frame.points().iter().enumerate() {
        let mut label = PointLabel::Entry;
        let mut best = entry_like;

        if bglike[f] > best {
            label = PointLabel::Background;
            best = bglike[f];
        }
        for (index, person) in persons.iter().enumerate() {
            for leg in 0..2 {
                let like = person.observation_like(pt, leg, &origin, config);
                if like > best {
                    label = PointLabel::Person { index, leg };
                    best = like;
                }
            }
        }

        match label {
            PointLabel::Background => out.n_background += 1,
            PointLabel::Entry => out.n_entry += 1,
            PointLabel::Person { .. } => out.n_assigned += 1,
        }
        out.labels.push(label);
        out.best_like.push(best);
    }

    debug!(
        assigned = out.n_assigned,
        background = out.n_background,
        entry = out.n_entry,
        entry_like,
        "Assigned scan points"
    );
    out
}

/// What [`resolve_leg_split`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitOutcome {
    pub split: bool,
    pub swapped: bool,
}

/// Repair a person's leg partition when every point went to one leg.
///
/// The trailing run after the first index gap, or failing that after the
/// first large range jump, moves to the empty leg. After a split the leg
/// roles are swapped if the swapped labelling is more likely overall. This
/// ignores which prior position is closer, so crossings can still swap
/// leg identities.
pub fn resolve_leg_split(
    frame: &ScanFrame,
    person: &Person,
    mut points: [Vec<usize>; 2],
    config: &TrackerConfig,
) -> ([Vec<usize>; 2], SplitOutcome) {
    let mut outcome = SplitOutcome::default();

    for f in 0..2 {
        if !points[f].is_empty() && points[1 - f].is_empty() {
            let cut = first_gap(&points[f]);
            if let Some(i) = cut {
                let tail = points[f].split_off(i);
                points[1 - f] = tail;
                outcome.split = true;
                debug!(id = person.id(), at = i, "Split leg points at a gap");
            }
        }
        if !points[f].is_empty() && points[1 - f].is_empty() {
            let ranges = frame.ranges();
            let cut = (1..points[f].len()).find(|&i| {
                (ranges[points[f][i]] - ranges[points[f][i - 1]]).abs() > config.initial_leg_diameter / 2.0
            });
            if let Some(i) = cut {
                let tail = points[f].split_off(i);
                points[1 - f] = tail;
                outcome.split = true;
                debug!(id = person.id(), at = i, "Split leg points at a range jump");
            }
        }
    }

    if outcome.split {
        let origin = frame.origin();
        let mut swap_like = 0.0;
        for (f, assigned) in points.iter().enumerate() {
            for &idx in assigned {
                let pt = frame.point(idx);
                for leg in 0..2 {
                    let like = person.observation_like(&pt, leg, &origin, config);
                    if leg == f {
                        swap_like += like;
                    } else {
                        swap_like -= like;
                    }
                }
            }
        }
        trace!(id = person.id(), swap_like, "Checked leg swap");
        if swap_like < 0.0 {
            points.swap(0, 1);
            outcome.swapped = true;
            debug!(id = person.id(), "Swapped leg assignment");
        }
    }

    (points, outcome)
}

/// Position of the first break in a sorted index run.
fn first_gap(indices: &[usize]) -> Option<usize> {
    let (first, last) = (indices.first()?, indices.last()?);
    if last - first + 1 == indices.len() {
        return None;
    }
    (1..indices.len()).find(|&i| indices[i] - indices[i - 1] != 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;
    use std::f64::consts::FRAC_PI_2;

    fn frame_from_points(points: &[(f64, f64)]) -> ScanFrame {
        let angles: Vec<f64> = points.iter().map(|(x, y)| y.atan2(*x)).collect();
        let ranges: Vec<f64> = points.iter().map(|(x, y)| x.hypot(*y)).collect();
        ScanFrame::from_polar(1, Point2::origin(), 0.0, &angles, &ranges)
    }

    #[test]
    fn test_entry_likelihood() {
        let config = TrackerConfig::default();
        let like = entry_likelihood(&config, 1, 100);
        let prob = 1.0 - (-config.entry_rate / 60.0 / config.frame_rate).exp();
        assert!((like - (prob / 100.0 * 10.0).ln()).abs() < 1e-12);
        // More elapsed frames make entries more likely
        assert!(entry_likelihood(&config, 5, 100) > like);
    }

    #[test]
    fn test_counts_sum_to_points() {
        let config = TrackerConfig::default();
        let frame = frame_from_points(&[(0.0, 2.0), (0.05, 2.0), (1.0, 3.0), (2.0, 4.0)]);
        let person = Person::new(1, 1, Point2::new(0.0, 2.1), Point2::new(0.3, 2.1), &config);
        let bglike = vec![-5.0, -5.0, 10.0, -100.0];
        let a = make_assignments(&frame, &bglike, &[person], -20.0, &config);
        assert_eq!(a.labels.len(), 4);
        assert_eq!(a.n_assigned + a.n_background + a.n_entry, 4);
        assert_eq!(a.labels[0], PointLabel::Person { index: 0, leg: 0 });
        assert_eq!(a.labels[2], PointLabel::Background);
        assert_eq!(a.labels[3], PointLabel::Entry);
        assert_eq!(a.unassigned(), vec![3]);
    }

    #[test]
    fn test_ties_favour_earlier_hypothesis() {
        let config = TrackerConfig::default();
        let frame = frame_from_points(&[(0.0, 2.0)]);
        let a = make_assignments(&frame, &[-3.0], &[], -3.0, &config);
        assert_eq!(a.labels[0], PointLabel::Entry);
        let a = make_assignments(&frame, &[-2.999], &[], -3.0, &config);
        assert_eq!(a.labels[0], PointLabel::Background);
    }

    #[test]
    fn test_points_by_person() {
        let a = Assignments {
            labels: vec![
                PointLabel::Person { index: 1, leg: 1 },
                PointLabel::Background,
                PointLabel::Person { index: 0, leg: 0 },
                PointLabel::Person { index: 1, leg: 1 },
            ],
            best_like: vec![0.0; 4],
            n_assigned: 3,
            n_background: 1,
            n_entry: 0,
        };
        let by = a.points_by_person(2);
        assert_eq!(by[0], [vec![2], vec![]]);
        assert_eq!(by[1], [vec![], vec![0, 3]]);
        assert!(a.use_all_points_for_background());
    }

    #[test]
    fn test_first_gap() {
        assert_eq!(first_gap(&[3, 4, 5]), None);
        assert_eq!(first_gap(&[3, 4, 7, 8]), Some(2));
        assert_eq!(first_gap(&[]), None);
    }

    #[test]
    fn test_split_at_gap() {
        let config = TrackerConfig::default();
        // Two clusters at the same range, left leg then right leg in scan order
        let pts: Vec<(f64, f64)> = [0.0, 0.01, 0.02, 0.1, 0.11, 0.12]
            .iter()
            .map(|a: &f64| {
                let t = FRAC_PI_2 - a;
                (2.0 * t.cos(), 2.0 * t.sin())
            })
            .collect();
        let frame = frame_from_points(&pts);
        let left = frame.point(1);
        let right = frame.point(4);
        let person = Person::new(1, 1, left, right, &config);

        let (split, outcome) = resolve_leg_split(&frame, &person, [vec![0, 1, 2, 4, 5], vec![]], &config);
        assert!(outcome.split);
        assert!(!outcome.swapped);
        assert_eq!(split, [vec![0, 1, 2], vec![4, 5]]);

        // Leg roles reversed: the split is swapped back
        let person = Person::new(1, 1, right, left, &config);
        let (split, outcome) = resolve_leg_split(&frame, &person, [vec![0, 1, 2, 4, 5], vec![]], &config);
        assert!(outcome.swapped);
        assert_eq!(split, [vec![4, 5], vec![0, 1, 2]]);
    }

    #[test]
    fn test_split_at_range_jump() {
        let config = TrackerConfig::default();
        let frame = ScanFrame::from_polar(
            1,
            Point2::origin(),
            0.0,
            &[1.50, 1.51, 1.52, 1.53],
            &[2.0, 2.0, 2.3, 2.3],
        );
        let person = Person::new(1, 1, frame.point(0), frame.point(3), &config);
        let (split, outcome) = resolve_leg_split(&frame, &person, [vec![], vec![0, 1, 2, 3]], &config);
        assert!(outcome.split);
        assert_eq!(split[0].len() + split[1].len(), 4);
        let mut all: Vec<usize> = split.concat();
        all.sort();
        assert_eq!(all, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_contiguous_points_untouched() {
        let config = TrackerConfig::default();
        let frame = ScanFrame::from_polar(1, Point2::origin(), 0.0, &[1.50, 1.51, 1.52], &[2.0, 2.01, 2.02]);
        let person = Person::new(1, 1, frame.point(0), frame.point(2), &config);
        let (split, outcome) = resolve_leg_split(&frame, &person, [vec![0, 1, 2], vec![]], &config);
        assert_eq!(outcome, SplitOutcome::default());
        assert_eq!(split, [vec![0, 1, 2], vec![]]);
    }
}

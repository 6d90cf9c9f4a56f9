//! Star history as a plottable series

use chrono::{DateTime, Utc};
use github::{Repository, StarEvent};
use serde::Serialize;

/// One point of the cumulative star curve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Point {
    pub x: DateTime<Utc>,
    pub y: u64,
}

/// Body of the stars endpoint.
#[derive(Debug, Serialize)]
pub struct StarSeries {
    pub repository: Repository,
    pub sampled: bool,
    pub points: Vec<Point>,
}

impl StarSeries {
    /// Turn collected events into points.
    ///
    /// `y` is the event's ordinal when it carries one, its 1-based position
    /// otherwise. A series with fewer than two points gets a `(now, 1)` point
    /// appended so it can always be drawn as a line.
    pub fn new(repository: Repository, stars: Vec<StarEvent>) -> Self {
        let sampled = stars.iter().any(|star| star.ordinal.is_some());
        let mut points: Vec<Point> = stars
            .into_iter()
            .enumerate()
            .map(|(i, star)| Point {
                x: star.starred_at,
                y: star.ordinal.unwrap_or(i as u64 + 1),
            })
            .collect();

        if points.len() < 2 {
            points.push(Point { x: Utc::now(), y: 1 });
        }

        Self {
            repository,
            sampled,
            points,
        }
    }
}

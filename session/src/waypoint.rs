//! Waypoints and the ordered [`WaypointSet`].
//!
//! A waypoint is a stop with a coordinate, a display name and a leg-splitting
//! flag. Silent waypoints are passed through without ending a leg; the first
//! and last waypoints always delimit legs.
//!
//! Unless the caller asks to preserve its order, every batch is sorted by the
//! explicit `order` field (missing = 0) with a stable sort, so ties keep their
//! insertion order.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Mean Earth radius used for great-circle distances
const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// A geographic position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees, `[-90, 90]`
    pub latitude: f64,
    /// Longitude in degrees, `[-180, 180]`
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a coordinate without validating it
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components are finite and in range
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle (haversine) distance in meters
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_METERS * a.sqrt().asin()
    }

    /// Point at `fraction` (clamped to `[0, 1]`) of the way towards `other`
    #[must_use]
    pub fn interpolate(&self, other: &Self, fraction: f64) -> Self {
        let t = fraction.clamp(0.0, 1.0);
        Self {
            latitude: (other.latitude - self.latitude).mul_add(t, self.latitude),
            longitude: (other.longitude - self.longitude).mul_add(t, self.longitude),
        }
    }
}

/// A validated stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waypoint {
    /// Display name, never blank
    pub name: String,
    /// Position of the stop
    pub coordinate: Coordinate,
    /// Pass-through stop that does not end a leg
    pub is_silent: bool,
    /// Explicit position used when ordering is not preserved
    pub order: Option<i32>,
}

impl Waypoint {
    /// Creates a leg-splitting waypoint without an explicit order
    #[must_use]
    pub fn new(name: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            name: name.into(),
            coordinate,
            is_silent: false,
            order: None,
        }
    }

    /// Sets the explicit order
    #[must_use]
    pub const fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    /// Marks the waypoint as a pass-through stop
    #[must_use]
    pub const fn silent(mut self) -> Self {
        self.is_silent = true;
        self
    }
}

/// Unvalidated waypoint as supplied by a caller or host channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WaypointInput {
    /// Display name
    pub name: Option<String>,
    /// Latitude in degrees
    pub latitude: Option<f64>,
    /// Longitude in degrees
    pub longitude: Option<f64>,
    /// Pass-through stop
    pub is_silent: bool,
    /// Explicit order
    pub order: Option<i32>,
}

impl WaypointInput {
    /// Validates the input, reporting `index` on failure
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingField`] for an absent or blank name
    /// or coordinate component, and [`ValidationError::InvalidCoordinate`]
    /// for out-of-range values.
    pub fn resolve(self, index: usize) -> Result<Waypoint, ValidationError> {
        let name = self
            .name
            .filter(|name| !name.trim().is_empty())
            .ok_or(ValidationError::MissingField {
                index,
                field: "name",
            })?;
        let latitude = self.latitude.ok_or(ValidationError::MissingField {
            index,
            field: "latitude",
        })?;
        let longitude = self.longitude.ok_or(ValidationError::MissingField {
            index,
            field: "longitude",
        })?;

        let coordinate = Coordinate::new(latitude, longitude);
        if !coordinate.is_valid() {
            return Err(ValidationError::InvalidCoordinate {
                index,
                latitude,
                longitude,
            });
        }

        Ok(Waypoint {
            name,
            coordinate,
            is_silent: self.is_silent,
            order: self.order,
        })
    }
}

impl From<Waypoint> for WaypointInput {
    fn from(waypoint: Waypoint) -> Self {
        Self {
            name: Some(waypoint.name),
            latitude: Some(waypoint.coordinate.latitude),
            longitude: Some(waypoint.coordinate.longitude),
            is_silent: waypoint.is_silent,
            order: waypoint.order,
        }
    }
}

/// Validates a whole batch, failing on the first rejected entry
fn resolve_batch<I>(inputs: I) -> Result<Vec<Waypoint>, ValidationError>
where
    I: IntoIterator,
    I::Item: Into<WaypointInput>,
{
    inputs
        .into_iter()
        .enumerate()
        .map(|(index, input)| input.into().resolve(index))
        .collect()
}

/// Stable sort by explicit order, missing order counts as 0
fn sort_by_order(batch: &mut [Waypoint]) {
    batch.sort_by_key(|waypoint| waypoint.order.unwrap_or(0));
}

/// Ordered collection of stops
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaypointSet {
    waypoints: Vec<Waypoint>,
}

impl WaypointSet {
    /// Creates an empty set
    #[must_use]
    pub const fn new() -> Self {
        Self {
            waypoints: Vec::new(),
        }
    }

    /// Builds a routable set (at least two waypoints)
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for invalid entries or fewer than two
    /// waypoints.
    pub fn from_inputs<I>(inputs: I, preserve_order: bool) -> Result<Self, ValidationError>
    where
        I: IntoIterator,
        I::Item: Into<WaypointInput>,
    {
        let mut set = Self::new();
        set.append(inputs, preserve_order)?;
        set.ensure_routable()?;
        Ok(set)
    }

    /// Appends a batch, sorting it by `order` unless `preserve_order` is set
    ///
    /// Returns the number of appended waypoints.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the first rejected entry; the set
    /// is left untouched.
    pub fn append<I>(&mut self, inputs: I, preserve_order: bool) -> Result<usize, ValidationError>
    where
        I: IntoIterator,
        I::Item: Into<WaypointInput>,
    {
        let mut batch = resolve_batch(inputs)?;
        if !preserve_order {
            sort_by_order(&mut batch);
        }
        let count = batch.len();
        self.waypoints.extend(batch);
        Ok(count)
    }

    /// Replaces the whole set with a batch sorted by `order`
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the first rejected entry; the set
    /// is left untouched.
    pub fn replace_all<I>(&mut self, inputs: I) -> Result<(), ValidationError>
    where
        I: IntoIterator,
        I::Item: Into<WaypointInput>,
    {
        let mut batch = resolve_batch(inputs)?;
        sort_by_order(&mut batch);
        self.waypoints = batch;
        Ok(())
    }

    /// Inserts a batch right after position `index`
    ///
    /// Returns the number of inserted waypoints.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPosition`] when `index` is not in the
    /// set, or the first rejected entry. The set is left untouched on error.
    pub fn insert_after<I>(
        &mut self,
        index: usize,
        inputs: I,
        preserve_order: bool,
    ) -> Result<usize, ValidationError>
    where
        I: IntoIterator,
        I::Item: Into<WaypointInput>,
    {
        if index >= self.waypoints.len() {
            return Err(ValidationError::InvalidPosition {
                index,
                len: self.waypoints.len(),
            });
        }

        let mut batch = resolve_batch(inputs)?;
        if !preserve_order {
            sort_by_order(&mut batch);
        }
        let count = batch.len();
        let at = index + 1;
        self.waypoints.splice(at..at, batch);
        Ok(count)
    }

    /// Coordinates in route order
    #[must_use]
    pub fn as_coordinate_list(&self) -> Vec<Coordinate> {
        self.waypoints.iter().map(|w| w.coordinate).collect()
    }

    /// Removes every waypoint
    pub fn clear(&mut self) {
        self.waypoints.clear();
    }

    /// Fails unless the set can be routed
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TooFewWaypoints`] below two waypoints.
    pub fn ensure_routable(&self) -> Result<(), ValidationError> {
        if self.waypoints.len() < 2 {
            return Err(ValidationError::TooFewWaypoints {
                count: self.waypoints.len(),
            });
        }
        Ok(())
    }

    /// First stop
    #[must_use]
    pub fn first(&self) -> Option<&Waypoint> {
        self.waypoints.first()
    }

    /// Final stop
    #[must_use]
    pub fn last(&self) -> Option<&Waypoint> {
        self.waypoints.last()
    }

    /// Stop at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }

    /// Number of stops
    #[must_use]
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Whether the set has no stops
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Iterates stops in route order
    pub fn iter(&self) -> std::slice::Iter<'_, Waypoint> {
        self.waypoints.iter()
    }

    /// Indices of the waypoints that delimit legs
    ///
    /// The first and last waypoints always delimit legs; in between only
    /// non-silent waypoints do.
    #[must_use]
    pub fn leg_boundaries(&self) -> Vec<usize> {
        let last = self.waypoints.len().saturating_sub(1);
        self.waypoints
            .iter()
            .enumerate()
            .filter(|(index, waypoint)| *index == 0 || *index == last || !waypoint.is_silent)
            .map(|(index, _)| index)
            .collect()
    }

    /// Number of legs a route through this set has
    #[must_use]
    pub fn leg_count(&self) -> usize {
        self.leg_boundaries().len().saturating_sub(1)
    }

    /// Waypoints still ahead while travelling `leg`
    ///
    /// Everything after the waypoint that starts `leg`. Empty when `leg` is
    /// past the last leg.
    #[must_use]
    pub fn remaining_after_leg(&self, leg: usize) -> Self {
        let boundaries = self.leg_boundaries();
        let waypoints = match boundaries.get(leg) {
            Some(&start) if leg + 1 < boundaries.len() => self.waypoints[start + 1..].to_vec(),
            _ => Vec::new(),
        };
        Self { waypoints }
    }

    /// Index of the waypoint that starts `leg`
    #[must_use]
    pub fn leg_start(&self, leg: usize) -> Option<usize> {
        let boundaries = self.leg_boundaries();
        boundaries.get(leg).copied().filter(|_| leg + 1 < boundaries.len())
    }

    /// Prepends a waypoint (used for the current position when rerouting)
    #[must_use]
    pub fn starting_from(mut self, origin: Waypoint) -> Self {
        self.waypoints.insert(0, origin);
        self
    }
}

impl<'a> IntoIterator for &'a WaypointSet {
    type Item = &'a Waypoint;
    type IntoIter = std::slice::Iter<'a, Waypoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.waypoints.iter()
    }
}

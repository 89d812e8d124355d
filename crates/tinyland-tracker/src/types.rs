use std::collections::btree_map;
use std::collections::BTreeMap;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use tinyland_core::Quad;

/// One marker as reported by a detector, in the coordinates of the frame
/// it was found in.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedMarker {
    pub id: u32,
    /// TL, TR, BR, BL.
    pub corners: Quad,
}

/// Which image the detector looked at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSpace {
    /// The raw camera frame.
    Camera,
    /// The frame already warped into projector space.
    Output,
}

/// A marker seen in one frame, with its corners in both spaces.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: u32,
    /// Corners in the space the detector ran in.
    pub observed: Quad,
    /// `observed` mapped through the calibration into the other space.
    pub mapped: Quad,
    pub space: DetectionSpace,
    /// Midpoint of the projector-space TL and BR corners.
    pub center: Point2<f64>,
    /// Left-edge angle in degrees; `NaN` when undefined.
    pub rotation: f64,
}

impl Marker {
    pub(crate) fn new(id: u32, observed: Quad, mapped: Quad, space: DetectionSpace) -> Self {
        let output = match space {
            DetectionSpace::Camera => mapped,
            DetectionSpace::Output => observed,
        };
        Self {
            id,
            observed,
            mapped,
            space,
            center: output.diagonal_center(),
            rotation: output.left_edge_angle_deg(),
        }
    }

    /// Corners in projector space.
    pub fn output_corners(&self) -> &Quad {
        match self.space {
            DetectionSpace::Camera => &self.mapped,
            DetectionSpace::Output => &self.observed,
        }
    }

    /// Corners in camera space.
    pub fn camera_corners(&self) -> &Quad {
        match self.space {
            DetectionSpace::Camera => &self.observed,
            DetectionSpace::Output => &self.mapped,
        }
    }

    /// Rotation in degrees, or `None` when the left edge is vertical in a
    /// way the angle formula cannot express.
    pub fn rotation(&self) -> Option<f64> {
        self.rotation.is_finite().then_some(self.rotation)
    }
}

/// Every marker of one frame, grouped by id in detection order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    markers: BTreeMap<u32, Vec<Marker>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, marker: Marker) {
        self.markers.entry(marker.id).or_default().push(marker);
    }

    pub fn get(&self, id: u32) -> &[Marker] {
        self.markers.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.markers.keys().copied()
    }

    /// All markers, ascending id then detection order.
    pub fn markers(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values().flatten()
    }

    /// Number of markers, not ids.
    pub fn len(&self) -> usize {
        self.markers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, u32, Vec<Marker>> {
        self.markers.iter()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = (&'a u32, &'a Vec<Marker>);
    type IntoIter = btree_map::Iter<'a, u32, Vec<Marker>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

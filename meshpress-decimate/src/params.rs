//! Decimation targets and boundary weighting.

use meshpress_core::{Error, Result};

/// Weight for boundary constraint planes when nothing asks for preservation.
pub const DEFAULT_BOUNDARY_WEIGHT: f64 = 1.0;
/// Weight used when open boundaries should keep their shape.
pub const PRESERVE_BOUNDARY_WEIGHT: f64 = 2.0;
/// Weight used when texture seams must survive; seams split into open
/// boundaries at load time, so a stronger boundary hold protects them.
pub const UV_BOUNDARY_WEIGHT: f64 = 3.0;

/// What a decimation run should produce.
///
/// The face count is validated at construction; the preservation flags
/// select how strongly open boundaries and texture seams are pinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimationTarget {
    face_count: usize,
    pub preserve_boundaries: bool,
    pub preserve_uv: bool,
}

impl DecimationTarget {
    /// Create a target for the given face count, which must be positive.
    pub fn new(face_count: usize) -> Result<Self> {
        if face_count == 0 {
            return Err(Error::InvalidData(
                "target face count must be positive".to_string(),
            ));
        }
        Ok(Self {
            face_count,
            preserve_boundaries: true,
            preserve_uv: false,
        })
    }

    pub fn face_count(&self) -> usize {
        self.face_count
    }

    #[must_use]
    pub fn with_preserve_boundaries(mut self, preserve: bool) -> Self {
        self.preserve_boundaries = preserve;
        self
    }

    #[must_use]
    pub fn with_preserve_uv(mut self, preserve: bool) -> Self {
        self.preserve_uv = preserve;
        self
    }

    /// Boundary constraint weight implied by the preservation flags.
    pub fn boundary_weight(&self) -> f64 {
        if self.preserve_uv {
            UV_BOUNDARY_WEIGHT
        } else if self.preserve_boundaries {
            PRESERVE_BOUNDARY_WEIGHT
        } else {
            DEFAULT_BOUNDARY_WEIGHT
        }
    }
}

//! Mask payloads flowing through the pipeline.
//!
//! The scheduler only needs two things from a grid: an independent clone and a content hash.
//! Both are captured by the [`Mask`] trait. The concrete map payloads are [`FloatMask`],
//! [`BooleanMask`] and [`Vector4Mask`], unified by [`MapMask`] so a single pipeline can carry
//! every port type of the stage graphs.
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub mod boolean;
pub mod float;
pub mod vector;

pub use boolean::BooleanMask;
pub use float::FloatMask;
pub use vector::Vector4Mask;

/// Grid data the pipeline can schedule operations on.
///
/// `Clone` must produce a fully independent snapshot: the pipeline hands clones to
/// concurrent readers and relies on none of them observing another's mutation.
pub trait Mask: Clone + Send + Sync + 'static {
    /// Feed the full content of the grid into `hasher`.
    fn hash_content(&self, hasher: &mut blake3::Hasher);

    /// Content hash of the grid.
    fn content_hash(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        self.hash_content(&mut hasher);
        hasher.finalize()
    }
}

/// Logical identifier of a mask registered with a [`crate::pipeline::Pipeline`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaskId(pub(crate) usize);

impl MaskId {
    /// Raw registration index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for MaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mask#{}", self.0)
    }
}

/// Payload type tag of a [`MapMask`], used to type-check graph ports.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MaskKind {
    Float,
    Boolean,
    Vector4,
}

impl MaskKind {
    fn tag(self) -> u8 {
        match self {
            MaskKind::Float => 0,
            MaskKind::Boolean => 1,
            MaskKind::Vector4 => 2,
        }
    }
}

/// Any map layer produced by a stage graph.
#[derive(Clone, Debug, PartialEq)]
pub enum MapMask {
    Float(FloatMask),
    Boolean(BooleanMask),
    Vector4(Vector4Mask),
}

impl MapMask {
    /// Create a zeroed mask of the given kind.
    pub fn empty(kind: MaskKind, width: usize, height: usize) -> Self {
        match kind {
            MaskKind::Float => MapMask::Float(FloatMask::new(width, height)),
            MaskKind::Boolean => MapMask::Boolean(BooleanMask::new(width, height)),
            MaskKind::Vector4 => MapMask::Vector4(Vector4Mask::new(width, height)),
        }
    }

    pub fn kind(&self) -> MaskKind {
        match self {
            MapMask::Float(_) => MaskKind::Float,
            MapMask::Boolean(_) => MaskKind::Boolean,
            MapMask::Vector4(_) => MaskKind::Vector4,
        }
    }

    /// Dimensions as `(width, height)`.
    pub fn size(&self) -> (usize, usize) {
        match self {
            MapMask::Float(m) => m.size(),
            MapMask::Boolean(m) => m.size(),
            MapMask::Vector4(m) => m.size(),
        }
    }

    fn mismatch(&self, expected: MaskKind) -> Error {
        Error::MaskKind {
            expected,
            found: self.kind(),
        }
    }

    pub fn as_float(&self) -> Result<&FloatMask> {
        match self {
            MapMask::Float(m) => Ok(m),
            other => Err(other.mismatch(MaskKind::Float)),
        }
    }

    pub fn as_float_mut(&mut self) -> Result<&mut FloatMask> {
        match self {
            MapMask::Float(m) => Ok(m),
            other => Err(other.mismatch(MaskKind::Float)),
        }
    }

    pub fn as_boolean(&self) -> Result<&BooleanMask> {
        match self {
            MapMask::Boolean(m) => Ok(m),
            other => Err(other.mismatch(MaskKind::Boolean)),
        }
    }

    pub fn as_boolean_mut(&mut self) -> Result<&mut BooleanMask> {
        match self {
            MapMask::Boolean(m) => Ok(m),
            other => Err(other.mismatch(MaskKind::Boolean)),
        }
    }

    pub fn as_vector(&self) -> Result<&Vector4Mask> {
        match self {
            MapMask::Vector4(m) => Ok(m),
            other => Err(other.mismatch(MaskKind::Vector4)),
        }
    }

    pub fn as_vector_mut(&mut self) -> Result<&mut Vector4Mask> {
        match self {
            MapMask::Vector4(m) => Ok(m),
            other => Err(other.mismatch(MaskKind::Vector4)),
        }
    }
}

impl Mask for MapMask {
    fn hash_content(&self, hasher: &mut blake3::Hasher) {
        hasher.update(&[self.kind().tag()]);
        match self {
            MapMask::Float(m) => m.hash_content(hasher),
            MapMask::Boolean(m) => m.hash_content(hasher),
            MapMask::Vector4(m) => m.hash_content(hasher),
        }
    }
}

impl From<FloatMask> for MapMask {
    fn from(value: FloatMask) -> Self {
        MapMask::Float(value)
    }
}

impl From<BooleanMask> for MapMask {
    fn from(value: BooleanMask) -> Self {
        MapMask::Boolean(value)
    }
}

impl From<Vector4Mask> for MapMask {
    fn from(value: Vector4Mask) -> Self {
        MapMask::Vector4(value)
    }
}

pub(crate) fn hash_dimensions(hasher: &mut blake3::Hasher, width: usize, height: usize) {
    hasher.update(&(width as u64).to_le_bytes());
    hasher.update(&(height as u64).to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_creates_requested_kind() {
        for kind in [MaskKind::Float, MaskKind::Boolean, MaskKind::Vector4] {
            let mask = MapMask::empty(kind, 3, 2);
            assert_eq!(mask.kind(), kind);
            assert_eq!(mask.size(), (3, 2));
        }
    }

    #[test]
    fn accessors_report_kind_mismatch() {
        let mask = MapMask::empty(MaskKind::Boolean, 1, 1);
        let err = mask.as_float().expect_err("boolean is not float");
        assert!(matches!(
            err,
            Error::MaskKind {
                expected: MaskKind::Float,
                found: MaskKind::Boolean
            }
        ));
    }

    #[test]
    fn hash_distinguishes_kinds_with_equal_bytes() {
        let float = MapMask::empty(MaskKind::Float, 2, 2);
        let vector = MapMask::empty(MaskKind::Vector4, 2, 2);
        assert_ne!(float.content_hash(), vector.content_hash());
    }

    #[test]
    fn clone_hashes_identically() {
        let mut mask = FloatMask::new(4, 4);
        mask.set(1, 2, 0.5);
        let a: MapMask = mask.into();
        let b = a.clone();
        assert_eq!(a.content_hash(), b.content_hash());
    }
}

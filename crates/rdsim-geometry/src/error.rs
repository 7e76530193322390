//! Error types for geometry construction.

use std::fmt;

use rdsim_core::id::SurfaceClassId;

/// Errors arising while building walls from a triangle list.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// A triangle references a vertex that does not exist.
    VertexOutOfRange {
        /// Index of the triangle.
        triangle: usize,
        /// The offending vertex index.
        vertex: usize,
    },
    /// A triangle has (near) zero area or non-finite coordinates.
    DegenerateTriangle {
        /// Index of the triangle.
        triangle: usize,
    },
    /// The per-triangle surface class list does not match the triangle count.
    ClassCountMismatch {
        /// Number of triangles.
        expected: usize,
        /// Number of class assignments supplied.
        got: usize,
    },
    /// A triangle names a surface class that was not defined.
    UnknownSurfaceClass {
        /// Index of the triangle.
        triangle: usize,
        /// The undefined class.
        class: SurfaceClassId,
    },
    /// More than two triangles share one edge.
    NonManifoldEdge {
        /// First vertex of the edge.
        a: usize,
        /// Second vertex of the edge.
        b: usize,
    },
    /// The subpartition grid parameters are unusable.
    InvalidGrid {
        /// What went wrong.
        reason: String,
    },
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VertexOutOfRange { triangle, vertex } => {
                write!(f, "triangle {triangle} references missing vertex {vertex}")
            }
            Self::DegenerateTriangle { triangle } => {
                write!(f, "triangle {triangle} is degenerate")
            }
            Self::ClassCountMismatch { expected, got } => write!(
                f,
                "expected a surface class for each of {expected} triangles, got {got}"
            ),
            Self::UnknownSurfaceClass { triangle, class } => {
                write!(f, "triangle {triangle} uses undefined surface class {class}")
            }
            Self::NonManifoldEdge { a, b } => {
                write!(f, "edge ({a}, {b}) is shared by more than two triangles")
            }
            Self::InvalidGrid { reason } => write!(f, "invalid subpartition grid: {reason}"),
        }
    }
}

impl std::error::Error for GeometryError {}

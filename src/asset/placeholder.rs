//! Procedural placeholder meshes.
//!
//! Placeholders are lathe surfaces: a 2D profile (radius, height) swept around
//! the vertical axis. They are cheap to build, need no network, and are
//! recognisable enough to stand in for a body or a garment.

use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use std::fmt;
use std::str::FromStr;

const SEGMENTS: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderShape {
    /// Mannequin silhouette.
    Body,
    /// Open torso shell.
    Garment,
    /// Sphere, when nothing is known about the asset.
    Generic,
}

impl PlaceholderShape {
    pub fn as_str(self) -> &'static str {
        match self {
            PlaceholderShape::Body => "body",
            PlaceholderShape::Garment => "garment",
            PlaceholderShape::Generic => "generic",
        }
    }

    /// (radius, height) profile in metres, bottom to top.
    fn profile(self) -> Vec<(f32, f32)> {
        match self {
            PlaceholderShape::Body => vec![
                (0.00, 0.00),
                (0.10, 0.02),
                (0.09, 0.45),
                (0.16, 0.85),
                (0.14, 1.05),
                (0.19, 1.35),
                (0.06, 1.50),
                (0.10, 1.62),
                (0.07, 1.74),
                (0.00, 1.76),
            ],
            PlaceholderShape::Garment => vec![
                (0.17, 0.80),
                (0.16, 0.95),
                (0.15, 1.05),
                (0.19, 1.25),
                (0.20, 1.38),
                (0.08, 1.46),
            ],
            PlaceholderShape::Generic => (0..=12)
                .map(|i| {
                    let theta = std::f32::consts::PI * i as f32 / 12.0;
                    (0.5 * theta.sin(), 0.5 - 0.5 * theta.cos())
                })
                .collect(),
        }
    }
}

impl fmt::Display for PlaceholderShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlaceholderShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "body" => Ok(PlaceholderShape::Body),
            "garment" | "clothing" => Ok(PlaceholderShape::Garment),
            "generic" => Ok(PlaceholderShape::Generic),
            other => Err(format!(
                "unknown placeholder shape '{}' (expected body, garment or generic)",
                other
            )),
        }
    }
}

/// Indexed triangle mesh built from a lathe profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ProceduralMesh {
    pub shape: PlaceholderShape,
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl ProceduralMesh {
    pub fn build(shape: PlaceholderShape) -> Self {
        let profile = shape.profile();
        let mut positions = Vec::with_capacity(profile.len() * SEGMENTS);
        for &(radius, height) in &profile {
            for segment in 0..SEGMENTS {
                let angle = TAU * segment as f32 / SEGMENTS as f32;
                positions.push([radius * angle.cos(), height, radius * angle.sin()]);
            }
        }

        let mut indices = Vec::with_capacity((profile.len() - 1) * SEGMENTS * 6);
        for ring in 0..profile.len() - 1 {
            for segment in 0..SEGMENTS {
                let next = (segment + 1) % SEGMENTS;
                let a = (ring * SEGMENTS + segment) as u32;
                let b = (ring * SEGMENTS + next) as u32;
                let c = ((ring + 1) * SEGMENTS + segment) as u32;
                let d = ((ring + 1) * SEGMENTS + next) as u32;
                indices.extend_from_slice(&[a, c, b, b, c, d]);
            }
        }

        Self {
            shape,
            positions,
            indices,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn face_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Height of the tallest vertex.
    pub fn height(&self) -> f32 {
        self.positions.iter().map(|p| p[1]).fold(0.0, f32::max)
    }
}

//! Renderer contract used by the asset loader.

use serde::Serialize;

use crate::asset::candidate::{AssetCandidate, AssetFormat};
use crate::asset::glb::GlbSummary;
use crate::asset::placeholder::{PlaceholderShape, ProceduralMesh};
use crate::error::ApiError;

/// A model the renderer has accepted for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedModel {
    pub format: AssetFormat,
    pub mesh_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertex_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<PlaceholderShape>,
}

/// Display capability supplied by the surrounding application.
///
/// `accept` may refuse a validated payload: `ApiError::Capability` when the
/// device cannot display the format at all, `ApiError::RendererRejected`
/// when only this particular asset is unusable. `procedural` never fails.
pub trait Renderer: Send + Sync {
    fn accept(
        &self,
        candidate: &AssetCandidate,
        payload: &[u8],
        summary: &GlbSummary,
    ) -> Result<RenderedModel, ApiError>;

    fn procedural(&self, shape: PlaceholderShape) -> RenderedModel;
}

/// Renderer without a display surface. Accepts any GLB with at least one mesh
/// up to a size limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessRenderer {
    pub supports_glb: bool,
    pub max_payload_bytes: u64,
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        Self {
            supports_glb: true,
            max_payload_bytes: 64 * 1024 * 1024,
        }
    }
}

impl Renderer for HeadlessRenderer {
    fn accept(
        &self,
        candidate: &AssetCandidate,
        payload: &[u8],
        summary: &GlbSummary,
    ) -> Result<RenderedModel, ApiError> {
        if !self.supports_glb {
            return Err(ApiError::Capability(format!(
                "{} rendering is not available on this device",
                candidate.format
            )));
        }
        if payload.len() as u64 > self.max_payload_bytes {
            return Err(ApiError::RendererRejected(format!(
                "{} bytes exceeds the renderer limit of {} bytes",
                payload.len(),
                self.max_payload_bytes
            )));
        }
        if summary.mesh_count == 0 {
            return Err(ApiError::RendererRejected(format!(
                "{} contains no meshes",
                candidate.reference
            )));
        }
        Ok(RenderedModel {
            format: candidate.format,
            mesh_count: summary.mesh_count,
            vertex_count: None,
            face_count: None,
            placeholder: None,
        })
    }

    fn procedural(&self, shape: PlaceholderShape) -> RenderedModel {
        let mesh = ProceduralMesh::build(shape);
        RenderedModel {
            format: AssetFormat::Procedural,
            mesh_count: 1,
            vertex_count: Some(mesh.vertex_count()),
            face_count: Some(mesh.face_count()),
            placeholder: Some(shape),
        }
    }
}

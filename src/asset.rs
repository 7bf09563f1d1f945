//! Resilient Asset Loader
//!
//! Resolves an ordered chain of asset candidates to something the renderer can
//! display, degrading to a procedural placeholder instead of failing.

pub mod candidate;
pub mod fetch;
pub mod glb;
pub mod loader;
pub mod placeholder;
pub mod renderer;

pub use candidate::{AssetCandidate, AssetChain, AssetFormat};
pub use fetch::{AssetFetcher, HttpAssetFetcher};
pub use glb::{encode_glb, inspect_glb, GlbSummary};
pub use loader::{
    CandidateFailure, Fidelity, LoadedAsset, LoaderConfig, Resolution, ResilientAssetLoader,
};
pub use placeholder::{PlaceholderShape, ProceduralMesh};
pub use renderer::{HeadlessRenderer, RenderedModel, Renderer};

//! Asset candidates and the ordered fallback chain.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::asset::placeholder::PlaceholderShape;
use crate::generation::task::{AssetBundle, TaskKind};

const PROCEDURAL_SCHEME: &str = "procedural:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetFormat {
    Glb,
    /// Generated locally; never touches the network and always succeeds.
    Procedural,
}

impl AssetFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetFormat::Glb => "glb",
            AssetFormat::Procedural => "procedural",
        }
    }
}

impl fmt::Display for AssetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One place to obtain a renderable asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetCandidate {
    /// URL or local path. For procedural candidates, `procedural:<shape>`.
    pub reference: String,
    pub format: AssetFormat,
    /// Set on the copy held by a `Resolution` once this candidate has been
    /// tried in that pass. The loader ignores the value on chains it is given:
    /// every pass starts from a clean slate.
    #[serde(default)]
    pub attempted: bool,
}

impl AssetCandidate {
    pub fn glb(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            format: AssetFormat::Glb,
            attempted: false,
        }
    }

    pub fn procedural(shape: PlaceholderShape) -> Self {
        Self {
            reference: format!("{}{}", PROCEDURAL_SCHEME, shape),
            format: AssetFormat::Procedural,
            attempted: false,
        }
    }

    pub fn is_procedural(&self) -> bool {
        self.format == AssetFormat::Procedural
    }

    /// Shape a procedural candidate stands in for.
    pub fn placeholder_shape(&self) -> PlaceholderShape {
        self.reference
            .strip_prefix(PROCEDURAL_SCHEME)
            .and_then(|shape| shape.parse().ok())
            .unwrap_or(PlaceholderShape::Generic)
    }
}

/// Ordered candidates, always terminated by exactly one procedural placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetChain {
    candidates: Vec<AssetCandidate>,
}

impl AssetChain {
    /// Build a chain from caller-supplied candidates.
    ///
    /// Anything after the first procedural candidate is unreachable and is
    /// dropped. A generic placeholder is appended when the list has none.
    pub fn new(candidates: Vec<AssetCandidate>) -> Self {
        let mut candidates: Vec<AssetCandidate> = candidates
            .into_iter()
            .filter(|c| c.is_procedural() || !c.reference.trim().is_empty())
            .collect();
        match candidates.iter().position(AssetCandidate::is_procedural) {
            Some(index) => candidates.truncate(index + 1),
            None => candidates.push(AssetCandidate::procedural(PlaceholderShape::Generic)),
        }
        Self { candidates }
    }

    /// Primary URL, then mirrors in order, then a placeholder suited to `kind`.
    pub fn from_bundle(bundle: &AssetBundle, kind: TaskKind) -> Self {
        let mut candidates = Vec::with_capacity(bundle.mirrors.len() + 2);
        candidates.push(AssetCandidate::glb(&bundle.primary_url));
        candidates.extend(bundle.mirrors.iter().map(AssetCandidate::glb));
        candidates.push(AssetCandidate::procedural(kind.placeholder_shape()));
        Self::new(candidates)
    }

    /// Chain for a list of references, ending in a placeholder of `shape`.
    pub fn from_references<I, S>(references: I, shape: PlaceholderShape) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut candidates: Vec<AssetCandidate> =
            references.into_iter().map(AssetCandidate::glb).collect();
        candidates.push(AssetCandidate::procedural(shape));
        Self::new(candidates)
    }

    pub fn candidates(&self) -> &[AssetCandidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Never true: a chain always holds its placeholder.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn placeholder(&self) -> &AssetCandidate {
        &self.candidates[self.candidates.len() - 1]
    }
}

impl From<Vec<AssetCandidate>> for AssetChain {
    fn from(candidates: Vec<AssetCandidate>) -> Self {
        Self::new(candidates)
    }
}

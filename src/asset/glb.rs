//! Binary glTF (GLB) container validation.
//!
//! Only the container is checked: header, chunk layout, and that the JSON
//! chunk parses as a glTF 2.0 document. Mesh data is left to the renderer.

use serde::Deserialize;

use crate::error::ApiError;

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_VERSION: u32 = 2;
const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

/// What a valid GLB container holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlbSummary {
    pub json_len: usize,
    pub bin_len: usize,
    pub mesh_count: usize,
    pub generator: Option<String>,
}

#[derive(Deserialize)]
struct GltfDocument {
    asset: GltfAsset,
    #[serde(default)]
    meshes: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct GltfAsset {
    version: String,
    #[serde(default)]
    generator: Option<String>,
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(offset..offset + 4)?.try_into().ok()?;
    Some(u32::from_le_bytes(raw))
}

fn invalid(message: impl Into<String>) -> ApiError {
    ApiError::InvalidAsset(message.into())
}

/// Validate a GLB payload.
pub fn inspect_glb(bytes: &[u8]) -> Result<GlbSummary, ApiError> {
    if bytes.is_empty() {
        return Err(invalid("empty payload"));
    }
    if bytes.len() < HEADER_LEN + CHUNK_HEADER_LEN {
        return Err(invalid(format!("payload too short for GLB ({} bytes)", bytes.len())));
    }
    if &bytes[..4] != GLB_MAGIC {
        return Err(invalid("missing glTF magic"));
    }

    let version = read_u32(bytes, 4).ok_or_else(|| invalid("truncated header"))?;
    if version != GLB_VERSION {
        return Err(invalid(format!("unsupported GLB version {}", version)));
    }
    let declared = read_u32(bytes, 8).ok_or_else(|| invalid("truncated header"))? as usize;
    if declared != bytes.len() {
        return Err(invalid(format!(
            "declared length {} does not match payload length {}",
            declared,
            bytes.len()
        )));
    }

    let mut offset = HEADER_LEN;
    let mut json: Option<&[u8]> = None;
    let mut bin_len = 0usize;
    while offset < bytes.len() {
        let chunk_len =
            read_u32(bytes, offset).ok_or_else(|| invalid("truncated chunk header"))? as usize;
        let chunk_type =
            read_u32(bytes, offset + 4).ok_or_else(|| invalid("truncated chunk header"))?;
        let start = offset + CHUNK_HEADER_LEN;
        let data = start
            .checked_add(chunk_len)
            .and_then(|end| bytes.get(start..end))
            .ok_or_else(|| invalid("chunk extends past end of payload"))?;

        match (json.is_some(), chunk_type) {
            (false, CHUNK_JSON) => json = Some(data),
            (false, other) => {
                return Err(invalid(format!("first chunk must be JSON (got 0x{:08X})", other)))
            }
            (true, CHUNK_BIN) if bin_len == 0 => bin_len = chunk_len,
            // Unknown chunks are allowed and skipped.
            (true, _) => {}
        }
        offset = start + chunk_len;
    }

    let json = json.ok_or_else(|| invalid("missing JSON chunk"))?;
    let document: GltfDocument = serde_json::from_slice(json)
        .map_err(|e| invalid(format!("JSON chunk is not a glTF document: {}", e)))?;
    if !document.asset.version.starts_with("2.") {
        return Err(invalid(format!(
            "unsupported glTF asset version {}",
            document.asset.version
        )));
    }

    Ok(GlbSummary {
        json_len: json.len(),
        bin_len,
        mesh_count: document.meshes.len(),
        generator: document.asset.generator,
    })
}

/// Assemble a GLB container from a JSON document and optional binary buffer.
pub fn encode_glb(document: &serde_json::Value, bin: &[u8]) -> Vec<u8> {
    let mut json = document.to_string().into_bytes();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = bin.to_vec();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let bin_chunk = if bin.is_empty() { 0 } else { CHUNK_HEADER_LEN + bin.len() };
    let total = HEADER_LEN + CHUNK_HEADER_LEN + json.len() + bin_chunk;

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(GLB_MAGIC);
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json);
    if !bin.is_empty() {
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        out.extend_from_slice(&bin);
    }
    out
}

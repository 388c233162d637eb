//! Static catalogue of the image models the gateway advertises.
//!
//! Served from `GET /v1/models` in the `OpenAI` list shape. Legacy ids listed
//! per model resolve to the current provider id when used in a request.

use serde::Serialize;
use std::collections::HashMap;

/// Fixed `created` stamp reported for every catalogue entry (2024-01-01).
const CATALOGUE_CREATED: i64 = 1_704_067_200;

#[derive(Debug, Clone, Copy)]
struct CatalogueEntry {
    id: &'static str,
    description: &'static str,
    legacy_ids: &'static [&'static str],
}

const CATALOGUE: &[CatalogueEntry] = &[
    CatalogueEntry {
        id: "doubao-seedream-4-0-250828",
        description: "Text-to-image, image-to-image (single or multi-image fusion), sequential generation",
        legacy_ids: &["doubao-seedream-4.0", "doubao-seedream-4-0"],
    },
    CatalogueEntry {
        id: "doubao-seedream-3-0-t2i-250415",
        description: "Text-to-image",
        legacy_ids: &["doubao-seedream-3.0-t2i"],
    },
    CatalogueEntry {
        id: "doubao-seededit-3-0-i2i-250628",
        description: "Image-to-image editing",
        legacy_ids: &["doubao-seededit-3.0-i2i"],
    },
];

/// One entry of the `/v1/models` list.
#[derive(Debug, Clone, Serialize)]
pub struct ModelCard {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub owned_by: &'static str,
    pub permission: Vec<serde_json::Value>,
    pub root: String,
    pub parent: Option<String>,
    pub description: String,
    pub metadata: ModelMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelMetadata {
    pub legacy_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelList {
    pub object: &'static str,
    pub data: Vec<ModelCard>,
}

/// The advertised model list.
#[must_use]
pub fn model_list() -> ModelList {
    ModelList {
        object: "list",
        data: CATALOGUE
            .iter()
            .map(|entry| ModelCard {
                id: entry.id.to_string(),
                object: "model",
                created: CATALOGUE_CREATED,
                owned_by: "volcano-engine",
                permission: Vec::new(),
                root: entry.id.to_string(),
                parent: None,
                description: entry.description.to_string(),
                metadata: ModelMetadata {
                    legacy_ids: entry.legacy_ids.iter().map(|id| (*id).to_string()).collect(),
                },
            })
            .collect(),
    }
}

/// Legacy ids mapped to current ids, overlaid with `configured` aliases.
/// Configured entries win on conflict.
#[must_use]
pub fn model_aliases(configured: &HashMap<String, String>) -> HashMap<String, String> {
    let mut map: HashMap<String, String> = CATALOGUE
        .iter()
        .flat_map(|entry| {
            entry
                .legacy_ids
                .iter()
                .map(move |legacy| ((*legacy).to_string(), entry.id.to_string()))
        })
        .collect();

    map.extend(configured.iter().map(|(k, v)| (k.clone(), v.clone())));
    map
}

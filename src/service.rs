//! Long-lived identification service: owns the catalog subset and its index.
//!
//! Constructed once at process startup and then shared (it is `Sync`) with
//! every request handler. Startup prefers a persisted snapshot and falls
//! back to rebuilding when the snapshot is missing, unreadable, built with a
//! different quantization step, or inconsistent with the catalog.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::camera_model::{CameraModel, DEFAULT_SCALING_FACTOR};
use crate::spht::{BuildConfig, Identification, IdentifyConfig, QuantizationStep, Spht};
use crate::{DetectedStar, NoMatchReason, SphtError, SphtResult, StarRecord};

/// How the service obtained its index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "path")]
pub enum StartupPath {
    /// Loaded from the snapshot.
    Loaded,
    /// No snapshot configured or present; built from the catalog.
    Built,
    /// A snapshot existed but was rejected.
    Rebuilt { reason: String },
}

/// Startup configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Snapshot to load; format chosen by extension (`.json` or rkyv).
    pub snapshot_path: Option<PathBuf>,
    pub build: BuildConfig,
    /// Write the index back to `snapshot_path` after building it.
    pub save_rebuilt_snapshot: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            build: BuildConfig::default(),
            save_rebuilt_snapshot: true,
        }
    }
}

/// Summary for health checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStats {
    pub catalog_stars: usize,
    pub index_pairs: usize,
    pub index_buckets: usize,
    pub quantization_step_deg: f64,
    pub startup: StartupPath,
}

pub struct StarIdService {
    catalog: Vec<StarRecord>,
    names: HashMap<u64, String>,
    spht: Spht,
    startup: StartupPath,
}

impl StarIdService {
    /// Load or build the index for `catalog` (the subset to index).
    pub fn start(catalog: Vec<StarRecord>, config: &ServiceConfig) -> SphtResult<Self> {
        let step = config.build.quantization_step;

        let (spht, startup) = match &config.snapshot_path {
            None => (Spht::build(&catalog, &config.build)?, StartupPath::Built),
            Some(path) => match Spht::load_from_file(path, &catalog, step) {
                Ok(spht) => (spht, StartupPath::Loaded),
                Err(err) => {
                    let startup = match &err {
                        SphtError::Io(io) if io.kind() == ErrorKind::NotFound => {
                            info!("No SPHT snapshot at {}, building", path.display());
                            StartupPath::Built
                        }
                        _ => {
                            warn!(
                                "Rejected SPHT snapshot {}: {}; rebuilding",
                                path.display(),
                                err
                            );
                            StartupPath::Rebuilt {
                                reason: err.to_string(),
                            }
                        }
                    };
                    let spht = Spht::build(&catalog, &config.build)?;
                    if config.save_rebuilt_snapshot {
                        // A failed save only costs the next startup a rebuild.
                        if let Err(e) = spht.save_to_file(path) {
                            warn!("Could not save SPHT snapshot {}: {}", path.display(), e);
                        }
                    }
                    (spht, startup)
                }
            },
        };

        Ok(Self::from_parts(catalog, spht, startup))
    }

    /// Wrap an already built index.
    pub fn from_parts(catalog: Vec<StarRecord>, spht: Spht, startup: StartupPath) -> Self {
        let names = catalog
            .iter()
            .map(|s| (s.id, s.display_name()))
            .collect();
        info!(
            "Star identification service ready: {} catalog stars, {} pairs ({:?})",
            catalog.len(),
            spht.num_pairs(),
            startup
        );
        Self {
            catalog,
            names,
            spht,
            startup,
        }
    }

    pub fn catalog(&self) -> &[StarRecord] {
        &self.catalog
    }

    pub fn spht(&self) -> &Spht {
        &self.spht
    }

    pub fn startup(&self) -> &StartupPath {
        &self.startup
    }

    pub fn identify(&self, detected: &[DetectedStar], config: &IdentifyConfig) -> Identification {
        self.spht.identify(detected, config)
    }

    /// Display name for a catalog id.
    pub fn star_name(&self, catalog_id: u64) -> String {
        self.names
            .get(&catalog_id)
            .cloned()
            .unwrap_or_else(|| format!("HR {}", catalog_id))
    }

    /// Serve one request.
    pub fn handle(&self, request: &IdentifyRequest) -> IdentifyResponse {
        let Ok(step) = QuantizationStep::from_degrees(request.quantization_step) else {
            return IdentifyResponse::failure(NoMatchReason::InvalidStep);
        };
        let config = IdentifyConfig {
            camera: request.camera_model(),
            quantization_step: step,
            ..Default::default()
        };
        let result = self.identify(&request.detected_stars, &config);

        IdentifyResponse {
            identified_stars: result
                .stars
                .iter()
                .map(|s| IdentifiedStarDto {
                    pixel_x: s.x,
                    pixel_y: s.y,
                    catalog_id: s.catalog_id,
                    name: self.star_name(s.catalog_id),
                    confidence: s.confidence,
                })
                .collect(),
            reason: result.reason.map(|r| r.to_string()),
        }
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            catalog_stars: self.catalog.len(),
            index_pairs: self.spht.num_pairs(),
            index_buckets: self.spht.num_buckets(),
            quantization_step_deg: self.spht.quantization_step().degrees(),
            startup: self.startup.clone(),
        }
    }
}

// ── Wire types ──────────────────────────────────────────────────────────────

fn default_scaling_factor() -> f64 {
    DEFAULT_SCALING_FACTOR
}

fn default_quantization_step() -> f64 {
    QuantizationStep::default().degrees()
}

/// Identification request as sent by the hosting service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyRequest {
    pub detected_stars: Vec<DetectedStar>,
    /// Pixels per degree.
    #[serde(default = "default_scaling_factor")]
    pub camera_scaling_factor: f64,
    /// Bucket width in degrees.
    #[serde(default = "default_quantization_step", alias = "al_parameter")]
    pub quantization_step: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_height: Option<u32>,
}

impl IdentifyRequest {
    pub fn new(detected_stars: Vec<DetectedStar>) -> Self {
        Self {
            detected_stars,
            camera_scaling_factor: DEFAULT_SCALING_FACTOR,
            quantization_step: default_quantization_step(),
            image_width: None,
            image_height: None,
        }
    }

    /// Camera model for this request. The principal point is the image center
    /// when the image size is known, otherwise the center of the detections'
    /// bounding box.
    pub fn camera_model(&self) -> CameraModel {
        if let (Some(w), Some(h)) = (self.image_width, self.image_height) {
            return CameraModel::centered(self.camera_scaling_factor, w, h);
        }
        let finite = self.detected_stars.iter().filter(|d| d.is_finite());
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for d in finite {
            min_x = min_x.min(d.x);
            min_y = min_y.min(d.y);
            max_x = max_x.max(d.x);
            max_y = max_y.max(d.y);
        }
        let center = if min_x.is_finite() {
            [(min_x + max_x) / 2.0, (min_y + max_y) / 2.0]
        } else {
            [0.0, 0.0]
        };
        CameraModel::new(self.camera_scaling_factor, center)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifiedStarDto {
    pub pixel_x: f64,
    pub pixel_y: f64,
    pub catalog_id: u64,
    pub name: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyResponse {
    pub identified_stars: Vec<IdentifiedStarDto>,
    /// Present only when `identified_stars` is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl IdentifyResponse {
    fn failure(reason: NoMatchReason) -> Self {
        Self {
            identified_stars: Vec::new(),
            reason: Some(reason.to_string()),
        }
    }
}

//! # spht
//!
//! **Lost-in-space star identification** with a Star Pattern Hash Table.
//!
//! Given star centroids detected in an image, `spht` assigns catalog
//! identities to them using nothing but the angular distances between stars;
//! no attitude estimate is required or produced.
//!
//! ## Example
//!
//! ```no_run
//! use spht::{BuildConfig, DetectedStar, IdentifyConfig, QuantizationStep, Spht};
//!
//! // Index a catalog subset (Bright Star Catalogue JSON)
//! let stars = spht::catalogs::load_bsc_catalog_from_file("data/bsc5.json").unwrap();
//! let subset = spht::sample_catalog(&stars, 200, 42).unwrap();
//! let index = Spht::build(&subset, &BuildConfig::default()).unwrap();
//!
//! // Persist it, or load a previously saved snapshot
//! index.save_to_file("data/spht.rkyv").unwrap();
//! let index = Spht::load_from_file("data/spht.rkyv", &subset, QuantizationStep::default()).unwrap();
//!
//! let detected = vec![
//!     DetectedStar::new(412.3, 118.9),
//!     DetectedStar::new(398.0, 402.1),
//!     DetectedStar::new(655.7, 510.4),
//! ];
//! let config = IdentifyConfig::new(18.18, QuantizationStep::default(), 1024, 1024);
//! let result = index.identify(&detected, &config);
//! match result.reason {
//!     None => {
//!         for s in &result.stars {
//!             println!("#{} -> HR {} ({:.2})", s.detected_index, s.catalog_id, s.confidence);
//!         }
//!     }
//!     Some(reason) => println!("no identification: {reason}"),
//! }
//! ```
//!
//! ## Algorithm overview
//!
//! 1. **Indexing**: every unordered pair of catalog-subset stars is hashed by
//!    its angular separation, quantized by a fixed step, into a bucket
//! 2. **Projection**: detected pixel positions become camera-frame unit
//!    vectors through a pinhole model (pixels-per-degree scale, principal point)
//! 3. **Retrieval**: each detected pair looks up its bucket and the two
//!    neighboring ones for candidate catalog pairs
//! 4. **Voting**: detection triangles keep only the catalog triangles that
//!    fit best, and vote for the corresponding ids
//! 5. **Assignment**: each detection takes its most-voted id; a catalog id is
//!    given to at most one detection
//!

pub mod camera_model;
pub mod catalogs;
mod detected;
mod error;
pub mod sampling;
pub mod service;
pub mod spht;
pub mod star;

pub use camera_model::CameraModel;
pub use detected::*;
pub use error::*;
pub use sampling::{research_subset, sample_catalog};
pub use service::{
    IdentifyRequest, IdentifyResponse, ServiceConfig, ServiceStats, StarIdService, StartupPath,
};
pub use spht::{
    BuildConfig, HashKey, Identification, IdentifyConfig, IdentifyStats, NoMatchReason,
    QuantizationStep, Spht, StarPair,
};
pub use spht::store::SnapshotFormat;
pub use star::*;

/// Double-precision 3-vector.
pub type Vector3 = nalgebra::Vector3<f64>;

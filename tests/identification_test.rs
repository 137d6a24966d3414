//! End-to-end identification against the pinned 19-star research subset:
//! build the index, project catalog stars through a synthetic camera, and
//! check that the engine recovers their identities.


use std::collections::HashSet;

use fixtures::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use spht::{BuildConfig, DetectedStar, IdentifyConfig, NoMatchReason, QuantizationStep, Spht};

fn research_index() -> (Vec<spht::StarRecord>, Spht) {
    init_tracing();
    let catalog = research_subset();
    assert_eq!(catalog.len(), 19);
    let spht = Spht::build(&catalog, &BuildConfig::default()).expect("build failed");
    (catalog, spht)
}

fn identify_config(camera: &SyntheticCamera) -> IdentifyConfig {
    IdentifyConfig {
        camera: camera.model,
        quantization_step: QuantizationStep::default(),
        ..Default::default()
    }
}

#[test]
fn test_research_subset_index() {
    let (_, spht) = research_index();
    assert_eq!(spht.num_pairs(), 171);
    assert_eq!(spht.num_buckets(), 91);
}

#[test]
fn test_dubhe_merak_phecda() {
    let (catalog, spht) = research_index();
    let camera = SyntheticCamera::pointing(165.0, 55.0, 0.0);
    let detected = camera.project_ids(&catalog, &[DUBHE, MERAK, PHECDA]);

    let result = spht.identify(&detected, &identify_config(&camera));
    assert!(result.reason.is_none());
    assert_eq!(result.stars.len(), 3);
    for (s, expected) in result.stars.iter().zip([DUBHE, MERAK, PHECDA]) {
        assert_eq!(s.catalog_id, expected);
        assert_eq!(s.confidence, 1.0);
        assert_eq!((s.x, s.y), (detected[s.detected_index].x, detected[s.detected_index].y));
    }
}

#[test]
fn test_all_ursa_major_stars() {
    let (catalog, spht) = research_index();
    // Arbitrary roll: identification only sees angular distances.
    for (ra, dec, roll) in [(165.0, 55.0, 0.0), (170.0, 52.0, 37.0), (160.0, 57.0, -120.0)] {
        let camera = SyntheticCamera::pointing(ra, dec, roll);
        let detected = camera.project_ids(&catalog, &URSA_MAJOR);
        let result = spht.identify(&detected, &identify_config(&camera));

        assert_eq!(result.stars.len(), URSA_MAJOR.len());
        for s in &result.stars {
            assert_eq!(s.catalog_id, URSA_MAJOR[s.detected_index]);
            assert_eq!(s.confidence, 1.0);
        }
    }
}

#[test]
fn test_results_follow_input_order() {
    let (catalog, spht) = research_index();
    let camera = SyntheticCamera::pointing(165.0, 55.0, 0.0);
    let order = [5191, 4301, 4660, 4295];
    let detected = camera.project_ids(&catalog, &order);
    let result = spht.identify(&detected, &identify_config(&camera));

    let indices: Vec<usize> = result.stars.iter().map(|s| s.detected_index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
    for (i, id) in order.iter().enumerate() {
        assert_eq!(result.catalog_id_for(i), Some(*id));
    }
}

#[test]
fn test_centroid_noise() {
    let (catalog, spht) = research_index();
    let camera = SyntheticCamera::pointing(165.0, 55.0, 0.0);
    let truth = camera.project_ids(&catalog, &BIG_DIPPER);
    let config = identify_config(&camera);

    let mut rng = StdRng::seed_from_u64(7);
    let jitter = Normal::new(0.0, 0.5).unwrap();
    for trial in 0..200 {
        let detected: Vec<DetectedStar> = truth
            .iter()
            .map(|d| DetectedStar::new(d.x + jitter.sample(&mut rng), d.y + jitter.sample(&mut rng)))
            .collect();
        let result = spht.identify(&detected, &config);

        assert!(result.reason.is_none(), "trial {}: {:?}", trial, result.reason);
        assert_eq!(result.stars.len(), BIG_DIPPER.len(), "trial {}", trial);
        for (i, s) in result.stars.iter().enumerate() {
            assert_eq!(s.detected_index, i);
            assert_eq!(s.catalog_id, BIG_DIPPER[i], "trial {} detection {}", trial, i);
        }
    }
}

#[test]
fn test_heavy_noise_stays_well_formed() {
    let (catalog, spht) = research_index();
    let camera = SyntheticCamera::pointing(165.0, 55.0, 0.0);
    let truth = camera.project_ids(&catalog, &BIG_DIPPER);
    let config = identify_config(&camera);

    let mut rng = StdRng::seed_from_u64(11);
    let jitter = Normal::new(0.0, 10.0).unwrap();
    for _ in 0..30 {
        let detected: Vec<DetectedStar> = truth
            .iter()
            .map(|d| DetectedStar::new(d.x + jitter.sample(&mut rng), d.y + jitter.sample(&mut rng)))
            .collect();
        let result = spht.identify(&detected, &config);

        assert_eq!(result.reason.is_some(), result.stars.is_empty());
        let mut ids = HashSet::new();
        for s in &result.stars {
            assert!(s.detected_index < detected.len());
            assert!((0.0..=1.0).contains(&s.confidence));
            assert!(ids.insert(s.catalog_id), "catalog id {} assigned twice", s.catalog_id);
        }
    }
}

#[test]
fn test_spurious_detection_does_not_displace_real_stars() {
    let (catalog, spht) = research_index();
    let camera = SyntheticCamera::pointing(165.0, 55.0, 0.0);
    let config = identify_config(&camera);

    for spurious in [DetectedStar::new(300.0, 700.0), DetectedStar::new(512.0, 512.0)] {
        let mut detected = camera.project_ids(&catalog, &BIG_DIPPER);
        detected.push(spurious);
        let result = spht.identify(&detected, &config);
        for (i, id) in BIG_DIPPER.iter().enumerate() {
            assert_eq!(result.catalog_id_for(i), Some(*id));
        }
    }
}

#[test]
fn test_insufficient_input() {
    let (catalog, spht) = research_index();
    let camera = SyntheticCamera::pointing(165.0, 55.0, 0.0);
    let config = identify_config(&camera);

    let one = camera.project_ids(&catalog, &[DUBHE]);
    for detected in [Vec::new(), one] {
        let result = spht.identify(&detected, &config);
        assert!(result.stars.is_empty());
        assert_eq!(result.reason, Some(NoMatchReason::InsufficientInput));
        assert_eq!(result.reason.unwrap().to_string(), "insufficient input");
    }
}

#[test]
fn test_empty_index() {
    let catalog = research_subset();
    let camera = SyntheticCamera::pointing(165.0, 55.0, 0.0);
    let detected = camera.project_ids(&catalog, &[DUBHE, MERAK, PHECDA]);
    let result = Spht::empty(QuantizationStep::default()).identify(&detected, &identify_config(&camera));
    assert!(result.stars.is_empty());
    assert_eq!(result.reason.unwrap().to_string(), "index unavailable");
}

#[test]
fn test_concurrent_identification() {
    let (catalog, spht) = research_index();
    let camera = SyntheticCamera::pointing(165.0, 55.0, 0.0);
    let detected = camera.project_ids(&catalog, &URSA_MAJOR);
    let config = identify_config(&camera);
    let expected = spht.identify(&detected, &config);

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| spht.identify(&detected, &config)))
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), expected);
        }
    });
}

// Unit tests for the VSPC rebalancer

use vspc_rebalancer::core::{
    constraints::{CapacityMode, ConstraintPolicy, LoadBand, MoveContext, Quadrant, Rejection},
    distance::{haversine_distance, haversine_distance_miles, EARTH_RADIUS_KM},
    InputError, LoadLedger, ProximityIndex, RebalanceError,
};
use vspc_rebalancer::models::{LocationRecord, PrecinctRecord, RebalanceConfig, ServiceArea};
use geo::Point;

#[test]
fn test_haversine_distance_zero() {
    let distance = haversine_distance(39.7392, -104.9903, 39.7392, -104.9903);
    assert_eq!(distance, 0.0);
}

#[test]
fn test_haversine_distance_symmetric() {
    let there = haversine_distance(39.7392, -104.9903, 39.5807, -104.8772);
    let back = haversine_distance(39.5807, -104.8772, 39.7392, -104.9903);
    assert!((there - back).abs() < 1e-9);
}

#[test]
fn test_haversine_distance_denver_to_boulder() {
    // Downtown Denver to Boulder is roughly 40 km
    let distance = haversine_distance(39.7392, -104.9903, 40.0150, -105.2705);
    assert!(distance > 35.0 && distance < 45.0);

    let miles = haversine_distance_miles(39.7392, -104.9903, 40.0150, -105.2705);
    assert!((miles - distance * 0.621371).abs() < 1e-9);
}

#[test]
fn test_haversine_triangle_inequality() {
    let denver = (39.7392, -104.9903);
    let aurora = (39.7294, -104.8319);
    let littleton = (39.6133, -105.0166);

    let ab = haversine_distance(denver.0, denver.1, aurora.0, aurora.1);
    let bc = haversine_distance(aurora.0, aurora.1, littleton.0, littleton.1);
    let ac = haversine_distance(denver.0, denver.1, littleton.0, littleton.1);
    assert!(ac <= ab + bc);
}

#[test]
fn test_haversine_one_degree_of_latitude() {
    let distance = haversine_distance(0.0, 0.0, 1.0, 0.0);
    let expected = EARTH_RADIUS_KM * 1f64.to_radians();
    assert!((distance - expected).abs() < 1e-6);
}

#[test]
fn test_service_area_rejects_missing_coordinates() {
    let mut precinct = PrecinctRecord::new("101", 39.7, -104.9, 100);
    precinct.longitude = None;

    let err = ServiceArea::from_records(vec![precinct], vec![LocationRecord::new("A", 39.7, -104.9)])
        .unwrap_err();
    assert_eq!(
        err,
        RebalanceError::InvalidInput(InputError::InvalidCoordinate {
            kind: "precinct",
            id: "101".to_string()
        })
    );
}

#[test]
fn test_service_area_rejects_duplicate_locations() {
    let err = ServiceArea::from_records(
        vec![PrecinctRecord::new("101", 39.7, -104.9, 100)],
        vec![
            LocationRecord::new("A", 39.7, -104.9),
            LocationRecord::new("A", 39.8, -104.9),
        ],
    )
    .unwrap_err();
    assert!(matches!(
        err,
        RebalanceError::InvalidInput(InputError::DuplicateId { kind: "location", .. })
    ));
}

#[test]
fn test_service_area_prior_voter_fallback() {
    let mut precinct = PrecinctRecord::new("101", 39.7, -104.9, 0);
    precinct.voter_count = None;
    precinct.prior_voter_count = Some(812);
    let missing = PrecinctRecord {
        voter_count: None,
        ..PrecinctRecord::new("102", 39.7, -104.9, 0)
    };

    let area = ServiceArea::from_records(vec![precinct, missing], vec![LocationRecord::new("A", 39.7, -104.9)])
        .unwrap();
    assert_eq!(area.precinct(0).voters, 812);
    assert_eq!(area.precinct(1).voters, 0);
    assert_eq!(area.total_voters(), 812);
}

#[test]
fn test_config_validation() {
    assert!(RebalanceConfig::default().validate().is_ok());

    let invalid = [
        RebalanceConfig { target_tolerance: 0.0, ..Default::default() },
        RebalanceConfig { max_rounds: 0, ..Default::default() },
        RebalanceConfig { max_closest_locations_to_check: 0, ..Default::default() },
        RebalanceConfig { max_distance_km: -1.0, ..Default::default() },
        RebalanceConfig { severe_overload_multiplier: 1.0, ..Default::default() },
        RebalanceConfig { relaxed_ceiling_multiplier: 0.9, ..Default::default() },
        RebalanceConfig { min_improvement: 1.0, ..Default::default() },
    ];
    for config in invalid {
        assert!(
            matches!(config.validate(), Err(RebalanceError::ConfigurationInconsistency(_))),
            "accepted {:?}",
            config
        );
    }
}

#[test]
fn test_load_band_edges() {
    let band = LoadBand::new(1000.0, 0.25);

    assert!(!band.is_overloaded(1250));
    assert!(band.is_overloaded(1251));
    assert!(!band.is_underloaded(750));
    assert!(band.is_underloaded(749));
}

#[test]
fn test_quadrants() {
    let center = Point::new(-104.90, 39.65);

    assert_eq!(Quadrant::of(&Point::new(-104.80, 39.70), &center), Quadrant::NE);
    assert_eq!(Quadrant::of(&Point::new(-105.00, 39.70), &center), Quadrant::NW);
    assert_eq!(Quadrant::of(&Point::new(-104.80, 39.60), &center), Quadrant::SE);
    assert_eq!(Quadrant::of(&Point::new(-105.00, 39.60), &center), Quadrant::SW);
    // On the centre lines counts as north and east
    assert_eq!(Quadrant::of(&center, &center), Quadrant::NE);

    assert!(Quadrant::SW.is_opposite(Quadrant::NE));
    assert!(Quadrant::NW.is_opposite(Quadrant::SE));
    assert!(!Quadrant::NE.is_opposite(Quadrant::NW));
}

#[test]
fn test_policy_rule_order() {
    let area = ServiceArea::from_records(
        vec![
            PrecinctRecord::new("101", 39.700, -104.900, 900),
            PrecinctRecord::new("102", 39.701, -104.900, 900),
            PrecinctRecord::new("103", 39.700, -104.700, 100),
        ],
        vec![
            LocationRecord::new("Central", 39.70, -104.90),
            LocationRecord::new("Far East", 39.70, -104.70),
        ],
    )
    .unwrap();
    let index = ProximityIndex::build(&area);
    let loads = LoadLedger::from_assignment(&[0, 0, 1], area.precincts(), 2);
    let band = LoadBand::new(area.target_voters(), 0.25);
    let ctx = MoveContext {
        area: &area,
        index: &index,
        loads: &loads,
        band,
        mode: CapacityMode::Normal,
    };

    let config = RebalanceConfig {
        max_distance_km: 10.0,
        rural_precinct_threshold: None,
        ..Default::default()
    };
    let policy = ConstraintPolicy::new(&config, &area, &index);
    // ~17 km east of Central
    assert!(matches!(
        policy.allowed(0, 0, 1, &ctx),
        Err(Rejection::DistanceCap { .. })
    ));

    let config = RebalanceConfig {
        max_closest_locations_to_check: 1,
        rural_precinct_threshold: None,
        ..Default::default()
    };
    let policy = ConstraintPolicy::new(&config, &area, &index);
    assert_eq!(
        policy.allowed(0, 0, 1, &ctx),
        Err(Rejection::RankWindow { rank: 1, window: 1 })
    );

    let config = RebalanceConfig {
        rural_precinct_threshold: None,
        ..Default::default()
    };
    let policy = ConstraintPolicy::new(&config, &area, &index);
    assert_eq!(policy.allowed(0, 0, 1, &ctx), Ok(()));
    assert!(policy.ceiling(&band, CapacityMode::Relaxed) > policy.ceiling(&band, CapacityMode::Normal));
}

//! Great-circle distance ranking on a spherical earth

use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::restaurant::{Restaurant, RestaurantCandidate},
};

/// Mean earth radius in meters
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Meters spanned by one degree of latitude on the sphere above
const METERS_PER_DEGREE: f64 = EARTH_RADIUS_METERS * std::f64::consts::PI / 180.0;

/// Validated WGS84 position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> AppResult<Self> {
        let valid = (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude);
        if !valid {
            return Err(AppError::InvalidLocation { latitude, longitude });
        }
        Ok(Self { latitude, longitude })
    }

    pub fn of(restaurant: &Restaurant) -> AppResult<Self> {
        Self::new(restaurant.latitude, restaurant.longitude)
    }
}

/// Haversine distance in meters
pub fn distance_meters(a: Coordinates, b: Coordinates) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).max(0.0).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Keep restaurants within `radius_meters` of `origin`, nearest first.
///
/// Ties on distance are broken by restaurant id so the order is deterministic.
/// Rows carrying out-of-range coordinates are dropped.
pub fn rank_within_radius<I>(origin: Coordinates, radius_meters: f64, restaurants: I) -> Vec<RestaurantCandidate>
where
    I: IntoIterator<Item = Restaurant>,
{
    let mut ranked: Vec<RestaurantCandidate> = restaurants
        .into_iter()
        .filter_map(|r| {
            let position = Coordinates::of(&r).ok()?;
            let distance = distance_meters(origin, position);
            (distance <= radius_meters).then(|| RestaurantCandidate::new(r, distance))
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.distance_meters
            .total_cmp(&b.distance_meters)
            .then_with(|| a.id().cmp(&b.id()))
    });
    ranked
}

/// Latitude/longitude box enclosing a search circle, used as a coarse prefilter
/// before exact distances are computed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    pub fn around(origin: Coordinates, radius_meters: f64) -> Self {
        let lat_delta = radius_meters / METERS_PER_DEGREE;
        let min_latitude = (origin.latitude - lat_delta).max(-90.0);
        let max_latitude = (origin.latitude + lat_delta).min(90.0);

        // Near the poles or across the antimeridian the longitude band degenerates
        let cos_lat = min_latitude.to_radians().cos().min(max_latitude.to_radians().cos());
        let full_band = cos_lat <= 1e-6 || min_latitude <= -90.0 || max_latitude >= 90.0;
        let (min_longitude, max_longitude) = if full_band {
            (-180.0, 180.0)
        } else {
            let lon_delta = lat_delta / cos_lat;
            let lo = origin.longitude - lon_delta;
            let hi = origin.longitude + lon_delta;
            if lo < -180.0 || hi > 180.0 {
                (-180.0, 180.0)
            } else {
                (lo, hi)
            }
        };

        Self {
            min_latitude,
            max_latitude,
            min_longitude,
            max_longitude,
        }
    }

    pub fn contains(&self, position: Coordinates) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&position.latitude)
            && (self.min_longitude..=self.max_longitude).contains(&position.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn restaurant(id: i64, latitude: f64, longitude: f64) -> Restaurant {
        Restaurant {
            id,
            name: format!("Restaurant {}", id),
            address: None,
            latitude,
            longitude,
            phone: None,
            rating: Some(4.0),
            price_level: Some(2),
            cuisine: None,
            is_active: true,
            external_id: None,
            image_url: None,
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        let tolerance = expected.abs() * 0.005;
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {} within 0.5% of {}",
            actual,
            expected
        );
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(matches!(Coordinates::new(90.5, 0.0), Err(AppError::InvalidLocation { .. })));
        assert!(matches!(Coordinates::new(0.0, -180.1), Err(AppError::InvalidLocation { .. })));
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
        assert!(Coordinates::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn distance_is_symmetric_and_zero_on_self() {
        let taipei_101 = Coordinates::new(25.0340, 121.5645).unwrap();
        let main_station = Coordinates::new(25.0478, 121.5170).unwrap();
        assert_eq!(distance_meters(taipei_101, taipei_101), 0.0);
        assert_eq!(
            distance_meters(taipei_101, main_station),
            distance_meters(main_station, taipei_101)
        );
    }

    #[test]
    fn known_distances() {
        let origin = Coordinates::new(0.0, 0.0).unwrap();
        let one_degree_north = Coordinates::new(1.0, 0.0).unwrap();
        assert_close(distance_meters(origin, one_degree_north), 111_195.0);

        // Paris -> London, ~343.5 km on the sphere
        let paris = Coordinates::new(48.8566, 2.3522).unwrap();
        let london = Coordinates::new(51.5074, -0.1278).unwrap();
        assert_close(distance_meters(paris, london), 343_556.0);
    }

    #[test]
    fn filters_by_radius_and_sorts_nearest_first() {
        let origin = Coordinates::new(25.03, 121.56).unwrap();
        let ranked = rank_within_radius(
            origin,
            1_000.0,
            vec![
                restaurant(1, 25.0380, 121.56), // ~890 m
                restaurant(2, 25.0310, 121.56), // ~111 m
                restaurant(3, 25.0500, 121.56), // ~2.2 km
            ],
        );
        let ids: Vec<i64> = ranked.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec![2, 1]);
        assert!(ranked.iter().all(|c| c.distance_meters <= 1_000.0));
    }

    #[test]
    fn equal_distances_are_ordered_by_id() {
        let origin = Coordinates::new(25.03, 121.56).unwrap();
        let ranked = rank_within_radius(
            origin,
            500.0,
            vec![restaurant(9, 25.03, 121.56), restaurant(4, 25.03, 121.56)],
        );
        assert_eq!(ranked[0].id(), 4);
        assert_eq!(ranked[1].id(), 9);
    }

    #[test]
    fn bounding_box_encloses_the_search_circle() {
        let origin = Coordinates::new(25.03, 121.56).unwrap();
        let bbox = BoundingBox::around(origin, 1_000.0);
        for (lat, lon) in [(25.039, 121.56), (25.03, 121.5699), (25.021, 121.551)] {
            let p = Coordinates::new(lat, lon).unwrap();
            if distance_meters(origin, p) <= 1_000.0 {
                assert!(bbox.contains(p));
            }
        }

        let polar = BoundingBox::around(Coordinates::new(89.999, 0.0).unwrap(), 1_000.0);
        assert_eq!((polar.min_longitude, polar.max_longitude), (-180.0, 180.0));
    }
}

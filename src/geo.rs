//! Latitude/longitude to sphere projection
//!
//! Right-handed, +Y up. Latitude becomes the polar angle measured from +Y and
//! longitude the azimuth, offset by 180 degrees so the antimeridian sits on +X.

use crate::error::GeoError;
use glam::Vec3;

const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// Reject coordinates outside WGS84 ranges.
pub fn validate(lat: f64, lng: f64) -> Result<(), GeoError> {
    let lat_ok = lat.is_finite() && (-90.0..=90.0).contains(&lat);
    let lng_ok = lng.is_finite() && (-180.0..=180.0).contains(&lng);
    if lat_ok && lng_ok {
        Ok(())
    } else {
        Err(GeoError::InvalidCoordinate { lat, lng })
    }
}

/// Map (lat, lng) in degrees onto the surface of a sphere of `radius`.
pub fn project(lat: f64, lng: f64, radius: f32) -> Result<Vec3, GeoError> {
    validate(lat, lng)?;
    let phi = (90.0 - lat) * DEG_TO_RAD;
    let theta = (lng + 180.0) * DEG_TO_RAD;
    let r = radius as f64;
    Ok(Vec3::new(
        (r * phi.sin() * theta.cos()) as f32,
        (r * phi.cos()) as f32,
        (r * phi.sin() * theta.sin()) as f32,
    ))
}

/// Inverse of [`project`] for a direction from the sphere centre.
///
/// Returns (lat, lng) in degrees. The zero vector maps to (0, 0).
pub fn unproject(direction: Vec3) -> (f64, f64) {
    let Some(n) = direction.try_normalize() else {
        return (0.0, 0.0);
    };
    let lat = 90.0 - (n.y as f64).clamp(-1.0, 1.0).acos().to_degrees();
    let theta = (n.z as f64).atan2(n.x as f64).to_degrees();
    let mut lng = theta - 180.0;
    if lng < -180.0 {
        lng += 360.0;
    }
    (lat, lng)
}

/// Shortest signed angular delta from `from` to `to`, radians, in -PI..PI.
pub fn shortest_angular_delta(from: f32, to: f32) -> f32 {
    let mut delta = (to - from).rem_euclid(std::f32::consts::TAU);
    if delta > std::f32::consts::PI {
        delta -= std::f32::consts::TAU;
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < EPS
    }

    #[test]
    fn equator_prime_meridian_lands_on_negative_x() {
        let p = project(0.0, 0.0, 1.0).unwrap();
        assert!(close(p, Vec3::new(-1.0, 0.0, 0.0)), "{p:?}");
    }

    #[test]
    fn antimeridian_lands_on_positive_x() {
        let p = project(0.0, -180.0, 2.0).unwrap();
        assert!(close(p, Vec3::new(2.0, 0.0, 0.0)), "{p:?}");
    }

    #[test]
    fn poles_are_on_the_y_axis() {
        let north = project(90.0, 37.0, 3.0).unwrap();
        let south = project(-90.0, -120.0, 3.0).unwrap();
        assert!(close(north, Vec3::new(0.0, 3.0, 0.0)), "{north:?}");
        assert!(close(south, Vec3::new(0.0, -3.0, 0.0)), "{south:?}");
    }

    #[test]
    fn projected_points_lie_on_their_sphere() {
        for radius in [0.5_f32, 1.0, 2.05] {
            for lat in (-90..=90).step_by(15) {
                for lng in (-180..=180).step_by(20) {
                    let p = project(lat as f64, lng as f64, radius).unwrap();
                    assert!((p.length() - radius).abs() < 1e-4, "{lat},{lng} -> {p:?}");
                }
            }
        }
    }

    #[test]
    fn out_of_range_input_is_rejected() {
        assert_eq!(
            project(91.0, 0.0, 1.0),
            Err(GeoError::InvalidCoordinate { lat: 91.0, lng: 0.0 })
        );
        assert!(project(0.0, 180.5, 1.0).is_err());
        assert!(project(f64::NAN, 0.0, 1.0).is_err());
        assert!(validate(-90.0, 180.0).is_ok());
    }

    #[test]
    fn unproject_inverts_project() {
        for (lat, lng) in [(0.0, 0.0), (51.5, -0.1), (-33.9, 151.2), (40.7, -74.0), (10.0, 90.0)] {
            let p = project(lat, lng, 1.7).unwrap();
            let (lat2, lng2) = unproject(p);
            assert!((lat - lat2).abs() < 1e-3, "{lat} vs {lat2}");
            assert!((lng - lng2).abs() < 1e-3, "{lng} vs {lng2}");
        }
    }

    #[test]
    fn angular_delta_wraps() {
        let d = shortest_angular_delta(3.0, -3.0);
        assert!((d - (std::f32::consts::TAU - 6.0)).abs() < 1e-5);
        assert!(shortest_angular_delta(0.5, 0.2) < 0.0);
    }
}

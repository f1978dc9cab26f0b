use geo::{Distance, Haversine, Point};
use geo_types::{coord, Coord};

/// Coordinates are stored as `x = lon`, `y = lat`.
pub struct GeoUtils;

impl GeoUtils {
    pub fn latlon(lat: f64, lon: f64) -> Coord {
        coord! { x: lon, y: lat }
    }

    /// Great-circle distance in metres on the mean Earth radius.
    pub fn haversine_m(p1: Coord, p2: Coord) -> f64 {
        Haversine.distance(Point::from(p1), Point::from(p2))
    }

    pub fn haversine_km(p1: Coord, p2: Coord) -> f64 {
        GeoUtils::haversine_m(p1, p2) / 1000.0
    }

    /// Row-major |first| x |second| distance matrix in metres.
    pub fn distance_matrix_m(first: &[Coord], second: &[Coord]) -> Vec<Vec<f64>> {
        first
            .iter()
            .map(|p1| {
                second
                    .iter()
                    .map(|p2| GeoUtils::haversine_m(*p1, *p2))
                    .collect()
            })
            .collect()
    }

    pub fn get_bounding_box(coords: &[Coord]) -> Option<BoundingBox> {
        let first = coords.first()?;
        let mut bbox = BoundingBox {
            min: *first,
            max: *first,
        };

        coords.iter().skip(1).for_each(|c| {
            bbox.min.x = c.x.min(bbox.min.x);
            bbox.min.y = c.y.min(bbox.min.y);
            bbox.max.x = c.x.max(bbox.max.x);
            bbox.max.y = c.y.max(bbox.max.y);
        });

        Some(bbox)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Coord,
    pub max: Coord,
}

impl BoundingBox {
    pub fn from_bounds(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min: GeoUtils::latlon(min_lat, min_lon),
            max: GeoUtils::latlon(max_lat, max_lon),
        }
    }

    /// Edges touching counts as overlapping.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        self.max.y >= other.min.y
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.min.x <= other.max.x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // Forbidden City to Tiananmen Square gate, roughly 1 km apart
        let a = GeoUtils::latlon(39.916, 116.397);
        let b = GeoUtils::latlon(39.907, 116.397);
        let d = GeoUtils::haversine_km(a, b);
        assert!((d - 1.0008).abs() < 0.01, "got {d}");
    }

    #[test]
    fn test_haversine_at_proximity_scale() {
        // 0.0001 degrees of latitude is about 11 m
        let a = GeoUtils::latlon(39.9000, 116.4000);
        let b = GeoUtils::latlon(39.9001, 116.4000);
        let d = GeoUtils::haversine_m(a, b);
        assert!((d - 11.12).abs() < 0.05, "got {d}");
    }

    #[test]
    fn test_haversine_zero_and_symmetric() {
        let a = GeoUtils::latlon(39.984702, 116.318417);
        let b = GeoUtils::latlon(39.984683, 116.31845);
        assert_eq!(GeoUtils::haversine_m(a, a), 0.0);
        assert!((GeoUtils::haversine_m(a, b) - GeoUtils::haversine_m(b, a)).abs() < 1e-9);
    }

    #[test]
    fn test_distance_matrix_shape() {
        let first = vec![GeoUtils::latlon(40.0, 116.0); 3];
        let second = vec![GeoUtils::latlon(40.0, 116.0); 2];
        let matrix = GeoUtils::distance_matrix_m(&first, &second);
        assert_eq!(matrix.len(), 3);
        assert!(matrix.iter().all(|row| row.len() == 2));
    }

    #[test]
    fn test_bounding_box_and_overlap() {
        let coords = vec![
            GeoUtils::latlon(39.9, 116.3),
            GeoUtils::latlon(40.1, 116.2),
            GeoUtils::latlon(40.0, 116.5),
        ];
        let bbox = GeoUtils::get_bounding_box(&coords).unwrap();
        assert_eq!(bbox, BoundingBox::from_bounds(39.9, 116.2, 40.1, 116.5));

        let touching = BoundingBox::from_bounds(40.1, 116.5, 40.2, 116.6);
        let apart = BoundingBox::from_bounds(41.0, 117.0, 41.1, 117.1);
        assert!(bbox.overlaps(&touching));
        assert!(!bbox.overlaps(&apart));
        assert!(GeoUtils::get_bounding_box(&[]).is_none());
    }
}

//! Sampling grids for interpolation
//!
//! Tilings follow the usual GeoJSON grid constructions: the cell size is
//! given in kilometres and converted to degrees with great-circle distances
//! measured along the bbox edges (square, triangle) or through its centre
//! (hex). Cells are closed rings of `[lng, lat]` positions.

use crate::config::{BoundingBox, GridType};
use crate::constants::EARTH_RADIUS_KM;
use std::f64::consts::PI;

/// A `[lng, lat]` position
pub type Position = [f64; 2];

/// One polygon of the sampling grid
#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    /// Closed ring, first position repeated at the end
    pub ring: Vec<Position>,
    /// Mean of the ring's distinct vertices
    pub centroid: Position,
}

impl GridCell {
    fn new(ring: Vec<Position>) -> Self {
        let centroid = centroid(&ring);
        Self { ring, centroid }
    }
}

/// Great-circle distance in kilometres (haversine)
pub fn distance_km(from: Position, to: Position) -> f64 {
    let [lng1, lat1] = from;
    let [lng2, lat2] = to;

    let dlat = (lat2 - lat1).to_radians();
    let dlng = (lng2 - lng1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Vertex mean of a closed ring, ignoring the closing position
pub fn centroid(ring: &[Position]) -> Position {
    let vertices = match ring {
        [first, .., last] if first == last => &ring[..ring.len() - 1],
        _ => ring,
    };

    if vertices.is_empty() {
        return [f64::NAN, f64::NAN];
    }

    let count = vertices.len() as f64;
    let (lng, lat) = vertices
        .iter()
        .fold((0.0, 0.0), |(lng, lat), [x, y]| (lng + x, lat + y));

    [lng / count, lat / count]
}

/// Build the grid of `grid_type` over `bbox` with `cell_width` kilometres
pub fn build_grid(bbox: &BoundingBox, grid_type: GridType, cell_width: f64) -> Vec<GridCell> {
    match grid_type {
        GridType::Hex => hex_grid(bbox, cell_width),
        GridType::Square => square_grid(bbox, cell_width),
        GridType::Triangle => triangle_grid(bbox, cell_width),
    }
}

/// Cell size in degrees along both axes, measured along the south and west edges
fn edge_cell_size(bbox: &BoundingBox, cell_width: f64) -> (f64, f64) {
    let x_fraction = cell_width / distance_km([bbox.west, bbox.south], [bbox.east, bbox.south]);
    let y_fraction = cell_width / distance_km([bbox.west, bbox.south], [bbox.west, bbox.north]);

    (
        x_fraction * (bbox.east - bbox.west),
        y_fraction * (bbox.north - bbox.south),
    )
}

/// Squares centred within the bbox; partial cells at the border are dropped
fn square_grid(bbox: &BoundingBox, cell_width: f64) -> Vec<GridCell> {
    let (width, height) = edge_cell_size(bbox, cell_width);
    let bbox_width = bbox.east - bbox.west;
    let bbox_height = bbox.north - bbox.south;

    let columns = (bbox_width / width).floor() as usize;
    let rows = (bbox_height / height).floor() as usize;
    let delta_x = (bbox_width - columns as f64 * width) / 2.0;
    let delta_y = (bbox_height - rows as f64 * height) / 2.0;

    let mut cells = Vec::with_capacity(columns * rows);
    for column in 0..columns {
        let x = bbox.west + delta_x + column as f64 * width;
        for row in 0..rows {
            let y = bbox.south + delta_y + row as f64 * height;
            cells.push(GridCell::new(vec![
                [x, y],
                [x, y + height],
                [x + width, y + height],
                [x + width, y],
                [x, y],
            ]));
        }
    }

    cells
}

/// Flat-topped hexagons with side length `cell_width`
fn hex_grid(bbox: &BoundingBox, cell_width: f64) -> Vec<GridCell> {
    let center_x = (bbox.west + bbox.east) / 2.0;
    let center_y = (bbox.south + bbox.north) / 2.0;

    let x_fraction = cell_width * 2.0 / distance_km([bbox.west, center_y], [bbox.east, center_y]);
    let hex_width_deg = x_fraction * (bbox.east - bbox.west);
    let y_fraction = cell_width * 2.0 / distance_km([center_x, bbox.south], [center_x, bbox.north]);
    let hex_height_deg = y_fraction * (bbox.north - bbox.south);

    let radius = hex_width_deg / 2.0;
    let hex_width = radius * 2.0;
    let hex_height = 3f64.sqrt() / 2.0 * hex_height_deg;

    let box_width = bbox.east - bbox.west;
    let box_height = bbox.north - bbox.south;

    let x_interval = 3.0 / 4.0 * hex_width;
    let y_interval = hex_height;

    let x_span = (box_width - hex_width) / (hex_width - radius / 2.0);
    let x_count = x_span.floor();
    let x_adjust =
        ((x_count * x_interval - radius / 2.0) - box_width) / 2.0 - radius / 2.0 + x_interval / 2.0;

    let y_count = ((box_height - hex_height) / hex_height).floor();
    let mut y_adjust = (box_height - y_count * hex_height) / 2.0;
    let has_offset_y = y_count * hex_height - box_height > hex_height / 2.0;
    if has_offset_y {
        y_adjust -= hex_height / 4.0;
    }

    if x_count < 0.0 || y_count < 0.0 {
        return Vec::new();
    }

    let corners: Vec<(f64, f64)> = (0..6)
        .map(|i| {
            let angle = 2.0 * PI / 6.0 * f64::from(i);
            (angle.cos(), angle.sin())
        })
        .collect();

    let mut cells = Vec::new();
    for x in 0..=(x_count as usize) {
        let is_odd = x % 2 == 1;
        for y in 0..=(y_count as usize) {
            if y == 0 && (is_odd || has_offset_y) {
                continue;
            }

            let cx = x as f64 * x_interval + bbox.west - x_adjust;
            let mut cy = y as f64 * y_interval + bbox.south + y_adjust;
            if is_odd {
                cy -= hex_height / 2.0;
            }

            let mut ring: Vec<Position> = corners
                .iter()
                .map(|(cos, sin)| [cx + hex_width_deg / 2.0 * cos, cy + hex_height_deg / 2.0 * sin])
                .collect();
            ring.push(ring[0]);

            cells.push(GridCell::new(ring));
        }
    }

    cells
}

/// Squares split into two triangles, alternating the diagonal by parity
fn triangle_grid(bbox: &BoundingBox, cell_width: f64) -> Vec<GridCell> {
    let (width, height) = edge_cell_size(bbox, cell_width);

    let mut cells = Vec::new();
    let mut xi = 0usize;
    let mut x = bbox.west;

    while x <= bbox.east {
        let mut yi = 0usize;
        let mut y = bbox.south;

        while y <= bbox.north {
            let sw = [x, y];
            let nw = [x, y + height];
            let ne = [x + width, y + height];
            let se = [x + width, y];

            let triangles = match (xi % 2 == 0, yi % 2 == 0) {
                (true, true) => [[sw, nw, se, sw], [nw, ne, se, nw]],
                (true, false) => [[sw, ne, se, sw], [sw, nw, ne, sw]],
                (false, true) => [[sw, nw, ne, sw], [sw, ne, se, sw]],
                (false, false) => [[sw, nw, se, sw], [nw, ne, se, nw]],
            };

            for triangle in triangles {
                cells.push(GridCell::new(triangle.to_vec()));
            }

            y += height;
            yi += 1;
        }

        x += width;
        xi += 1;
    }

    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    fn muenster() -> BoundingBox {
        BoundingBox::new(7.55, 51.90, 7.70, 52.00)
    }

    #[test]
    fn test_distance_km() {
        let one_degree = distance_km([0.0, 0.0], [1.0, 0.0]);
        assert!((one_degree - 111.195).abs() < 0.01);
        assert_eq!(distance_km([7.6, 51.9], [7.6, 51.9]), 0.0);
    }

    #[test]
    fn test_centroid_ignores_closing_vertex() {
        let ring = vec![[0.0, 0.0], [0.0, 2.0], [2.0, 2.0], [2.0, 0.0], [0.0, 0.0]];
        assert_eq!(centroid(&ring), [1.0, 1.0]);
    }

    #[test]
    fn test_square_grid_stays_within_bbox() {
        let bbox = muenster();
        let cells = build_grid(&bbox, GridType::Square, 2.0);

        assert!(!cells.is_empty());
        for cell in &cells {
            assert_eq!(cell.ring.len(), 5);
            for [lng, lat] in &cell.ring {
                assert!(*lng >= bbox.west - 1e-9 && *lng <= bbox.east + 1e-9);
                assert!(*lat >= bbox.south - 1e-9 && *lat <= bbox.north + 1e-9);
            }
        }
    }

    #[test]
    fn test_square_cells_are_about_cell_width_wide() {
        let cells = build_grid(&muenster(), GridType::Square, 2.0);
        let [sw, nw, _, se, _] = cells[0].ring[..] else {
            panic!("unexpected ring");
        };

        assert!((distance_km(sw, se) - 2.0).abs() < 0.05);
        assert!((distance_km(sw, nw) - 2.0).abs() < 0.05);
    }

    #[test]
    fn test_hex_grid_cells_have_six_sides() {
        let cells = build_grid(&muenster(), GridType::Hex, 1.0);

        assert!(!cells.is_empty());
        assert!(cells.iter().all(|cell| cell.ring.len() == 7));
        assert!(cells.iter().all(|cell| cell.ring.first() == cell.ring.last()));
    }

    #[test]
    fn test_triangle_grid_has_two_triangles_per_square() {
        let cells = build_grid(&muenster(), GridType::Triangle, 2.0);

        assert!(!cells.is_empty());
        assert_eq!(cells.len() % 2, 0);
        assert!(cells.iter().all(|cell| cell.ring.len() == 4));
    }

    #[test]
    fn test_cell_larger_than_bbox_yields_empty_square_grid() {
        assert!(build_grid(&muenster(), GridType::Square, 500.0).is_empty());
    }
}

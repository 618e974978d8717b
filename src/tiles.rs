//! Map tile addressing.

/// Maximum tile zoom level.
pub const MAX_ZOOM: u8 = 24;

/// Scale denominator of a 256px web mercator tile at zoom level 0.
///
/// This uses the standardized rendering pixel size of 0.28mm.
const ZERO_SCALE_DENOMINATOR: f64 = 559_082_264.028_717_4;

/// Pixel size [`ZERO_SCALE_DENOMINATOR`] is defined for.
const REFERENCE_TILE_SIZE: f64 = 256.;

/// Index of a tile in the quadtree.
#[derive(Hash, PartialEq, Eq, Copy, Clone, Default, Debug)]
pub struct TileIndex {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileIndex {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Map scale denominator this tile is rendered at.
    ///
    /// Larger tiles cover less ground per pixel, reducing the denominator.
    pub fn scale_denominator(&self, tile_size: u32) -> f64 {
        let zoom = self.z.min(MAX_ZOOM) as i32;
        ZERO_SCALE_DENOMINATOR * REFERENCE_TILE_SIZE / tile_size.max(1) as f64 / 2f64.powi(zoom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_scales() {
        let tile = TileIndex::new(0, 0, 0);
        assert_eq!(tile.scale_denominator(256), ZERO_SCALE_DENOMINATOR);

        let tile = TileIndex::new(8504, 5473, 14);
        let scale = tile.scale_denominator(256);
        assert!((scale - 34_123.673_3).abs() < 0.001);

        // Doubling the tile size halves the denominator.
        assert_eq!(tile.scale_denominator(512), scale / 2.);
    }
}

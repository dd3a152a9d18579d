//! Terrain elevation access

/// Grid of elevations sampled at integer (x, y) coordinates.
///
/// Unit cell `(x, y)` spans `[x, x + 1] x [y, y + 1]` and is bounded by the
/// four samples at its corners, so a `width x height` grid has
/// `(width - 1) x (height - 1)` cells.
pub trait Heightmap: Send + Sync {
    /// Number of samples along X
    fn width(&self) -> usize;

    /// Number of samples along Y
    fn height(&self) -> usize;

    /// Elevation at a sample point; callers stay within `width x height`
    fn elevation(&self, x: usize, y: usize) -> f32;
}

/// Heightmap stored as a dense row-major grid
#[derive(Debug, Clone)]
pub struct GridHeightmap {
    width: usize,
    height: usize,
    samples: Vec<f32>,
}

impl GridHeightmap {
    /// Wrap row-major samples; returns `None` when the length does not match
    pub fn new(width: usize, height: usize, samples: Vec<f32>) -> Option<Self> {
        (samples.len() == width * height).then_some(Self {
            width,
            height,
            samples,
        })
    }

    /// Level terrain at a single elevation
    pub fn flat(width: usize, height: usize, elevation: f32) -> Self {
        Self {
            width,
            height,
            samples: vec![elevation; width * height],
        }
    }

    /// Terrain sampled from a function of the grid coordinates
    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> f32) -> Self {
        let mut samples = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                samples.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            samples,
        }
    }
}

impl Heightmap for GridHeightmap {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn elevation(&self, x: usize, y: usize) -> f32 {
        self.samples[y * self.width + x]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_layout() {
        let map = GridHeightmap::from_fn(3, 2, |x, y| (x + 10 * y) as f32);
        assert_eq!(map.elevation(2, 0), 2.0);
        assert_eq!(map.elevation(1, 1), 11.0);
    }

    #[test]
    fn test_mismatched_samples_rejected() {
        assert!(GridHeightmap::new(4, 4, vec![0.0; 15]).is_none());
        assert!(GridHeightmap::new(4, 4, vec![0.0; 16]).is_some());
    }
}

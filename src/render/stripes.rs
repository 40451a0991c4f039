//! Partitioning of the analysis range into horizontal stripes.

use crate::gpu::Viewport;

/// One horizontal slice of a frame and the sample range it analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stripe {
    pub index: u32,
    pub count: u32,
    /// First sample of the stripe, shifted back by the analysis half-window.
    pub offset_min: i32,
    pub offset_max: i32,
}

impl Stripe {
    /// Slice of a `width x height` surface this stripe is drawn into.
    pub fn viewport(&self, width: u32, height: u32) -> Viewport {
        Viewport::stripe(width, height, self.index, self.count)
    }
}

/// Split the window `[min, max)` into `count` equal stripes.
///
/// The range is moved back by `half_window` so each analysis window is centered
/// on the samples it is drawn at. Bounds are truncated towards zero.
pub fn stripe_bounds(min: u64, max: u64, half_window: i64, count: u32) -> Vec<Stripe> {
    let count = count.max(1);
    let t_min = min as f64 - half_window as f64;
    let t_max = max as f64 - half_window as f64;
    let dt = (t_max - t_min) / count as f64;

    (0..count)
        .map(|k| Stripe {
            index: k,
            count,
            offset_min: (t_min + dt * k as f64) as i32,
            offset_max: (t_min + dt * (k + 1) as f64) as i32,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_stripe_is_shifted_window() {
        let stripes = stripe_bounds(450, 550, 2048, 1);
        assert_eq!(
            stripes,
            vec![Stripe {
                index: 0,
                count: 1,
                offset_min: -1598,
                offset_max: -1498
            }]
        );
    }

    #[test]
    fn test_stripes_partition_the_range() {
        let stripes = stripe_bounds(0, 1000, 100, 4);
        let bounds: Vec<_> = stripes.iter().map(|s| (s.offset_min, s.offset_max)).collect();
        assert_eq!(bounds, vec![(-100, 150), (150, 400), (400, 650), (650, 900)]);
    }

    #[test]
    fn test_uneven_stripes_truncate_toward_zero() {
        let stripes = stripe_bounds(0, 10, 5, 3);
        let bounds: Vec<_> = stripes.iter().map(|s| (s.offset_min, s.offset_max)).collect();
        // -5, -1.67, 1.67, 5
        assert_eq!(bounds, vec![(-5, -1), (-1, 1), (1, 5)]);
    }

    #[test]
    fn test_stripe_viewports_stack_top_to_bottom() {
        let stripes = stripe_bounds(0, 1000, 0, 2);
        assert_eq!(stripes[0].viewport(64, 64).y, 0);
        assert_eq!(stripes[1].viewport(64, 64).y, 32);
        assert_eq!(stripes[1].viewport(64, 64).height, 32);
    }
}

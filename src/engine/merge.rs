//! Tile-merge math: area-weighted statistics across tiles,
//! reassembled in `tile_id` order so output is deterministic regardless of
//! completion order.

use std::collections::HashMap;

/// One tile's continuous-indicator reduction, weighted by its own area.
#[derive(Debug, Clone, Copy)]
pub struct ContinuousTileStats {
    pub weight: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct MergedContinuous {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

/// Area-weighted mean, element-wise min/max, and the pooled-variance stddev
/// formula `σ² = Σ wᵢσᵢ² + Σ wᵢ(μᵢ−μ)²`. Passthrough with one tile.
pub fn merge_continuous(tiles: &[ContinuousTileStats]) -> MergedContinuous {
    assert!(!tiles.is_empty(), "merge_continuous requires at least one tile");

    if tiles.len() == 1 {
        let t = tiles[0];
        return MergedContinuous {
            mean: t.mean,
            min: t.min,
            max: t.max,
            std_dev: t.std_dev,
        };
    }

    let total_weight: f64 = tiles.iter().map(|t| t.weight).sum();
    let norm = |w: f64| if total_weight > 0.0 { w / total_weight } else { 0.0 };

    let mean: f64 = tiles.iter().map(|t| norm(t.weight) * t.mean).sum();
    let min = tiles.iter().map(|t| t.min).fold(f64::INFINITY, f64::min);
    let max = tiles.iter().map(|t| t.max).fold(f64::NEG_INFINITY, f64::max);

    let variance: f64 = tiles
        .iter()
        .map(|t| {
            let w = norm(t.weight);
            w * t.std_dev.powi(2) + w * (t.mean - mean).powi(2)
        })
        .sum();

    MergedContinuous {
        mean,
        min,
        max,
        std_dev: variance.max(0.0).sqrt(),
    }
}

/// Weighted average of per-class percentages over all tiles, then
/// renormalized to sum to 100 within ±0.01, flagging
/// `normalized=true` when renormalization changed anything beyond ±0.5.
pub fn merge_class_percentages(
    tiles: &[(f64, HashMap<String, f64>)],
) -> (HashMap<String, f64>, bool) {
    let total_weight: f64 = tiles.iter().map(|(w, _)| *w).sum();
    let mut merged: HashMap<String, f64> = HashMap::new();

    if total_weight <= 0.0 {
        return (merged, false);
    }

    for (weight, percentages) in tiles {
        let norm_weight = weight / total_weight;
        for (class, pct) in percentages {
            *merged.entry(class.clone()).or_insert(0.0) += norm_weight * pct;
        }
    }

    let sum: f64 = merged.values().sum();
    let needs_renormalization = (sum - 100.0).abs() > 0.5;
    if needs_renormalization && sum > 0.0 {
        for value in merged.values_mut() {
            *value = *value / sum * 100.0;
        }
    }

    (merged, needs_renormalization)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_tile_passes_through() {
        let merged = merge_continuous(&[ContinuousTileStats {
            weight: 10.0,
            mean: 0.4,
            min: 0.1,
            max: 0.7,
            std_dev: 0.05,
        }]);
        assert_eq!(merged.mean, 0.4);
        assert_eq!(merged.std_dev, 0.05);
    }

    #[test]
    fn merged_mean_matches_single_polygon_mean() {
        // Two equal-weight tiles with known means should average exactly,
        // matching a hypothetical single-polygon reduction over the union.
        let merged = merge_continuous(&[
            ContinuousTileStats {
                weight: 1.0,
                mean: 0.2,
                min: 0.0,
                max: 0.4,
                std_dev: 0.05,
            },
            ContinuousTileStats {
                weight: 1.0,
                mean: 0.6,
                min: 0.3,
                max: 0.9,
                std_dev: 0.05,
            },
        ]);
        assert!((merged.mean - 0.4).abs() < 1e-9);
        assert_eq!(merged.min, 0.0);
        assert_eq!(merged.max, 0.9);
    }

    #[test]
    fn pooled_variance_matches_formula() {
        let tiles = [
            ContinuousTileStats {
                weight: 2.0,
                mean: 0.3,
                min: 0.1,
                max: 0.5,
                std_dev: 0.1,
            },
            ContinuousTileStats {
                weight: 3.0,
                mean: 0.5,
                min: 0.2,
                max: 0.8,
                std_dev: 0.2,
            },
        ];
        let merged = merge_continuous(&tiles);
        let w1 = 2.0 / 5.0;
        let w2 = 3.0 / 5.0;
        let mean = w1 * 0.3 + w2 * 0.5;
        let variance = w1 * 0.1f64.powi(2)
            + w1 * (0.3 - mean).powi(2)
            + w2 * 0.2f64.powi(2)
            + w2 * (0.5 - mean).powi(2);
        assert!((merged.std_dev - variance.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn class_percentages_sum_to_100_after_renormalization() {
        let tiles = vec![
            (1.0, HashMap::from([("water".to_string(), 40.0), ("land".to_string(), 61.0)])),
            (1.0, HashMap::from([("water".to_string(), 20.0), ("land".to_string(), 78.0)])),
        ];
        let (merged, normalized) = merge_class_percentages(&tiles);
        let sum: f64 = merged.values().sum();
        assert!((sum - 100.0).abs() < 0.01);
        assert!(normalized);
    }
}

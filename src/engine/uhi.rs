//! Urban Heat Island computation. Four methods are tried
//! in order; the first with enough pixels in both masks wins. The final
//! statistical fallback always succeeds.

use crate::domain::{UhiDetails, UhiMethod};

/// One candidate classification's urban/rural pixel counts and mean LST.
pub struct UhiCandidate {
    pub method: UhiMethod,
    pub urban_pixel_count: u64,
    pub rural_pixel_count: u64,
    pub urban_mean: f64,
    pub rural_mean: f64,
    pub min_pixels_required: u64,
}

/// `uhi_intensity = max(0, urban_mean - rural_mean)` for the first candidate
/// meeting its pixel-count requirement; falls through to the statistical
/// method (`p90(LST) - p10(LST)`), which always succeeds.
pub fn compute_uhi(candidates: &[UhiCandidate], lst_p90: f64, lst_p10: f64) -> (f64, UhiDetails) {
    for candidate in candidates {
        if candidate.urban_pixel_count >= candidate.min_pixels_required
            && candidate.rural_pixel_count >= candidate.min_pixels_required
        {
            let intensity = (candidate.urban_mean - candidate.rural_mean).max(0.0);
            return (
                intensity,
                UhiDetails {
                    method: candidate.method,
                    urban_pixel_count: candidate.urban_pixel_count,
                    rural_pixel_count: candidate.rural_pixel_count,
                },
            );
        }
    }

    let intensity = (lst_p90 - lst_p10).max(0.0);
    (
        intensity,
        UhiDetails {
            method: UhiMethod::Statistical,
            urban_pixel_count: 0,
            rural_pixel_count: 0,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_eligible_method_wins() {
        let candidates = [
            UhiCandidate {
                method: UhiMethod::DynamicWorld,
                urban_pixel_count: 1,
                rural_pixel_count: 1,
                urban_mean: 35.0,
                rural_mean: 28.0,
                min_pixels_required: 3,
            },
            UhiCandidate {
                method: UhiMethod::ModisLc,
                urban_pixel_count: 5,
                rural_pixel_count: 5,
                urban_mean: 34.0,
                rural_mean: 27.0,
                min_pixels_required: 2,
            },
        ];
        let (intensity, details) = compute_uhi(&candidates, 40.0, 20.0);
        assert_eq!(details.method, UhiMethod::ModisLc);
        assert!((intensity - 7.0).abs() < 1e-9);
    }

    #[test]
    fn falls_back_to_statistical_method() {
        let candidates = [UhiCandidate {
            method: UhiMethod::DynamicWorld,
            urban_pixel_count: 0,
            rural_pixel_count: 0,
            urban_mean: 0.0,
            rural_mean: 0.0,
            min_pixels_required: 3,
        }];
        let (intensity, details) = compute_uhi(&candidates, 38.0, 22.0);
        assert_eq!(details.method, UhiMethod::Statistical);
        assert!((intensity - 16.0).abs() < 1e-9);
        assert!(intensity >= 0.0);
    }

    #[test]
    fn intensity_is_never_negative() {
        let candidates = [UhiCandidate {
            method: UhiMethod::EsaWorldcover,
            urban_pixel_count: 10,
            rural_pixel_count: 10,
            urban_mean: 20.0,
            rural_mean: 25.0,
            min_pixels_required: 5,
        }];
        let (intensity, _) = compute_uhi(&candidates, 40.0, 20.0);
        assert_eq!(intensity, 0.0);
    }
}

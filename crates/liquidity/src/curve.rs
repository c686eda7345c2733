//! Per-bin weight curves for seeding liquidity around the active bin.
//!
//! Bins above the active id can only hold X, bins below only Y, and the
//! active bin holds both. A placement picks which side of the active id the
//! curve covers; a profile picks how weight falls off across it.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::{LiquidityError, ONE};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CurveProfile {
    /// Same weight in every bin
    Uniform,
    /// Half bell peaking next to the active bin.
    ///
    /// `sigma` is measured in bins and defaults to half the span of the side.
    /// Weights are normalised against the whole bell, so the tail past the
    /// last bin stays unallocated and is refunded by the router.
    Gaussian { sigma: Option<f64> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// X only, in bins at or above the active id
    AskSide,
    /// Y only, in bins at or below the active id
    BidSide,
    /// Y left of the active bin, X right of it, both in it
    Centered,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveShape {
    pub profile: CurveProfile,
    pub placement: Placement,
    /// Distance between the active id and the nearest seeded bin (side placements only)
    #[serde(default)]
    pub offset: u32,
}

impl CurveShape {
    pub fn new(profile: CurveProfile, placement: Placement) -> Self {
        Self {
            profile,
            placement,
            offset: 0,
        }
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }
}

impl Default for CurveShape {
    fn default() -> Self {
        Self::new(CurveProfile::Gaussian { sigma: None }, Placement::AskSide)
    }
}

/// Distributions `(distributionX, distributionY)` for `bin_count` bins, in
/// the order of [`delta_ids`]. Each side sums to at most [`ONE`].
pub fn generate_curve(shape: &CurveShape, bin_count: usize) -> Result<(Vec<u128>, Vec<u128>), LiquidityError> {
    check_shape(shape, bin_count)?;

    match shape.placement {
        Placement::AskSide => {
            let x = side_weights(&shape.profile, bin_count)?;
            Ok((x, vec![0; bin_count]))
        }
        Placement::BidSide => {
            let mut y = side_weights(&shape.profile, bin_count)?;
            y.reverse();
            Ok((vec![0; bin_count], y))
        }
        Placement::Centered => {
            let half = bin_count / 2;
            let side = side_weights(&shape.profile, half + 1)?;

            let mut x = vec![0; half];
            x.extend_from_slice(&side);

            let mut y = side;
            y.reverse();
            y.resize(bin_count, 0);

            Ok((x, y))
        }
    }
}

/// Offsets from the active id matching [`generate_curve`], strictly increasing
pub fn delta_ids(shape: &CurveShape, bin_count: usize) -> Result<Vec<i64>, LiquidityError> {
    check_shape(shape, bin_count)?;

    let count = bin_count as i64;
    let offset = i64::from(shape.offset);
    let ids = match shape.placement {
        Placement::AskSide => (offset..offset + count).collect(),
        Placement::BidSide => (-(offset + count - 1)..=-offset).collect(),
        Placement::Centered => {
            let half = count / 2;
            (-half..=half).collect()
        }
    };
    Ok(ids)
}

fn check_shape(shape: &CurveShape, bin_count: usize) -> Result<(), LiquidityError> {
    if bin_count == 0 {
        return Err(LiquidityError::InvalidCurve("bin count must be at least 1".into()));
    }
    if shape.placement == Placement::Centered {
        if bin_count % 2 == 0 {
            return Err(LiquidityError::InvalidCurve(format!(
                "centered curves need an odd bin count, got {bin_count}"
            )));
        }
        if shape.offset != 0 {
            return Err(LiquidityError::InvalidCurve(
                "centered curves always include the active bin".into(),
            ));
        }
    }
    if let CurveProfile::Gaussian { sigma: Some(sigma) } = shape.profile {
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(LiquidityError::InvalidCurve(format!(
                "sigma must be positive, got {sigma}"
            )));
        }
    }
    Ok(())
}

/// Weights for one side, largest nearest the active bin
fn side_weights(profile: &CurveProfile, count: usize) -> Result<Vec<u128>, LiquidityError> {
    let sigma = match profile {
        CurveProfile::Uniform => return Ok(vec![ONE / count as u128; count]),
        CurveProfile::Gaussian { sigma } => sigma.unwrap_or_else(|| default_sigma(count)),
    };

    let raw: Vec<f64> = (0..count)
        .map(|i| {
            let d = i as f64;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();

    // The continuous half bell bounds the discrete one except for very narrow sigmas
    let discrete: f64 = raw.iter().sum();
    let total = discrete.max(sigma * (PI / 2.0).sqrt());
    if !(total.is_finite() && total > 0.0) {
        return Err(LiquidityError::InvalidCurve("degenerate weights".into()));
    }

    let weights: Vec<u128> = raw
        .iter()
        .map(|w| (w / total * ONE as f64).floor() as u128)
        .collect();

    // Floating point rounding can still leave the sum a few units over
    let sum: u128 = weights.iter().sum();
    Ok(trim_excess(weights, sum))
}

fn default_sigma(count: usize) -> f64 {
    if count > 1 {
        (count - 1) as f64 / 2.0
    } else {
        1.0
    }
}

fn trim_excess(mut weights: Vec<u128>, sum: u128) -> Vec<u128> {
    if sum > ONE {
        let mut excess = sum - ONE;
        for weight in weights.iter_mut().rev() {
            let cut = excess.min(*weight);
            *weight -= cut;
            excess -= cut;
            if excess == 0 {
                break;
            }
        }
    }
    weights
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ask_gaussian() -> CurveShape {
        CurveShape::default().with_offset(211)
    }

    #[test]
    fn test_gaussian_ask_side_matches_seed_table() {
        let (x, y) = generate_curve(&ask_gaussian(), 40).unwrap();

        assert_eq!(x.len(), 40);
        assert!(y.iter().all(|v| *v == 0));

        // Reference values of the 40-bin ask-side seeding table
        let expected_first = 40_917_156_964_249_510f64;
        let expected_last = 5_537_535_026_993_647f64;
        assert!((x[0] as f64 - expected_first).abs() / expected_first < 1e-9);
        assert!((x[39] as f64 - expected_last).abs() / expected_last < 1e-9);
    }

    #[test]
    fn test_gaussian_ask_side_decays_and_fits() {
        let (x, _) = generate_curve(&ask_gaussian(), 40).unwrap();

        assert!(x.windows(2).all(|w| w[0] > w[1]));
        assert!(x.iter().sum::<u128>() <= ONE);
    }

    #[test]
    fn test_delta_ids_per_placement() {
        assert_eq!(
            delta_ids(&ask_gaussian(), 40).unwrap(),
            (211..251).collect::<Vec<i64>>()
        );

        let bid = CurveShape::new(CurveProfile::Uniform, Placement::BidSide).with_offset(1);
        assert_eq!(delta_ids(&bid, 3).unwrap(), vec![-3, -2, -1]);

        let centered = CurveShape::new(CurveProfile::Uniform, Placement::Centered);
        assert_eq!(delta_ids(&centered, 5).unwrap(), vec![-2, -1, 0, 1, 2]);
    }

    #[test]
    fn test_uniform_bid_side() {
        let shape = CurveShape::new(CurveProfile::Uniform, Placement::BidSide);
        let (x, y) = generate_curve(&shape, 3).unwrap();

        assert_eq!(x, vec![0, 0, 0]);
        assert_eq!(y, vec![ONE / 3; 3]);
    }

    #[test]
    fn test_centered_splits_sides_around_active_bin() {
        let shape = CurveShape::new(CurveProfile::Uniform, Placement::Centered);
        let (x, y) = generate_curve(&shape, 5).unwrap();

        assert_eq!(x, vec![0, 0, ONE / 3, ONE / 3, ONE / 3]);
        assert_eq!(y, vec![ONE / 3, ONE / 3, ONE / 3, 0, 0]);
    }

    #[test]
    fn test_centered_gaussian_peaks_at_active_bin() {
        let shape = CurveShape::new(CurveProfile::Gaussian { sigma: Some(2.0) }, Placement::Centered);
        let (x, y) = generate_curve(&shape, 7).unwrap();

        assert_eq!(x[3], y[3]);
        assert!(x[3] > x[4] && x[4] > x[5] && x[5] > x[6]);
        assert!(y[3] > y[2] && y[2] > y[1] && y[1] > y[0]);
        assert!(x.iter().sum::<u128>() <= ONE);
        assert!(y.iter().sum::<u128>() <= ONE);
    }

    #[test]
    fn test_narrow_sigma_stays_within_one() {
        let shape = CurveShape::new(CurveProfile::Gaussian { sigma: Some(0.1) }, Placement::AskSide);
        let (x, _) = generate_curve(&shape, 4).unwrap();
        assert!(x.iter().sum::<u128>() <= ONE);
        assert!(x[0] > ONE / 2);
    }

    #[test]
    fn test_single_bin() {
        let shape = CurveShape::new(CurveProfile::Uniform, Placement::AskSide);
        assert_eq!(generate_curve(&shape, 1).unwrap(), (vec![ONE], vec![0]));
    }

    #[test]
    fn test_invalid_curves() {
        let uniform = CurveShape::new(CurveProfile::Uniform, Placement::AskSide);
        assert!(generate_curve(&uniform, 0).is_err());

        let centered = CurveShape::new(CurveProfile::Uniform, Placement::Centered);
        assert!(generate_curve(&centered, 4).is_err());
        assert!(delta_ids(&centered.with_offset(2), 5).is_err());

        let bad_sigma = CurveShape::new(CurveProfile::Gaussian { sigma: Some(-1.0) }, Placement::AskSide);
        assert!(matches!(
            generate_curve(&bad_sigma, 10),
            Err(LiquidityError::InvalidCurve(_))
        ));
    }

    #[test]
    fn test_shape_deserializes_from_config() {
        let shape: CurveShape = serde_json::from_str(
            r#"{"profile": {"kind": "gaussian", "sigma": null}, "placement": "ask_side", "offset": 211}"#,
        )
        .unwrap();
        assert_eq!(shape, ask_gaussian());
    }
}

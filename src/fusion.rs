// 该文件是 Xianmang （闲忙） 项目的一部分。
// src/fusion.rs - 特征归一化与加权融合
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

//! # 评分融合
//!
//! 五项原始测量值先按各自的参考区间截断并线性映射到 `[0, 1]`，
//! 再按固定权重求和得到 `combined_raw`，最后映射为 1–10 的整数分数：
//!
//! ```text
//! combined = 0.30·motion + 0.20·edge + 0.20·color + 0.15·texture + 0.15·contour
//! score    = clamp(round(1 + combined · 9), 1, 10)
//! ```
//!
//! 超出参考区间的值会饱和到 0 或 1。NaN 输入不会被静默替换，而是返回
//! [`FusionError::NotANumber`]。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::feature::FeatureSet;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 10;

/// 权重以百分数表示，保证整数和严格为 100
const WEIGHT_PERCENT: [u32; 5] = [30, 20, 20, 15, 15];
const _: () = assert!(
  WEIGHT_PERCENT[0] + WEIGHT_PERCENT[1] + WEIGHT_PERCENT[2] + WEIGHT_PERCENT[3] + WEIGHT_PERCENT[4]
    == 100
);

const WEIGHT_TOLERANCE: f64 = 1e-9;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FusionError {
  #[error("权重之和必须为 1.0, 实际为 {0}")]
  WeightsNotNormalized(f64),
  #[error("权重 {0} 不能为负数或 NaN")]
  InvalidWeight(&'static str),
  #[error("特征 {0} 为 NaN")]
  NotANumber(&'static str),
  #[error("特征 {feature} 的参考区间无效: [{floor}, {ceiling}]")]
  InvalidRange {
    feature: &'static str,
    floor: f64,
    ceiling: f64,
  },
}

/// 线性归一化参考区间
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationRange {
  pub floor: f64,
  pub ceiling: f64,
}

impl NormalizationRange {
  pub const fn new(floor: f64, ceiling: f64) -> Self {
    Self { floor, ceiling }
  }

  /// 截断到区间后线性映射到 [0, 1]
  pub fn normalize(&self, value: f64) -> f64 {
    if value <= self.floor {
      return 0.0;
    }
    if value >= self.ceiling {
      return 1.0;
    }
    ((value - self.floor) / (self.ceiling - self.floor)).clamp(0.0, 1.0)
  }

  fn validate(&self, feature: &'static str) -> Result<(), FusionError> {
    if self.floor.is_finite() && self.ceiling.is_finite() && self.floor < self.ceiling {
      Ok(())
    } else {
      Err(FusionError::InvalidRange {
        feature,
        floor: self.floor,
        ceiling: self.ceiling,
      })
    }
  }
}

/// 各特征的参考区间
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
  pub motion_ratio: NormalizationRange,
  pub edge_ratio: NormalizationRange,
  pub color_variance: NormalizationRange,
  pub texture_variance: NormalizationRange,
  pub contour_count: NormalizationRange,
}

impl Default for Calibration {
  fn default() -> Self {
    Self {
      motion_ratio: NormalizationRange::new(0.0, 0.5),
      edge_ratio: NormalizationRange::new(0.0, 0.2),
      color_variance: NormalizationRange::new(0.0, 10_000.0),
      texture_variance: NormalizationRange::new(0.0, 1_000.0),
      contour_count: NormalizationRange::new(0.0, 20.0),
    }
  }
}

impl Calibration {
  pub fn validate(&self) -> Result<(), FusionError> {
    self.motion_ratio.validate("motion_ratio")?;
    self.edge_ratio.validate("edge_ratio")?;
    self.color_variance.validate("color_variance")?;
    self.texture_variance.validate("texture_variance")?;
    self.contour_count.validate("contour_count")
  }

  pub fn floor_features(&self) -> FeatureSet {
    FeatureSet {
      motion_ratio: self.motion_ratio.floor,
      edge_ratio: self.edge_ratio.floor,
      color_variance: self.color_variance.floor,
      texture_variance: self.texture_variance.floor,
      contour_count: self.contour_count.floor.max(0.0) as u32,
    }
  }

  pub fn ceiling_features(&self) -> FeatureSet {
    FeatureSet {
      motion_ratio: self.motion_ratio.ceiling,
      edge_ratio: self.edge_ratio.ceiling,
      color_variance: self.color_variance.ceiling,
      texture_variance: self.texture_variance.ceiling,
      contour_count: self.contour_count.ceiling.ceil().max(0.0) as u32,
    }
  }
}

/// 融合权重，之和必须为 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
  pub motion: f64,
  pub edge: f64,
  pub color: f64,
  pub texture: f64,
  pub contour: f64,
}

impl Default for Weights {
  fn default() -> Self {
    let [motion, edge, color, texture, contour] = WEIGHT_PERCENT.map(|w| w as f64 / 100.0);
    Self {
      motion,
      edge,
      color,
      texture,
      contour,
    }
  }
}

impl Weights {
  pub fn sum(&self) -> f64 {
    self.motion + self.edge + self.color + self.texture + self.contour
  }

  pub fn validate(&self) -> Result<(), FusionError> {
    for (name, w) in [
      ("motion", self.motion),
      ("edge", self.edge),
      ("color", self.color),
      ("texture", self.texture),
      ("contour", self.contour),
    ] {
      if w.is_nan() || w < 0.0 {
        return Err(FusionError::InvalidWeight(name));
      }
    }
    let sum = self.sum();
    if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
      return Err(FusionError::WeightsNotNormalized(sum));
    }
    Ok(())
  }
}

/// 归一化后的各项子分数
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubScores {
  pub motion: f64,
  pub edge: f64,
  pub color: f64,
  pub texture: f64,
  pub contour: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fused {
  pub score: u8,
  pub combined_raw: f64,
  pub sub_scores: SubScores,
}

#[derive(Debug, Clone, Default)]
pub struct ScoreFusion {
  calibration: Calibration,
  weights: Weights,
}

impl ScoreFusion {
  pub fn new(calibration: Calibration, weights: Weights) -> Result<Self, FusionError> {
    calibration.validate()?;
    weights.validate()?;
    Ok(Self {
      calibration,
      weights,
    })
  }

  pub fn calibration(&self) -> &Calibration {
    &self.calibration
  }

  pub fn normalize(&self, features: &FeatureSet) -> Result<SubScores, FusionError> {
    let c = &self.calibration;
    let contour = features.contour_count as f64;
    for (name, value) in [
      ("motion_ratio", features.motion_ratio),
      ("edge_ratio", features.edge_ratio),
      ("color_variance", features.color_variance),
      ("texture_variance", features.texture_variance),
    ] {
      if value.is_nan() {
        return Err(FusionError::NotANumber(name));
      }
    }

    Ok(SubScores {
      motion: c.motion_ratio.normalize(features.motion_ratio),
      edge: c.edge_ratio.normalize(features.edge_ratio),
      color: c.color_variance.normalize(features.color_variance),
      texture: c.texture_variance.normalize(features.texture_variance),
      contour: c.contour_count.normalize(contour),
    })
  }

  pub fn fuse(&self, features: &FeatureSet) -> Result<Fused, FusionError> {
    self.weights.validate()?;

    let s = self.normalize(features)?;
    let w = &self.weights;
    let combined_raw = w.motion * s.motion
      + w.edge * s.edge
      + w.color * s.color
      + w.texture * s.texture
      + w.contour * s.contour;

    Ok(Fused {
      score: score_from_combined(combined_raw),
      combined_raw,
      sub_scores: s,
    })
  }
}

/// 把 [0, 1] 的加权和映射为 1–10 的整数分数
pub fn score_from_combined(combined: f64) -> u8 {
  let scaled = (1.0 + combined * 9.0).round();
  scaled.clamp(MIN_SCORE as f64, MAX_SCORE as f64) as u8
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  fn features(motion: f64, edge: f64, color: f64, texture: f64, contour: u32) -> FeatureSet {
    FeatureSet {
      motion_ratio: motion,
      edge_ratio: edge,
      color_variance: color,
      texture_variance: texture,
      contour_count: contour,
    }
  }

  #[test]
  fn default_weights_sum_to_one() {
    assert_eq!(WEIGHT_PERCENT.iter().sum::<u32>(), 100);
    assert!(Weights::default().validate().is_ok());
  }

  #[test]
  fn all_floor_scores_one() {
    let fusion = ScoreFusion::default();
    let fused = fusion.fuse(&features(0.0, 0.0, 0.0, 0.0, 0)).unwrap();
    assert_eq!(fused.score, 1);
    assert_eq!(fused.combined_raw, 0.0);
  }

  #[test]
  fn all_ceiling_scores_ten() {
    let fusion = ScoreFusion::default();
    let fused = fusion
      .fuse(&fusion.calibration().ceiling_features())
      .unwrap();
    assert_eq!(fused.score, 10);
    assert!((fused.combined_raw - 1.0).abs() < 1e-12);
  }

  #[test]
  fn far_beyond_ceiling_saturates() {
    let fusion = ScoreFusion::default();
    let fused = fusion
      .fuse(&features(1.0, 1.0, 1e12, f64::INFINITY, u32::MAX))
      .unwrap();
    assert_eq!(fused.sub_scores.texture, 1.0);
    assert_eq!(fused.score, 10);
  }

  #[test]
  fn below_floor_saturates_to_zero() {
    let range = NormalizationRange::new(10.0, 20.0);
    assert_eq!(range.normalize(-5.0), 0.0);
    assert_eq!(range.normalize(10.0), 0.0);
    assert_eq!(range.normalize(15.0), 0.5);
    assert_eq!(range.normalize(20.0), 1.0);
    assert_eq!(range.normalize(1e9), 1.0);
  }

  #[test]
  fn motion_only_uses_its_weight() {
    let fusion = ScoreFusion::default();
    let fused = fusion.fuse(&features(0.5, 0.0, 0.0, 0.0, 0)).unwrap();
    assert!((fused.combined_raw - 0.30).abs() < 1e-12);
    // 1 + 0.3·9 = 3.7
    assert_eq!(fused.score, 4);
  }

  #[test]
  fn score_mapping_is_clamped() {
    assert_eq!(score_from_combined(0.0), 1);
    assert_eq!(score_from_combined(0.5), 6);
    assert_eq!(score_from_combined(1.0), 10);
    assert_eq!(score_from_combined(-3.0), 1);
    assert_eq!(score_from_combined(7.0), 10);
  }

  #[test]
  fn nan_is_rejected() {
    let fusion = ScoreFusion::default();
    let err = fusion
      .fuse(&features(0.1, f64::NAN, 0.0, 0.0, 0))
      .unwrap_err();
    assert_eq!(err, FusionError::NotANumber("edge_ratio"));
  }

  #[test]
  fn unnormalized_weights_are_rejected() {
    let weights = Weights {
      motion: 0.5,
      ..Weights::default()
    };
    assert!(matches!(
      ScoreFusion::new(Calibration::default(), weights),
      Err(FusionError::WeightsNotNormalized(_))
    ));
  }

  #[test]
  fn inverted_range_is_rejected() {
    let calibration = Calibration {
      edge_ratio: NormalizationRange::new(0.3, 0.1),
      ..Calibration::default()
    };
    assert!(matches!(
      ScoreFusion::new(calibration, Weights::default()),
      Err(FusionError::InvalidRange { feature: "edge_ratio", .. })
    ));
  }

  fn in_range_features() -> impl Strategy<Value = FeatureSet> {
    (0.0..=0.5f64, 0.0..=0.2f64, 0.0..=10_000.0f64, 0.0..=1_000.0f64, 0u32..=20)
      .prop_map(|(m, e, c, t, n)| features(m, e, c, t, n))
  }

  fn any_features() -> impl Strategy<Value = FeatureSet> {
    (0.0..=1.0f64, 0.0..=1.0f64, 0.0..1e9f64, 0.0..1e9f64, any::<u32>())
      .prop_map(|(m, e, c, t, n)| features(m, e, c, t, n))
  }

  proptest! {
    #[test]
    fn score_is_always_in_range(f in any_features()) {
      let fused = ScoreFusion::default().fuse(&f).unwrap();
      prop_assert!((MIN_SCORE..=MAX_SCORE).contains(&fused.score));
    }

    #[test]
    fn combined_stays_in_unit_interval(f in in_range_features()) {
      let fused = ScoreFusion::default().fuse(&f).unwrap();
      prop_assert!(fused.combined_raw >= 0.0);
      prop_assert!(fused.combined_raw <= 1.0 + 1e-12);
    }

    #[test]
    fn combined_is_monotonic_in_each_feature(
      f in in_range_features(),
      bump in 0.0..=1.0f64,
      which in 0usize..5,
    ) {
      let fusion = ScoreFusion::default();
      let mut g = f;
      match which {
        0 => g.motion_ratio = (f.motion_ratio + bump * 0.5).min(0.5),
        1 => g.edge_ratio = (f.edge_ratio + bump * 0.2).min(0.2),
        2 => g.color_variance = (f.color_variance + bump * 10_000.0).min(10_000.0),
        3 => g.texture_variance = (f.texture_variance + bump * 1_000.0).min(1_000.0),
        _ => g.contour_count = (f.contour_count + (bump * 20.0) as u32).min(20),
      }
      let before = fusion.fuse(&f).unwrap();
      let after = fusion.fuse(&g).unwrap();
      prop_assert!(after.combined_raw >= before.combined_raw);
      prop_assert!(after.score >= before.score);
    }
  }
}

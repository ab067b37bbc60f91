// 该文件是 Xianmang （闲忙） 项目的一部分。
// src/feature.rs - 原始特征提取
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{
  frame::Frame,
  motion::{MotionError, MotionModel},
};

mod color;
mod contour;
mod edge;
mod texture;

pub use self::color::color_variance;
pub use self::contour::{DEFAULT_MIN_CONTOUR_AREA, contour_count};
pub use self::edge::{CANNY_HIGH_THRESHOLD, CANNY_LOW_THRESHOLD, edge_ratio};
pub use self::texture::texture_variance;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
  #[error("运动模型错误: {0}")]
  Motion(#[from] MotionError),
  #[error("特征 {feature} 结果无效: {value}")]
  InvalidMeasurement { feature: &'static str, value: f64 },
}

/// 单帧的五项原始测量值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
  pub motion_ratio: f64,
  pub edge_ratio: f64,
  pub color_variance: f64,
  pub texture_variance: f64,
  pub contour_count: u32,
}

/// 特征提取器，持有跨周期的运动模型
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
  motion: MotionModel,
  min_contour_area: f64,
}

impl Default for FeatureExtractor {
  fn default() -> Self {
    Self::new(MotionModel::default())
  }
}

impl FeatureExtractor {
  pub fn new(motion: MotionModel) -> Self {
    Self {
      motion,
      min_contour_area: DEFAULT_MIN_CONTOUR_AREA,
    }
  }

  pub fn with_min_contour_area(mut self, area: f64) -> Self {
    self.min_contour_area = area;
    self
  }

  pub fn motion_model(&self) -> &MotionModel {
    &self.motion
  }

  pub fn extract(&mut self, frame: &Frame) -> Result<FeatureSet, ExtractionError> {
    let gray = frame.to_gray();

    let motion_ratio = self.motion.observe(frame)?;
    let edge_ratio = edge_ratio(&gray);
    let color_variance = color_variance(frame.image());
    let texture_variance = texture_variance(&gray);
    let contour_count = contour_count(&gray, self.min_contour_area);

    for (feature, value) in [
      ("motion_ratio", motion_ratio),
      ("edge_ratio", edge_ratio),
      ("color_variance", color_variance),
      ("texture_variance", texture_variance),
    ] {
      if !value.is_finite() || value < 0.0 {
        return Err(ExtractionError::InvalidMeasurement { feature, value });
      }
    }

    let features = FeatureSet {
      motion_ratio,
      edge_ratio,
      color_variance,
      texture_variance,
      contour_count,
    };
    debug!("特征提取完成: {:?}", features);
    Ok(features)
  }
}

/// 总体方差，空输入返回 0
pub(crate) fn variance<I>(values: I) -> f64
where
  I: Iterator<Item = f64> + Clone,
{
  let (count, sum) = values.clone().fold((0usize, 0.0f64), |(n, s), v| (n + 1, s + v));
  if count == 0 {
    return 0.0;
  }
  let mean = sum / count as f64;
  values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  // 暗背景上互不相邻的亮块
  fn blocks(size: u32, cell: u32) -> Frame {
    Frame::now(RgbImage::from_fn(size, size, |x, y| {
      if x % (cell * 2) < cell && y % (cell * 2) < cell {
        Rgb([240, 240, 240])
      } else {
        Rgb([15, 15, 15])
      }
    }))
    .unwrap()
  }

  #[test]
  fn variance_of_constant_is_zero() {
    assert_eq!(variance([3.0f64; 10].into_iter()), 0.0);
    assert_eq!(variance(std::iter::empty::<f64>()), 0.0);
  }

  #[test]
  fn variance_matches_population_formula() {
    let v = variance([2.0f64, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].into_iter());
    assert!((v - 4.0).abs() < 1e-12);
  }

  #[test]
  fn uniform_frame_is_degenerate_but_valid() {
    for value in [0u8, 128, 255] {
      let mut extractor = FeatureExtractor::default();
      let frame = Frame::now(RgbImage::from_pixel(64, 48, Rgb([value; 3]))).unwrap();
      let features = extractor.extract(&frame).unwrap();
      assert_eq!(features.motion_ratio, 0.0);
      assert_eq!(features.edge_ratio, 0.0);
      assert_eq!(features.color_variance, 0.0);
      assert_eq!(features.texture_variance, 0.0);
      assert_eq!(features.contour_count, 0);
    }
  }

  #[test]
  fn busy_frame_scores_above_flat_frame() {
    let mut extractor = FeatureExtractor::default();
    let busy = extractor.extract(&blocks(96, 16)).unwrap();
    assert!(busy.edge_ratio > 0.0);
    assert!(busy.color_variance > 0.0);
    assert!(busy.texture_variance > 0.0);
    assert!(busy.contour_count > 0);
  }

  #[test]
  fn extraction_is_deterministic() {
    let frame = blocks(64, 8);
    let a = FeatureExtractor::default().extract(&frame).unwrap();
    let b = FeatureExtractor::default().extract(&frame).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn motion_comes_from_owned_model() {
    let mut extractor = FeatureExtractor::default();
    let dark = Frame::now(RgbImage::from_pixel(32, 32, Rgb([0; 3]))).unwrap();
    let bright = Frame::now(RgbImage::from_pixel(32, 32, Rgb([255; 3]))).unwrap();
    assert_eq!(extractor.extract(&dark).unwrap().motion_ratio, 0.0);
    assert_eq!(extractor.extract(&bright).unwrap().motion_ratio, 1.0);
    assert_eq!(extractor.motion_model().observed(), 2);
  }

  #[test]
  fn resized_frame_is_an_extraction_error() {
    let mut extractor = FeatureExtractor::default();
    extractor
      .extract(&Frame::now(RgbImage::new(8, 8)).unwrap())
      .unwrap();
    let err = extractor
      .extract(&Frame::now(RgbImage::new(9, 8)).unwrap())
      .unwrap_err();
    assert!(matches!(err, ExtractionError::Motion(_)));
  }
}

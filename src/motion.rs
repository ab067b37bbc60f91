// 该文件是 Xianmang （闲忙） 项目的一部分。
// src/motion.rs - 背景模型与运动比例
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

//! 运动模型：灰度帧的指数加权背景估计。
//!
//! 每次 [`MotionModel::observe`] 先用当前背景计算前景比例，再把当前帧以
//! 固定学习率混入背景。持续存在的变化（挪动的家具）会慢慢并入背景，
//! 短暂的变化（走过的人）则被标记为前景。

use thiserror::Error;
use tracing::debug;

use crate::frame::Frame;

/// 背景学习率 α
pub const DEFAULT_LEARNING_RATE: f32 = 0.05;
/// 前景判定阈值（灰度级）
pub const DEFAULT_FOREGROUND_THRESHOLD: f32 = 25.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
  #[error("帧尺寸与背景不一致: 背景 {expected:?}, 实际 {actual:?}")]
  DimensionMismatch {
    expected: (u32, u32),
    actual: (u32, u32),
  },
  #[error("学习率必须位于 (0, 1) 区间: {0}")]
  InvalidLearningRate(f32),
}

#[derive(Debug, Clone)]
struct Background {
  width: u32,
  height: u32,
  pixels: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct MotionModel {
  learning_rate: f32,
  threshold: f32,
  background: Option<Background>,
  observed: u64,
}

impl Default for MotionModel {
  fn default() -> Self {
    Self {
      learning_rate: DEFAULT_LEARNING_RATE,
      threshold: DEFAULT_FOREGROUND_THRESHOLD,
      background: None,
      observed: 0,
    }
  }
}

impl MotionModel {
  pub fn new(learning_rate: f32, threshold: f32) -> Result<Self, MotionError> {
    if !(learning_rate > 0.0 && learning_rate < 1.0) {
      return Err(MotionError::InvalidLearningRate(learning_rate));
    }
    Ok(Self {
      learning_rate,
      threshold,
      ..Self::default()
    })
  }

  pub fn learning_rate(&self) -> f32 {
    self.learning_rate
  }

  /// 已观察的帧数
  pub fn observed(&self) -> u64 {
    self.observed
  }

  /// 观察新帧，返回前景像素比例并更新背景
  ///
  /// 第一帧没有可比较的背景，直接作为初始背景并返回 0.0。
  /// 帧尺寸变化视为输入错误，背景保持不变。
  pub fn observe(&mut self, frame: &Frame) -> Result<f64, MotionError> {
    let gray = frame.to_gray();
    let (width, height) = gray.dimensions();

    let Some(background) = self.background.as_mut() else {
      self.background = Some(Background {
        width,
        height,
        pixels: gray.as_raw().iter().map(|&v| v as f32).collect(),
      });
      self.observed += 1;
      debug!("初始化背景模型: {}x{}", width, height);
      return Ok(0.0);
    };

    if (background.width, background.height) != (width, height) {
      return Err(MotionError::DimensionMismatch {
        expected: (background.width, background.height),
        actual: (width, height),
      });
    }

    let alpha = self.learning_rate;
    let mut foreground = 0usize;
    for (bg, &px) in background.pixels.iter_mut().zip(gray.as_raw().iter()) {
      let current = px as f32;
      if (current - *bg).abs() > self.threshold {
        foreground += 1;
      }
      *bg = *bg * (1.0 - alpha) + current * alpha;
    }
    self.observed += 1;

    let ratio = foreground as f64 / background.pixels.len() as f64;
    debug!("前景像素 {} / {}, 比例 {:.4}", foreground, background.pixels.len(), ratio);
    Ok(ratio)
  }
}

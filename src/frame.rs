// 该文件是 Xianmang （闲忙） 项目的一部分。
// src/frame.rs - 采集帧定义
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

use chrono::{DateTime, Local};
use image::{GrayImage, RgbImage};
use thiserror::Error;

const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
  #[error("帧尺寸无效: {width}x{height}")]
  EmptyFrame { width: u32, height: u32 },
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 一帧 RGB 图像，采集后不可变
#[derive(Debug, Clone)]
pub struct Frame {
  image: RgbImage,
  captured_at: DateTime<Local>,
}

impl Frame {
  pub fn new(image: RgbImage, captured_at: DateTime<Local>) -> Result<Self, FrameError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
      return Err(FrameError::EmptyFrame { width, height });
    }
    Ok(Self { image, captured_at })
  }

  /// 以当前时间作为采集时间
  pub fn now(image: RgbImage) -> Result<Self, FrameError> {
    Self::new(image, Local::now())
  }

  /// 从 RGB24 (HWC) 原始数据构造
  pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
    let expected = RGB_CHANNELS * width as usize * height as usize;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }
    let image = RgbImage::from_raw(width, height, data).ok_or(FrameError::LengthMismatch {
      expected,
      actual: 0,
    })?;
    Self::now(image)
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn captured_at(&self) -> DateTime<Local> {
    self.captured_at
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn to_gray(&self) -> GrayImage {
    image::imageops::grayscale(&self.image)
  }
}

// 该文件是 Xianmang （闲忙） 项目的一部分。
// src/feature/edge.rs - 边缘密度
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

use image::GrayImage;
use imageproc::edges::canny;

pub const CANNY_LOW_THRESHOLD: f32 = 50.0;
pub const CANNY_HIGH_THRESHOLD: f32 = 150.0;

/// Canny 边缘像素占全部像素的比例
pub fn edge_ratio(gray: &GrayImage) -> f64 {
  let total = gray.width() as usize * gray.height() as usize;
  if total == 0 {
    return 0.0;
  }
  let edges = canny(gray, CANNY_LOW_THRESHOLD, CANNY_HIGH_THRESHOLD);
  let marked = edges.as_raw().iter().filter(|&&v| v > 0).count();
  marked as f64 / total as f64
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Luma;

  #[test]
  fn flat_image_has_no_edges() {
    assert_eq!(edge_ratio(&GrayImage::from_pixel(40, 30, Luma([0]))), 0.0);
    assert_eq!(edge_ratio(&GrayImage::from_pixel(40, 30, Luma([255]))), 0.0);
  }

  #[test]
  fn step_edge_is_detected() {
    let gray = GrayImage::from_fn(40, 40, |x, _| if x < 20 { Luma([0]) } else { Luma([255]) });
    let ratio = edge_ratio(&gray);
    assert!(ratio > 0.0 && ratio < 0.5, "ratio = {ratio}");
  }

  #[test]
  fn faint_gradient_stays_below_threshold() {
    let gray = GrayImage::from_fn(40, 40, |x, _| Luma([100 + (x / 10) as u8]));
    assert_eq!(edge_ratio(&gray), 0.0);
  }
}

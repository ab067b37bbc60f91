// 该文件是 Xianmang （闲忙） 项目的一部分。
// src/feature/color.rs - 颜色方差
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

use image::RgbImage;

use super::variance;

/// 三个通道各自的方差取平均
pub fn color_variance(image: &RgbImage) -> f64 {
  let per_channel: [f64; 3] =
    std::array::from_fn(|c| variance(image.pixels().map(move |p| p[c] as f64)));
  per_channel.iter().sum::<f64>() / per_channel.len() as f64
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn solid_color_has_zero_variance() {
    let image = RgbImage::from_pixel(16, 16, Rgb([12, 200, 77]));
    assert_eq!(color_variance(&image), 0.0);
  }

  #[test]
  fn averages_channels() {
    // 红色通道在 0 与 200 间交替，方差 10000；其余通道恒定
    let image = RgbImage::from_fn(10, 10, |x, _| {
      if x % 2 == 0 { Rgb([0, 50, 50]) } else { Rgb([200, 50, 50]) }
    });
    let v = color_variance(&image);
    assert!((v - 10000.0 / 3.0).abs() < 1e-9, "v = {v}");
  }
}

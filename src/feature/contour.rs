// 该文件是 Xianmang （闲忙） 项目的一部分。
// src/feature/contour.rs - 轮廓计数
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

use image::{GrayImage, Luma};
use imageproc::{
  contours::{BorderType, find_contours},
  contrast::otsu_level,
  point::Point,
};

/// 小于该面积（像素²）的轮廓视为噪声
pub const DEFAULT_MIN_CONTOUR_AREA: f64 = 100.0;

/// Otsu 二值化后统计面积超过 `min_area` 的外轮廓数量
///
/// 亮背景上的暗物体在二值图中是背景的孔洞，因此正反两种极性各统计一次，
/// 取较大者。
pub fn contour_count(gray: &GrayImage, min_area: f64) -> u32 {
  let (min, max) = gray
    .as_raw()
    .iter()
    .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
  if min >= max {
    return 0;
  }

  let level = otsu_level(gray);
  let bright = binarize(gray, |v| v > level);
  let dark = binarize(gray, |v| v <= level);
  outer_contours(&bright, min_area).max(outer_contours(&dark, min_area))
}

fn binarize(gray: &GrayImage, foreground: impl Fn(u8) -> bool) -> GrayImage {
  GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
    if foreground(gray.get_pixel(x, y)[0]) {
      Luma([255])
    } else {
      Luma([0])
    }
  })
}

fn outer_contours(binary: &GrayImage, min_area: f64) -> u32 {
  find_contours::<i32>(binary)
    .into_iter()
    .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
    .filter(|c| polygon_area(&c.points) > min_area)
    .count() as u32
}

// 鞋带公式
fn polygon_area(points: &[Point<i32>]) -> f64 {
  if points.len() < 3 {
    return 0.0;
  }
  let twice: i64 = points
    .iter()
    .zip(points.iter().cycle().skip(1))
    .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
    .sum();
  twice.abs() as f64 / 2.0
}

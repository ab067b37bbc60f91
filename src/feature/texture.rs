// 该文件是 Xianmang （闲忙） 项目的一部分。
// src/feature/texture.rs - 拉普拉斯纹理方差
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
use imageproc::filter::laplacian_filter;

use super::variance;

/// 拉普拉斯响应的方差，细节越多值越大，平坦或模糊区域接近 0
pub fn texture_variance(gray: &GrayImage) -> f64 {
  let response = laplacian_filter(gray);
  variance(response.as_raw().iter().map(|&v| v as f64))
}

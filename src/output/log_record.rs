// 该文件是 Xianmang （闲忙） 项目的一部分。
// src/output/log_record.rs - 仅写日志的输出
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

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::Sink,
  record::{BusynessRecord, RecordTags},
};

#[derive(Error, Debug)]
pub enum LogRecordError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 不上传，只把记录写进日志，用于试运行
#[derive(Debug, Default)]
pub struct LogRecordOutput;

impl FromUrlWithScheme for LogRecordOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogRecordOutput {
  type Error = LogRecordError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(LogRecordError::SchemeMismatch);
    }
    Ok(LogRecordOutput)
  }
}

impl Sink for LogRecordOutput {
  type Error = LogRecordError;

  fn publish(&self, record: &BusynessRecord, tags: &RecordTags) -> Result<(), Self::Error> {
    let f = &record.features;
    info!(
      camera = tags.camera_name.as_deref().unwrap_or("-"),
      "繁忙度 {}/10 @ {} (运动 {:.3}, 边缘 {:.3}, 颜色方差 {:.1}, 纹理方差 {:.1}, 轮廓 {}, 加权和 {:.4})",
      record.score,
      record.timestamp_text(),
      f.motion_ratio,
      f.edge_ratio,
      f.color_variance,
      f.texture_variance,
      f.contour_count,
      record.combined_raw
    );
    Ok(())
  }
}

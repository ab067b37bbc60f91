// 该文件是 Xianmang （闲忙） 项目的一部分。
// src/record.rs - 繁忙度记录
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

use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{feature::FeatureSet, fusion::Fused};

/// 一个监测周期的输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusynessRecord {
  pub timestamp: DateTime<Local>,
  pub score: u8,
  pub features: FeatureSet,
  pub combined_raw: f64,
}

impl BusynessRecord {
  pub fn new(timestamp: DateTime<Local>, features: FeatureSet, fused: &Fused) -> Self {
    Self {
      timestamp,
      score: fused.score,
      features,
      combined_raw: fused.combined_raw,
    }
  }

  /// UTC 的 ISO-8601 时间戳文本，字典序与时间先后一致
  pub fn timestamp_text(&self) -> String {
    self
      .timestamp
      .with_timezone(&Utc)
      .to_rfc3339_opts(SecondsFormat::Micros, true)
  }

  /// 写入 metadata 列的 JSON 对象
  pub fn metadata(&self) -> serde_json::Value {
    json!({
      "motion_ratio": self.features.motion_ratio,
      "edge_ratio": self.features.edge_ratio,
      "color_variance": self.features.color_variance,
      "texture_variance": self.features.texture_variance,
      "contour_count": self.features.contour_count,
      "combined_raw": self.combined_raw,
    })
  }
}

/// 随记录一起写入的附加信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordTags {
  pub notes: Option<String>,
  pub camera_name: Option<String>,
}

impl RecordTags {
  pub fn new(notes: Option<&str>, camera_name: Option<&str>) -> Self {
    Self {
      notes: notes.filter(|s| !s.is_empty()).map(str::to_string),
      camera_name: camera_name.filter(|s| !s.is_empty()).map(str::to_string),
    }
  }
}

/// 存储表中的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkRow {
  pub timestamp: String,
  pub score: u8,
  pub motion_ratio: f64,
  pub edge_ratio: f64,
  pub color_variance: f64,
  pub texture_variance: f64,
  pub contour_count: u32,
  pub combined_raw: f64,
  pub metadata: String,
  pub notes: Option<String>,
  pub camera_name: Option<String>,
}

pub const SINK_COLUMNS: [&str; 11] = [
  "timestamp",
  "score",
  "motion_ratio",
  "edge_ratio",
  "color_variance",
  "texture_variance",
  "contour_count",
  "combined_raw",
  "metadata",
  "notes",
  "camera_name",
];

impl SinkRow {
  pub fn from_record(record: &BusynessRecord, tags: &RecordTags) -> Self {
    Self {
      timestamp: record.timestamp_text(),
      score: record.score,
      motion_ratio: record.features.motion_ratio,
      edge_ratio: record.features.edge_ratio,
      color_variance: record.features.color_variance,
      texture_variance: record.features.texture_variance,
      contour_count: record.features.contour_count,
      combined_raw: record.combined_raw,
      metadata: record.metadata().to_string(),
      notes: tags.notes.clone(),
      camera_name: tags.camera_name.clone(),
    }
  }

  /// 按 [`SINK_COLUMNS`] 顺序排列的参数
  pub fn params(&self) -> Vec<serde_json::Value> {
    vec![
      json!(self.timestamp),
      json!(self.score),
      json!(self.motion_ratio),
      json!(self.edge_ratio),
      json!(self.color_variance),
      json!(self.texture_variance),
      json!(self.contour_count),
      json!(self.combined_raw),
      json!(self.metadata),
      json!(self.notes),
      json!(self.camera_name),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fusion::ScoreFusion;
  use chrono::TimeZone;

  fn record() -> BusynessRecord {
    let features = FeatureSet {
      motion_ratio: 0.1,
      edge_ratio: 0.05,
      color_variance: 2500.0,
      texture_variance: 300.0,
      contour_count: 4,
    };
    let fused = ScoreFusion::default().fuse(&features).unwrap();
    let timestamp = Local.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
    BusynessRecord::new(timestamp, features, &fused)
  }

  #[test]
  fn metadata_carries_raw_values() {
    let record = record();
    let metadata = record.metadata();
    assert_eq!(metadata["contour_count"], 4);
    assert_eq!(metadata["color_variance"], 2500.0);
    assert_eq!(metadata["combined_raw"], record.combined_raw);
  }

  #[test]
  fn row_params_follow_column_order() {
    let record = record();
    let row = SinkRow::from_record(&record, &RecordTags::new(Some(""), Some("Lobby")));
    let params = row.params();
    assert_eq!(params.len(), SINK_COLUMNS.len());
    assert_eq!(params[0], json!(record.timestamp_text()));
    assert_eq!(params[1], json!(record.score));
    assert_eq!(params[9], serde_json::Value::Null);
    assert_eq!(params[10], json!("Lobby"));
  }

  #[test]
  fn timestamp_is_utc_iso8601() {
    let record = record();
    let text = record.timestamp_text();
    assert!(text.ends_with(".000000Z"), "{text}");
    assert_eq!(DateTime::parse_from_rfc3339(&text).unwrap(), record.timestamp);
  }

  #[test]
  fn timestamp_text_sorts_in_time_order() {
    let earlier = record();
    let mut later = earlier.clone();
    // 跨越夏令时回拨时本地偏移会变化，UTC 文本不受影响
    later.timestamp = earlier.timestamp + chrono::Duration::minutes(30);
    assert!(earlier.timestamp_text() < later.timestamp_text());

    let mut next_day = earlier.clone();
    next_day.timestamp = earlier.timestamp + chrono::Duration::hours(23);
    assert!(later.timestamp_text() < next_day.timestamp_text());
  }
}

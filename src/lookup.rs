// 该文件是 Xianmang （闲忙） 项目的一部分。
// src/lookup.rs - 繁忙度查询
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

//! 对 `busyness_data` 的只读查询，每个摄像头只取最新的一行。

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::output::{D1Client, D1Error};

// 每个 camera_name 的最新记录
const LATEST_PER_CAMERA: &str = "SELECT b.camera_name, b.timestamp, b.score, b.combined_raw, b.notes
  FROM busyness_data b
  JOIN (
    SELECT camera_name, MAX(timestamp) AS latest
    FROM busyness_data
    WHERE camera_name IS NOT NULL
    GROUP BY camera_name
  ) l ON b.camera_name = l.camera_name AND b.timestamp = l.latest";

#[derive(Error, Debug)]
pub enum LookupError {
  #[error("D1 查询错误: {0}")]
  D1Error(#[from] D1Error),
  #[error("结果行格式错误: {0}")]
  RowError(#[from] serde_json::Error),
}

/// 查询结果中的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestReading {
  pub camera_name: String,
  pub timestamp: String,
  pub score: u8,
  #[serde(default)]
  pub combined_raw: Option<f64>,
  #[serde(default)]
  pub notes: Option<String>,
}

/// 一个查询：SQL 与参数
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
  /// 最新分数不超过 `max_score` 的摄像头，按分数再按名称排序
  Quiet { max_score: u8 },
  /// 指定摄像头的最新记录
  Status { camera_name: String },
  /// 所有摄像头的最新记录
  All,
}

impl Lookup {
  pub fn statement(&self) -> (String, Vec<Value>) {
    match self {
      Lookup::Quiet { max_score } => (
        format!(
          "{}\n  WHERE b.score <= ?\n  ORDER BY b.score ASC, b.camera_name ASC",
          LATEST_PER_CAMERA
        ),
        vec![json!(max_score)],
      ),
      Lookup::Status { camera_name } => (
        "SELECT camera_name, timestamp, score, combined_raw, notes
  FROM busyness_data
  WHERE camera_name = ?
  ORDER BY timestamp DESC
  LIMIT 1"
          .to_string(),
        vec![json!(camera_name)],
      ),
      Lookup::All => (
        format!("{}\n  ORDER BY b.camera_name ASC", LATEST_PER_CAMERA),
        Vec::new(),
      ),
    }
  }

  pub fn run(&self, client: &D1Client) -> Result<Vec<LatestReading>, LookupError> {
    let (sql, params) = self.statement();
    let rows = client.query(&sql, &params)?;
    parse_rows(rows)
  }
}

pub fn parse_rows(rows: Vec<Value>) -> Result<Vec<LatestReading>, LookupError> {
  rows
    .into_iter()
    .map(|row| serde_json::from_value(row).map_err(LookupError::from))
    .collect()
}

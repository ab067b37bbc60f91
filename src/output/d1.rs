// 该文件是 Xianmang （闲忙） 项目的一部分。
// src/output/d1.rs - Cloudflare D1 输出
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

//! # Cloudflare D1 输出
//!
//! 通过 D1 的 HTTP 查询接口写入 `busyness_data` 表：
//!
//! ```text
//! POST {endpoint}/accounts/{account_id}/d1/database/{database_id}/query
//! Authorization: Bearer {api_token}
//! {"sql": "...", "params": [...]}
//! ```
//!
//! 地址格式为 `d1://<account_id>/<database_id>`，可以用查询参数
//! `endpoint=` 替换 API 根地址。API token 不放在地址里，通过
//! [`D1Sink::with_api_token`] 设置。
//!
//! 只有 HTTP 200 且响应体 `success` 为 `true` 才视为写入成功。

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::Sink,
  record::{BusynessRecord, RecordTags, SINK_COLUMNS, SinkRow},
};

pub const DEFAULT_ENDPOINT: &str = "https://api.cloudflare.com/client/v4";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const TABLE_NAME: &str = "busyness_data";

/// 建表与索引语句
pub const SCHEMA_STATEMENTS: [&str; 3] = [
  "CREATE TABLE IF NOT EXISTS busyness_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    score INTEGER NOT NULL CHECK (score >= 1 AND score <= 10),
    motion_ratio REAL,
    edge_ratio REAL,
    color_variance REAL,
    texture_variance REAL,
    contour_count INTEGER,
    combined_raw REAL,
    metadata TEXT,
    notes TEXT,
    camera_name TEXT,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
  )",
  "CREATE INDEX IF NOT EXISTS idx_busyness_timestamp ON busyness_data(timestamp)",
  "CREATE INDEX IF NOT EXISTS idx_busyness_score ON busyness_data(score)",
];

#[derive(Error, Debug)]
pub enum D1Error {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("D1 地址无效: {0}")]
  InvalidUrl(String),
  #[error("缺少 API token")]
  MissingToken,
  #[error("网络错误: {0}")]
  Transport(String),
  #[error("API 请求失败: {status} - {body}")]
  Status { status: u16, body: String },
  #[error("数据库查询失败: {0}")]
  Query(String),
  #[error("响应解析失败: {0}")]
  Decode(#[from] std::io::Error),
}

impl From<ureq::Error> for D1Error {
  fn from(err: ureq::Error) -> Self {
    match err {
      ureq::Error::Status(status, response) => D1Error::Status {
        status,
        body: response.into_string().unwrap_or_default(),
      },
      ureq::Error::Transport(transport) => D1Error::Transport(transport.to_string()),
    }
  }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
  #[serde(default)]
  success: bool,
  #[serde(default)]
  errors: Vec<Value>,
  #[serde(default)]
  result: Vec<QueryResult>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
  #[serde(default)]
  results: Vec<Value>,
}

/// D1 HTTP 查询客户端
#[derive(Clone)]
pub struct D1Client {
  agent: ureq::Agent,
  query_url: String,
  api_token: Option<String>,
}

impl std::fmt::Debug for D1Client {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("D1Client")
      .field("query_url", &self.query_url)
      .field("api_token", &self.api_token.as_ref().map(|_| "***"))
      .finish()
  }
}

impl D1Client {
  pub fn new(endpoint: &str, account_id: &str, database_id: &str) -> Self {
    let query_url = format!(
      "{}/accounts/{}/d1/database/{}/query",
      endpoint.trim_end_matches('/'),
      urlencoding::encode(account_id),
      urlencoding::encode(database_id)
    );
    let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
    Self {
      agent,
      query_url,
      api_token: None,
    }
  }

  pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
    self.api_token = Some(token.into());
    self
  }

  pub fn has_api_token(&self) -> bool {
    self.api_token.is_some()
  }

  pub fn query_url(&self) -> &str {
    &self.query_url
  }

  /// 执行一条参数化 SQL，返回结果行
  pub fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Value>, D1Error> {
    let token = self.api_token.as_deref().ok_or(D1Error::MissingToken)?;
    let payload = if params.is_empty() {
      json!({ "sql": sql })
    } else {
      json!({ "sql": sql, "params": params })
    };

    debug!("D1 查询: {}", sql.split_whitespace().collect::<Vec<_>>().join(" "));
    let response = self
      .agent
      .post(&self.query_url)
      .set("Authorization", &format!("Bearer {}", token))
      .set("Content-Type", "application/json")
      .send_json(payload)?;

    let body: QueryResponse = response.into_json()?;
    if !body.success {
      let errors = if body.errors.is_empty() {
        "Unknown error".to_string()
      } else {
        Value::Array(body.errors).to_string()
      };
      return Err(D1Error::Query(errors));
    }

    Ok(body.result.into_iter().flat_map(|r| r.results).collect())
  }

  pub fn table_exists(&self) -> Result<bool, D1Error> {
    let rows = self.query(
      "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
      &[json!(TABLE_NAME)],
    )?;
    Ok(rows.iter().any(|r| r.get("name") == Some(&json!(TABLE_NAME))))
  }

  pub fn create_schema(&self) -> Result<(), D1Error> {
    for (i, sql) in SCHEMA_STATEMENTS.iter().enumerate() {
      info!("执行建表语句 {}/{}", i + 1, SCHEMA_STATEMENTS.len());
      self.query(sql, &[])?;
    }
    Ok(())
  }
}

pub fn insert_sql() -> String {
  let placeholders = vec!["?"; SINK_COLUMNS.len()].join(", ");
  format!(
    "INSERT INTO {} ({}) VALUES ({})",
    TABLE_NAME,
    SINK_COLUMNS.join(", "),
    placeholders
  )
}

pub struct D1Sink {
  client: D1Client,
  insert_sql: String,
}

impl FromUrlWithScheme for D1Sink {
  const SCHEME: &'static str = "d1";
}

impl FromUrl for D1Sink {
  type Error = D1Error;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(D1Error::SchemeMismatch);
    }
    let account_id = url
      .host_str()
      .filter(|h| !h.is_empty())
      .ok_or_else(|| D1Error::InvalidUrl(format!("缺少 account id: {}", url)))?;
    let database_id = url.path().trim_matches('/');
    if database_id.is_empty() || database_id.contains('/') {
      return Err(D1Error::InvalidUrl(format!("缺少 database id: {}", url)));
    }
    let endpoint = url
      .query_pairs()
      .find(|(k, _)| k == "endpoint")
      .map(|(_, v)| v.into_owned())
      .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

    Ok(D1Sink::new(D1Client::new(&endpoint, account_id, database_id)))
  }
}

impl D1Sink {
  pub fn new(client: D1Client) -> Self {
    Self {
      client,
      insert_sql: insert_sql(),
    }
  }

  pub fn with_api_token(self, token: impl Into<String>) -> Self {
    Self {
      client: self.client.with_api_token(token),
      ..self
    }
  }

  pub fn has_api_token(&self) -> bool {
    self.client.has_api_token()
  }

  pub fn client(&self) -> &D1Client {
    &self.client
  }
}

impl Sink for D1Sink {
  type Error = D1Error;

  fn publish(&self, record: &BusynessRecord, tags: &RecordTags) -> Result<(), Self::Error> {
    let row = SinkRow::from_record(record, tags);
    self.client.query(&self.insert_sql, &row.params())?;
    info!(
      "上传成功: score={}, timestamp={}",
      row.score, row.timestamp
    );
    Ok(())
  }
}

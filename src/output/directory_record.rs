// 该文件是 Xianmang （闲忙） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::{
  fs::OpenOptions,
  io::Write,
  path::{Path, PathBuf},
};

use chrono::Datelike;
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::Sink,
  record::{BusynessRecord, RecordTags, SinkRow},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 按日期分文件追加 JSON 行：`<dir>/YYYY/MM/DD.jsonl`
pub struct DirectoryRecordOutput {
  directory: PathBuf,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let directory = urlencoding::decode(uri.path())
      .map(|p| PathBuf::from(p.into_owned()))
      .unwrap_or_else(|_| PathBuf::from(uri.path()));
    Ok(DirectoryRecordOutput { directory })
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl AsRef<Path>) -> Self {
    Self {
      directory: directory.as_ref().to_path_buf(),
    }
  }

  fn record_path(&self, record: &BusynessRecord) -> Result<PathBuf, DirectoryRecordOutputError> {
    let ts = record.timestamp;
    let directory = self
      .directory
      .join(ts.year().to_string())
      .join(format!("{:02}", ts.month()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }
    Ok(directory.join(format!("{:02}.jsonl", ts.day())))
  }
}

impl Sink for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn publish(&self, record: &BusynessRecord, tags: &RecordTags) -> Result<(), Self::Error> {
    let path = self.record_path(record)?;
    let mut line = serde_json::to_string(&SinkRow::from_record(record, tags))?;
    line.push('\n');

    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    file.write_all(line.as_bytes())?;
    debug!("记录已追加到 {}", path.display());
    Ok(())
  }
}

// 该文件是 Xianmang （闲忙） 项目的一部分。
// src/output.rs - 记录输出定义
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
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  record::{BusynessRecord, RecordTags},
};

/// 记录的去处；一次调用追加一行，失败不影响后续周期
pub trait Sink {
  type Error;
  fn publish(&self, record: &BusynessRecord, tags: &RecordTags) -> Result<(), Self::Error>;
}

impl<T: Sink + ?Sized> Sink for Box<T> {
  type Error = T::Error;

  fn publish(&self, record: &BusynessRecord, tags: &RecordTags) -> Result<(), Self::Error> {
    (**self).publish(record, tags)
  }
}

mod log_record;
pub use self::log_record::{LogRecordError, LogRecordOutput};

#[cfg(feature = "d1_sink")]
pub mod d1;
#[cfg(feature = "d1_sink")]
pub use self::d1::{D1Client, D1Error, D1Sink};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[derive(Error, Debug)]
pub enum PublishError {
  #[error("日志输出错误: {0}")]
  LogRecordError(#[from] LogRecordError),
  #[cfg(feature = "d1_sink")]
  #[error("D1 写入错误: {0}")]
  D1Error(#[from] D1Error),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  LogRecordOutput(LogRecordOutput),
  #[cfg(feature = "d1_sink")]
  D1Sink(D1Sink),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = PublishError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      LogRecordOutput::SCHEME => Ok(OutputWrapper::LogRecordOutput(LogRecordOutput::from_url(
        url,
      )?)),
      #[cfg(feature = "d1_sink")]
      D1Sink::SCHEME => Ok(OutputWrapper::D1Sink(D1Sink::from_url(url)?)),
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => Ok(OutputWrapper::DirectoryRecordOutput(
        DirectoryRecordOutput::from_url(url)?,
      )),
      other => Err(PublishError::SchemeMismatch(other.to_string())),
    }
  }
}

impl OutputWrapper {
  /// 为需要鉴权的输出设置 API token，其余输出忽略
  pub fn with_api_token(self, token: Option<String>) -> Self {
    match self {
      #[cfg(feature = "d1_sink")]
      OutputWrapper::D1Sink(sink) => match token {
        Some(token) => OutputWrapper::D1Sink(sink.with_api_token(token)),
        None => OutputWrapper::D1Sink(sink),
      },
      other => {
        let _ = token;
        other
      }
    }
  }

  pub fn requires_api_token(&self) -> bool {
    match self {
      #[cfg(feature = "d1_sink")]
      OutputWrapper::D1Sink(sink) => !sink.has_api_token(),
      _ => false,
    }
  }
}

impl Sink for OutputWrapper {
  type Error = PublishError;

  fn publish(&self, record: &BusynessRecord, tags: &RecordTags) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::LogRecordOutput(output) => {
        output.publish(record, tags).map_err(PublishError::from)
      }
      #[cfg(feature = "d1_sink")]
      OutputWrapper::D1Sink(output) => output.publish(record, tags).map_err(PublishError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => {
        output.publish(record, tags).map_err(PublishError::from)
      }
    }
  }
}

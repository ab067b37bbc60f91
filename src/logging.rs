// 该文件是 Xianmang （闲忙） 项目的一部分。
// src/logging.rs - 日志初始化
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

use std::{fs::OpenOptions, path::PathBuf, sync::Mutex};

use thiserror::Error;
use tracing_subscriber::{
  EnvFilter, filter::ParseError, fmt, layer::SubscriberExt, util::SubscriberInitExt,
  util::TryInitError,
};

use crate::config::LoggingConfig;

#[derive(Error, Debug)]
pub enum LoggingError {
  #[error("日志级别无效: {0}")]
  InvalidFilter(#[from] ParseError),
  #[error("无法打开日志文件 {path:?}: {source}")]
  OpenFile {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("日志系统初始化失败: {0}")]
  Init(#[from] TryInitError),
}

/// `RUST_LOG` 优先，其次是配置中的级别
pub fn env_filter(level: &str) -> Result<EnvFilter, ParseError> {
  match EnvFilter::try_from_default_env() {
    Ok(filter) => Ok(filter),
    Err(_) => EnvFilter::try_new(level.to_ascii_lowercase()),
  }
}

/// 初始化全局日志：标准错误输出，外加可选的日志文件
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
  let filter = env_filter(&config.level)?;

  let file_layer = match &config.file {
    Some(path) => {
      let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoggingError::OpenFile {
          path: path.clone(),
          source,
        })?;
      Some(
        fmt::layer()
          .with_ansi(false)
          .with_target(true)
          .with_writer(Mutex::new(file)),
      )
    }
    None => None,
  };

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
    .with(file_layer)
    .try_init()?;
  Ok(())
}

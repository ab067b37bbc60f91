// 该文件是 Xianmang （闲忙） 项目的一部分。
// src/config.rs - 配置文件
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

//! JSON 配置文件，形如：
//!
//! ```json
//! {
//!   "cloudflare": { "api_token": "...", "account_id": "...", "database_id": "..." },
//!   "camera": { "index": 0, "interval": 30, "name": "MacBook Camera" },
//!   "logging": { "level": "INFO", "file": "busyness_monitor.log" },
//!   "calibration": { "learning_rate": 0.05, "motion_ratio": { "floor": 0.0, "ceiling": 0.5 } }
//! }
//! ```
//!
//! 所有字段都可省略；命令行参数优先于文件中的值。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[cfg(feature = "d1_sink")]
use crate::output::{D1Client, d1::DEFAULT_ENDPOINT};
use crate::{
  feature::{DEFAULT_MIN_CONTOUR_AREA, FeatureExtractor},
  fusion::{Calibration, FusionError, ScoreFusion, Weights},
  motion::{DEFAULT_FOREGROUND_THRESHOLD, DEFAULT_LEARNING_RATE, MotionError, MotionModel},
};

pub const DEFAULT_CAMERA_NAME: &str = "MacBook Camera";
pub const DEFAULT_INTERVAL_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("无法读取配置文件 {path:?}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("配置文件 {path:?} 格式错误: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
  #[error("校准参数无效: {0}")]
  Calibration(#[from] FusionError),
  #[error("运动模型参数无效: {0}")]
  Motion(#[from] MotionError),
  #[error("缺少 Cloudflare 配置")]
  MissingCloudflare,
  #[error("缺少 Cloudflare 配置项 {0}")]
  MissingField(&'static str),
  #[error("Cloudflare 配置无效: {0}")]
  InvalidCloudflare(#[from] url::ParseError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  pub cloudflare: Option<CloudflareConfig>,
  pub camera: CameraConfig,
  pub logging: LoggingConfig,
  pub calibration: CalibrationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudflareConfig {
  #[serde(default)]
  pub api_token: Option<String>,
  pub account_id: String,
  pub database_id: String,
  /// 替换默认的 API 根地址
  #[serde(default)]
  pub endpoint: Option<String>,
}

impl CloudflareConfig {
  /// 对应的 `d1://` 输出地址
  pub fn sink_url(&self) -> Result<Url, ConfigError> {
    let mut url = Url::parse(&format!(
      "d1://{}/{}",
      urlencoding::encode(&self.account_id),
      urlencoding::encode(&self.database_id)
    ))?;
    if let Some(endpoint) = &self.endpoint {
      url.query_pairs_mut().append_pair("endpoint", endpoint);
    }
    Ok(url)
  }

  /// 带 API token 的 D1 客户端
  #[cfg(feature = "d1_sink")]
  pub fn client(&self) -> Result<D1Client, ConfigError> {
    let token = self
      .api_token
      .clone()
      .ok_or(ConfigError::MissingField("api_token"))?;
    let endpoint = self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
    Ok(D1Client::new(endpoint, &self.account_id, &self.database_id).with_api_token(token))
  }
}

/// 直接访问 D1 的命令行参数，覆盖配置文件中的 `cloudflare` 项
#[derive(clap::Args, Debug, Clone, Default, PartialEq)]
pub struct CloudflareArgs {
  /// Cloudflare 账户 ID
  #[arg(long, value_name = "ID", global = true)]
  pub account_id: Option<String>,
  /// D1 数据库 ID
  #[arg(long, value_name = "ID", global = true)]
  pub database_id: Option<String>,
  /// Cloudflare API token
  #[arg(long, env = "CLOUDFLARE_API_TOKEN", hide_env_values = true, global = true)]
  pub api_token: Option<String>,
  /// API 根地址
  #[arg(long, value_name = "URL", global = true)]
  pub endpoint: Option<String>,
}

impl CloudflareArgs {
  pub fn resolve(&self, file: Option<&CloudflareConfig>) -> Result<CloudflareConfig, ConfigError> {
    let account_id = self
      .account_id
      .clone()
      .or_else(|| file.map(|c| c.account_id.clone()))
      .ok_or(ConfigError::MissingField("account_id"))?;
    let database_id = self
      .database_id
      .clone()
      .or_else(|| file.map(|c| c.database_id.clone()))
      .ok_or(ConfigError::MissingField("database_id"))?;
    Ok(CloudflareConfig {
      api_token: self
        .api_token
        .clone()
        .or_else(|| file.and_then(|c| c.api_token.clone())),
      account_id,
      database_id,
      endpoint: self
        .endpoint
        .clone()
        .or_else(|| file.and_then(|c| c.endpoint.clone())),
    })
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
  pub index: u32,
  /// 采集间隔（秒）
  pub interval: u64,
  pub name: String,
}

impl Default for CameraConfig {
  fn default() -> Self {
    Self {
      index: 0,
      interval: DEFAULT_INTERVAL_SECS,
      name: DEFAULT_CAMERA_NAME.to_string(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// 日志级别或 `EnvFilter` 指令，例如 "info"、"xianmang=debug,warn"
  pub level: String,
  pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      file: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
  pub learning_rate: f32,
  pub foreground_threshold: f32,
  pub min_contour_area: f64,
  #[serde(flatten)]
  pub ranges: Calibration,
  pub weights: Weights,
}

impl Default for CalibrationConfig {
  fn default() -> Self {
    Self {
      learning_rate: DEFAULT_LEARNING_RATE,
      foreground_threshold: DEFAULT_FOREGROUND_THRESHOLD,
      min_contour_area: DEFAULT_MIN_CONTOUR_AREA,
      ranges: Calibration::default(),
      weights: Weights::default(),
    }
  }
}

impl CalibrationConfig {
  pub fn extractor(&self) -> Result<FeatureExtractor, ConfigError> {
    let motion = MotionModel::new(self.learning_rate, self.foreground_threshold)?;
    Ok(FeatureExtractor::new(motion).with_min_contour_area(self.min_contour_area))
  }

  pub fn fusion(&self) -> Result<ScoreFusion, ConfigError> {
    Ok(ScoreFusion::new(self.ranges, self.weights)?)
  }
}

impl AppConfig {
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// 有路径时读取，否则使用默认配置
  pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
    match path {
      Some(path) => Self::load(path),
      None => Ok(Self::default()),
    }
  }

  pub fn cloudflare(&self) -> Result<&CloudflareConfig, ConfigError> {
    self.cloudflare.as_ref().ok_or(ConfigError::MissingCloudflare)
  }
}

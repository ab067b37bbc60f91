// 该文件是 Xianmang （闲忙） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::{path::PathBuf, time::Duration};

use anyhow::{Result, anyhow, ensure};
use clap::Parser;
use url::Url;

use xianmang::{
  config::{AppConfig, LoggingConfig},
  input::device_url,
  record::RecordTags,
};

/// Xianmang 摄像头繁忙度监测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源，例如 v4l:///dev/video0 或 image:///tmp/room.png
  #[arg(long, value_name = "SOURCE", conflicts_with = "camera")]
  pub input: Option<Url>,

  /// 摄像头编号，等同于 --input v4l:///dev/video<INDEX>
  #[arg(long, value_name = "INDEX")]
  pub camera: Option<u32>,

  /// 记录输出，例如 d1://<account>/<database>、folder:///var/lib/xianmang 或 log://
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<Url>,

  /// 采集间隔（秒）
  #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
  pub interval: Option<u64>,

  /// 只执行一次
  #[arg(long)]
  pub once: bool,

  /// 持续模式下的最大周期数
  #[arg(long, value_name = "N")]
  pub max_cycles: Option<u64>,

  /// 本次监测的备注
  #[arg(long, value_name = "TEXT")]
  pub notes: Option<String>,

  /// 摄像头名称
  #[arg(long, value_name = "NAME")]
  pub camera_name: Option<String>,

  /// JSON 配置文件
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// Cloudflare API token
  #[arg(long, env = "CLOUDFLARE_API_TOKEN", hide_env_values = true)]
  pub api_token: Option<String>,

  /// 日志级别
  #[arg(long, value_name = "LEVEL")]
  pub log_level: Option<String>,

  /// 日志文件
  #[arg(long, value_name = "FILE")]
  pub log_file: Option<PathBuf>,
}

/// 命令行与配置文件合并后的运行参数
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
  pub input: Url,
  pub output: Url,
  pub api_token: Option<String>,
  pub interval: Duration,
  pub once: bool,
  pub max_cycles: Option<u64>,
  pub tags: RecordTags,
  pub logging: LoggingConfig,
}

impl Args {
  /// 命令行优先，其次配置文件，最后是默认值
  pub fn resolve(&self, config: &AppConfig) -> Result<Settings> {
    let input = match &self.input {
      Some(url) => url.clone(),
      None => device_url(self.camera.unwrap_or(config.camera.index))?,
    };

    let output = match (&self.output, &config.cloudflare) {
      (Some(url), _) => url.clone(),
      (None, Some(cloudflare)) => cloudflare.sink_url()?,
      (None, None) => return Err(anyhow!("需要 --output 参数或配置文件中的 cloudflare 配置")),
    };

    let api_token = self.api_token.clone().or_else(|| {
      config
        .cloudflare
        .as_ref()
        .and_then(|c| c.api_token.clone())
    });

    let interval = self.interval.unwrap_or(config.camera.interval);
    ensure!(interval > 0, "采集间隔必须大于 0 秒");

    let camera_name = self.camera_name.as_deref().unwrap_or(&config.camera.name);

    let logging = LoggingConfig {
      level: self
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone()),
      file: self.log_file.clone().or_else(|| config.logging.file.clone()),
    };

    Ok(Settings {
      input,
      output,
      api_token,
      interval: Duration::from_secs(interval),
      once: self.once,
      max_cycles: self.max_cycles,
      tags: RecordTags::new(self.notes.as_deref(), Some(camera_name)),
      logging,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(argv: &[&str]) -> Args {
    Args::try_parse_from(std::iter::once("xianmang").chain(argv.iter().copied())).unwrap()
  }

  fn config_with_cloudflare() -> AppConfig {
    serde_json::from_str(
      r#"{
        "cloudflare": { "api_token": "file-token", "account_id": "acc", "database_id": "db" },
        "camera": { "index": 2, "interval": 45, "name": "Lobby" },
        "logging": { "level": "DEBUG" }
      }"#,
    )
    .unwrap()
  }

  #[test]
  fn defaults_come_from_config_file() {
    let settings = parse(&[]).resolve(&config_with_cloudflare()).unwrap();
    assert_eq!(settings.input.as_str(), "v4l:///dev/video2");
    assert_eq!(settings.output.as_str(), "d1://acc/db");
    assert_eq!(settings.api_token.as_deref(), Some("file-token"));
    assert_eq!(settings.interval, Duration::from_secs(45));
    assert_eq!(settings.tags.camera_name.as_deref(), Some("Lobby"));
    assert_eq!(settings.logging.level, "DEBUG");
    assert!(!settings.once);
  }

  #[test]
  fn flags_override_config_file() {
    let args = parse(&[
      "--camera",
      "0",
      "--output",
      "log://",
      "--interval",
      "5",
      "--once",
      "--notes",
      "exam week",
      "--camera-name",
      "Library",
      "--api-token",
      "cli-token",
    ]);
    let settings = args.resolve(&config_with_cloudflare()).unwrap();
    assert_eq!(settings.input.as_str(), "v4l:///dev/video0");
    assert_eq!(settings.output.as_str(), "log://");
    assert_eq!(settings.api_token.as_deref(), Some("cli-token"));
    assert_eq!(settings.interval, Duration::from_secs(5));
    assert!(settings.once);
    assert_eq!(settings.tags.notes.as_deref(), Some("exam week"));
    assert_eq!(settings.tags.camera_name.as_deref(), Some("Library"));
  }

  #[test]
  fn built_in_defaults_without_config() {
    let settings = parse(&["--output", "log://"])
      .resolve(&AppConfig::default())
      .unwrap();
    assert_eq!(settings.input.as_str(), "v4l:///dev/video0");
    assert_eq!(settings.interval, Duration::from_secs(30));
    assert_eq!(settings.tags.camera_name.as_deref(), Some("MacBook Camera"));
    assert_eq!(settings.tags.notes, None);
  }

  #[test]
  fn output_is_required_somewhere() {
    assert!(parse(&[]).resolve(&AppConfig::default()).is_err());
  }

  #[test]
  fn rejects_conflicting_sources_and_zero_interval() {
    assert!(
      Args::try_parse_from(["xianmang", "--camera", "1", "--input", "image:///tmp/a.png"]).is_err()
    );
    assert!(Args::try_parse_from(["xianmang", "--interval", "0"]).is_err());
  }
}

// 该文件是 Xianmang （闲忙） 项目的一部分。
// src/bin/busyness_lookup.rs - 查询各摄像头的最新繁忙度
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

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use xianmang::{
  config::{AppConfig, CloudflareArgs, LoggingConfig},
  logging::init_logging,
  lookup::{LatestReading, Lookup},
};

/// 查询 busyness_data 中各摄像头的最新记录
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(subcommand)]
  pub query: Query,
  /// JSON 配置文件
  #[arg(long, value_name = "FILE", global = true)]
  pub config: Option<PathBuf>,
  #[command(flatten)]
  pub cloudflare: CloudflareArgs,
  /// 以 JSON 输出
  #[arg(long, global = true)]
  pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Query {
  /// 最新分数不超过给定值的摄像头
  Quiet {
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=10))]
    max_score: u8,
  },
  /// 指定摄像头的最新记录
  Status {
    #[arg(long)]
    name: String,
  },
  /// 所有摄像头的最新记录
  All,
}

impl From<Query> for Lookup {
  fn from(query: Query) -> Self {
    match query {
      Query::Quiet { max_score } => Lookup::Quiet { max_score },
      Query::Status { name } => Lookup::Status { camera_name: name },
      Query::All => Lookup::All,
    }
  }
}

fn print_reading(reading: &LatestReading) {
  println!(
    "{:<24} {:>2}/10  {}{}",
    reading.camera_name,
    reading.score,
    reading.timestamp,
    reading
      .notes
      .as_deref()
      .map(|n| format!("  ({})", n))
      .unwrap_or_default()
  );
}

fn main() -> Result<()> {
  let args = Args::parse();
  let config = AppConfig::load_or_default(args.config.as_deref())?;
  init_logging(&LoggingConfig {
    level: "warn".to_string(),
    file: None,
  })?;

  let client = args
    .cloudflare
    .resolve(config.cloudflare.as_ref())?
    .client()?;
  let lookup = Lookup::from(args.query);
  let readings = lookup.run(&client)?;
  info!("查询返回 {} 行", readings.len());

  if args.json {
    println!("{}", serde_json::to_string_pretty(&readings)?);
  } else if readings.is_empty() {
    println!("没有匹配的记录");
  } else {
    readings.iter().for_each(print_reading);
  }

  Ok(())
}

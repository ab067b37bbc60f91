// 该文件是 Xianmang （闲忙） 项目的一部分。
// src/bin/init_database.rs - 初始化 D1 数据库表结构
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

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};

use xianmang::{
  config::{AppConfig, CloudflareArgs, LoggingConfig},
  logging::init_logging,
};

/// 在 Cloudflare D1 中创建 busyness_data 表
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// JSON 配置文件
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,
  #[command(flatten)]
  pub cloudflare: CloudflareArgs,
}

fn main() -> Result<()> {
  let args = Args::parse();
  let config = AppConfig::load_or_default(args.config.as_deref())?;
  init_logging(&LoggingConfig {
    file: None,
    ..config.logging.clone()
  })?;

  let cloudflare = args.cloudflare.resolve(config.cloudflare.as_ref())?;
  info!("使用数据库: {}", cloudflare.database_id);
  let client = cloudflare.client()?;

  info!("测试数据库连接...");
  if client.table_exists().context("数据库连接测试失败")? {
    info!("数据库连接成功，busyness_data 表已存在");
  } else {
    info!("数据库连接成功，将创建 busyness_data 表");
  }

  client.create_schema().context("创建表结构失败")?;

  if !client.table_exists()? {
    bail!("表结构验证失败: busyness_data 不存在");
  }
  info!("表结构已就绪");
  if config.cloudflare.is_none() {
    warn!("未提供配置文件，监测程序需要使用相同的 --output d1://... 参数");
  }

  Ok(())
}

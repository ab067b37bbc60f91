// 该文件是 Xianmang （闲忙） 项目的一部分。
// src/main.rs - 繁忙度监测主程序
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

mod args;

use anyhow::{Result, bail};
use clap::Parser;
use tracing::info;

use xianmang::{
  FromUrl,
  config::AppConfig,
  input::InputWrapper,
  logging::init_logging,
  output::OutputWrapper,
  task::{ContinuousTask, Monitor, OneShotTask, Task, install_interrupt_handler},
};

fn main() -> Result<()> {
  let args = args::Args::parse();
  let config = AppConfig::load_or_default(args.config.as_deref())?;
  let settings = args.resolve(&config)?;

  init_logging(&settings.logging)?;

  info!("输入来源: {}", settings.input);
  info!("记录输出: {}", settings.output);
  if let Some(name) = &settings.tags.camera_name {
    info!("摄像头名称: {}", name);
  }

  let input = InputWrapper::from_url(&settings.input)?;
  let output = OutputWrapper::from_url(&settings.output)?.with_api_token(settings.api_token);
  if output.requires_api_token() {
    bail!("{} 需要 API token (--api-token 或 CLOUDFLARE_API_TOKEN)", settings.output);
  }

  let mut monitor = Monitor::new(
    input,
    config.calibration.extractor()?,
    config.calibration.fusion()?,
    output,
  )
  .with_tags(settings.tags);

  if settings.once {
    OneShotTask.run_task(&mut monitor)?;
  } else {
    let shutdown = install_interrupt_handler()?;
    ContinuousTask::default()
      .with_interval(settings.interval)
      .with_max_cycles(settings.max_cycles)
      .with_shutdown(shutdown)
      .run_task(&mut monitor)?;
  }

  Ok(())
}

// 该文件是 Xianmang （闲忙） 项目的一部分。
// src/task.rs - 监测周期与任务调度
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
  fmt,
  sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError},
  thread,
  time::{Duration, Instant},
};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  feature::{ExtractionError, FeatureExtractor},
  fusion::{FusionError, ScoreFusion},
  input::{CaptureError, FrameSource},
  output::Sink,
  record::{BusynessRecord, RecordTags},
};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

/// 监测周期所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
  Idle,
  Capturing,
  Extracting,
  Fusing,
  Publishing,
}

impl fmt::Display for CycleStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      CycleStage::Idle => "idle",
      CycleStage::Capturing => "capture",
      CycleStage::Extracting => "extract",
      CycleStage::Fusing => "fuse",
      CycleStage::Publishing => "publish",
    };
    f.write_str(name)
  }
}

/// 单个周期的失败，按阶段区分
#[derive(Error, Debug)]
pub enum CycleError {
  #[error("采集失败: {0}")]
  Capture(#[source] CaptureError),
  #[error("特征提取失败: {0}")]
  Extraction(#[source] ExtractionError),
  #[error("分数融合失败: {0}")]
  Fusion(#[source] FusionError),
  #[error("记录发布失败: {0}")]
  Publish(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CycleError {
  pub fn stage(&self) -> CycleStage {
    match self {
      CycleError::Capture(_) => CycleStage::Capturing,
      CycleError::Extraction(_) => CycleStage::Extracting,
      CycleError::Fusion(_) => CycleStage::Fusing,
      CycleError::Publish(_) => CycleStage::Publishing,
    }
  }
}

/// 采集、提取、融合、发布
pub struct Monitor<S, K> {
  source: S,
  extractor: FeatureExtractor,
  fusion: ScoreFusion,
  sink: K,
  tags: RecordTags,
  stage: CycleStage,
}

impl<S, K> Monitor<S, K>
where
  S: FrameSource,
  K: Sink,
  K::Error: std::error::Error + Send + Sync + 'static,
{
  pub fn new(source: S, extractor: FeatureExtractor, fusion: ScoreFusion, sink: K) -> Self {
    Self {
      source,
      extractor,
      fusion,
      sink,
      tags: RecordTags::default(),
      stage: CycleStage::Idle,
    }
  }

  pub fn with_tags(mut self, tags: RecordTags) -> Self {
    self.tags = tags;
    self
  }

  pub fn stage(&self) -> CycleStage {
    self.stage
  }

  pub fn extractor(&self) -> &FeatureExtractor {
    &self.extractor
  }

  pub fn sink(&self) -> &K {
    &self.sink
  }

  /// 执行一个完整周期；无论成败，结束后回到 Idle
  pub fn run_cycle(&mut self) -> Result<BusynessRecord, CycleError> {
    let result = self.step();
    self.stage = CycleStage::Idle;
    result
  }

  fn step(&mut self) -> Result<BusynessRecord, CycleError> {
    self.stage = CycleStage::Capturing;
    let frame = self.source.capture().map_err(CycleError::Capture)?;
    debug!("采集到 {}x{} 帧", frame.width(), frame.height());

    self.stage = CycleStage::Extracting;
    let features = self
      .extractor
      .extract(&frame)
      .map_err(CycleError::Extraction)?;

    self.stage = CycleStage::Fusing;
    let fused = self.fusion.fuse(&features).map_err(CycleError::Fusion)?;
    let record = BusynessRecord::new(frame.captured_at(), features, &fused);

    self.stage = CycleStage::Publishing;
    self
      .sink
      .publish(&record, &self.tags)
      .map_err(|e| CycleError::Publish(Box::new(e)))?;

    info!(
      "繁忙度 {}/10 (combined_raw={:.3}) @ {}",
      record.score,
      record.combined_raw,
      record.timestamp_text()
    );
    Ok(record)
  }
}

/// 运行结果统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
  pub cycles: u64,
  pub published: u64,
  pub failed: u64,
}

impl RunSummary {
  fn count(&mut self, result: &Result<BusynessRecord, CycleError>) {
    self.cycles += 1;
    match result {
      Ok(_) => self.published += 1,
      Err(_) => self.failed += 1,
    }
  }
}

pub trait Task<S, K>: Sized {
  type Error;
  fn run_task(self, monitor: &mut Monitor<S, K>) -> Result<RunSummary, Self::Error>;
}

/// 只执行一个周期，失败即返回错误
pub struct OneShotTask;

impl<S, K> Task<S, K> for OneShotTask
where
  S: FrameSource,
  K: Sink,
  K::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = CycleError;

  fn run_task(self, monitor: &mut Monitor<S, K>) -> Result<RunSummary, Self::Error> {
    info!("开始单次监测...");
    let now = Instant::now();
    let result = monitor.run_cycle();
    let mut summary = RunSummary::default();
    summary.count(&result);
    match result {
      Ok(_) => {
        info!("单次监测完成，耗时: {:.2?}", now.elapsed());
        Ok(summary)
      }
      Err(e) => {
        error!(stage = %e.stage(), "单次监测失败: {}", e);
        Err(e)
      }
    }
  }
}

/// 按固定间隔持续监测，单个周期失败不会终止循环
#[derive(Debug)]
pub struct ContinuousTask {
  interval: Duration,
  max_cycles: Option<u64>,
  shutdown: Option<Receiver<()>>,
}

impl Default for ContinuousTask {
  fn default() -> Self {
    Self {
      interval: DEFAULT_INTERVAL,
      max_cycles: None,
      shutdown: None,
    }
  }
}

impl ContinuousTask {
  pub fn with_interval(mut self, interval: Duration) -> Self {
    self.interval = interval;
    self
  }

  pub fn with_max_cycles(mut self, max_cycles: Option<u64>) -> Self {
    self.max_cycles = max_cycles;
    self
  }

  /// 收到消息后在周期边界退出
  pub fn with_shutdown(mut self, shutdown: Receiver<()>) -> Self {
    self.shutdown = Some(shutdown);
    self
  }

  fn interrupted(&self) -> bool {
    match &self.shutdown {
      Some(rx) => match rx.try_recv() {
        Ok(()) => true,
        Err(TryRecvError::Empty | TryRecvError::Disconnected) => false,
      },
      None => false,
    }
  }

  /// 等待到下一个周期，期间收到中断则返回 true
  fn wait(&self, duration: Duration) -> bool {
    if duration.is_zero() {
      return self.interrupted();
    }
    match &self.shutdown {
      Some(rx) => match rx.recv_timeout(duration) {
        Ok(()) => true,
        Err(RecvTimeoutError::Timeout) => false,
        Err(RecvTimeoutError::Disconnected) => {
          thread::sleep(duration);
          false
        }
      },
      None => {
        thread::sleep(duration);
        false
      }
    }
  }
}

impl<S, K> Task<S, K> for ContinuousTask
where
  S: FrameSource,
  K: Sink,
  K::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = CycleError;

  fn run_task(self, monitor: &mut Monitor<S, K>) -> Result<RunSummary, Self::Error> {
    info!("开始持续监测，间隔 {:?}", self.interval);
    let mut summary = RunSummary::default();

    loop {
      if self.interrupted() {
        warn!("中断信号接收，退出监测循环");
        break;
      }

      let started = Instant::now();
      info!("第 {} 个周期开始", summary.cycles + 1);
      let result = monitor.run_cycle();
      if let Err(e) = &result {
        error!(stage = %e.stage(), "周期失败: {}", e);
      }
      summary.count(&result);

      if self.max_cycles.is_some_and(|n| summary.cycles >= n) {
        info!("达到指定周期数 {}, 退出监测循环", summary.cycles);
        break;
      }

      let remaining = self.interval.saturating_sub(started.elapsed());
      info!("等待 {:.1} 秒后进入下一周期", remaining.as_secs_f64());
      if self.wait(remaining) {
        warn!("中断信号接收，退出监测循环");
        break;
      }
    }

    info!(
      "监测结束: 共 {} 个周期，成功 {}，失败 {}",
      summary.cycles, summary.published, summary.failed
    );
    Ok(summary)
  }
}

/// 安装 Ctrl-C 处理；第二次信号或超时后强制退出
pub fn install_interrupt_handler() -> Result<Receiver<()>, ctrlc::Error> {
  let (tx, rx) = mpsc::channel();
  ctrlc::set_handler(move || {
    info!("收到中断信号，当前周期结束后退出...");
    if tx.send(()).is_err() {
      warn!("监测循环已结束，立即退出");
      std::process::exit(1);
    }
    thread::spawn(|| {
      thread::sleep(FORCE_EXIT_AFTER);
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })?;
  Ok(rx)
}

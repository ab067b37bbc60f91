// 该文件是 Xianmang （闲忙） 项目的一部分。
// src/input/v4l_input.rs - V4L 摄像头输入
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

//! V4L2 摄像头输入。
//!
//! 采样间隔通常是几十秒，因此每次采集都重新打开设备并建立捕获流，
//! 丢弃最初几帧（自动曝光尚未稳定），取下一帧作为结果。这样两次采集之间
//! 设备处于空闲状态，也不会读到驱动队列里积压的旧帧。

use image::ImageFormat;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;
use v4l::{
  Device, FourCC, buffer::Type, io::mmap::Stream, io::traits::CaptureStream, video::Capture,
};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, FrameError},
  input::{CaptureError, FrameSource},
};

const DEFAULT_DEVICE: &str = "/dev/video0";
const REQUEST_WIDTH: u32 = 1280;
const REQUEST_HEIGHT: u32 = 720;
const STREAM_BUFFERS: u32 = 4;
const WARMUP_FRAMES: usize = 3;

#[derive(Error, Debug)]
pub enum V4lInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("无法打开设备 {0}: {1}")]
  OpenDevice(String, std::io::Error),
  #[error("设备格式协商失败: {0}")]
  Format(std::io::Error),
  #[error("捕获流错误: {0}")]
  Stream(std::io::Error),
  #[error("不支持的像素格式: {0}")]
  UnsupportedPixelFormat(String),
  #[error("缓冲区大小不匹配: 期望 {expected} 字节, 实际 {actual} 字节")]
  BufferSizeMismatch { expected: usize, actual: usize },
  #[error("MJPEG 解码失败: {0}")]
  Decode(#[from] image::ImageError),
  #[error("帧数据无效: {0}")]
  Frame(#[from] FrameError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelFormat {
  Yuyv,
  Mjpeg,
  Rgb24,
}

impl PixelFormat {
  fn from_fourcc(fourcc: FourCC) -> Result<Self, V4lInputError> {
    match &fourcc.repr {
      b"YUYV" => Ok(PixelFormat::Yuyv),
      b"MJPG" => Ok(PixelFormat::Mjpeg),
      b"RGB3" => Ok(PixelFormat::Rgb24),
      other => Err(V4lInputError::UnsupportedPixelFormat(
        String::from_utf8_lossy(other).into_owned(),
      )),
    }
  }
}

pub struct V4lInput {
  device_path: String,
}

impl FromUrlWithScheme for V4lInput {
  const SCHEME: &'static str = "v4l";
}

impl FromUrl for V4lInput {
  type Error = V4lInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(V4lInputError::SchemaMismatch);
    }

    // v4l:///dev/video0
    let device_path = if url.path().is_empty() || url.path() == "/" {
      DEFAULT_DEVICE.to_string()
    } else {
      url.path().to_string()
    };

    Self::open(&device_path)
  }
}

impl V4lInput {
  /// 打开设备并协商输出格式
  pub fn open(device_path: &str) -> Result<Self, V4lInputError> {
    let device = Device::with_path(device_path)
      .map_err(|e| V4lInputError::OpenDevice(device_path.to_string(), e))?;
    let (width, height, pixel_format) = Self::negotiate(&device)?;
    info!(
      "摄像头 {} 已就绪: {}x{} {:?}",
      device_path, width, height, pixel_format
    );

    Ok(Self {
      device_path: device_path.to_string(),
    })
  }

  fn negotiate(device: &Device) -> Result<(u32, u32, PixelFormat), V4lInputError> {
    let mut format = device.format().map_err(V4lInputError::Format)?;
    format.width = REQUEST_WIDTH;
    format.height = REQUEST_HEIGHT;
    format.fourcc = FourCC::new(b"YUYV");
    let format = match device.set_format(&format) {
      Ok(format) => format,
      Err(e) => {
        debug!("设置 YUYV 格式失败, 使用设备当前格式: {}", e);
        device.format().map_err(V4lInputError::Format)?
      }
    };
    let pixel_format = PixelFormat::from_fourcc(format.fourcc)?;
    Ok((format.width, format.height, pixel_format))
  }

  fn capture_frame(&self) -> Result<Frame, V4lInputError> {
    let device = Device::with_path(&self.device_path)
      .map_err(|e| V4lInputError::OpenDevice(self.device_path.clone(), e))?;
    let (width, height, pixel_format) = Self::negotiate(&device)?;

    let mut stream = Stream::with_buffers(&device, Type::VideoCapture, STREAM_BUFFERS)
      .map_err(V4lInputError::Stream)?;
    for _ in 0..WARMUP_FRAMES {
      stream.next().map_err(V4lInputError::Stream)?;
    }
    let (buffer, meta) = stream.next().map_err(V4lInputError::Stream)?;
    let used = (meta.bytesused as usize).min(buffer.len());
    let data = if used > 0 { &buffer[..used] } else { buffer };

    let frame = match pixel_format {
      PixelFormat::Yuyv => {
        let raw = exact_prefix(data, frame_bytes(width, height, 2))?;
        Frame::from_raw(width, height, yuyv_to_rgb(raw))?
      }
      PixelFormat::Rgb24 => {
        let raw = exact_prefix(data, frame_bytes(width, height, 3))?;
        Frame::from_raw(width, height, raw.to_vec())?
      }
      PixelFormat::Mjpeg => {
        Frame::now(image::load_from_memory_with_format(data, ImageFormat::Jpeg)?.to_rgb8())?
      }
    };
    Ok(frame)
  }
}

impl FrameSource for V4lInput {
  fn capture(&mut self) -> Result<Frame, CaptureError> {
    Ok(self.capture_frame()?)
  }
}

/// 一帧原始数据的字节数
fn frame_bytes(width: u32, height: u32, bytes_per_pixel: usize) -> usize {
  width as usize * height as usize * bytes_per_pixel
}

/// 驱动给出的缓冲区可能带填充，只取一帧所需的长度
fn exact_prefix(data: &[u8], expected: usize) -> Result<&[u8], V4lInputError> {
  data
    .get(..expected)
    .ok_or(V4lInputError::BufferSizeMismatch {
      expected,
      actual: data.len(),
    })
}

/// 将 YUYV 格式转换为 RGB
fn yuyv_to_rgb(yuyv: &[u8]) -> Vec<u8> {
  let mut rgb = Vec::with_capacity(yuyv.len() / 2 * 3);

  for chunk in yuyv.chunks_exact(4) {
    let y0 = chunk[0] as f32;
    let u = chunk[1] as f32 - 128.0;
    let y1 = chunk[2] as f32;
    let v = chunk[3] as f32 - 128.0;

    for y in [y0, y1] {
      let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
      rgb.extend_from_slice(&[r, g, b]);
    }
  }

  rgb
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn neutral_chroma_is_gray() {
    let rgb = yuyv_to_rgb(&[16, 128, 235, 128]);
    assert_eq!(rgb, vec![16, 16, 16, 235, 235, 235]);
  }

  #[test]
  fn pixel_formats_from_fourcc() {
    assert_eq!(
      PixelFormat::from_fourcc(FourCC::new(b"YUYV")).unwrap(),
      PixelFormat::Yuyv
    );
    assert_eq!(
      PixelFormat::from_fourcc(FourCC::new(b"MJPG")).unwrap(),
      PixelFormat::Mjpeg
    );
    assert!(matches!(
      PixelFormat::from_fourcc(FourCC::new(b"NV12")),
      Err(V4lInputError::UnsupportedPixelFormat(s)) if s == "NV12"
    ));
  }

  #[test]
  fn padded_buffer_is_trimmed_and_short_buffer_rejected() {
    let padded = [1u8; 10];
    assert_eq!(exact_prefix(&padded, 8).unwrap().len(), 8);
    assert!(matches!(
      exact_prefix(&padded[..6], 8),
      Err(V4lInputError::BufferSizeMismatch {
        expected: 8,
        actual: 6
      })
    ));
  }

  #[cfg(target_pointer_width = "64")]
  #[test]
  fn frame_size_does_not_wrap_in_u32() {
    assert_eq!(frame_bytes(1280, 720, 2), 1_843_200);
    // 65536 x 32768 x 2 超出 u32
    assert_eq!(frame_bytes(65_536, 32_768, 2), 1usize << 32);
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("image:///tmp/a.png").unwrap();
    assert!(matches!(
      V4lInput::from_url(&url),
      Err(V4lInputError::SchemaMismatch)
    ));
  }
}

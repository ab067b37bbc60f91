// 该文件是 Xianmang （闲忙） 项目的一部分。
// src/input.rs - 帧来源
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

use crate::{
  FromUrl,
  frame::{Frame, FrameError},
};

/// 每次请求产生一帧；失败视为暂时性错误，由下一个周期重试
pub trait FrameSource {
  fn capture(&mut self) -> Result<Frame, CaptureError>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
  fn capture(&mut self) -> Result<Frame, CaptureError> {
    (**self).capture()
  }
}

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "v4l_input")]
mod v4l_input;
#[cfg(feature = "v4l_input")]
pub use self::v4l_input::{V4lInput, V4lInputError};

#[derive(Error, Debug)]
pub enum CaptureError {
  #[cfg(feature = "read_image_file")]
  #[error("图像文件输入错误: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[cfg(feature = "v4l_input")]
  #[error("V4L 输入错误: {0}")]
  V4lInputError(#[from] V4lInputError),
  #[error("帧数据无效: {0}")]
  FrameError(#[from] FrameError),
  #[error("设备不可用: {0}")]
  DeviceUnavailable(String),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum InputWrapper {
  #[cfg(feature = "v4l_input")]
  V4l(V4lInput),
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
}

impl FromUrl for InputWrapper {
  type Error = CaptureError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "v4l_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == V4lInput::SCHEME {
        return Ok(InputWrapper::V4l(V4lInput::from_url(url)?));
      }
    }
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        return Ok(InputWrapper::ReadImageFile(ImageFileInput::from_url(url)?));
      }
    }
    Err(CaptureError::SchemeMismatch(url.scheme().to_string()))
  }
}

/// 摄像头序号对应的输入地址，例如 `0` 对应 `v4l:///dev/video0`
pub fn device_url(index: u32) -> Result<url::Url, url::ParseError> {
  url::Url::parse(&format!("v4l:///dev/video{}", index))
}

impl FrameSource for InputWrapper {
  fn capture(&mut self) -> Result<Frame, CaptureError> {
    match self {
      #[cfg(feature = "v4l_input")]
      InputWrapper::V4l(input) => input.capture(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.capture(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn device_index_maps_to_v4l_path() {
    let url = device_url(2).unwrap();
    assert_eq!(url.scheme(), "v4l");
    assert_eq!(url.path(), "/dev/video2");
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = url::Url::parse("rtsp://camera.local/stream").unwrap();
    assert!(matches!(
      InputWrapper::from_url(&url),
      Err(CaptureError::SchemeMismatch(s)) if s == "rtsp"
    ));
  }
}

// 该文件是 Paizhao （牌照） 项目的一部分。
// src/input.rs - 图像输入解码
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

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("Empty image payload")]
  Empty,
  #[error("Image decoding error: {0}")]
  Image(#[from] image::ImageError),
  #[error("Image has zero extent: {0}x{1}")]
  ZeroExtent(u32, u32),
}

/// 在内存中解码上传的图像字节，统一转换为 RGB
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
  if bytes.is_empty() {
    error!("Image payload is empty");
    return Err(DecodeError::Empty);
  }

  let decoded = image::load_from_memory(bytes).inspect_err(|e| {
    error!("Failed to decode image payload ({} bytes): {}", bytes.len(), e);
  })?;
  debug!("Decoded image color type: {:?}", decoded.color());

  let image = decoded.to_rgb8();
  let (width, height) = image.dimensions();
  if width == 0 || height == 0 {
    return Err(DecodeError::ZeroExtent(width, height));
  }

  Ok(image)
}

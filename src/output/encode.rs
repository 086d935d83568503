// 该文件是 Paizhao （牌照） 项目的一部分。
// src/output/encode.rs - 图像编码与传输表示
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

use std::{fmt, io::Cursor};

use base64::{Engine, prelude::BASE64_STANDARD};
use image::{ImageFormat, RgbImage};
use serde::{Serialize, Serializer};

const PNG_MIME: &str = "image/png";

/// 内存中 PNG 编码的图像，序列化为 data URL 以便内嵌显示
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
  bytes: Vec<u8>,
}

impl EncodedImage {
  pub fn encode_png(image: &RgbImage) -> Result<Self, image::ImageError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(Self { bytes })
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.bytes
  }

  pub fn mime(&self) -> &'static str {
    PNG_MIME
  }

  pub fn to_data_url(&self) -> String {
    format!("data:{};base64,{}", PNG_MIME, BASE64_STANDARD.encode(&self.bytes))
  }

  pub fn decode(&self) -> Result<RgbImage, image::ImageError> {
    Ok(image::load_from_memory_with_format(&self.bytes, ImageFormat::Png)?.to_rgb8())
  }
}

impl fmt::Debug for EncodedImage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "EncodedImage({}, {} bytes)", PNG_MIME, self.bytes.len())
  }
}

impl Serialize for EncodedImage {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.to_data_url())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn test_png_data_url() {
    let image = RgbImage::from_pixel(4, 3, Rgb([10, 20, 30]));
    let encoded = EncodedImage::encode_png(&image).unwrap();

    let url = encoded.to_data_url();
    assert!(url.starts_with("data:image/png;base64,"));
    let payload = BASE64_STANDARD
      .decode(url.trim_start_matches("data:image/png;base64,"))
      .unwrap();
    assert_eq!(payload, encoded.as_bytes());

    assert_eq!(encoded.decode().unwrap(), image);
  }

  #[test]
  fn test_serializes_as_string() {
    let encoded = EncodedImage::encode_png(&RgbImage::new(1, 1)).unwrap();
    let value = serde_json::to_value(&encoded).unwrap();
    assert_eq!(value, serde_json::Value::String(encoded.to_data_url()));
  }
}

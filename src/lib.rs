// 该文件是 Tumbler Probe 项目的一部分。
// src/lib.rs - 库主文件
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Tumbler Probe 贡献者

pub mod config;
pub mod decoder;
pub mod detector;
pub mod encoder;
pub mod frame;
pub mod input;
pub mod logging;
pub mod model;
pub mod output;
pub mod task;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 把 URL 的路径部分解码为本地文件路径
pub(crate) fn url_file_path(
  url: &url::Url,
) -> Result<std::path::PathBuf, std::string::FromUtf8Error> {
  let path = urlencoding::decode(url.path())?;
  Ok(std::path::PathBuf::from(path.into_owned()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::PathBuf;

  #[test]
  fn test_url_file_path_decodes_escapes() {
    let url = url::Url::parse("image:///sdcard/my photos/fish 3.png").unwrap();
    assert_eq!(url.path(), "/sdcard/my%20photos/fish%203.png");
    assert_eq!(
      url_file_path(&url).unwrap(),
      PathBuf::from("/sdcard/my photos/fish 3.png")
    );
  }

  #[test]
  fn test_url_file_path_rejects_invalid_utf8() {
    let url = url::Url::parse("model:///assets/rhm%FF.onnx").unwrap();
    assert!(url_file_path(&url).is_err());
  }
}

mod zlib_codec;

pub use zlib_codec::ZlibCodec;

use binz_core::Codec;

/// Resolve a codec from the name used on the command line.
pub fn codec_by_name(name: &str, level: u32) -> anyhow::Result<Box<dyn Codec>> {
    match name {
        "zlib" | "deflate" | "z" => Ok(Box::new(ZlibCodec::new(level))),
        other => anyhow::bail!("unknown codec '{}'; valid options: zlib", other),
    }
}

//! Decoder for the binary PPM (`P6`) stream ffmpeg writes with `-c:v ppm`.

use std::io::{BufRead, ErrorKind, Read};

use anyhow::{bail, Context, Result};
use image::RgbImage;

/// Largest edge accepted from a header; guards the allocation below.
const MAX_EDGE: u32 = 16_384;

/// Reads consecutive PPM images from a byte stream.
pub struct PpmReader<R> {
    inner: R,
}

impl<R: BufRead> PpmReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Next image, or `None` when the stream ends cleanly between images.
    pub fn next_image(&mut self) -> Result<Option<RgbImage>> {
        if self.inner.fill_buf()?.is_empty() {
            return Ok(None);
        }

        let magic = self.token()?.context("stream ended inside PPM header")?;
        if magic != "P6" {
            bail!("unsupported PPM magic {magic:?}");
        }
        let width = self.number("width")?;
        let height = self.number("height")?;
        let maxval = self.number("maxval")?;
        if maxval != 255 {
            bail!("unsupported PPM maxval {maxval}");
        }
        if width == 0 || height == 0 || width > MAX_EDGE || height > MAX_EDGE {
            bail!("implausible PPM size {width}x{height}");
        }

        let len = width as usize * height as usize * 3;
        let mut data = vec![0u8; len];
        self.inner.read_exact(&mut data).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                anyhow::anyhow!("truncated PPM frame ({width}x{height})")
            } else {
                e.into()
            }
        })?;

        RgbImage::from_raw(width, height, data)
            .map(Some)
            .context("PPM buffer does not match header size")
    }

    fn number(&mut self, what: &str) -> Result<u32> {
        let tok = self
            .token()?
            .with_context(|| format!("stream ended before PPM {what}"))?;
        tok.parse()
            .with_context(|| format!("bad PPM {what} {tok:?}"))
    }

    /// Next whitespace-delimited header token. Consumes exactly one trailing
    /// whitespace byte, which is the separator before the raster.
    fn token(&mut self) -> Result<Option<String>> {
        let mut tok = String::new();
        loop {
            let Some(byte) = self.byte()? else {
                return Ok((!tok.is_empty()).then_some(tok));
            };
            match byte {
                b'#' if tok.is_empty() => self.skip_comment()?,
                b if b.is_ascii_whitespace() => {
                    if !tok.is_empty() {
                        return Ok(Some(tok));
                    }
                }
                b => {
                    if tok.len() > 16 {
                        bail!("oversized PPM header token");
                    }
                    tok.push(b as char);
                }
            }
        }
    }

    fn skip_comment(&mut self) -> Result<()> {
        while let Some(b) = self.byte()? {
            if b == b'\n' {
                break;
            }
        }
        Ok(())
    }

    fn byte(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        match self.inner.read(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }
}

/// Decode a buffer holding exactly one PPM image.
pub fn decode_single(bytes: &[u8]) -> Result<RgbImage> {
    PpmReader::new(bytes)
        .next_image()?
        .context("no image in ffmpeg output")
}

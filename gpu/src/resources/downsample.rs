//! Software mip generation.
//!
//! Each level is a 2x2 box filter of its parent. Four-channel formats weight
//! color by alpha so fully transparent texels do not bleed into their
//! neighbours; alpha itself is a straight average.

use bytemuck::{Pod, Zeroable};

use crate::format::{TexFormat, mip_dimensions};

/// A scalar channel the box filter can average.
trait Channel: Pod {
    /// Value treated as fully opaque when weighting by alpha.
    const MAX: f32;

    fn to_f32(self) -> f32;
    fn from_f32(value: f32) -> Self;
    fn average(values: [Self; 4]) -> Self;
}

impl Channel for u8 {
    const MAX: f32 = 255.0;

    fn to_f32(self) -> f32 {
        self as f32
    }

    fn from_f32(value: f32) -> Self {
        value as u8
    }

    fn average(v: [Self; 4]) -> Self {
        ((v[0] as u32 + v[1] as u32 + v[2] as u32 + v[3] as u32) / 4) as u8
    }
}

impl Channel for u16 {
    const MAX: f32 = 65535.0;

    fn to_f32(self) -> f32 {
        self as f32
    }

    fn from_f32(value: f32) -> Self {
        value as u16
    }

    fn average(v: [Self; 4]) -> Self {
        ((v[0] as u32 + v[1] as u32 + v[2] as u32 + v[3] as u32) / 4) as u16
    }
}

impl Channel for i16 {
    const MAX: f32 = 32762.0;

    fn to_f32(self) -> f32 {
        self as f32
    }

    fn from_f32(value: f32) -> Self {
        value as i16
    }

    fn average(v: [Self; 4]) -> Self {
        ((v[0] as i32 + v[1] as i32 + v[2] as i32 + v[3] as i32) / 4) as i16
    }
}

impl Channel for f32 {
    const MAX: f32 = 1.0;

    fn to_f32(self) -> f32 {
        self
    }

    fn from_f32(value: f32) -> Self {
        value
    }

    fn average(v: [Self; 4]) -> Self {
        (v[0] + v[1] + v[2] + v[3]) / 4.0
    }
}

/// The four source texel indices feeding destination texel (x, y).
///
/// Odd source sizes clamp to the last row or column.
fn quad(x: u32, y: u32, width: u32, height: u32) -> [usize; 4] {
    let x0 = (x * 2).min(width - 1);
    let x1 = (x * 2 + 1).min(width - 1);
    let y0 = (y * 2).min(height - 1);
    let y1 = (y * 2 + 1).min(height - 1);
    let at = |x: u32, y: u32| (y * width + x) as usize;
    [at(x0, y0), at(x1, y0), at(x0, y1), at(x1, y1)]
}

/// Alpha-weighted box filter over four-channel texels, alpha last.
fn downsample_weighted<T: Channel>(src: &[T], width: u32, height: u32) -> (Vec<T>, u32, u32) {
    const C: usize = 4;
    let (out_w, out_h) = mip_dimensions(width, height, 1);
    let mut out = Vec::with_capacity((out_w * out_h) as usize * C);

    for y in 0..out_h {
        for x in 0..out_w {
            let texels = quad(x, y, width, height).map(|i| &src[i * C..i * C + C]);
            let weights = texels.map(|t| t[3].to_f32() / T::MAX);
            let total: f32 = weights.iter().sum();

            for c in 0..3 {
                let value = if total > 0.0 {
                    texels
                        .iter()
                        .zip(weights)
                        .map(|(t, w)| t[c].to_f32() * w)
                        .sum::<f32>()
                        / total
                } else {
                    texels.iter().map(|t| t[c].to_f32()).sum::<f32>() / 4.0
                };
                out.push(T::from_f32(value));
            }
            out.push(T::average(texels.map(|t| t[3])));
        }
    }
    (out, out_w, out_h)
}

/// Plain box filter applied to each of `channels` channels independently.
fn downsample_plain<T: Channel>(
    src: &[T],
    channels: usize,
    width: u32,
    height: u32,
) -> (Vec<T>, u32, u32) {
    let (out_w, out_h) = mip_dimensions(width, height, 1);
    let mut out = Vec::with_capacity((out_w * out_h) as usize * channels);

    for y in 0..out_h {
        for x in 0..out_w {
            let quad = quad(x, y, width, height);
            for c in 0..channels {
                out.push(T::average(quad.map(|i| src[i * channels + c])));
            }
        }
    }
    (out, out_w, out_h)
}

fn run<T: Channel>(
    src: &[u8],
    width: u32,
    height: u32,
    kernel: impl Fn(&[T], u32, u32) -> (Vec<T>, u32, u32),
) -> (Vec<u8>, u32, u32) {
    let mut texels = vec![<T as Zeroable>::zeroed(); src.len() / std::mem::size_of::<T>()];
    bytemuck::cast_slice_mut::<T, u8>(&mut texels).copy_from_slice(src);
    let (out, w, h) = kernel(&texels, width, height);
    (bytemuck::cast_slice::<T, u8>(&out).to_vec(), w, h)
}

fn level_len(format: TexFormat, width: u32, height: u32) -> Option<usize> {
    usize::try_from(format.memory(width, height)?).ok()
}

/// Produce the next mip level of a `width` x `height` image.
///
/// Returns `None` for formats without a software kernel or when `src` is
/// smaller than one full level.
pub fn downsample(format: TexFormat, src: &[u8], width: u32, height: u32) -> Option<(Vec<u8>, u32, u32)> {
    if width == 0 || height == 0 {
        return None;
    }
    let src = src.get(..level_len(format, width, height)?)?;

    Some(match format {
        TexFormat::Rgba32 | TexFormat::Rgba32Linear | TexFormat::Bgra32 | TexFormat::Bgra32Linear => {
            run::<u8>(src, width, height, downsample_weighted)
        }
        TexFormat::Rgba64u => run::<u16>(src, width, height, downsample_weighted),
        TexFormat::Rgba64s => run::<i16>(src, width, height, downsample_weighted),
        TexFormat::Rgba128 => run::<f32>(src, width, height, downsample_weighted),
        TexFormat::Depth32 | TexFormat::R32 => {
            run::<f32>(src, width, height, |s, w, h| downsample_plain(s, 1, w, h))
        }
        TexFormat::Depth16 | TexFormat::R16u => {
            run::<u16>(src, width, height, |s, w, h| downsample_plain(s, 1, w, h))
        }
        TexFormat::R16s => run::<i16>(src, width, height, |s, w, h| downsample_plain(s, 1, w, h)),
        TexFormat::R8g8 => run::<u8>(src, width, height, |s, w, h| downsample_plain(s, 2, w, h)),
        TexFormat::R8 => run::<u8>(src, width, height, |s, w, h| downsample_plain(s, 1, w, h)),
        _ => return None,
    })
}

/// Build a contiguous mip chain, level 0 first, from a single top level.
pub fn build_mip_chain(
    format: TexFormat,
    top: &[u8],
    width: u32,
    height: u32,
    mip_count: u32,
) -> Option<Vec<u8>> {
    let top = top.get(..level_len(format, width, height)?)?;
    let mut chain = top.to_vec();
    let mut level = top.to_vec();
    let (mut w, mut h) = (width, height);

    for _ in 1..mip_count {
        let (next, nw, nh) = downsample(format, &level, w, h)?;
        chain.extend_from_slice(&next);
        level = next;
        (w, h) = (nw, nh);
    }
    Some(chain)
}

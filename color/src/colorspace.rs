// alpenglow/color/src/colorspace.rs
//
// Copyright © 2024 The Alpenglow Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Color-space conversions backing the DAG's `SRGB<->LinearSRGB`,
//! `DisplayP3<->LinearSRGB`, and `Oklab<->LinearSRGB` nodes. Every
//! conversion routes through linear sRGB as the pivot space, the way the
//! CSS Color 4 matrices below are defined; alpha always passes through
//! unmodified.

use crate::ColorF;

/// A color space a `ColorF` can be tagged as living in. The DAG only ever
/// needs pairwise conversions to and from `LinearSrgb`; `convert` chains
/// through it for the P3/Oklab cases.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Colorspace {
    Srgb,
    LinearSrgb,
    DisplayP3,
    Oklab,
}

pub fn convert(color: ColorF, from: Colorspace, to: Colorspace) -> ColorF {
    if from == to {
        return color;
    }
    let linear = to_linear_srgb(color, from);
    from_linear_srgb(linear, to)
}

fn to_linear_srgb(color: ColorF, from: Colorspace) -> ColorF {
    match from {
        Colorspace::LinearSrgb => color,
        Colorspace::Srgb => map_rgb(color, srgb_channel_to_linear),
        Colorspace::DisplayP3 => linear_p3_to_linear_srgb(map_rgb(color, srgb_channel_to_linear)),
        Colorspace::Oklab => oklab_to_linear_srgb(color),
    }
}

fn from_linear_srgb(color: ColorF, to: Colorspace) -> ColorF {
    match to {
        Colorspace::LinearSrgb => color,
        Colorspace::Srgb => map_rgb(color, linear_channel_to_srgb),
        Colorspace::DisplayP3 => map_rgb(linear_srgb_to_linear_p3(color), linear_channel_to_srgb),
        Colorspace::Oklab => linear_srgb_to_oklab(color),
    }
}

fn map_rgb(color: ColorF, f: impl Fn(f32) -> f32) -> ColorF {
    ColorF::new(f(color.r), f(color.g), f(color.b), color.a)
}

/// IEC 61966-2-1 sRGB electro-optical transfer function, decode direction.
pub fn srgb_channel_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// IEC 61966-2-1 sRGB electro-optical transfer function, encode direction.
pub fn linear_channel_to_srgb(c: f32) -> f32 {
    if c <= 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

// Display P3 shares sRGB's transfer function (CSS Color 4 `display-p3`);
// only the RGB primaries differ, captured by this D65 linear-space
// transform matrix pair.

fn linear_srgb_to_linear_p3(color: ColorF) -> ColorF {
    let (r, g, b) = (color.r, color.g, color.b);
    ColorF::new(
        0.822_461_99 * r + 0.177_538_01 * g + 0.000_000_00 * b,
        0.033_194_20 * r + 0.966_805_80 * g + 0.000_000_00 * b,
        0.017_082_631 * r + 0.072_397_44 * g + 0.910_519_93 * b,
        color.a,
    )
}

fn linear_p3_to_linear_srgb(color: ColorF) -> ColorF {
    let (r, g, b) = (color.r, color.g, color.b);
    ColorF::new(
        2.493_496_9 * r - 0.931_383_6 * g - 0.402_710_78 * b,
        -0.829_489 * r + 1.762_664_1 * g + 0.023_624_686 * b,
        0.035_845_83 * r - 0.076_172_39 * g + 0.956_884_5 * b,
        color.a,
    )
}

// Oklab, per Björn Ottosson's published matrices. Operates on
// non-premultiplied linear sRGB; alpha passes through.

fn linear_srgb_to_oklab(color: ColorF) -> ColorF {
    let (r, g, b) = (color.r, color.g, color.b);

    let l = 0.412_221_47 * r + 0.536_332_54 * g + 0.051_445_994 * b;
    let m = 0.211_903_5 * r + 0.680_699_5 * g + 0.107_396_96 * b;
    let s = 0.088_302_46 * r + 0.281_718_84 * g + 0.629_978_7 * b;

    let l_ = l.cbrt();
    let m_ = m.cbrt();
    let s_ = s.cbrt();

    ColorF::new(
        0.210_454_26 * l_ + 0.793_617_8 * m_ - 0.004_072_047 * s_,
        1.977_998_5 * l_ - 2.428_592_2 * m_ + 0.450_593_7 * s_,
        0.025_904_037 * l_ + 0.782_771_77 * m_ - 0.808_675_77 * s_,
        color.a,
    )
}

fn oklab_to_linear_srgb(color: ColorF) -> ColorF {
    let (l, a, b) = (color.r, color.g, color.b);

    let l_ = l + 0.396_337_78 * a + 0.215_803_76 * b;
    let m_ = l - 0.105_561_346 * a - 0.063_854_17 * b;
    let s_ = l - 0.089_484_18 * a - 1.291_485_5 * b;

    let l = l_ * l_ * l_;
    let m = m_ * m_ * m_;
    let s = s_ * s_ * s_;

    ColorF::new(
        4.076_741_7 * l - 3.307_711_6 * m + 0.230_969_93 * s,
        -1.268_438 * l + 2.609_757_4 * m - 0.341_319_4 * s,
        -0.004_196_086 * l - 0.703_418_6 * m + 1.707_614_7 * s,
        color.a,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_linear_round_trip() {
        for &c in &[0.0_f32, 0.02, 0.2, 0.5, 0.9, 1.0] {
            let round_tripped = linear_channel_to_srgb(srgb_channel_to_linear(c));
            assert!((round_tripped - c).abs() < 1e-5, "{} -> {}", c, round_tripped);
        }
    }

    #[test]
    fn display_p3_round_trip_through_linear_srgb() {
        let color = ColorF::new(0.3, 0.6, 0.9, 1.0);
        let to_p3 = convert(color, Colorspace::LinearSrgb, Colorspace::DisplayP3);
        let back = convert(to_p3, Colorspace::DisplayP3, Colorspace::LinearSrgb);
        assert!((back.r - color.r).abs() < 1e-4);
        assert!((back.g - color.g).abs() < 1e-4);
        assert!((back.b - color.b).abs() < 1e-4);
    }

    #[test]
    fn oklab_round_trip_through_linear_srgb() {
        let color = ColorF::new(0.45, 0.12, 0.78, 0.5);
        let to_oklab = convert(color, Colorspace::LinearSrgb, Colorspace::Oklab);
        let back = convert(to_oklab, Colorspace::Oklab, Colorspace::LinearSrgb);
        assert!((back.r - color.r).abs() < 1e-3);
        assert!((back.g - color.g).abs() < 1e-3);
        assert!((back.b - color.b).abs() < 1e-3);
        assert_eq!(back.a, color.a);
    }

    #[test]
    fn identity_conversion_is_exact() {
        let color = ColorF::new(0.1, 0.2, 0.3, 0.4);
        assert_eq!(convert(color, Colorspace::Srgb, Colorspace::Srgb), color);
    }

    #[test]
    fn oklab_of_white_has_lightness_one() {
        let white = ColorF::new(1.0, 1.0, 1.0, 1.0);
        let oklab = convert(white, Colorspace::LinearSrgb, Colorspace::Oklab);
        assert!((oklab.r - 1.0).abs() < 1e-3);
        assert!(oklab.g.abs() < 1e-3);
        assert!(oklab.b.abs() < 1e-3);
    }
}

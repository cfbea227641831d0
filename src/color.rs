//! Packed color channels and the hue/saturation/brightness decomposition.
//!
//! Packed pixels are `0xAARRGGBB`. [`Hsb`] uses the classic hexcone model
//! with all three components in `[0, 1]`; converting back always yields an
//! opaque pixel.

use rgb::Rgba;

/// Alpha bits of a fully opaque packed pixel.
pub const OPAQUE: u32 = 0xFF00_0000;

/// Pack 8-bit channels into `0xAARRGGBB`.
#[inline]
pub const fn pack(r: u8, g: u8, b: u8, a: u8) -> u32 {
    (a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32
}

/// Pack an [`Rgba`] pixel into `0xAARRGGBB`.
#[inline]
pub fn pack_rgba(px: Rgba<u8>) -> u32 {
    pack(px.r, px.g, px.b, px.a)
}

/// Unpack `0xAARRGGBB` into an [`Rgba`] pixel.
#[inline]
pub fn unpack(argb: u32) -> Rgba<u8> {
    Rgba::new(
        (argb >> 16) as u8,
        (argb >> 8) as u8,
        argb as u8,
        (argb >> 24) as u8,
    )
}

/// Hue, saturation and brightness of one pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Hsb {
    /// Hue as a fraction of a full turn.
    pub hue: f32,
    /// Saturation.
    pub saturation: f32,
    /// Brightness (value), the largest channel over 255.
    pub brightness: f32,
}

impl Hsb {
    /// Create from components.
    pub const fn new(hue: f32, saturation: f32, brightness: f32) -> Self {
        Self {
            hue,
            saturation,
            brightness,
        }
    }

    /// Decompose 8-bit RGB channels.
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let cmax = r.max(g).max(b);
        let cmin = r.min(g).min(b);
        let brightness = cmax as f32 / 255.0;
        let saturation = if cmax != 0 {
            (cmax - cmin) as f32 / cmax as f32
        } else {
            0.0
        };
        if saturation == 0.0 {
            return Self::new(0.0, saturation, brightness);
        }
        let span = (cmax - cmin) as f32;
        let redc = (cmax - r) as f32 / span;
        let greenc = (cmax - g) as f32 / span;
        let bluec = (cmax - b) as f32 / span;
        let sector = if r == cmax {
            bluec - greenc
        } else if g == cmax {
            2.0 + redc - bluec
        } else {
            4.0 + greenc - redc
        };
        let mut hue = sector / 6.0;
        if hue < 0.0 {
            hue += 1.0;
        }
        Self::new(hue, saturation, brightness)
    }

    /// Decompose a packed pixel, ignoring alpha.
    #[inline]
    pub fn from_argb(argb: u32) -> Self {
        Self::from_rgb((argb >> 16) as u8, (argb >> 8) as u8, argb as u8)
    }

    /// Same hue and saturation with a new brightness.
    #[inline]
    pub fn with_brightness(self, brightness: f32) -> Self {
        Self { brightness, ..self }
    }

    /// Recompose 8-bit RGB channels.
    pub fn to_rgb(self) -> (u8, u8, u8) {
        let Self {
            hue,
            saturation,
            brightness,
        } = self;
        if saturation == 0.0 {
            let v = channel(brightness);
            return (v, v, v);
        }
        let h = (hue - hue.floor()) * 6.0;
        let f = h - h.floor();
        let p = brightness * (1.0 - saturation);
        let q = brightness * (1.0 - saturation * f);
        let t = brightness * (1.0 - saturation * (1.0 - f));
        let (r, g, b) = match h as u32 {
            0 => (brightness, t, p),
            1 => (q, brightness, p),
            2 => (p, brightness, t),
            3 => (p, q, brightness),
            4 => (t, p, brightness),
            _ => (brightness, p, q),
        };
        (channel(r), channel(g), channel(b))
    }

    /// Recompose an opaque packed pixel.
    #[inline]
    pub fn to_argb(self) -> u32 {
        let (r, g, b) = self.to_rgb();
        pack(r, g, b, 0xFF)
    }
}

/// Scale a unit value to a rounded 8-bit channel.
#[inline]
fn channel(v: f32) -> u8 {
    // `as` saturates, so NaN and negatives land on 0.
    ((v * 255.0 + 0.5) as u32).min(255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn pack_unpack() {
        let argb = pack(0x12, 0x34, 0x56, 0x78);
        assert_eq!(argb, 0x7812_3456);
        assert_eq!(unpack(argb), Rgba::new(0x12, 0x34, 0x56, 0x78));
        assert_eq!(pack_rgba(unpack(argb)), argb);
    }

    #[test]
    fn black_and_white() {
        let black = Hsb::from_argb(OPAQUE);
        assert_eq!(black, Hsb::new(0.0, 0.0, 0.0));
        let white = Hsb::from_argb(0xFFFF_FFFF);
        assert_eq!(white, Hsb::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn primary_hues() {
        let red = Hsb::from_rgb(255, 0, 0);
        assert!(close(red.hue, 0.0) && close(red.saturation, 1.0) && close(red.brightness, 1.0));
        let green = Hsb::from_rgb(0, 255, 0);
        assert!(close(green.hue, 1.0 / 3.0));
        let blue = Hsb::from_rgb(0, 0, 255);
        assert!(close(blue.hue, 2.0 / 3.0));
        // Negative sector wraps around.
        let magenta_ish = Hsb::from_rgb(255, 0, 128);
        assert!(magenta_ish.hue > 0.9 && magenta_ish.hue < 1.0);
    }

    #[test]
    fn gray_brightness_rounds() {
        assert_eq!(Hsb::new(0.0, 0.0, 0.5).to_argb(), 0xFF80_8080);
        assert_eq!(Hsb::new(0.0, 0.0, 1.0).to_argb(), 0xFFFF_FFFF);
        assert_eq!(Hsb::new(0.0, 0.0, 0.0).to_argb(), 0xFF00_0000);
    }

    #[test]
    fn out_of_range_brightness_clamps() {
        assert_eq!(Hsb::new(0.0, 0.0, 1.5).to_rgb(), (255, 255, 255));
        assert_eq!(Hsb::new(0.0, 0.0, -0.5).to_rgb(), (0, 0, 0));
    }

    #[test]
    fn round_trip_is_exact_for_8bit_colors() {
        for &(r, g, b) in &[
            (0u8, 0u8, 0u8),
            (255, 255, 255),
            (255, 0, 0),
            (12, 200, 99),
            (250, 251, 252),
            (1, 2, 3),
            (128, 64, 32),
            (90, 10, 200),
        ] {
            let argb = pack(r, g, b, 0xFF);
            assert_eq!(Hsb::from_argb(argb).to_argb(), argb, "rgb({r}, {g}, {b})");
        }
    }

    #[test]
    fn output_is_opaque() {
        let translucent = pack(10, 20, 30, 0x40);
        assert_eq!(Hsb::from_argb(translucent).to_argb() >> 24, 0xFF);
    }

    #[test]
    fn with_brightness_keeps_hue_and_saturation() {
        let hsb = Hsb::from_rgb(200, 100, 50).with_brightness(0.25);
        let orig = Hsb::from_rgb(200, 100, 50);
        assert_eq!(hsb.hue, orig.hue);
        assert_eq!(hsb.saturation, orig.saturation);
        assert_eq!(hsb.brightness, 0.25);
    }
}

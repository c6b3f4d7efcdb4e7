#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Rgb {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
}

impl Rgb {
    pub(crate) fn lerp(a: Rgb, b: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let lerp1 = |x: u8, y: u8| -> u8 {
            (x as f32 + (y as f32 - x as f32) * t).round().clamp(0.0, 255.0) as u8
        };
        Rgb {
            r: lerp1(a.r, b.r),
            g: lerp1(a.g, b.g),
            b: lerp1(a.b, b.b),
        }
    }
    pub(crate) fn to_color(self) -> crossterm::style::Color {
        crossterm::style::Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Rgba {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: u8,
}

// Radial falloff shapes. The cubic kernel is C1-continuous at the
// max_distance/3 seam so overlapping blobs fuse without visible rings
// under additive blending.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Falloff {
    Cubic { max_distance: f32, scaling: f32 },
    Flat(f32),
}

impl Falloff {
    pub(crate) fn eval(&self, d: f32) -> f32 {
        match *self {
            Falloff::Cubic {
                max_distance,
                scaling,
            } => {
                let m = max_distance.max(1e-6);
                if d < 0.0 {
                    0.0
                } else if d <= m / 3.0 {
                    let q = d / m;
                    scaling * (1.0 - 3.0 * q * q)
                } else if d <= m {
                    let q = 1.0 - d / m;
                    1.5 * scaling * q * q
                } else {
                    0.0
                }
            }
            Falloff::Flat(v) => v,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum ColorMap {
    // Lerp from outer to inner by the inner-gradient falloff value.
    TwoColor { outer: Rgb, inner: Rgb },
    Solid(Rgb),
}

impl ColorMap {
    fn eval(&self, _alpha: f32, inner_gradient: f32) -> Rgb {
        match *self {
            ColorMap::TwoColor { outer, inner } => Rgb::lerp(outer, inner, inner_gradient),
            ColorMap::Solid(c) => c,
        }
    }
}

// A (2*radius)^2 RGBA grid; each texel is a pure function of its offset
// from the grid center, so regeneration from the same inputs is
// bit-identical.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Texture {
    pub(crate) radius: u32,
    pub(crate) size: u32,
    pub(crate) texels: Vec<Rgba>,
}

impl Texture {
    pub(crate) fn generate(
        radius: u32,
        shape: &Falloff,
        color_shape: &Falloff,
        color: &ColorMap,
    ) -> Texture {
        let radius = radius.max(1);
        let size = radius * 2;
        let r = radius as f32;
        let mut texels = Vec::with_capacity((size * size) as usize);

        for y in 0..size {
            for x in 0..size {
                let dx = x as f32 / r - 1.0;
                let dy = y as f32 / r - 1.0;
                let distance = (dx * dx + dy * dy).sqrt();

                let alpha = shape.eval(distance);
                let inner = color_shape.eval(distance);
                let rgb = color.eval(alpha, inner);

                texels.push(Rgba {
                    r: rgb.r,
                    g: rgb.g,
                    b: rgb.b,
                    a: (alpha * 255.0).round().clamp(0.0, 255.0) as u8,
                });
            }
        }

        Texture {
            radius,
            size,
            texels,
        }
    }

    pub(crate) fn texel(&self, x: u32, y: u32) -> Rgba {
        self.texels[(y * self.size + x) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lava_like() -> Texture {
        Texture::generate(
            60,
            &Falloff::Cubic {
                max_distance: 1.0,
                scaling: 0.8,
            },
            &Falloff::Cubic {
                max_distance: 0.6,
                scaling: 0.8,
            },
            &ColorMap::TwoColor {
                outer: Rgb { r: 139, g: 0, b: 0 },
                inner: Rgb {
                    r: 255,
                    g: 255,
                    b: 0,
                },
            },
        )
    }

    #[test]
    fn center_texel_alpha_matches_scaling() {
        let tex = lava_like();
        let center = tex.texel(tex.radius, tex.radius);
        let expected = (0.8f32 * 255.0).round() as i32;
        assert!((center.a as i32 - expected).abs() <= 1);
    }

    #[test]
    fn corner_texels_are_transparent() {
        let tex = lava_like();
        let n = tex.size - 1;
        for (x, y) in [(0, 0), (n, 0), (0, n), (n, n)] {
            assert_eq!(tex.texel(x, y).a, 0);
        }
    }

    #[test]
    fn cubic_kernel_is_continuous_at_the_seam() {
        for &(m, s) in &[(1.0f32, 1.0f32), (0.6, 0.8), (0.7, 0.9)] {
            let d = m / 3.0;
            let near = s * (1.0 - 3.0 * (d / m) * (d / m));
            let far = 1.5 * s * (1.0 - d / m) * (1.0 - d / m);
            assert!((near - far).abs() < 1e-5, "kernel seam at m={m} s={s}");
        }
    }

    #[test]
    fn generation_is_idempotent() {
        assert_eq!(lava_like(), lava_like());
    }

    #[test]
    fn solid_color_ignores_falloff_values() {
        let c = Rgb {
            r: 10,
            g: 20,
            b: 30,
        };
        let tex = Texture::generate(
            4,
            &Falloff::Cubic {
                max_distance: 1.0,
                scaling: 1.0,
            },
            &Falloff::Flat(0.0),
            &ColorMap::Solid(c),
        );
        for t in &tex.texels {
            assert_eq!((t.r, t.g, t.b), (c.r, c.g, c.b));
        }
    }

    #[test]
    fn radius_is_clamped_to_a_valid_minimum() {
        let tex = Texture::generate(
            0,
            &Falloff::Flat(1.0),
            &Falloff::Flat(0.0),
            &ColorMap::Solid(Rgb { r: 1, g: 2, b: 3 }),
        );
        assert_eq!(tex.size, 2);
        assert_eq!(tex.texels.len(), 4);
    }
}

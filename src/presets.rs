use crate::texture::{ColorMap, Falloff, Rgb, Texture};

// Named generation + glow bundles. Sizes are texture radii in world pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Preset {
    pub(crate) name: &'static str,
    pub(crate) glow: Rgb,
    pub(crate) gradient_inner: Rgb,
    pub(crate) gradient_outer: Rgb,
    pub(crate) glow_factor: f32,
    pub(crate) max_distance: f32,
    pub(crate) scaling_factor: f32,
    pub(crate) size: u32,
}

const DARK_RED: Rgb = Rgb { r: 139, g: 0, b: 0 };
const YELLOW: Rgb = Rgb {
    r: 255,
    g: 255,
    b: 0,
};
const MIDNIGHT_BLUE: Rgb = Rgb {
    r: 25,
    g: 25,
    b: 112,
};
const DODGER_BLUE: Rgb = Rgb {
    r: 30,
    g: 144,
    b: 255,
};
const DARK_GREEN: Rgb = Rgb { r: 0, g: 100, b: 0 };
const GREEN_YELLOW: Rgb = Rgb {
    r: 173,
    g: 255,
    b: 47,
};
const INDIGO: Rgb = Rgb {
    r: 75,
    g: 0,
    b: 130,
};
const MAGENTA: Rgb = Rgb {
    r: 255,
    g: 0,
    b: 255,
};

pub(crate) const PRESETS: &[Preset] = &[
    Preset {
        name: "Lava",
        glow: DARK_RED,
        gradient_inner: YELLOW,
        gradient_outer: DARK_RED,
        glow_factor: 0.8,
        max_distance: 0.6,
        scaling_factor: 0.8,
        size: 120,
    },
    Preset {
        name: "Water",
        glow: MIDNIGHT_BLUE,
        gradient_inner: DODGER_BLUE,
        gradient_outer: MIDNIGHT_BLUE,
        glow_factor: 0.3,
        max_distance: 0.7,
        scaling_factor: 0.9,
        size: 100,
    },
    Preset {
        name: "Slime",
        glow: DARK_GREEN,
        gradient_inner: GREEN_YELLOW,
        gradient_outer: DARK_GREEN,
        glow_factor: 0.5,
        max_distance: 0.65,
        scaling_factor: 0.85,
        size: 110,
    },
    Preset {
        name: "Plasma",
        glow: INDIGO,
        gradient_inner: MAGENTA,
        gradient_outer: INDIGO,
        glow_factor: 0.7,
        max_distance: 0.6,
        scaling_factor: 0.85,
        size: 110,
    },
];

impl Preset {
    pub(crate) fn by_name(name: &str) -> Preset {
        PRESETS
            .iter()
            .copied()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .unwrap_or(PRESETS[0])
    }

    pub(crate) fn index_of(name: &str) -> usize {
        PRESETS
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name))
            .unwrap_or(0)
    }

    // The silhouette shape always covers the full texture; the color
    // gradient uses the preset's own reach and strength.
    pub(crate) fn build_texture(&self) -> Texture {
        Texture::generate(
            self.size,
            &Falloff::Cubic {
                max_distance: 1.0,
                scaling: self.scaling_factor,
            },
            &Falloff::Cubic {
                max_distance: self.max_distance,
                scaling: self.scaling_factor,
            },
            &ColorMap::TwoColor {
                outer: self.gradient_outer,
                inner: self.gradient_inner,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name_is_case_insensitive() {
        assert_eq!(Preset::by_name("water").name, "Water");
        assert_eq!(Preset::by_name("LAVA").name, "Lava");
    }

    #[test]
    fn unknown_names_fall_back_to_the_first_preset() {
        assert_eq!(Preset::by_name("nope").name, PRESETS[0].name);
        assert_eq!(Preset::index_of("nope"), 0);
    }

    #[test]
    fn preset_textures_match_their_size() {
        for p in PRESETS {
            let tex = p.build_texture();
            assert_eq!(tex.size, p.size * 2);
        }
    }
}

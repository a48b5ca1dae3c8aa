// Flag palette module
// Stripe colors for every selectable flag

/// A selectable flag motif drawn behind the subject image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Palette {
    #[default]
    Pastel,
    Rainbow,
    Transgender,
    Bisexual,
    Pansexual,
    Lesbian,
    NonBinary,
    Asexual,
}

impl Palette {
    /// Every palette, in menu order
    pub const ALL: [Palette; 8] = [
        Palette::Pastel,
        Palette::Rainbow,
        Palette::Transgender,
        Palette::Bisexual,
        Palette::Pansexual,
        Palette::Lesbian,
        Palette::NonBinary,
        Palette::Asexual,
    ];

    /// Display name of the flag
    pub fn name(self) -> &'static str {
        match self {
            Palette::Pastel => "Pastel",
            Palette::Rainbow => "Rainbow",
            Palette::Transgender => "Transgender",
            Palette::Bisexual => "Bisexual",
            Palette::Pansexual => "Pansexual",
            Palette::Lesbian => "Lesbian",
            Palette::NonBinary => "Non-Binary",
            Palette::Asexual => "Asexual",
        }
    }

    /// Look a palette up by its display name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Palette> {
        Self::ALL
            .into_iter()
            .find(|palette| palette.name().eq_ignore_ascii_case(name))
    }

    /// Stripe colors from top to bottom, as RGB
    pub fn stripes(self) -> &'static [[u8; 3]] {
        match self {
            Palette::Pastel => &[
                [0xff, 0xad, 0xad],
                [0xff, 0xd6, 0xa5],
                [0xfd, 0xff, 0xb6],
                [0xca, 0xff, 0xbf],
                [0x9b, 0xf6, 0xff],
                [0xa0, 0xc4, 0xff],
                [0xbd, 0xb2, 0xff],
            ],
            Palette::Rainbow => &[
                [0xe4, 0x03, 0x03],
                [0xff, 0x8c, 0x00],
                [0xff, 0xed, 0x00],
                [0x00, 0x80, 0x26],
                [0x24, 0x40, 0x8e],
                [0x73, 0x29, 0x82],
            ],
            Palette::Transgender => &[
                [0x5b, 0xce, 0xfa],
                [0xf5, 0xa9, 0xb8],
                [0xff, 0xff, 0xff],
                [0xf5, 0xa9, 0xb8],
                [0x5b, 0xce, 0xfa],
            ],
            Palette::Bisexual => &[
                [0xd6, 0x02, 0x70],
                [0xd6, 0x02, 0x70],
                [0x9b, 0x4f, 0x96],
                [0x00, 0x38, 0xa8],
                [0x00, 0x38, 0xa8],
            ],
            Palette::Pansexual => &[
                [0xff, 0x21, 0x8c],
                [0xff, 0xd8, 0x00],
                [0x21, 0xb1, 0xff],
            ],
            Palette::Lesbian => &[
                [0xd5, 0x2d, 0x00],
                [0xff, 0x9a, 0x56],
                [0xff, 0xff, 0xff],
                [0xd3, 0x62, 0xa4],
                [0xa3, 0x02, 0x62],
            ],
            Palette::NonBinary => &[
                [0xfc, 0xf4, 0x34],
                [0xff, 0xff, 0xff],
                [0x9c, 0x59, 0xd1],
                [0x2c, 0x2c, 0x2c],
            ],
            Palette::Asexual => &[
                [0x00, 0x00, 0x00],
                [0xa3, 0xa3, 0xa3],
                [0xff, 0xff, 0xff],
                [0x80, 0x00, 0x80],
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_palette_has_stripes() {
        for palette in Palette::ALL {
            assert!(!palette.stripes().is_empty(), "{} has no stripes", palette.name());
        }
    }

    #[test]
    fn names_round_trip_case_insensitively() {
        assert_eq!(Palette::from_name("non-binary"), Some(Palette::NonBinary));
        assert_eq!(Palette::from_name("PASTEL"), Some(Palette::Pastel));
        assert_eq!(Palette::from_name("checkerboard"), None);
    }

    #[test]
    fn default_is_pastel() {
        assert_eq!(Palette::default(), Palette::Pastel);
    }
}

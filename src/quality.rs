// Quality module
// Maps the quality slider to a canvas resolution

use std::ops::RangeInclusive;

/// Quality values exposed by the slider
pub const QUALITY_RANGE: RangeInclusive<u8> = 1..=5;

/// Resolution used at the lowest quality setting
const BASE_RESOLUTION: u32 = 256;

/// Side length in pixels of the square drawing target for a quality value.
///
/// Each step doubles the resolution. Values outside [`QUALITY_RANGE`] are
/// clamped, so the mapping is monotonic over the whole `u8` domain.
pub fn resolution_for(quality: u8) -> u32 {
    let step = quality.clamp(*QUALITY_RANGE.start(), *QUALITY_RANGE.end()) - QUALITY_RANGE.start();
    BASE_RESOLUTION << step
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_steps() {
        assert_eq!(resolution_for(1), 256);
        assert_eq!(resolution_for(3), 1024);
        assert_eq!(resolution_for(5), 4096);
    }

    #[test]
    fn out_of_range_values_clamp() {
        assert_eq!(resolution_for(0), 256);
        assert_eq!(resolution_for(6), 4096);
        assert_eq!(resolution_for(u8::MAX), 4096);
    }

    #[test]
    fn monotonic_over_full_domain() {
        let mut previous = resolution_for(0);
        for quality in 1..=u8::MAX {
            let current = resolution_for(quality);
            assert!(current >= previous, "quality {quality} went down");
            previous = current;
        }
    }
}

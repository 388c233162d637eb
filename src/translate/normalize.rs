//! Map `OpenAI`-style `size` and `temperature` inputs onto provider-native values.

/// Resolution token used when no size is given or a ratio is not recognised.
pub const DEFAULT_SIZE: &str = "4K";

/// Guidance used when no temperature is given.
pub const DEFAULT_GUIDANCE: f64 = 5.0;

const RATIO_SIZES: &[(&str, &str)] = &[
    ("1:1", "2048x2048"),
    ("4:3", "2304x1728"),
    ("3:4", "1728x2304"),
    ("16:9", "2560x1440"),
    ("9:16", "1440x2560"),
    ("3:2", "2496x1664"),
    ("2:3", "1664x2496"),
    ("21:9", "3024x1296"),
];

/// Normalise a requested size.
///
/// `"W:H"` ratio tokens are looked up in a fixed table; pixel strings such as
/// `"1024x1024"` and resolution tokens such as `"2K"` pass through unchanged.
#[must_use]
pub fn normalize_size(size: Option<&str>) -> String {
    let Some(size) = size else {
        return DEFAULT_SIZE.to_string();
    };

    if size.contains(':') {
        return RATIO_SIZES
            .iter()
            .find(|(ratio, _)| *ratio == size)
            .map_or(DEFAULT_SIZE, |&(_, pixels)| pixels)
            .to_string();
    }

    size.to_string()
}

/// Map a temperature in `[0, 1]` onto guidance scale `[1, 10]`.
///
/// Out-of-range input is not clamped; the provider rejects it.
#[must_use]
pub fn normalize_guidance(temperature: Option<f64>) -> f64 {
    temperature.map_or(DEFAULT_GUIDANCE, |t| 1.0 + t * 9.0)
}

/// Recognised ratio tokens, in table order.
pub fn supported_ratios() -> impl Iterator<Item = &'static str> {
    RATIO_SIZES.iter().map(|&(ratio, _)| ratio)
}

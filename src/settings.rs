use serde::Serialize;

use crate::domain::DashError;

pub const MAX_REFRESH_SECS: u64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingField {
    PlatformName,
    AccentColor,
    RefreshInterval,
}

impl SettingField {
    pub const ALL: [SettingField; 3] = [
        SettingField::PlatformName,
        SettingField::AccentColor,
        SettingField::RefreshInterval,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SettingField::PlatformName => "Platform name",
            SettingField::AccentColor => "Accent color",
            SettingField::RefreshInterval => "Refresh interval (s)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub platform_name: String,
    pub accent_color: String,
    pub refresh_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            platform_name: "Spatial Showroom".to_string(),
            accent_color: "#6366F1".to_string(),
            refresh_interval_secs: 30,
        }
    }
}

impl Settings {
    pub fn value(&self, field: SettingField) -> String {
        match field {
            SettingField::PlatformName => self.platform_name.clone(),
            SettingField::AccentColor => self.accent_color.clone(),
            SettingField::RefreshInterval => self.refresh_interval_secs.to_string(),
        }
    }

    /// Validates `input` and stores it. On error nothing changes.
    pub fn apply(&mut self, field: SettingField, input: &str) -> Result<(), DashError> {
        let input = input.trim();
        match field {
            SettingField::PlatformName => {
                if input.is_empty() {
                    return Err(DashError::Validation("platform name is required".into()));
                }
                self.platform_name = input.to_string();
            }
            SettingField::AccentColor => {
                let (r, g, b) = parse_hex_color(input)?;
                self.accent_color = format!("#{r:02X}{g:02X}{b:02X}");
            }
            SettingField::RefreshInterval => {
                let secs: u64 = input.parse().map_err(|_| {
                    DashError::Validation(format!("\"{input}\" is not a number of seconds"))
                })?;
                if secs > MAX_REFRESH_SECS {
                    return Err(DashError::Validation(format!(
                        "refresh interval must be at most {MAX_REFRESH_SECS}s"
                    )));
                }
                self.refresh_interval_secs = secs;
            }
        }
        Ok(())
    }

    pub fn accent_rgb(&self) -> (u8, u8, u8) {
        parse_hex_color(&self.accent_color).unwrap_or((0x63, 0x66, 0xF1))
    }
}

/// Parses `#RGB` or `#RRGGBB`.
pub fn parse_hex_color(input: &str) -> Result<(u8, u8, u8), DashError> {
    let invalid = || DashError::Validation(format!("\"{input}\" is not a hex color like #1E90FF"));
    let hex = input.strip_prefix('#').ok_or_else(invalid)?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
    match hex.len() {
        3 => {
            let expand = |i: usize| channel(&hex[i..i + 1].repeat(2));
            Ok((expand(0)?, expand(1)?, expand(2)?))
        }
        6 => Ok((channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#1e90ff").unwrap(), (0x1E, 0x90, 0xFF));
        assert_eq!(parse_hex_color("#fA0").unwrap(), (0xFF, 0xAA, 0x00));
        for bad in ["1e90ff", "#12345", "#gg0000", "#", "", "#1234567"] {
            assert!(
                matches!(parse_hex_color(bad), Err(DashError::Validation(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn invalid_input_does_not_mutate() {
        let mut settings = Settings::default();
        let before = settings.clone();
        assert!(settings.apply(SettingField::AccentColor, "#12").is_err());
        assert!(settings.apply(SettingField::PlatformName, "   ").is_err());
        assert!(settings.apply(SettingField::RefreshInterval, "soon").is_err());
        assert!(settings.apply(SettingField::RefreshInterval, "7200").is_err());
        assert_eq!(settings, before);
    }

    #[test]
    fn valid_input_is_normalized() {
        let mut settings = Settings::default();
        settings.apply(SettingField::AccentColor, " #abc ").unwrap();
        assert_eq!(settings.accent_color, "#AABBCC");
        assert_eq!(settings.accent_rgb(), (0xAA, 0xBB, 0xCC));
        settings.apply(SettingField::RefreshInterval, "0").unwrap();
        assert_eq!(settings.value(SettingField::RefreshInterval), "0");
        settings.apply(SettingField::PlatformName, " Showroom One ").unwrap();
        assert_eq!(settings.platform_name, "Showroom One");
    }
}

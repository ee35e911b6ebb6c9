use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumString};

/// CPU8 register file. `AC`..`FR` are 8-bit, `SP` and `PC` are 16-bit,
/// and `X`/`Y`/`Z` are 16-bit pair views (`X` = `XH:AC`, `Y` = `YH:YL`,
/// `Z` = `ZH:ZL`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoPrimitive,
    TryFromPrimitive,
    EnumString,
    EnumCount,
    Display,
)]
#[repr(u8)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Reg {
    // 8-bit registers
    AC,
    XH,
    YL,
    YH,
    ZL,
    ZH,
    FR,
    // 16-bit registers
    SP,
    PC,
    // 16-bit pair views
    X,
    Y,
    Z,
}

impl Reg {
    pub fn parse(s: &str) -> Option<Self> {
        s.parse::<Self>().ok()
    }

    pub fn is_byte(self) -> bool {
        matches!(
            self,
            Reg::AC | Reg::XH | Reg::YL | Reg::YH | Reg::ZL | Reg::ZH | Reg::FR
        )
    }

    pub fn is_wide(self) -> bool {
        !self.is_byte()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::EnumCount;

    #[test]
    fn parse_names() {
        assert_eq!(Reg::parse("ac"), Some(Reg::AC));
        assert_eq!(Reg::parse("AC"), Some(Reg::AC));
        assert_eq!(Reg::parse("Zh"), Some(Reg::ZH));
        assert_eq!(Reg::parse("sp"), Some(Reg::SP));
        assert_eq!(Reg::parse("x"), Some(Reg::X));
        assert_eq!(Reg::parse("hoge"), None);
        assert_eq!(Reg::parse(""), None);
    }

    #[test]
    fn display_is_lowercase_token() {
        assert_eq!(Reg::AC.to_string(), "ac");
        assert_eq!(Reg::PC.to_string(), "pc");
        assert_eq!(Reg::Y.to_string(), "y");
    }

    #[test]
    fn widths() {
        assert!(Reg::AC.is_byte());
        assert!(Reg::FR.is_byte());
        assert!(Reg::SP.is_wide());
        assert!(Reg::X.is_wide());
        assert_eq!(Reg::COUNT, 12);
    }
}

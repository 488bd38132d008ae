//! Session identity models (app classification, locale, theming, icon asset)

use bytes::Bytes;
use crc::{Crc, CRC_32_ISO_HDLC};
use serde::{Deserialize, Serialize};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Head-unit application classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AppCategory {
    #[default]
    Default,
    Communication,
    Media,
    Messaging,
    Navigation,
    Information,
    Social,
    Projection,
    Testing,
    System,
}

impl std::fmt::Display for AppCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AppCategory::Default => "DEFAULT",
            AppCategory::Communication => "COMMUNICATION",
            AppCategory::Media => "MEDIA",
            AppCategory::Messaging => "MESSAGING",
            AppCategory::Navigation => "NAVIGATION",
            AppCategory::Information => "INFORMATION",
            AppCategory::Social => "SOCIAL",
            AppCategory::Projection => "PROJECTION",
            AppCategory::Testing => "TESTING",
            AppCategory::System => "SYSTEM",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for AppCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEFAULT" => Ok(AppCategory::Default),
            "COMMUNICATION" => Ok(AppCategory::Communication),
            "MEDIA" => Ok(AppCategory::Media),
            "MESSAGING" => Ok(AppCategory::Messaging),
            "NAVIGATION" => Ok(AppCategory::Navigation),
            "INFORMATION" => Ok(AppCategory::Information),
            "SOCIAL" => Ok(AppCategory::Social),
            "PROJECTION" => Ok(AppCategory::Projection),
            "TESTING" => Ok(AppCategory::Testing),
            "SYSTEM" => Ok(AppCategory::System),
            _ => Err(format!("Unknown app category: '{}'", s)),
        }
    }
}

/// Display language negotiated with the head unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "EN-US")]
    EnUs,
    #[serde(rename = "EN-GB")]
    EnGb,
    #[serde(rename = "DE-DE")]
    DeDe,
    #[serde(rename = "ES-ES")]
    EsEs,
    #[serde(rename = "ES-MX")]
    EsMx,
    #[serde(rename = "FR-FR")]
    FrFr,
    #[serde(rename = "FR-CA")]
    FrCa,
    #[serde(rename = "IT-IT")]
    ItIt,
    #[serde(rename = "JA-JP")]
    JaJp,
    #[serde(rename = "KO-KR")]
    KoKr,
    #[serde(rename = "PT-BR")]
    PtBr,
    #[serde(rename = "RU-RU")]
    RuRu,
    #[serde(rename = "ZH-CN")]
    ZhCn,
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Locale::EnUs => "EN-US",
            Locale::EnGb => "EN-GB",
            Locale::DeDe => "DE-DE",
            Locale::EsEs => "ES-ES",
            Locale::EsMx => "ES-MX",
            Locale::FrFr => "FR-FR",
            Locale::FrCa => "FR-CA",
            Locale::ItIt => "IT-IT",
            Locale::JaJp => "JA-JP",
            Locale::KoKr => "KO-KR",
            Locale::PtBr => "PT-BR",
            Locale::RuRu => "RU-RU",
            Locale::ZhCn => "ZH-CN",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EN-US" => Ok(Locale::EnUs),
            "EN-GB" => Ok(Locale::EnGb),
            "DE-DE" => Ok(Locale::DeDe),
            "ES-ES" => Ok(Locale::EsEs),
            "ES-MX" => Ok(Locale::EsMx),
            "FR-FR" => Ok(Locale::FrFr),
            "FR-CA" => Ok(Locale::FrCa),
            "IT-IT" => Ok(Locale::ItIt),
            "JA-JP" => Ok(Locale::JaJp),
            "KO-KR" => Ok(Locale::KoKr),
            "PT-BR" => Ok(Locale::PtBr),
            "RU-RU" => Ok(Locale::RuRu),
            "ZH-CN" => Ok(Locale::ZhCn),
            _ => Err(format!("Unknown locale: '{}'", s)),
        }
    }
}

/// 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

/// Day or night color theme advertised during registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorScheme {
    pub primary: Rgb,
    pub secondary: Rgb,
    pub background: Rgb,
}

/// Foreground level the head unit currently grants the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HmiLevel {
    Full,
    Limited,
    Background,
    None,
}

impl std::fmt::Display for HmiLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HmiLevel::Full => "FULL",
            HmiLevel::Limited => "LIMITED",
            HmiLevel::Background => "BACKGROUND",
            HmiLevel::None => "NONE",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for HmiLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FULL" => Ok(HmiLevel::Full),
            "LIMITED" => Ok(HmiLevel::Limited),
            "BACKGROUND" => Ok(HmiLevel::Background),
            "NONE" => Ok(HmiLevel::None),
            _ => Err(format!("Unknown HMI level: '{}'", s)),
        }
    }
}

/// Binary asset uploadable to the head unit (the app icon).
///
/// Data is reference-counted so the asset can be cloned into upload tasks
/// without copying the image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconAsset {
    pub name: String,
    pub media_type: String,
    pub data: Bytes,
}

impl IconAsset {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            data,
        }
    }

    pub fn png(name: impl Into<String>, data: Bytes) -> Self {
        Self::new(name, "image/png", data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// CRC-32 over the asset bytes, carried in the upload request so the
    /// head unit can verify the transfer
    pub fn checksum(&self) -> u32 {
        CRC32.checksum(&self.data)
    }
}

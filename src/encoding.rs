//! The small set of charsets needed to turn text into bytes for byte sinks.

use crate::error::RuntimeErrorKind;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Latin1,
    Ascii,
}

impl Encoding {
    /// Looks up an encoding by name, ignoring case, `-` and `_`.
    pub fn for_name(name: &str) -> Result<Self, RuntimeErrorKind> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match normalized.as_str() {
            "UTF8" => Ok(Self::Utf8),
            "ISO88591" | "LATIN1" => Ok(Self::Latin1),
            "USASCII" | "ASCII" => Ok(Self::Ascii),
            _ => Err(RuntimeErrorKind::UnsupportedEncoding(name.to_owned())),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Latin1 => "ISO-8859-1",
            Self::Ascii => "US-ASCII",
        }
    }

    /// Encodes `text`, replacing unmappable characters with `?`.
    pub fn encode(self, text: &str) -> Vec<u8> {
        let limit = match self {
            Self::Utf8 => return text.as_bytes().to_vec(),
            Self::Latin1 => 0xff,
            Self::Ascii => 0x7f,
        };
        text.chars()
            .map(|c| u8::try_from(u32::from(c)).ok().filter(|b| u32::from(*b) <= limit).unwrap_or(b'?'))
            .collect()
    }
}

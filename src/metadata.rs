//! Token metadata - highlighting attributes packed into one `u32`
//!
//! Bit layout (bit 0 = least significant):
//!
//! ```text
//!  3322 2222 2222 1111 1111 1100 0000 0000
//!  1098 7654 3210 9876 5432 1098 7654 3210
//!  bbbb bbbb bfff ffff ffFF FTTT LLLL LLLL
//! ```
//!
//! - `L` language id (8 bits)
//! - `T` token type flags (3 bits)
//! - `F` font style flags (3 bits)
//! - `f` foreground color index (9 bits)
//! - `b` background color index (9 bits)
//!
//! The layout is shared with renderers and must not change.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

const LANGUAGE_ID_MASK: u32 = 0b0000_0000_0000_0000_0000_0000_1111_1111;
const TOKEN_TYPE_MASK: u32 = 0b0000_0000_0000_0000_0000_0111_0000_0000;
const FONT_STYLE_MASK: u32 = 0b0000_0000_0000_0000_0011_1000_0000_0000;
const FOREGROUND_MASK: u32 = 0b0000_0000_0111_1111_1100_0000_0000_0000;
const BACKGROUND_MASK: u32 = 0b1111_1111_1000_0000_0000_0000_0000_0000;

const LANGUAGE_ID_OFFSET: u32 = 0;
const TOKEN_TYPE_OFFSET: u32 = 8;
const FONT_STYLE_OFFSET: u32 = 11;
const FOREGROUND_OFFSET: u32 = 14;
const BACKGROUND_OFFSET: u32 = 23;

/// Largest encodable language id
pub const MAX_LANGUAGE_ID: u32 = LANGUAGE_ID_MASK >> LANGUAGE_ID_OFFSET;
/// Largest encodable color index
pub const MAX_COLOR_INDEX: u32 = FOREGROUND_MASK >> FOREGROUND_OFFSET;

bitflags! {
    /// Standard token classes.
    ///
    /// The empty set is `Other`. Values are bit flags (bit 3 is never used),
    /// so combinations are representable even though engines usually emit one.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
    pub struct TokenType: u8 {
        const COMMENT = 1 << 0;
        const STRING = 1 << 1;
        const REGEX = 1 << 2;
    }
}

impl TokenType {
    /// Plain code, no standard class
    pub const OTHER: TokenType = TokenType::empty();

    /// Parse a token type name (`other`, `comment`, `string`, `regex`)
    pub fn parse_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "other" => Some(Self::OTHER),
            "comment" => Some(Self::COMMENT),
            "string" => Some(Self::STRING),
            "regex" | "regexp" => Some(Self::REGEX),
            _ => None,
        }
    }
}

bitflags! {
    /// Font style flags as used by themes.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
    pub struct FontStyle: u8 {
        const ITALIC = 1 << 0;
        const BOLD = 1 << 1;
        const UNDERLINE = 1 << 2;
    }
}

impl FontStyle {
    /// Parse a theme `fontStyle` string such as `"bold italic"`.
    ///
    /// Unknown words (e.g. `strikethrough`) have no bit in the layout and are
    /// ignored; an empty string is an explicit "no style".
    pub fn parse(value: &str) -> Self {
        value
            .split_whitespace()
            .fold(FontStyle::empty(), |style, word| match word {
                "italic" => style | FontStyle::ITALIC,
                "bold" => style | FontStyle::BOLD,
                "underline" => style | FontStyle::UNDERLINE,
                _ => style,
            })
    }
}

/// The five highlighting attributes in unpacked form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TokenAttributes {
    pub language_id: u32,
    pub token_type: TokenType,
    pub font_style: FontStyle,
    pub foreground: u32,
    pub background: u32,
}

/// Overlay for [`MetadataWord::apply`]: `None` keeps the current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetadataPatch {
    pub language_id: Option<u32>,
    pub token_type: Option<TokenType>,
    pub font_style: Option<FontStyle>,
    pub foreground: Option<u32>,
    pub background: Option<u32>,
}

/// Packed highlighting attributes.
///
/// Equal words denote identical attributes, so renderers can use the word as
/// a style cache key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataWord(u32);

impl MetadataWord {
    /// Pack five fields. Each field is masked to its width first, so an
    /// out-of-range value cannot spill into its neighbours.
    pub fn pack(
        language_id: u32,
        token_type: TokenType,
        font_style: FontStyle,
        foreground: u32,
        background: u32,
    ) -> Self {
        let word = ((language_id << LANGUAGE_ID_OFFSET) & LANGUAGE_ID_MASK)
            | ((u32::from(token_type.bits()) << TOKEN_TYPE_OFFSET) & TOKEN_TYPE_MASK)
            | ((u32::from(font_style.bits()) << FONT_STYLE_OFFSET) & FONT_STYLE_MASK)
            | ((foreground << FOREGROUND_OFFSET) & FOREGROUND_MASK)
            | ((background << BACKGROUND_OFFSET) & BACKGROUND_MASK);
        Self(word)
    }

    /// Pack from the unpacked struct
    pub fn from_attributes(attributes: TokenAttributes) -> Self {
        Self::pack(
            attributes.language_id,
            attributes.token_type,
            attributes.font_style,
            attributes.foreground,
            attributes.background,
        )
    }

    /// Wrap a raw word received from elsewhere
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn unpack(self) -> TokenAttributes {
        TokenAttributes {
            language_id: self.language_id(),
            token_type: self.token_type(),
            font_style: self.font_style(),
            foreground: self.foreground(),
            background: self.background(),
        }
    }

    pub fn language_id(self) -> u32 {
        (self.0 & LANGUAGE_ID_MASK) >> LANGUAGE_ID_OFFSET
    }

    pub fn token_type(self) -> TokenType {
        // The mask keeps three bits, which always fit the flag set
        TokenType::from_bits_retain(((self.0 & TOKEN_TYPE_MASK) >> TOKEN_TYPE_OFFSET) as u8)
    }

    pub fn font_style(self) -> FontStyle {
        FontStyle::from_bits_retain(((self.0 & FONT_STYLE_MASK) >> FONT_STYLE_OFFSET) as u8)
    }

    pub fn foreground(self) -> u32 {
        (self.0 & FOREGROUND_MASK) >> FOREGROUND_OFFSET
    }

    pub fn background(self) -> u32 {
        (self.0 & BACKGROUND_MASK) >> BACKGROUND_OFFSET
    }

    /// Replace the fields set in `patch`, keep the others
    pub fn apply(self, patch: MetadataPatch) -> Self {
        let current = self.unpack();
        Self::pack(
            patch.language_id.unwrap_or(current.language_id),
            patch.token_type.unwrap_or(current.token_type),
            patch.font_style.unwrap_or(current.font_style),
            patch.foreground.unwrap_or(current.foreground),
            patch.background.unwrap_or(current.background),
        )
    }
}

impl From<MetadataWord> for u32 {
    fn from(word: MetadataWord) -> Self {
        word.0
    }
}

impl fmt::Display for MetadataWord {
    /// 32-digit binary form, most significant bit first
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032b}", self.0)
    }
}

impl fmt::Debug for MetadataWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attributes = self.unpack();
        f.debug_struct("MetadataWord")
            .field("language_id", &attributes.language_id)
            .field("token_type", &attributes.token_type)
            .field("font_style", &attributes.font_style)
            .field("foreground", &attributes.foreground)
            .field("background", &attributes.background)
            .finish()
    }
}

//! Theme model and color interning
//!
//! Colors are interned into a `ColorMap` so metadata words can carry a
//! 9-bit index instead of a string. Index 0 means "unset".

use crate::metadata::{FontStyle, MAX_COLOR_INDEX, MetadataPatch};
use crate::scope::ScopeName;
use crate::selector::ScopeSelector;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_FOREGROUND: &str = "#000000";
pub const DEFAULT_BACKGROUND: &str = "#FFFFFF";

/// Theme as found in a theme file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTheme {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "tokenColors")]
    pub settings: Vec<RawThemeSetting>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawThemeSetting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<RawThemeScope>,
    #[serde(default)]
    pub settings: RawThemeStyle,
}

/// `"scope"` is either a comma-separated string or a list of selectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawThemeScope {
    One(String),
    Many(Vec<String>),
}

impl RawThemeScope {
    fn selectors(&self) -> Vec<ScopeSelector> {
        match self {
            Self::One(list) => ScopeSelector::parse_list(list),
            Self::Many(items) => items.iter().flat_map(|s| ScopeSelector::parse_list(s)).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawThemeStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreground: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

/// Index to color table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorMap {
    colors: Vec<String>,
    ids: HashMap<String, u32>,
    frozen: bool,
}

impl Default for ColorMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorMap {
    /// Growable map with index 0 reserved
    pub fn new() -> Self {
        Self {
            colors: vec![String::new()],
            ids: HashMap::new(),
            frozen: false,
        }
    }

    /// Fixed map supplied by a caller; interning a color it lacks fails
    pub fn frozen(colors: Vec<String>) -> Result<Self> {
        if colors.len() > MAX_COLOR_INDEX as usize + 1 {
            return Err(Error::Theme(format!(
                "color map has {} entries, at most {} fit",
                colors.len(),
                MAX_COLOR_INDEX + 1
            )));
        }

        let colors: Vec<String> = colors.into_iter().map(|c| c.to_uppercase()).collect();
        let ids = colors
            .iter()
            .enumerate()
            .filter(|(_, color)| !color.is_empty())
            .map(|(id, color)| (color.clone(), id as u32))
            .collect();
        Ok(Self {
            colors,
            ids,
            frozen: true,
        })
    }

    /// Index of a color, adding it when the map is not frozen
    pub fn intern(&mut self, color: &str) -> Result<u32> {
        let color = color.to_uppercase();
        if let Some(id) = self.ids.get(&color) {
            return Ok(*id);
        }
        if self.frozen {
            return Err(Error::Theme(format!("Missing color in color map - {}", color)));
        }

        let id = self.colors.len() as u32;
        if id > MAX_COLOR_INDEX {
            return Err(Error::Theme(format!(
                "too many colors: {} does not fit in {} entries",
                color,
                MAX_COLOR_INDEX + 1
            )));
        }
        self.colors.push(color.clone());
        self.ids.insert(color, id);
        Ok(id)
    }

    pub fn id_of(&self, color: &str) -> Option<u32> {
        self.ids.get(&color.to_uppercase()).copied()
    }

    pub fn color(&self, id: u32) -> Option<&str> {
        self.colors
            .get(id as usize)
            .map(String::as_str)
            .filter(|c| !c.is_empty())
    }

    pub fn colors(&self) -> &[String] {
        &self.colors
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

/// Style set by a rule; `None` fields are left to other rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThemeStyle {
    pub font_style: Option<FontStyle>,
    pub foreground: Option<u32>,
    pub background: Option<u32>,
}

impl ThemeStyle {
    pub fn to_patch(self) -> MetadataPatch {
        MetadataPatch {
            font_style: self.font_style,
            foreground: self.foreground,
            background: self.background,
            ..MetadataPatch::default()
        }
    }

    fn overlay(&mut self, other: ThemeStyle) {
        self.font_style = other.font_style.or(self.font_style);
        self.foreground = other.foreground.or(self.foreground);
        self.background = other.background.or(self.background);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThemeRule {
    pub selector: ScopeSelector,
    pub style: ThemeStyle,
    /// Position of the setting in the raw theme
    pub index: usize,
}

/// Parsed theme with colors interned.
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    name: Option<String>,
    defaults: ThemeStyle,
    rules: Vec<ThemeRule>,
    color_map: ColorMap,
}

impl Default for Theme {
    fn default() -> Self {
        let mut color_map = ColorMap::new();
        color_map.colors.push(DEFAULT_FOREGROUND.to_string());
        color_map.ids.insert(DEFAULT_FOREGROUND.to_string(), 1);
        color_map.colors.push(DEFAULT_BACKGROUND.to_string());
        color_map.ids.insert(DEFAULT_BACKGROUND.to_string(), 2);
        Self {
            name: None,
            defaults: ThemeStyle {
                font_style: Some(FontStyle::empty()),
                foreground: Some(1),
                background: Some(2),
            },
            rules: Vec::new(),
            color_map,
        }
    }
}

impl Theme {
    /// Parse a raw theme. With `color_map` set, the table is frozen to it.
    pub fn from_raw(raw: &RawTheme, color_map: Option<Vec<String>>) -> Result<Self> {
        let mut colors = match color_map {
            Some(colors) => ColorMap::frozen(colors)?,
            None => ColorMap::new(),
        };

        let mut default_font = FontStyle::empty();
        let mut default_fg = DEFAULT_FOREGROUND.to_string();
        let mut default_bg = DEFAULT_BACKGROUND.to_string();
        let mut scoped = Vec::new();

        for (index, setting) in raw.settings.iter().enumerate() {
            let style = &setting.settings;
            let foreground = style.foreground.as_deref().filter(|c| is_hex_color(c));
            let background = style.background.as_deref().filter(|c| is_hex_color(c));
            let font_style = style.font_style.as_deref().map(FontStyle::parse);

            let selectors = setting
                .scope
                .as_ref()
                .map(RawThemeScope::selectors)
                .unwrap_or_default();
            if selectors.is_empty() {
                // Settings without a scope restyle the defaults
                if let Some(font) = font_style {
                    default_font = font;
                }
                if let Some(fg) = foreground {
                    default_fg = fg.to_string();
                }
                if let Some(bg) = background {
                    default_bg = bg.to_string();
                }
                continue;
            }
            scoped.push((index, selectors, font_style, foreground, background));
        }

        let defaults = ThemeStyle {
            font_style: Some(default_font),
            foreground: Some(colors.intern(&default_fg)?),
            background: Some(colors.intern(&default_bg)?),
        };

        let mut rules = Vec::new();
        for (index, selectors, font_style, foreground, background) in scoped {
            let style = ThemeStyle {
                font_style,
                foreground: foreground.map(|c| colors.intern(c)).transpose()?,
                background: background.map(|c| colors.intern(c)).transpose()?,
            };
            rules.extend(selectors.into_iter().map(|selector| ThemeRule {
                selector,
                style,
                index,
            }));
        }

        tracing::debug!(
            "Parsed theme {} with {} rules and {} colors",
            raw.name.as_deref().unwrap_or("<unnamed>"),
            rules.len(),
            colors.len()
        );

        Ok(Self {
            name: raw.name.clone(),
            defaults,
            rules,
            color_map: colors,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn defaults(&self) -> ThemeStyle {
        self.defaults
    }

    pub fn rules(&self) -> &[ThemeRule] {
        &self.rules
    }

    pub fn color_map(&self) -> &ColorMap {
        &self.color_map
    }

    /// Style of a scope path (outermost first): every matching rule is
    /// layered in theme order, later rules override earlier ones per field.
    pub fn style_for(&self, path: &[&ScopeName]) -> ThemeStyle {
        let mut style = ThemeStyle::default();
        for rule in self.rules.iter().filter(|rule| rule.selector.matches(path)) {
            style.overlay(rule.style);
        }
        style
    }
}

fn is_hex_color(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 4 | 6 | 8) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

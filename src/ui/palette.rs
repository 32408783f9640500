//! Terminal styles of the CLI. Editor themes live in `store::theme`.

use owo_colors::Style;
use std::sync::OnceLock;

static PALETTE: OnceLock<Palette> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct Palette {
    pub header: Style,
    pub success: Style,
    pub error: Style,
    pub warn: Style,
    pub label: Style,
    /// Scope names in listings
    pub scope: Style,
    /// `scope#rule` keys of partial dependencies
    pub rule: Style,
    /// Scopes that were referenced but never found
    pub missing: Style,
    /// Packed metadata words
    pub word: Style,
}

impl Palette {
    /// Colored when `console` allows it (TTY, `NO_COLOR`, `CLICOLOR_FORCE`)
    pub fn detect() -> Self {
        if console::colors_enabled() {
            Self::colored()
        } else {
            Self::plain()
        }
    }

    pub fn colored() -> Self {
        Self {
            header: Style::new().cyan().bold(),
            success: Style::new().green().bold(),
            error: Style::new().red().bold(),
            warn: Style::new().yellow().bold(),
            label: Style::new().white().dimmed(),
            scope: Style::new().blue(),
            rule: Style::new().magenta(),
            missing: Style::new().bright_black().strikethrough(),
            word: Style::new().yellow(),
        }
    }

    pub fn plain() -> Self {
        let none = Style::new();
        Self {
            header: none,
            success: none,
            error: none,
            warn: none,
            label: none,
            scope: none,
            rule: none,
            missing: none,
            word: none,
        }
    }
}

pub fn palette() -> &'static Palette {
    PALETTE.get_or_init(Palette::detect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use owo_colors::OwoColorize;

    #[test]
    fn test_plain_palette_adds_no_escapes() {
        let plain = Palette::plain();
        assert_eq!("source.js".style(plain.scope).to_string(), "source.js");
        assert_eq!("source.c#x".style(plain.rule).to_string(), "source.c#x");
    }

    #[test]
    fn test_colored_palette_styles_scopes() {
        let colored = Palette::colored();
        assert_ne!("source.js".style(colored.scope).to_string(), "source.js");
    }
}

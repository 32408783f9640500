use crate::{OutputMode, emit_success};
use owo_colors::OwoColorize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tmreg::config::{self, TmregConfig};
use tmreg::metadata::{MAX_COLOR_INDEX, MAX_LANGUAGE_ID};
use tmreg::store::{NoEngine, Theme};
use tmreg::ui::{
    ColorRow, DependencyRow, FieldRow, Icons, TableBuilder, header, info, palette, scope_line,
    section, stats_table, status, success, warn,
};
use tmreg::{
    DependencyCollector, DirectoryLoader, FontStyle, MetadataWord, RawGrammar, RawTheme, Registry,
    ScopeAttributesProvider, ScopeName, ScopeStack, TokenAttributes, TokenType,
};

pub fn run_init(output_mode: OutputMode, config_path: &Path, force: bool) -> anyhow::Result<()> {
    let config = TmregConfig::starter();
    config::write_config(config_path, &config, force)?;

    if output_mode.is_human() {
        success(&format!("Wrote {}", config_path.display()));
        info("Grammar directories", &format!("{:?}", config.grammar_dirs));
    } else {
        let data = serde_json::json!({
            "path": config_path,
            "config": config,
        });
        emit_success(output_mode, "init", data)?;
    }
    Ok(())
}

pub async fn run_resolve(
    output_mode: OutputMode,
    config_path: &Path,
    scope: &str,
    dirs: Vec<PathBuf>,
    inject: Vec<String>,
) -> anyhow::Result<()> {
    let config = config::load_config(Some(config_path))?.unwrap_or_default();

    let mut grammar_dirs: Vec<PathBuf> = config
        .grammar_dirs
        .iter()
        .map(|dir| config::resolve_relative(config_path, dir))
        .collect();
    grammar_dirs.extend(dirs);
    if grammar_dirs.is_empty() {
        anyhow::bail!("no grammar directories configured (use --dir or `tmreg init`)");
    }

    let mut injections = config.injection_table()?;
    merge_injections(&mut injections, parse_injections(&inject)?);

    let loader = DirectoryLoader::new(&grammar_dirs)?.with_injections(injections);
    let indexed = loader.len();
    let registry = Registry::new(Arc::new(loader), Arc::new(NoEngine));

    let scope = ScopeName::parse(scope)?;
    let resolution = registry.resolve(&scope).await?;

    if output_mode.is_human() {
        header(&format!("Resolved {}", scope));
        status(Icons::PACKAGE, "Indexed grammars", &indexed.to_string());

        section("Loaded");
        for loaded in &resolution.loaded {
            scope_line(loaded.as_str(), true);
        }
        if !resolution.missing.is_empty() {
            section("Missing");
            for missing in &resolution.missing {
                scope_line(missing.as_str(), false);
            }
        }
        if !resolution.partial.is_empty() {
            section("Partial");
            for key in &resolution.partial {
                println!("  {} {}", Icons::LINK, key.style(palette().rule));
            }
        }

        println!();
        println!(
            "{}",
            stats_table(&[
                ("Layers", resolution.layers.to_string().as_str()),
                ("Loaded", resolution.loaded.len().to_string().as_str()),
                ("Full", resolution.full.len().to_string().as_str()),
                ("Partial", resolution.partial.len().to_string().as_str()),
                ("Missing", resolution.missing.len().to_string().as_str()),
                ("Fetches", registry.cache().fetch_count().to_string().as_str()),
            ])
        );
        if !resolution.is_complete() {
            warn("Some referenced grammars were not found");
        }
    } else {
        emit_success(output_mode, "resolve", serde_json::to_value(&resolution)?)?;
    }
    Ok(())
}

pub fn run_scan(output_mode: OutputMode, file: &Path, rule: Option<&str>) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(file)?;
    let grammar = RawGrammar::from_json_str(&contents)?;

    let mut collector = DependencyCollector::new();
    match rule {
        Some(rule) => {
            if grammar.rule(rule).is_none() {
                anyhow::bail!("{} has no repository rule `{}`", grammar.scope_name, rule);
            }
            collector.collect_from_rule(&grammar, &grammar, rule);
        }
        None => collector.collect_all(&grammar, &grammar),
    }

    let visited = collector.visited_rule_count();
    let dependencies = collector.into_dependencies();

    if output_mode.is_human() {
        header(&format!("Dependencies of {}", grammar.scope_name));
        status(Icons::FILE, "File", &file.display().to_string());
        status(Icons::SEARCH, "Rules visited", &visited.to_string());

        if dependencies.is_empty() {
            success("No cross-scope includes");
            return Ok(());
        }
        let rows: Vec<DependencyRow> = dependencies
            .iter()
            .map(|dep| DependencyRow {
                kind: dep.kind_str().to_string(),
                scope: dep.scope_name().to_string(),
                rule: dep.rule().unwrap_or("").to_string(),
            })
            .collect();
        println!("{}", TableBuilder::render(&rows));
    } else {
        let data = serde_json::json!({
            "scope": grammar.scope_name,
            "rule": rule,
            "visited_rules": visited,
            "dependencies": dependencies,
        });
        emit_success(output_mode, "scan", data)?;
    }
    Ok(())
}

pub fn run_pack(
    output_mode: OutputMode,
    language: u32,
    token_type: &str,
    font_style: &str,
    foreground: u32,
    background: u32,
) -> anyhow::Result<()> {
    let Some(parsed_type) = TokenType::parse_name(token_type) else {
        anyhow::bail!("unknown token type `{}` (other, comment, string, regex)", token_type);
    };
    if language > MAX_LANGUAGE_ID {
        warn(&format!("language id {} is truncated to 8 bits", language));
    }
    if foreground > MAX_COLOR_INDEX || background > MAX_COLOR_INDEX {
        warn("color indices are truncated to 9 bits");
    }

    let word = MetadataWord::pack(
        language,
        parsed_type,
        FontStyle::parse(font_style),
        foreground,
        background,
    );

    if output_mode.is_human() {
        println!("{}", word.bits().style(palette().word));
        println!(
            "{}",
            stats_table(&[
                ("Hex", format!("{:#010x}", word.bits()).as_str()),
                ("Binary", word.to_string().as_str()),
            ])
        );
    } else {
        let data = serde_json::json!({
            "word": word.bits(),
            "hex": format!("{:#010x}", word.bits()),
            "binary": word.to_string(),
        });
        emit_success(output_mode, "pack", data)?;
    }
    Ok(())
}

pub fn run_unpack(output_mode: OutputMode, word: &str) -> anyhow::Result<()> {
    let word = MetadataWord::from_bits(parse_word(word)?);
    let attributes = word.unpack();

    if output_mode.is_human() {
        header(&format!("Metadata {:#010x}", word.bits()));
        let rows = field_rows(&attributes);
        println!("{}", TableBuilder::render(&rows));
        println!("{}", word.to_string().style(palette().word));
    } else {
        let data = serde_json::json!({
            "word": word.bits(),
            "attributes": attributes,
        });
        emit_success(output_mode, "unpack", data)?;
    }
    Ok(())
}

pub fn run_style(
    output_mode: OutputMode,
    config_path: &Path,
    scopes: &[String],
    language: Option<u32>,
    theme: Option<PathBuf>,
) -> anyhow::Result<()> {
    let (stack, word) = resolve_style(config_path, scopes, language, theme)?;
    let attributes = word.unpack();

    if output_mode.is_human() {
        header(&format!("Style of {}", stack));
        status(Icons::STATS, "Word", &format!("{:#010x}", word.bits()));
        println!("{}", TableBuilder::render(&field_rows(&attributes)));
    } else {
        let data = serde_json::json!({
            "scopes": stack.scope_names(),
            "word": word.bits(),
            "attributes": attributes,
        });
        emit_success(output_mode, "style", data)?;
    }
    Ok(())
}

/// Scope stack and final metadata word of a scope path. Flags win over the
/// config file.
fn resolve_style(
    config_path: &Path,
    scopes: &[String],
    language: Option<u32>,
    theme: Option<PathBuf>,
) -> anyhow::Result<(ScopeStack, MetadataWord)> {
    let config = config::load_config(Some(config_path))?.unwrap_or_default();
    let language_id = language.or(config.language_id).unwrap_or(0);
    let provider = ScopeAttributesProvider::new(language_id, &config.grammar_configuration()?)?;
    let theme = match theme_path(theme, &config, config_path) {
        Some(path) => Theme::from_raw(&read_theme(&path)?, None)?,
        None => Theme::default(),
    };

    let path = scopes
        .iter()
        .map(|s| ScopeName::parse(s))
        .collect::<tmreg::Result<Vec<_>>>()?;
    let Some((root, rest)) = path.split_first() else {
        anyhow::bail!("no scopes given");
    };
    let mut stack = ScopeStack::root_attributed(root.clone(), &provider);
    for scope in rest {
        stack = stack.push_attributed(scope.clone(), &provider);
    }

    let word = stack
        .metadata()
        .apply(theme.defaults().to_patch())
        .apply(theme.style_for(&stack.scope_names()).to_patch());
    Ok((stack, word))
}

pub fn run_colors(
    output_mode: OutputMode,
    config_path: &Path,
    theme: Option<PathBuf>,
    color_map: Option<&Path>,
) -> anyhow::Result<()> {
    let config = config::load_config(Some(config_path))?.unwrap_or_default();
    let Some(theme) = theme_path(theme, &config, config_path) else {
        anyhow::bail!("no theme given (pass a theme file or set `theme` in tmreg.toml)");
    };
    let raw = read_theme(&theme)?;
    let fixed = match color_map {
        Some(path) => Some(serde_json::from_str::<Vec<String>>(&std::fs::read_to_string(path)?)?),
        None => None,
    };
    let parsed = Theme::from_raw(&raw, fixed)?;
    let colors = parsed.color_map().colors();

    if output_mode.is_human() {
        header(&format!(
            "{} Colors of {}",
            Icons::PALETTE,
            parsed.name().unwrap_or("unnamed theme")
        ));
        status(Icons::STATS, "Rules", &parsed.rules().len().to_string());
        let rows: Vec<ColorRow> = colors
            .iter()
            .enumerate()
            .skip(1)
            .map(|(index, color)| ColorRow {
                index: index as u32,
                color: color.clone(),
            })
            .collect();
        println!("{}", TableBuilder::render(&rows));
    } else {
        let data = serde_json::json!({
            "name": parsed.name(),
            "rules": parsed.rules().len(),
            "colors": colors,
        });
        emit_success(output_mode, "colors", data)?;
    }
    Ok(())
}

/// Theme given on the command line, else the configured one
fn theme_path(flag: Option<PathBuf>, config: &TmregConfig, config_path: &Path) -> Option<PathBuf> {
    flag.or_else(|| {
        config
            .theme
            .as_deref()
            .map(|theme| config::resolve_relative(config_path, theme))
    })
}

fn read_theme(path: &Path) -> anyhow::Result<RawTheme> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

fn field_rows(attributes: &TokenAttributes) -> Vec<FieldRow> {
    vec![
        FieldRow {
            field: "language".into(),
            bits: "0-7".into(),
            value: attributes.language_id.to_string(),
        },
        FieldRow {
            field: "token type".into(),
            bits: "8-10".into(),
            value: flag_names(attributes.token_type, "other"),
        },
        FieldRow {
            field: "font style".into(),
            bits: "11-13".into(),
            value: flag_names(attributes.font_style, "none"),
        },
        FieldRow {
            field: "foreground".into(),
            bits: "14-22".into(),
            value: attributes.foreground.to_string(),
        },
        FieldRow {
            field: "background".into(),
            bits: "23-31".into(),
            value: attributes.background.to_string(),
        },
    ]
}

/// `target=scope` pairs from the command line, in order
fn parse_injections(values: &[String]) -> anyhow::Result<Vec<(ScopeName, ScopeName)>> {
    values
        .iter()
        .map(|value| -> anyhow::Result<(ScopeName, ScopeName)> {
            let Some((target, injected)) = value.split_once('=') else {
                anyhow::bail!("injection `{}` is not of the form target=scope", value);
            };
            Ok((ScopeName::parse(target.trim())?, ScopeName::parse(injected.trim())?))
        })
        .collect()
}

/// Merge command-line injections into the configured table
fn merge_injections(
    table: &mut HashMap<ScopeName, Vec<ScopeName>>,
    extra: Vec<(ScopeName, ScopeName)>,
) {
    for (target, injected) in extra {
        let injected_into = table.entry(target).or_default();
        if !injected_into.contains(&injected) {
            injected_into.push(injected);
        }
    }
}

fn parse_word(value: &str) -> anyhow::Result<u32> {
    let value = value.trim().replace('_', "");
    let parsed = if let Some(hex) = value.strip_prefix("0x") {
        u32::from_str_radix(hex, 16)?
    } else if let Some(bin) = value.strip_prefix("0b") {
        u32::from_str_radix(bin, 2)?
    } else {
        value.parse()?
    };
    Ok(parsed)
}

fn flag_names<F: bitflags::Flags>(flags: F, empty: &str) -> String {
    let names: Vec<String> = flags.iter_names().map(|(name, _)| name.to_lowercase()).collect();
    if names.is_empty() {
        empty.to_string()
    } else {
        names.join(" | ")
    }
}

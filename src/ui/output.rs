use crate::ui::{Icons, palette};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, text.style(palette().header));
}

pub fn status(icon: &str, label: &str, value: &str) {
    println!("{} {}: {}", icon, label.style(palette().label), value);
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(palette().success));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(palette().error));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(palette().warn));
}

pub fn info(label: &str, value: &str) {
    println!("{} {}: {}", Icons::INFO, label.style(palette().label), value);
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(palette().header));
}

/// One scope in a listing, prefixed by its outcome
pub fn scope_line(scope: &str, found: bool) {
    if found {
        println!("  {} {}", Icons::CHECK, scope.style(palette().scope));
    } else {
        println!("  {} {}", Icons::CROSS, scope.style(palette().missing));
    }
}

//! Small builders for the markup the pages share.

use std::fmt::Display;

pub const MAIN_MENU_BUTTON: &str = "</p><p><form method='get' action='/'>\
<button type='submit'>Main Menu</button></form>";

pub const BACK_TO_CONFIG: &str = "&#8617; Configuration";

/// Escape text for use inside a single- or double-quoted attribute or element.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&#39;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// `<h1>host</h1><hr>`, the opening line of every page body.
pub fn heading(out: &mut String, hostname: &str) {
    out.push_str(&format!("<h1>{}</h1><hr>", escape(hostname)));
}

pub fn option<V: Display>(out: &mut String, value: V, label: &str, selected: bool) {
    out.push_str(&format!(
        "<option value='{}'{}>{}</option>",
        escape(&value.to_string()),
        if selected { " selected" } else { "" },
        escape(label)
    ));
}

pub fn button(out: &mut String, label: &str, extra: &str) {
    out.push_str(&format!("<button type='submit' {extra}>{label}</button>"));
}

pub fn close_form(out: &mut String) {
    out.push_str("</form></p>");
}

/// A one-button GET form pointing at `action`.
pub fn form_button(out: &mut String, label: &str, action: &str, extra: &str) {
    out.push_str(&format!("<p><form method='get' action='{action}'>"));
    button(out, label, extra);
    close_form(out);
}

/// Text input carrying the current value.
pub fn text_input(out: &mut String, name: &str, label: &str, max_len: usize, value: &str) {
    out.push_str(&format!(
        "<p><b>{label}</b> <input id='{name}' name='{name}' maxlength={max_len} value='{}'></p>",
        escape(value)
    ));
}

pub fn number_input(out: &mut String, name: &str, label: &str, min: i64, max: i64, value: i64) {
    out.push_str(&format!(
        "<p><b>{label}</b> <input id='{name}' required name='{name}' type='number' \
         min='{min}' max='{max}' value='{value}'></p>"
    ));
}

pub fn checkbox(out: &mut String, name: &str, label: &str, checked: bool) {
    out.push_str(&format!(
        "<p><input id='{name}' name='{name}' type='checkbox' {}><b>{label}</b></p>",
        if checked { " checked" } else { "" }
    ));
}

/// Human readable byte count, e.g. `1.50 KiB`.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

/// `1d 2h 3m 4s`, leaving out leading zero units.
#[must_use]
pub fn format_uptime(secs: u64) -> String {
    let day = secs / 86_400;
    let hour = (secs % 86_400) / 3600;
    let min = (secs % 3600) / 60;
    let sec = secs % 60;
    let mut out = String::new();
    if day > 0 {
        out.push_str(&format!("{day}d "));
    }
    if day > 0 || hour > 0 {
        out.push_str(&format!("{hour}h "));
    }
    if day > 0 || hour > 0 || min > 0 {
        out.push_str(&format!("{min}m "));
    }
    out.push_str(&format!("{sec}s"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_marks_selection() {
        let mut s = String::new();
        option(&mut s, 2, "180 degrees", true);
        option(&mut s, 3, "270 degrees", false);
        assert_eq!(
            s,
            "<option value='2' selected>180 degrees</option><option value='3'>270 degrees</option>"
        );
    }

    #[test]
    fn test_escape_quotes() {
        assert_eq!(escape("a'b<c>"), "a&#39;b&lt;c&gt;");
    }

    #[test]
    fn test_uptime_skips_leading_zero_units() {
        assert_eq!(format_uptime(5), "5s");
        assert_eq!(format_uptime(3600), "1h 0m 0s");
        assert_eq!(format_uptime(90_061), "1d 1h 1m 1s");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KiB");
    }
}

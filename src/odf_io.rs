use anyhow::{anyhow, Context, Result};
use ini::inistr;
use std::collections::HashMap;
use std::fmt::Display;
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

/// The INI parser treats `#` as a comment marker anywhere on a line, so it is
/// swapped out before parsing and restored when a value is handed out.
const HASH_PLACEHOLDER: &str = "__HASH__";

type SectionMap = HashMap<String, HashMap<String, Option<String>>>;

/// Formats a 1-based (or manual 0-based) number the way ODF section and key
/// suffixes expect it: three digits, zero padded.
pub fn format_index(n: usize) -> String {
    format!("{:03}", n)
}

/// Shortest decimal that reads back to the same `f32`. Never uses exponent
/// notation.
pub fn format_decimal(value: f32) -> String {
    format!("{}", value)
}

/// Tri-state boolean: `Y`/`N` (any case), anything empty falls back to
/// `default`. Unrecognised text also yields `default`.
pub fn parse_bool(value: &str, default: bool) -> bool {
    match value.trim() {
        "" => default,
        v if v.eq_ignore_ascii_case("Y") => true,
        v if v.eq_ignore_ascii_case("N") => false,
        _ => default,
    }
}

pub fn bool_str(value: bool) -> &'static str {
    if value { "Y" } else { "N" }
}

/// Decodes ODF/CMB text. UTF-8 (optionally with BOM) is used when the bytes
/// are valid UTF-8, otherwise every byte is taken as ISO-8859-1.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Key/value reader over a parsed ODF (or decompressed CMB) document.
/// Section and key lookups are case-insensitive.
#[derive(Debug, Default)]
pub struct OdfReader {
    sections: SectionMap,
}

impl OdfReader {
    pub fn from_str(content: &str) -> Result<Self> {
        let safe_content = content.replace('#', HASH_PLACEHOLDER);
        let sections: SectionMap = inistr!(safe safe_content.as_str())
            .map_err(|e| anyhow!("Failed to parse INI content: {}", e))?;
        Ok(Self { sections })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
        Self::from_str(&decode_text(&bytes))
    }

    pub fn has_group(&self, section: &str) -> bool {
        self.sections.contains_key(&section.to_lowercase())
    }

    pub fn has_key(&self, section: &str, key: &str) -> bool {
        self.read_string(section, key).is_some()
    }

    /// Returns the raw value, or `None` when the section/key is absent or the
    /// value is empty.
    pub fn read_string(&self, section: &str, key: &str) -> Option<String> {
        self.sections
            .get(&section.to_lowercase())
            .and_then(|props| props.get(&key.to_lowercase()))
            .and_then(|opt| opt.as_deref())
            .map(|s| s.trim().replace(HASH_PLACEHOLDER, "#"))
            .filter(|s| !s.is_empty())
    }

    pub fn read_string_or(&self, section: &str, key: &str, default: &str) -> String {
        self.read_string(section, key).unwrap_or_else(|| default.to_string())
    }

    pub fn read_bool(&self, section: &str, key: &str, default: bool) -> bool {
        match self.read_string(section, key) {
            Some(v) => {
                let parsed = parse_bool(&v, default);
                if !v.eq_ignore_ascii_case("Y") && !v.eq_ignore_ascii_case("N") {
                    log::debug!("[{}] {}={} is not Y/N, using default", section, key, v);
                }
                parsed
            }
            None => default,
        }
    }

    /// Integer inside `range`, or `None` when absent, unparseable or out of
    /// range.
    pub fn read_int_opt(&self, section: &str, key: &str, range: RangeInclusive<i32>) -> Option<i32> {
        let raw = self.read_string(section, key)?;
        match raw.parse::<i32>() {
            Ok(v) if range.contains(&v) => Some(v),
            Ok(v) => {
                log::debug!(
                    "[{}] {}={} outside {}..={}, ignored",
                    section,
                    key,
                    v,
                    range.start(),
                    range.end()
                );
                None
            }
            Err(_) => {
                log::debug!("[{}] {}={} is not an integer, ignored", section, key, raw);
                None
            }
        }
    }

    pub fn read_int(&self, section: &str, key: &str, range: RangeInclusive<i32>, default: i32) -> i32 {
        self.read_int_opt(section, key, range).unwrap_or(default)
    }

    pub fn read_float(&self, section: &str, key: &str, range: RangeInclusive<f32>, default: f32) -> f32 {
        let Some(raw) = self.read_string(section, key) else {
            return default;
        };
        match raw.parse::<f32>() {
            Ok(v) if range.contains(&v) => v,
            _ => {
                log::debug!("[{}] {}={} rejected, using {}", section, key, raw, default);
                default
            }
        }
    }

    /// Matches the value case-insensitively against `choices` and returns the
    /// associated item.
    pub fn read_choice<T: Copy>(&self, section: &str, key: &str, choices: &[(&str, T)], default: T) -> T {
        let Some(raw) = self.read_string(section, key) else {
            return default;
        };
        choices
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&raw))
            .map(|(_, value)| *value)
            .unwrap_or_else(|| {
                log::warn!("[{}] {}={} is not a recognised value", section, key, raw);
                default
            })
    }
}

/// Line oriented writer for ODF output.
#[derive(Debug, Default)]
pub struct OdfWriter {
    lines: Vec<String>,
}

impl OdfWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn add_comment(&mut self, text: &str) {
        self.lines.push(format!(";{}", text));
    }

    /// Starts a new `[section]`, separated from the previous one by a blank
    /// line.
    pub fn add_section(&mut self, name: &str) {
        if !self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.lines.push(format!("[{}]", name));
    }

    pub fn add_key(&mut self, key: &str, value: impl Display) {
        self.lines.push(format!("{}={}", key, value));
    }

    pub fn add_bool(&mut self, key: &str, value: bool) {
        self.add_key(key, bool_str(value));
    }

    pub fn add_decimal(&mut self, key: &str, value: f32) {
        self.add_key(key, format_decimal(value));
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn to_text(&self) -> String {
        let mut text = self.lines.join("\r\n");
        text.push_str("\r\n");
        text
    }

    pub fn to_latin1_bytes(&self) -> Vec<u8> {
        let text = self.to_text();
        let mut replaced = 0usize;
        let bytes = text
            .chars()
            .map(|c| {
                let code = c as u32;
                if code <= 0xFF {
                    code as u8
                } else {
                    replaced += 1;
                    b'?'
                }
            })
            .collect();
        if replaced > 0 {
            log::warn!("[OdfWriter] {} character(s) outside ISO-8859-1 were replaced by '?'", replaced);
        }
        bytes
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_latin1_bytes()).with_context(|| format!("Failed to write {:?}", path))?;
        log::info!("[OdfWriter] Wrote {} lines to {:?}", self.lines.len(), path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_is_zero_padded() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(0), "000");
    }

    #[test]
    fn decimal_formatting_is_plain() {
        assert_eq!(format_decimal(100.0), "100");
        assert_eq!(format_decimal(-3.5), "-3.5");
        assert_eq!(format_decimal(0.25), "0.25");
    }

    #[test]
    fn bool_parsing_is_tri_state() {
        assert!(parse_bool("Y", false));
        assert!(parse_bool("y", false));
        assert!(!parse_bool("N", true));
        assert!(parse_bool("", true), "Empty value should fall back to the default");
        assert!(!parse_bool("", false));
        assert!(parse_bool("maybe", true), "Garbage should fall back to the default");
    }

    #[test]
    fn latin1_bytes_decode_when_not_utf8() {
        let bytes = [b'N', b'a', b'm', b'e', b'=', 0xE9];
        assert_eq!(decode_text(&bytes), "Name=é");
        let bom = [0xEF, 0xBB, 0xBF, b'a'];
        assert_eq!(decode_text(&bom), "a");
    }

    #[test]
    fn reader_is_case_insensitive_and_keeps_hashes() {
        let reader = OdfReader::from_str("[Organ]\nChurchName=St. Mary #2\nHasPedals=Y\n").unwrap();
        assert!(reader.has_group("organ"));
        assert!(reader.has_group("ORGAN"));
        assert_eq!(reader.read_string("Organ", "churchname").as_deref(), Some("St. Mary #2"));
        assert!(reader.read_bool("Organ", "HasPedals", false));
        assert_eq!(reader.read_string("Organ", "Missing"), None);
    }

    #[test]
    fn out_of_range_integers_fall_back() {
        let reader = OdfReader::from_str("[S]\nA=5\nB=500\nC=abc\n").unwrap();
        assert_eq!(reader.read_int("S", "A", 0..=10, 1), 5);
        assert_eq!(reader.read_int("S", "B", 0..=10, 1), 1);
        assert_eq!(reader.read_int("S", "C", 0..=10, 1), 1);
        assert_eq!(reader.read_int("S", "D", 0..=10, 7), 7);
    }

    #[test]
    fn writer_uses_dos_line_endings_and_latin1() {
        let mut w = OdfWriter::new();
        w.add_section("Organ");
        w.add_key("ChurchName", "Église");
        w.add_bool("HasPedals", true);
        assert_eq!(w.to_text(), "[Organ]\r\nChurchName=Église\r\nHasPedals=Y\r\n");
        let bytes = w.to_latin1_bytes();
        assert!(bytes.contains(&0xC9), "É should be a single Latin-1 byte");

        let mut w = OdfWriter::new();
        w.add_key("Name", "漢");
        assert_eq!(w.to_latin1_bytes(), b"Name=?\r\n".to_vec());
    }
}

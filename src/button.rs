use crate::odf_io::{OdfReader, OdfWriter};

/// Attributes shared by every named, pushable or drawable organ control.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Button {
    name: String,
    pub displayed: bool,
    pub display_in_inverted_state: bool,
    /// 0 means no shortcut key.
    pub shortcut_key: u8,
}

impl Button {
    pub fn with_name(name: &str) -> Self {
        let mut button = Self::default();
        button.set_name(name);
        button
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A valid name does not start with whitespace and contains no `;` (the
    /// ODF comment character).
    pub fn is_valid_name(name: &str) -> bool {
        !name.starts_with(char::is_whitespace) && !name.contains(';')
    }

    /// Sets the name if it is valid. Returns whether it was accepted.
    pub fn set_name(&mut self, name: &str) -> bool {
        if !Self::is_valid_name(name) {
            log::warn!("[Button] Rejected invalid name {:?}", name);
            return false;
        }
        self.name = name.to_string();
        true
    }

    pub fn write(&self, w: &mut OdfWriter) {
        w.add_key("Name", self.name.trim_end());
        w.add_bool("Displayed", self.displayed);
        if self.display_in_inverted_state {
            w.add_bool("DisplayInInvertedState", true);
        }
        if self.shortcut_key != 0 {
            w.add_key("ShortcutKey", self.shortcut_key);
        }
    }

    pub fn read(reader: &OdfReader, section: &str) -> Self {
        let name = reader.read_string_or(section, "Name", "");
        let name = if Self::is_valid_name(&name) {
            name
        } else {
            log::warn!("[{}] Name {:?} is not valid, using an empty name", section, name);
            String::new()
        };
        Self {
            name,
            displayed: reader.read_bool(section, "Displayed", false),
            display_in_inverted_state: reader.read_bool(section, "DisplayInInvertedState", false),
            shortcut_key: reader.read_int(section, "ShortcutKey", 0..=255, 0) as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_validated() {
        let mut b = Button::default();
        assert!(b.set_name("Principal 8'"));
        assert!(!b.set_name(" Leading"), "Leading whitespace is not allowed");
        assert!(!b.set_name("Semi;colon"), "Semicolons are not allowed");
        assert_eq!(b.name(), "Principal 8'");
    }

    #[test]
    fn write_omits_defaults_and_trims_name() {
        let mut b = Button::with_name("Octave 4'   ");
        b.displayed = true;
        let mut w = OdfWriter::new();
        b.write(&mut w);
        assert_eq!(w.lines(), ["Name=Octave 4'", "Displayed=Y"]);

        b.display_in_inverted_state = true;
        b.shortcut_key = 65;
        let mut w = OdfWriter::new();
        b.write(&mut w);
        assert_eq!(
            w.lines(),
            ["Name=Octave 4'", "Displayed=Y", "DisplayInInvertedState=Y", "ShortcutKey=65"]
        );
    }

    #[test]
    fn read_rejects_out_of_range_shortcut() {
        let reader = OdfReader::from_str("[Switch001]\nName=Sw\nShortcutKey=300\nDisplayed=Y\n").unwrap();
        let b = Button::read(&reader, "Switch001");
        assert_eq!(b.name(), "Sw");
        assert_eq!(b.shortcut_key, 0);
        assert!(b.displayed);
    }
}

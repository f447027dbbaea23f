use crate::ids::{EnclosureId, HasId};
use crate::odf_io::{OdfReader, OdfWriter};

/// A swell box controlled by an expression pedal.
#[derive(Debug, Clone, PartialEq)]
pub struct Enclosure {
    id: EnclosureId,
    pub name: String,
    pub displayed: bool,
    /// Percentage of amplitude left with the box closed, 0..=100.
    pub amp_minimum_level: u32,
    /// 0..=200
    pub midi_input_number: u32,
}

impl Enclosure {
    pub fn new(id: EnclosureId) -> Self {
        Self {
            id,
            name: String::new(),
            displayed: false,
            amp_minimum_level: 1,
            midi_input_number: 0,
        }
    }

    pub fn write(&self, w: &mut OdfWriter) {
        w.add_key("Name", self.name.trim_end());
        w.add_bool("Displayed", self.displayed);
        w.add_key("AmpMinimumLevel", self.amp_minimum_level);
        w.add_key("MIDIInputNumber", self.midi_input_number);
    }

    pub fn read(reader: &OdfReader, section: &str, id: EnclosureId) -> Self {
        Self {
            id,
            name: reader.read_string_or(section, "Name", ""),
            displayed: reader.read_bool(section, "Displayed", false),
            amp_minimum_level: reader.read_int(section, "AmpMinimumLevel", 0..=100, 1) as u32,
            midi_input_number: reader.read_int(section, "MIDIInputNumber", 0..=200, 0) as u32,
        }
    }
}

impl HasId for Enclosure {
    type Id = EnclosureId;

    fn id(&self) -> EnclosureId {
        self.id
    }
}

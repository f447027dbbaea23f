use crate::coupler::Coupler;
use crate::divisional::Divisional;
use crate::ids::{CouplerId, DivisionalId, HasId, ManualId, StopId, SwitchId, TremulantId, position_of, position_of_id};
use crate::odf_io::{OdfReader, OdfWriter, format_index};
use crate::organ::Organ;
use crate::stop::Stop;

pub const MAX_LOGICAL_KEYS: u32 = 192;
pub const MAX_ACCESSIBLE_KEYS: u32 = 85;
pub const MIDI_KEY_COUNT: usize = 128;

/// A keyboard. Owns its stops, couplers and divisionals; tremulants and
/// switches are owned by the organ and only referenced here.
#[derive(Debug, Clone, PartialEq)]
pub struct Manual {
    id: ManualId,
    pub name: String,
    is_pedal: bool,
    /// 1..=192
    pub number_of_logical_keys: u32,
    /// 1..=number_of_logical_keys
    pub first_accessible_key_logical_key_number: u32,
    pub first_accessible_key_midi_note_number: u8,
    /// 0..=85
    pub number_of_accessible_keys: u32,
    /// 0..=200
    pub midi_input_number: u32,
    pub displayed: bool,
    pub(crate) stops: Vec<Stop>,
    pub(crate) couplers: Vec<Coupler>,
    pub(crate) divisionals: Vec<Divisional>,
    tremulants: Vec<TremulantId>,
    switches: Vec<SwitchId>,
    midi_key_map: [u8; MIDI_KEY_COUNT],
}

fn identity_key_map() -> [u8; MIDI_KEY_COUNT] {
    std::array::from_fn(|i| i as u8)
}

impl Manual {
    pub fn new(id: ManualId, is_pedal: bool) -> Self {
        Self {
            id,
            name: String::new(),
            is_pedal,
            number_of_logical_keys: if is_pedal { 32 } else { 61 },
            first_accessible_key_logical_key_number: 1,
            first_accessible_key_midi_note_number: 36,
            number_of_accessible_keys: if is_pedal { 32 } else { 61 },
            midi_input_number: 0,
            displayed: false,
            stops: Vec::new(),
            couplers: Vec::new(),
            divisionals: Vec::new(),
            tremulants: Vec::new(),
            switches: Vec::new(),
            midi_key_map: identity_key_map(),
        }
    }

    pub fn is_pedal(&self) -> bool {
        self.is_pedal
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn couplers(&self) -> &[Coupler] {
        &self.couplers
    }

    pub fn divisionals(&self) -> &[Divisional] {
        &self.divisionals
    }

    pub fn tremulants(&self) -> &[TremulantId] {
        &self.tremulants
    }

    pub fn switches(&self) -> &[SwitchId] {
        &self.switches
    }

    pub fn stop(&self, id: StopId) -> Option<&Stop> {
        self.stops.iter().find(|s| s.id() == id)
    }

    pub fn stop_mut(&mut self, id: StopId) -> Option<&mut Stop> {
        self.stops.iter_mut().find(|s| s.id() == id)
    }

    pub fn coupler(&self, id: CouplerId) -> Option<&Coupler> {
        self.couplers.iter().find(|c| c.id() == id)
    }

    pub fn coupler_mut(&mut self, id: CouplerId) -> Option<&mut Coupler> {
        self.couplers.iter_mut().find(|c| c.id() == id)
    }

    pub fn divisional(&self, id: DivisionalId) -> Option<&Divisional> {
        self.divisionals.iter().find(|d| d.id() == id)
    }

    pub fn divisional_mut(&mut self, id: DivisionalId) -> Option<&mut Divisional> {
        self.divisionals.iter_mut().find(|d| d.id() == id)
    }

    pub fn stop_index(&self, id: StopId) -> Option<usize> {
        position_of(&self.stops, id)
    }

    pub fn coupler_index(&self, id: CouplerId) -> Option<usize> {
        position_of(&self.couplers, id)
    }

    pub fn divisional_index(&self, id: DivisionalId) -> Option<usize> {
        position_of(&self.divisionals, id)
    }

    pub fn tremulant_index(&self, id: TremulantId) -> Option<usize> {
        position_of_id(&self.tremulants, id)
    }

    pub fn switch_index(&self, id: SwitchId) -> Option<usize> {
        position_of_id(&self.switches, id)
    }

    pub fn has_tremulant(&self, id: TremulantId) -> bool {
        self.tremulants.contains(&id)
    }

    /// Adds a tremulant reference; returns false if it is already present.
    pub fn add_tremulant(&mut self, id: TremulantId) -> bool {
        if self.has_tremulant(id) {
            return false;
        }
        self.tremulants.push(id);
        true
    }

    pub fn remove_tremulant(&mut self, id: TremulantId) {
        self.tremulants.retain(|t| *t != id);
    }

    pub fn has_switch(&self, id: SwitchId) -> bool {
        self.switches.contains(&id)
    }

    /// Adds a switch reference; returns false if it is already present.
    pub fn add_switch(&mut self, id: SwitchId) -> bool {
        if self.has_switch(id) {
            return false;
        }
        self.switches.push(id);
        true
    }

    pub fn remove_switch(&mut self, id: SwitchId) {
        self.switches.retain(|s| *s != id);
    }

    /// MIDI note sent for `key` (0..=127).
    pub fn midi_key(&self, key: usize) -> Option<u8> {
        self.midi_key_map.get(key).copied()
    }

    pub fn set_midi_key(&mut self, key: usize, note: u8) -> bool {
        match self.midi_key_map.get_mut(key) {
            Some(slot) if note < MIDI_KEY_COUNT as u8 => {
                *slot = note;
                true
            }
            _ => false,
        }
    }

    pub fn has_custom_key_map(&self) -> bool {
        self.midi_key_map != identity_key_map()
    }

    pub fn write(&self, w: &mut OdfWriter, organ: &Organ) {
        w.add_key("Name", self.name.trim_end());
        w.add_key("NumberOfLogicalKeys", self.number_of_logical_keys);
        w.add_key(
            "FirstAccessibleKeyLogicalKeyNumber",
            self.first_accessible_key_logical_key_number,
        );
        w.add_key("FirstAccessibleKeyMIDINoteNumber", self.first_accessible_key_midi_note_number);
        w.add_key("NumberOfAccessibleKeys", self.number_of_accessible_keys);
        w.add_key("MIDIInputNumber", self.midi_input_number);
        w.add_bool("Displayed", self.displayed);

        let stops: Vec<usize> = self.stops.iter().filter_map(|s| organ.organ_stop_number(s.id())).collect();
        let couplers: Vec<usize> = self
            .couplers
            .iter()
            .filter_map(|c| organ.organ_coupler_number(c.id()))
            .collect();
        let divisionals: Vec<usize> = self
            .divisionals
            .iter()
            .filter_map(|d| organ.organ_divisional_number(d.id()))
            .collect();
        let tremulants = self.resolve_numbers("tremulant", self.tremulants.iter().map(|t| organ.tremulant_index(*t)));
        let switches = self.resolve_numbers("switch", self.switches.iter().map(|s| organ.switch_index(*s)));

        w.add_key("NumberOfStops", stops.len());
        w.add_key("NumberOfCouplers", couplers.len());
        w.add_key("NumberOfDivisionals", divisionals.len());
        w.add_key("NumberOfTremulants", tremulants.len());
        w.add_key("NumberOfSwitches", switches.len());
        for (prefix, numbers) in [
            ("Stop", &stops),
            ("Coupler", &couplers),
            ("Divisional", &divisionals),
            ("Tremulant", &tremulants),
            ("Switch", &switches),
        ] {
            for (i, number) in numbers.iter().enumerate() {
                w.add_key(&format!("{}{}", prefix, format_index(i + 1)), number);
            }
        }

        for (key, note) in self.midi_key_map.iter().enumerate() {
            if *note as usize != key {
                w.add_key(&format!("MIDIKey{}", format_index(key)), note);
            }
        }
    }

    fn resolve_numbers(&self, kind: &str, indices: impl Iterator<Item = Option<usize>>) -> Vec<usize> {
        indices
            .filter_map(|index| {
                if index.is_none() {
                    log::warn!("[Manual] {:?}: a referenced {} no longer exists", self.name, kind);
                }
                index.map(|i| i + 1)
            })
            .collect()
    }

    /// Reads the manual's own attributes, its tremulant and switch
    /// references and its key map. Stops, couplers and divisionals live in
    /// their own sections; see [Manual::read_element_numbers].
    pub fn read(reader: &OdfReader, section: &str, organ: &Organ, id: ManualId, is_pedal: bool) -> Self {
        let mut manual = Self::new(id, is_pedal);
        manual.name = reader.read_string_or(section, "Name", "");
        manual.number_of_logical_keys = reader.read_int(
            section,
            "NumberOfLogicalKeys",
            1..=MAX_LOGICAL_KEYS as i32,
            manual.number_of_logical_keys as i32,
        ) as u32;
        manual.first_accessible_key_logical_key_number = reader.read_int(
            section,
            "FirstAccessibleKeyLogicalKeyNumber",
            1..=manual.number_of_logical_keys as i32,
            1,
        ) as u32;
        manual.first_accessible_key_midi_note_number =
            reader.read_int(section, "FirstAccessibleKeyMIDINoteNumber", 0..=127, 36) as u8;
        manual.number_of_accessible_keys = reader.read_int(
            section,
            "NumberOfAccessibleKeys",
            0..=MAX_ACCESSIBLE_KEYS as i32,
            manual.number_of_accessible_keys as i32,
        ) as u32;
        manual.midi_input_number = reader.read_int(section, "MIDIInputNumber", 0..=200, 0) as u32;
        manual.displayed = reader.read_bool(section, "Displayed", false);

        let tremulant_count = organ.tremulants().len();
        for number in Self::read_numbers(reader, section, "Tremulant", tremulant_count) {
            if let Some(tremulant) = organ.tremulant_id_at(number - 1)
                && !manual.add_tremulant(tremulant)
            {
                log::warn!("[{}] Tremulant {} is referenced twice", section, number);
            }
        }
        let switch_count = organ.switches().len();
        for number in Self::read_numbers(reader, section, "Switch", switch_count) {
            if let Some(switch) = organ.switch_id_at(number - 1)
                && !manual.add_switch(switch)
            {
                log::warn!("[{}] Switch {} is referenced twice", section, number);
            }
        }

        for key in 0..MIDI_KEY_COUNT {
            if let Some(note) = reader.read_int_opt(section, &format!("MIDIKey{}", format_index(key)), 0..=127) {
                manual.midi_key_map[key] = note as u8;
            }
        }
        manual
    }

    /// Reads the `NumberOf...` count and the 1-based organ-wide numbers of the
    /// stops, couplers or divisionals the manual owns. Entries beyond
    /// `limit` are dropped.
    pub fn read_element_numbers(reader: &OdfReader, section: &str, prefix: &str, limit: usize) -> Vec<usize> {
        Self::read_numbers(reader, section, prefix, limit)
    }

    fn read_numbers(reader: &OdfReader, section: &str, prefix: &str, limit: usize) -> Vec<usize> {
        let count_key = match prefix {
            "Switch" => "NumberOfSwitches".to_string(),
            _ => format!("NumberOf{}s", prefix),
        };
        let count = reader.read_int(section, &count_key, 0..=999, 0) as usize;
        let mut numbers = Vec::with_capacity(count);
        for i in 1..=count {
            let key = format!("{}{}", prefix, format_index(i));
            match reader.read_int_opt(section, &key, 1..=limit as i32) {
                Some(number) => numbers.push(number as usize),
                None => log::error!("[{}] {} does not reference a valid {}", section, key, prefix.to_lowercase()),
            }
        }
        numbers
    }
}

impl HasId for Manual {
    type Id = ManualId;

    fn id(&self) -> ManualId {
        self.id
    }
}

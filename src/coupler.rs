use crate::drawstop::{Drawstop, HasDrawstop};
use crate::ids::{CouplerId, HasId, ManualId};
use crate::odf_io::{OdfReader, OdfWriter};
use crate::organ::Organ;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CouplerType {
    #[default]
    Normal,
    Bass,
    Melody,
}

impl CouplerType {
    pub const ALL: [(&'static str, CouplerType); 3] = [
        ("Normal", CouplerType::Normal),
        ("Bass", CouplerType::Bass),
        ("Melody", CouplerType::Melody),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CouplerType::Normal => "Normal",
            CouplerType::Bass => "Bass",
            CouplerType::Melody => "Melody",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Coupler {
    id: CouplerId,
    owning_manual: ManualId,
    pub drawstop: Drawstop,
    pub unison_off: bool,
    /// `None` when the coupler has no (valid) destination.
    pub destination_manual: Option<ManualId>,
    /// -24..=24
    pub destination_keyshift: i32,
    pub coupler_type: CouplerType,
    pub couple_to_subsequent_unison_intermanual_couplers: bool,
    pub couple_to_subsequent_upward_intermanual_couplers: bool,
    pub couple_to_subsequent_downward_intermanual_couplers: bool,
    pub couple_to_subsequent_upward_intramanual_couplers: bool,
    pub couple_to_subsequent_downward_intramanual_couplers: bool,
    pub first_midi_note_number: u8,
    pub number_of_keys: u8,
}

impl Coupler {
    pub fn new(id: CouplerId, owning_manual: ManualId) -> Self {
        Self {
            id,
            owning_manual,
            drawstop: Drawstop::default(),
            unison_off: false,
            destination_manual: None,
            destination_keyshift: 0,
            coupler_type: CouplerType::Normal,
            couple_to_subsequent_unison_intermanual_couplers: false,
            couple_to_subsequent_upward_intermanual_couplers: false,
            couple_to_subsequent_downward_intermanual_couplers: false,
            couple_to_subsequent_upward_intramanual_couplers: false,
            couple_to_subsequent_downward_intramanual_couplers: false,
            first_midi_note_number: 0,
            number_of_keys: 127,
        }
    }

    pub fn owning_manual(&self) -> ManualId {
        self.owning_manual
    }

    pub(crate) fn set_owning_manual(&mut self, manual: ManualId) {
        self.owning_manual = manual;
    }

    pub fn write(&self, w: &mut OdfWriter, organ: &Organ) {
        self.drawstop.write(w, organ);
        w.add_bool("UnisonOff", self.unison_off);
        if !self.unison_off {
            match self.destination_manual.and_then(|m| organ.odf_manual_number(m)) {
                Some(number) => w.add_key("DestinationManual", number),
                None => log::warn!("[Coupler] {:?} has no destination manual", self.drawstop.button.name()),
            }
            w.add_key("DestinationKeyshift", self.destination_keyshift);
            if self.coupler_type == CouplerType::Normal {
                w.add_bool(
                    "CoupleToSubsequentUnisonIntermanualCouplers",
                    self.couple_to_subsequent_unison_intermanual_couplers,
                );
                w.add_bool(
                    "CoupleToSubsequentUpwardIntermanualCouplers",
                    self.couple_to_subsequent_upward_intermanual_couplers,
                );
                w.add_bool(
                    "CoupleToSubsequentDownwardIntermanualCouplers",
                    self.couple_to_subsequent_downward_intermanual_couplers,
                );
                w.add_bool(
                    "CoupleToSubsequentUpwardIntramanualCouplers",
                    self.couple_to_subsequent_upward_intramanual_couplers,
                );
                w.add_bool(
                    "CoupleToSubsequentDownwardIntramanualCouplers",
                    self.couple_to_subsequent_downward_intramanual_couplers,
                );
            } else {
                w.add_key("CouplerType", self.coupler_type.as_str());
            }
        }
        if self.first_midi_note_number != 0 {
            w.add_key("FirstMIDINoteNumber", self.first_midi_note_number);
        }
        if self.number_of_keys != 127 {
            w.add_key("NumberOfKeys", self.number_of_keys);
        }
    }

    pub fn read(reader: &OdfReader, section: &str, organ: &Organ, id: CouplerId, owning_manual: ManualId) -> Self {
        let mut coupler = Self::new(id, owning_manual);
        coupler.drawstop = Drawstop::read(reader, section, organ);
        coupler.unison_off = reader.read_bool(section, "UnisonOff", false);

        let manual_count = organ.number_of_manuals() as i32;
        coupler.destination_manual = reader
            .read_int_opt(section, "DestinationManual", 0..=manual_count)
            .and_then(|number| organ.manual_from_odf_number(number));
        if !coupler.unison_off && coupler.destination_manual.is_none() {
            log::warn!("[{}] coupler has no valid destination manual", section);
        }

        coupler.destination_keyshift = reader.read_int(section, "DestinationKeyshift", -24..=24, 0);
        coupler.couple_to_subsequent_unison_intermanual_couplers =
            reader.read_bool(section, "CoupleToSubsequentUnisonIntermanualCouplers", false);
        coupler.couple_to_subsequent_upward_intermanual_couplers =
            reader.read_bool(section, "CoupleToSubsequentUpwardIntermanualCouplers", false);
        coupler.couple_to_subsequent_downward_intermanual_couplers =
            reader.read_bool(section, "CoupleToSubsequentDownwardIntermanualCouplers", false);
        coupler.couple_to_subsequent_upward_intramanual_couplers =
            reader.read_bool(section, "CoupleToSubsequentUpwardIntramanualCouplers", false);
        coupler.couple_to_subsequent_downward_intramanual_couplers =
            reader.read_bool(section, "CoupleToSubsequentDownwardIntramanualCouplers", false);
        coupler.coupler_type = reader.read_choice(section, "CouplerType", &CouplerType::ALL, CouplerType::Normal);
        coupler.first_midi_note_number = reader.read_int(section, "FirstMIDINoteNumber", 0..=127, 0) as u8;
        coupler.number_of_keys = reader.read_int(section, "NumberOfKeys", 0..=127, 127) as u8;
        coupler
    }
}

impl HasId for Coupler {
    type Id = CouplerId;

    fn id(&self) -> CouplerId {
        self.id
    }
}

impl HasDrawstop for Coupler {
    fn drawstop(&self) -> &Drawstop {
        &self.drawstop
    }

    fn drawstop_mut(&mut self) -> &mut Drawstop {
        &mut self.drawstop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn organ_with_pedal_and_manuals(manuals: usize) -> (Organ, Vec<ManualId>) {
        let mut organ = Organ::new();
        let mut ids = vec![organ.add_manual(true).unwrap()];
        for _ in 0..manuals {
            ids.push(organ.add_manual(false).unwrap());
        }
        (organ, ids)
    }

    fn round_trip(coupler: &Coupler, organ: &Organ) -> (Vec<String>, Coupler) {
        let mut w = OdfWriter::new();
        w.add_section("Coupler001");
        coupler.write(&mut w, organ);
        let reader = OdfReader::from_str(&w.to_text()).unwrap();
        let read = Coupler::read(&reader, "Coupler001", organ, coupler.id(), coupler.owning_manual());
        (w.lines().to_vec(), read)
    }

    #[test]
    fn normal_coupler_round_trip() {
        let (organ, manuals) = organ_with_pedal_and_manuals(3);
        let mut c = Coupler::new(CouplerId(100), manuals[1]);
        c.drawstop.button.set_name("Sw to Gt");
        c.destination_manual = Some(manuals[2]);
        c.destination_keyshift = 12;
        c.couple_to_subsequent_unison_intermanual_couplers = true;
        c.couple_to_subsequent_upward_intermanual_couplers = true;
        c.couple_to_subsequent_downward_intermanual_couplers = true;
        c.couple_to_subsequent_upward_intramanual_couplers = true;
        c.couple_to_subsequent_downward_intramanual_couplers = true;

        let (lines, read) = round_trip(&c, &organ);
        assert!(lines.contains(&"DestinationManual=2".to_string()), "Pedal present: index equals ODF number");
        assert_eq!(read.destination_keyshift, 12);
        assert_eq!(read.destination_manual, Some(manuals[2]));
        assert!(read.couple_to_subsequent_unison_intermanual_couplers);
        assert!(read.couple_to_subsequent_upward_intermanual_couplers);
        assert!(read.couple_to_subsequent_downward_intermanual_couplers);
        assert!(read.couple_to_subsequent_upward_intramanual_couplers);
        assert!(read.couple_to_subsequent_downward_intramanual_couplers);
        assert_eq!(read, c);
    }

    #[test]
    fn destination_is_shifted_without_pedal() {
        let mut organ = Organ::new();
        let gt = organ.add_manual(false).unwrap();
        let sw = organ.add_manual(false).unwrap();
        let mut c = Coupler::new(CouplerId(50), gt);
        c.destination_manual = Some(sw);
        let (lines, read) = round_trip(&c, &organ);
        assert!(lines.contains(&"DestinationManual=2".to_string()));
        assert_eq!(read.destination_manual, Some(sw));

        let reader = OdfReader::from_str("[Coupler001]\nDestinationManual=0\n").unwrap();
        let c = Coupler::read(&reader, "Coupler001", &organ, CouplerId(51), gt);
        assert_eq!(c.destination_manual, None, "Manual 0 does not exist without a pedal");
    }

    #[test]
    fn bass_coupler_writes_type_instead_of_flags() {
        let (organ, manuals) = organ_with_pedal_and_manuals(1);
        let mut c = Coupler::new(CouplerId(9), manuals[1]);
        c.destination_manual = Some(manuals[0]);
        c.coupler_type = CouplerType::Bass;
        c.first_midi_note_number = 36;
        c.number_of_keys = 32;
        let (lines, read) = round_trip(&c, &organ);
        assert!(lines.contains(&"CouplerType=Bass".to_string()));
        assert!(!lines.iter().any(|l| l.starts_with("CoupleToSubsequent")));
        assert!(lines.contains(&"FirstMIDINoteNumber=36".to_string()));
        assert!(lines.contains(&"NumberOfKeys=32".to_string()));
        assert_eq!(read, c);
    }

    #[test]
    fn unison_off_writes_only_the_flag() {
        let (organ, manuals) = organ_with_pedal_and_manuals(1);
        let mut c = Coupler::new(CouplerId(9), manuals[1]);
        c.unison_off = true;
        let (lines, read) = round_trip(&c, &organ);
        assert!(lines.contains(&"UnisonOff=Y".to_string()));
        assert!(!lines.iter().any(|l| l.starts_with("Destination")));
        assert!(read.unison_off);
    }

    #[test]
    fn out_of_range_values_keep_defaults() {
        let (organ, manuals) = organ_with_pedal_and_manuals(2);
        let reader = OdfReader::from_str(
            "[Coupler001]\nDestinationManual=7\nDestinationKeyshift=25\nCouplerType=melody\nFirstMIDINoteNumber=128\nNumberOfKeys=-1\n",
        )
        .unwrap();
        let c = Coupler::read(&reader, "Coupler001", &organ, CouplerId(3), manuals[1]);
        assert_eq!(c.destination_manual, None);
        assert_eq!(c.destination_keyshift, 0);
        assert_eq!(c.coupler_type, CouplerType::Melody);
        assert_eq!(c.first_midi_note_number, 0);
        assert_eq!(c.number_of_keys, 127);

        let reader = OdfReader::from_str("[Coupler001]\nDestinationKeyshift=-24\n").unwrap();
        let c = Coupler::read(&reader, "Coupler001", &organ, CouplerId(4), manuals[1]);
        assert_eq!(c.destination_keyshift, -24);
    }
}

use anyhow::{Result, anyhow};
use std::collections::HashSet;
use std::path::Path;

use crate::coupler::Coupler;
use crate::divisional::Divisional;
use crate::divisional_coupler::DivisionalCoupler;
use crate::enclosure::Enclosure;
use crate::general::General;
use crate::ids::{HasId, ManualId};
use crate::manual::Manual;
use crate::odf_io::{OdfReader, format_index};
use crate::organ::{MAX_MANUALS, Organ};
use crate::rank::Rank;
use crate::reversible_piston::ReversiblePiston;
use crate::stop::Stop;
use crate::switch::GoSwitch;
use crate::tremulant::Tremulant;
use crate::windchest::WindchestGroup;

const ORGAN: &str = "Organ";

/// Builds an [Organ] from ODF text, reading elements in the order their
/// cross references require.
pub struct OrganFileParser<'a> {
    reader: &'a OdfReader,
    organ: Organ,
}

impl<'a> OrganFileParser<'a> {
    pub fn load(path: &Path) -> Result<Organ> {
        log::info!("[OrganFileParser] Loading {:?}", path);
        let reader = OdfReader::load(path)?;
        OrganFileParser::parse(&reader)
    }

    pub fn parse_str(text: &str) -> Result<Organ> {
        let reader = OdfReader::from_str(text)?;
        OrganFileParser::parse(&reader)
    }

    pub fn parse(reader: &'a OdfReader) -> Result<Organ> {
        if !reader.has_group(ORGAN) {
            return Err(anyhow!("No [Organ] section found, this is not an organ definition file"));
        }
        let mut parser = OrganFileParser {
            reader,
            organ: Organ::new(),
        };
        parser.organ.using_old_panel_format = !reader.has_group("Panel000");
        if parser.organ.using_old_panel_format {
            log::debug!("[OrganFileParser] No Panel000 section, using the old panel format");
        }
        parser.organ.read_attributes(reader);

        parser.read_enclosures();
        parser.read_switches_and_tremulants();
        parser.read_windchest_groups();
        parser.read_ranks();
        let manuals = parser.read_manuals();
        parser.read_manual_elements(&manuals);
        parser.read_divisional_couplers();
        parser.read_generals();
        parser.read_reversible_pistons();

        let organ = parser.organ;
        log::info!(
            "[OrganFileParser] Loaded {} manual(s), {} stop(s), {} rank(s), {} switch(es)",
            organ.manuals().len(),
            organ.all_stops().count(),
            organ.ranks().len(),
            organ.switches().len()
        );
        Ok(organ)
    }

    fn count(&self, key: &str, max: usize) -> usize {
        self.reader.read_int(ORGAN, key, 0..=max as i32, 0) as usize
    }

    /// Logs declared sections that are missing. The element is still created
    /// with defaults so later positions stay aligned.
    fn check_section(&self, section: &str) {
        if !self.reader.has_group(section) {
            log::warn!("[OrganFileParser] Section [{}] is declared but missing", section);
        }
    }

    fn read_enclosures(&mut self) {
        for i in 1..=self.count("NumberOfEnclosures", 999) {
            let section = format!("Enclosure{}", format_index(i));
            self.check_section(&section);
            let id = self.organ.add_enclosure();
            self.organ.replace_enclosure(Enclosure::read(self.reader, &section, id));
        }
    }

    /// Switches and tremulants may reference any switch, so all placeholders
    /// exist before the first one is read.
    fn read_switches_and_tremulants(&mut self) {
        let switches: Vec<_> = (0..self.count("NumberOfSwitches", 999))
            .map(|_| self.organ.add_switch())
            .collect();
        let tremulants: Vec<_> = (0..self.count("NumberOfTremulants", 999))
            .map(|_| self.organ.add_tremulant())
            .collect();

        for (i, id) in switches.into_iter().enumerate() {
            let section = format!("Switch{}", format_index(i + 1));
            self.check_section(&section);
            let switch = GoSwitch::read(self.reader, &section, &self.organ, id);
            self.organ.replace_switch(switch);
        }
        for (i, id) in tremulants.into_iter().enumerate() {
            let section = format!("Tremulant{}", format_index(i + 1));
            self.check_section(&section);
            let tremulant = Tremulant::read(self.reader, &section, &self.organ, id);
            self.organ.replace_tremulant(tremulant);
        }
    }

    fn read_windchest_groups(&mut self) {
        for i in 1..=self.count("NumberOfWindchestGroups", 999) {
            let section = format!("WindchestGroup{}", format_index(i));
            self.check_section(&section);
            let id = self.organ.add_windchest_group();
            let windchest = WindchestGroup::read(self.reader, &section, &self.organ, id);
            self.organ.replace_windchest_group(windchest);
        }
    }

    fn read_ranks(&mut self) {
        for i in 1..=self.count("NumberOfRanks", 999) {
            let section = format!("Rank{}", format_index(i));
            self.check_section(&section);
            let id = self.organ.add_rank();
            let rank = Rank::read(self.reader, &section, &self.organ, id);
            self.organ.replace_rank(rank);
        }
    }

    /// Creates every manual first so couplers can target manuals defined
    /// after their own.
    fn read_manuals(&mut self) -> Vec<ManualId> {
        let has_pedal = self.reader.read_bool(ORGAN, "HasPedals", false);
        if has_pedal && let Err(e) = self.organ.add_manual(true) {
            log::error!("[OrganFileParser] {}", e);
        }
        for _ in 0..self.count("NumberOfManuals", MAX_MANUALS) {
            if let Err(e) = self.organ.add_manual(false) {
                log::error!("[OrganFileParser] {}", e);
            }
        }

        let manuals: Vec<(ManualId, bool)> = self.organ.manuals().iter().map(|m| (m.id(), m.is_pedal())).collect();
        for (index, (id, is_pedal)) in manuals.iter().enumerate() {
            let number = if has_pedal { index } else { index + 1 };
            let section = format!("Manual{}", format_index(number));
            self.check_section(&section);
            let manual = Manual::read(self.reader, &section, &self.organ, *id, *is_pedal);
            self.organ.replace_manual_attributes(manual);
        }
        manuals.into_iter().map(|(id, _)| id).collect()
    }

    /// Reads the stop, coupler and divisional sections each manual lists.
    /// Couplers are read once all stops exist; divisionals once the manual's
    /// own stops and couplers exist.
    fn read_manual_elements(&mut self, manuals: &[ManualId]) {
        let mut used_stops = HashSet::new();
        for &manual in manuals {
            let section = self.manual_section(manual);
            for number in Manual::read_element_numbers(self.reader, &section, "Stop", 999) {
                if !used_stops.insert(number) {
                    log::warn!("[{}] Stop{} is used by more than one manual", section, format_index(number));
                }
                let stop_section = format!("Stop{}", format_index(number));
                self.check_section(&stop_section);
                let (id, rank_id) = (self.organ.mint(), self.organ.mint());
                let stop = Stop::read(self.reader, &stop_section, &self.organ, id, manual, rank_id);
                self.organ.push_stop(stop);
                self.organ.record_file_stop_number(number, id);
            }
        }

        for &manual in manuals {
            let section = self.manual_section(manual);
            for number in Manual::read_element_numbers(self.reader, &section, "Coupler", 999) {
                let coupler_section = format!("Coupler{}", format_index(number));
                self.check_section(&coupler_section);
                let id = self.organ.mint();
                let coupler = Coupler::read(self.reader, &coupler_section, &self.organ, id, manual);
                self.organ.push_coupler(coupler);
            }
        }

        for &manual in manuals {
            let section = self.manual_section(manual);
            for number in Manual::read_element_numbers(self.reader, &section, "Divisional", 999) {
                let divisional_section = format!("Divisional{}", format_index(number));
                self.check_section(&divisional_section);
                let id = self.organ.mint();
                let divisional = Divisional::read(self.reader, &divisional_section, &self.organ, manual, id);
                self.organ.push_divisional(manual, divisional);
            }
        }
    }

    fn manual_section(&self, manual: ManualId) -> String {
        let number = self.organ.odf_manual_number(manual).unwrap_or_default();
        format!("Manual{}", format_index(number))
    }

    fn read_divisional_couplers(&mut self) {
        for i in 1..=self.count("NumberOfDivisionalCouplers", 999) {
            let section = format!("DivisionalCoupler{}", format_index(i));
            self.check_section(&section);
            let id = self.organ.mint();
            let coupler = DivisionalCoupler::read(self.reader, &section, &self.organ, id);
            self.organ.push_divisional_coupler(coupler);
        }
    }

    fn read_generals(&mut self) {
        for i in 1..=self.count("NumberOfGenerals", 999) {
            let section = format!("General{}", format_index(i));
            self.check_section(&section);
            let id = self.organ.mint();
            let general = General::read(self.reader, &section, &self.organ, id);
            self.organ.push_general(general);
        }
    }

    fn read_reversible_pistons(&mut self) {
        for i in 1..=self.count("NumberOfReversiblePistons", 999) {
            let section = format!("ReversiblePiston{}", format_index(i));
            self.check_section(&section);
            let id = self.organ.mint();
            let piston = ReversiblePiston::read(self.reader, &section, &self.organ, id);
            self.organ.push_reversible_piston(piston);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_organ_section_is_an_error() {
        let result = OrganFileParser::parse_str("[Manual001]\nName=Great\n");
        assert!(result.is_err());
    }

    #[test]
    fn panel_format_is_detected() {
        let organ = OrganFileParser::parse_str("[Organ]\nChurchName=X\n").unwrap();
        assert!(organ.using_old_panel_format);
        let organ = OrganFileParser::parse_str("[Organ]\nChurchName=X\n[Panel000]\nName=Main\n").unwrap();
        assert!(!organ.using_old_panel_format);
    }

    #[test]
    fn missing_sections_keep_positions() {
        let organ = OrganFileParser::parse_str(
            "[Organ]\nNumberOfSwitches=3\n[Switch001]\nName=A\n[Switch003]\nName=C\nFunction=Not\nSwitch001=1\n",
        )
        .unwrap();
        assert_eq!(organ.switches().len(), 3);
        assert_eq!(organ.switches()[1].drawstop.button.name(), "");
        assert_eq!(organ.switches()[2].drawstop.switches(), [organ.switches()[0].id()]);
    }

    #[test]
    fn switches_may_reference_later_switches() {
        let organ = OrganFileParser::parse_str(
            "[Organ]\nNumberOfSwitches=2\n[Switch001]\nName=Gate\nFunction=And\nSwitchCount=1\nSwitch001=2\n[Switch002]\nName=Input\n",
        )
        .unwrap();
        assert_eq!(organ.switches()[0].drawstop.switches(), [organ.switches()[1].id()]);
    }

    #[test]
    fn manual_stops_use_organ_wide_numbers() {
        let organ = OrganFileParser::parse_str(
            "[Organ]\nHasPedals=Y\nNumberOfManuals=1\n\
             [Manual000]\nName=Pedal\nNumberOfStops=1\nStop001=2\n\
             [Manual001]\nName=Great\nNumberOfStops=1\nStop001=1\n\
             [Stop001]\nName=Principal\n[Stop002]\nName=Subbass\n",
        )
        .unwrap();
        assert_eq!(organ.manuals()[0].stops()[0].drawstop.button.name(), "Subbass");
        assert_eq!(organ.manuals()[1].stops()[0].drawstop.button.name(), "Principal");
        assert_eq!(organ.stop_at_file_number(1), Some(organ.manuals()[1].stops()[0].id()));
        assert_eq!(organ.stop_at_file_number(2), Some(organ.manuals()[0].stops()[0].id()));
        assert_eq!(organ.stop_at_file_number(3), None);
    }
}

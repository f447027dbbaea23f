use crate::button::Button;
use crate::combination::{CombinationList, read_count, read_signed_entry, write_signed_entries};
use crate::ids::{CouplerId, DivisionalId, HasId, ManualId, StopId, SwitchId, TremulantId};
use crate::manual::Manual;
use crate::odf_io::{OdfReader, OdfWriter, format_index};
use crate::organ::Organ;

/// A combination scoped to one manual. All positions are relative to the
/// owning manual's lists.
#[derive(Debug, Clone, PartialEq)]
pub struct Divisional {
    id: DivisionalId,
    pub button: Button,
    pub protected: bool,
    pub stops: CombinationList<StopId>,
    pub couplers: CombinationList<CouplerId>,
    pub tremulants: CombinationList<TremulantId>,
    pub switches: CombinationList<SwitchId>,
}

impl Divisional {
    pub fn new(id: DivisionalId) -> Self {
        Self {
            id,
            button: Button::default(),
            protected: false,
            stops: CombinationList::default(),
            couplers: CombinationList::default(),
            tremulants: CombinationList::default(),
            switches: CombinationList::default(),
        }
    }

    pub fn write(&self, w: &mut OdfWriter, manual: &Manual) {
        self.button.write(w);
        if self.protected {
            w.add_bool("Protected", true);
        }
        let name = self.button.name();
        let stops = resolve(name, "stop", self.stops.iter().map(|a| (manual.stop_index(a.id), a.is_on)));
        write_signed_entries(w, "NumberOfStops", "Stop", &stops);
        let couplers = resolve(name, "coupler", self.couplers.iter().map(|a| (manual.coupler_index(a.id), a.is_on)));
        write_signed_entries(w, "NumberOfCouplers", "Coupler", &couplers);
        let tremulants = resolve(
            name,
            "tremulant",
            self.tremulants.iter().map(|a| (manual.tremulant_index(a.id), a.is_on)),
        );
        write_signed_entries(w, "NumberOfTremulants", "Tremulant", &tremulants);
        let switches = resolve(name, "switch", self.switches.iter().map(|a| (manual.switch_index(a.id), a.is_on)));
        write_signed_entries(w, "NumberOfSwitches", "Switch", &switches);
    }

    pub fn read(reader: &OdfReader, section: &str, organ: &Organ, manual: ManualId, id: DivisionalId) -> Self {
        let mut divisional = Self::new(id);
        divisional.button = Button::read(reader, section);
        divisional.protected = reader.read_bool(section, "Protected", false);
        let Some(manual) = organ.manual(manual) else {
            log::error!("[{}] divisional without a manual", section);
            return divisional;
        };

        let stops = manual.stops();
        for i in 1..=read_count(reader, section, "NumberOfStops", stops.len()) {
            let key = format!("Stop{}", format_index(i));
            match read_signed_entry(reader, section, &key, stops.len()) {
                Some((index, is_on)) if !divisional.stops.has(stops[index].id()) => {
                    divisional.stops.add(stops[index].id(), is_on)
                }
                Some(_) => log::warn!("[{}] {} is a duplicate, skipped", section, key),
                None => log::warn!("[{}] {} is not a valid stop reference", section, key),
            }
        }

        let couplers = manual.couplers();
        for i in 1..=read_count(reader, section, "NumberOfCouplers", couplers.len()) {
            let key = format!("Coupler{}", format_index(i));
            match read_signed_entry(reader, section, &key, couplers.len()) {
                Some((index, is_on)) if !divisional.couplers.has(couplers[index].id()) => {
                    divisional.couplers.add(couplers[index].id(), is_on)
                }
                Some(_) => log::warn!("[{}] {} is a duplicate, skipped", section, key),
                None => log::warn!("[{}] {} is not a valid coupler reference", section, key),
            }
        }

        let tremulants = manual.tremulants();
        for i in 1..=read_count(reader, section, "NumberOfTremulants", tremulants.len()) {
            let key = format!("Tremulant{}", format_index(i));
            match read_signed_entry(reader, section, &key, tremulants.len()) {
                Some((index, is_on)) if !divisional.tremulants.has(tremulants[index]) => {
                    divisional.tremulants.add(tremulants[index], is_on)
                }
                Some(_) => log::warn!("[{}] {} is a duplicate, skipped", section, key),
                None => log::error!("[{}] {} is out of range for the manual's tremulants", section, key),
            }
        }

        let switches = manual.switches();
        for i in 1..=read_count(reader, section, "NumberOfSwitches", switches.len()) {
            let key = format!("Switch{}", format_index(i));
            match read_signed_entry(reader, section, &key, switches.len()) {
                Some((index, is_on)) if !divisional.switches.has(switches[index]) => {
                    divisional.switches.add(switches[index], is_on)
                }
                Some(_) => log::warn!("[{}] {} is a duplicate, skipped", section, key),
                None => log::error!("[{}] {} is out of range for the manual's switches", section, key),
            }
        }
        divisional
    }
}

impl HasId for Divisional {
    type Id = DivisionalId;

    fn id(&self) -> DivisionalId {
        self.id
    }
}

/// Turns (position, state) pairs into 1-based numbers, dropping handles that
/// no longer resolve.
pub(crate) fn resolve(
    owner: &str,
    kind: &str,
    entries: impl Iterator<Item = (Option<usize>, bool)>,
) -> Vec<(usize, bool)> {
    entries
        .filter_map(|(index, is_on)| match index {
            Some(index) => Some((index + 1, is_on)),
            None => {
                log::warn!("[Divisional] {:?}: a referenced {} no longer exists, skipped", owner, kind);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual_with_elements(organ: &mut Organ) -> (ManualId, Vec<StopId>, Vec<CouplerId>) {
        let manual = organ.add_manual(false).unwrap();
        let stops = (0..3).map(|_| organ.add_stop(manual).unwrap()).collect();
        let couplers = (0..2).map(|_| organ.add_coupler(manual).unwrap()).collect();
        (manual, stops, couplers)
    }

    #[test]
    fn write_uses_current_stop_positions() {
        let mut organ = Organ::new();
        let (manual, stops, couplers) = manual_with_elements(&mut organ);
        let mut d = Divisional::new(DivisionalId(99));
        d.button.set_name("1");
        d.stops.add(stops[2], true);
        d.stops.add(stops[0], false);
        d.couplers.add(couplers[1], true);

        organ.move_stop(manual, 2, 0).unwrap();

        let mut w = OdfWriter::new();
        d.write(&mut w, organ.manual(manual).unwrap());
        let lines = w.lines();
        assert!(lines.contains(&"NumberOfStops=2".to_string()));
        assert!(lines.contains(&"Stop001=1".to_string()), "Moved stop is now first");
        assert!(lines.contains(&"Stop002=-2".to_string()));
        assert!(lines.contains(&"Coupler001=2".to_string()));
        assert!(lines.contains(&"NumberOfTremulants=0".to_string()));
    }

    #[test]
    fn read_skips_invalid_and_duplicate_entries() {
        let mut organ = Organ::new();
        let (manual, stops, _) = manual_with_elements(&mut organ);
        let trem = organ.add_tremulant();
        organ.manual_mut(manual).unwrap().add_tremulant(trem);
        let reader = OdfReader::from_str(
            "[Divisional001]\nName=1\nProtected=Y\nNumberOfStops=3\nStop001=-3\nStop002=3\nStop003=0\nNumberOfTremulants=1\nTremulant001=2\nNumberOfCouplers=5\nCoupler001=1\n",
        )
        .unwrap();
        let d = Divisional::read(&reader, "Divisional001", &organ, manual, DivisionalId(5));
        assert!(d.protected);
        assert_eq!(d.stops.len(), 1);
        assert_eq!(d.stops.pair_at(0).map(|a| (a.id, a.is_on)), Some((stops[2], false)));
        assert!(d.tremulants.is_empty(), "Tremulant002 does not exist on the manual");
        assert!(d.couplers.is_empty(), "Declared coupler count exceeds the manual's couplers");
    }

    #[test]
    fn round_trip() {
        let mut organ = Organ::new();
        let (manual, stops, couplers) = manual_with_elements(&mut organ);
        let switch = organ.add_switch();
        organ.manual_mut(manual).unwrap().add_switch(switch);
        let mut d = Divisional::new(DivisionalId(5));
        d.button.set_name("Setzer 2");
        d.stops.add(stops[1], true);
        d.couplers.add(couplers[0], false);
        d.switches.add(switch, true);

        let mut w = OdfWriter::new();
        w.add_section("Divisional001");
        d.write(&mut w, organ.manual(manual).unwrap());
        let reader = OdfReader::from_str(&w.to_text()).unwrap();
        assert_eq!(Divisional::read(&reader, "Divisional001", &organ, manual, DivisionalId(5)), d);
    }
}

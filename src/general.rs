use crate::button::Button;
use crate::combination::{CombinationList, read_count, read_signed_entry, write_signed_entries};
use crate::divisional::resolve;
use crate::ids::{CouplerId, DivisionalCouplerId, GeneralId, HasId, StopId, SwitchId, TremulantId};
use crate::manual::Manual;
use crate::odf_io::{OdfReader, OdfWriter, format_index};
use crate::organ::Organ;

/// An organ-wide combination. Stops and couplers are stored with their
/// manual number; tremulants, switches and divisional couplers use organ-wide
/// positions.
#[derive(Debug, Clone, PartialEq)]
pub struct General {
    id: GeneralId,
    pub button: Button,
    pub protected: bool,
    pub stops: CombinationList<StopId>,
    pub couplers: CombinationList<CouplerId>,
    pub tremulants: CombinationList<TremulantId>,
    pub switches: CombinationList<SwitchId>,
    pub divisional_couplers: CombinationList<DivisionalCouplerId>,
}

impl General {
    pub fn new(id: GeneralId) -> Self {
        Self {
            id,
            button: Button::default(),
            protected: false,
            stops: CombinationList::default(),
            couplers: CombinationList::default(),
            tremulants: CombinationList::default(),
            switches: CombinationList::default(),
            divisional_couplers: CombinationList::default(),
        }
    }

    pub fn write(&self, w: &mut OdfWriter, organ: &Organ) {
        self.button.write(w);
        if self.protected {
            w.add_bool("Protected", true);
        }
        let name = self.button.name();

        let stops: Vec<(usize, usize, bool)> = self
            .stops
            .iter()
            .filter_map(|a| {
                let located = organ.stop_location(a.id).and_then(|(manual, local)| {
                    organ.odf_manual_number_at(manual).map(|number| (number, local + 1, a.is_on))
                });
                if located.is_none() {
                    log::warn!("[General] {:?}: a referenced stop no longer exists, skipped", name);
                }
                located
            })
            .collect();
        write_manual_entries(w, "NumberOfStops", "Stop", &stops);

        let couplers: Vec<(usize, usize, bool)> = self
            .couplers
            .iter()
            .filter_map(|a| {
                let located = organ.coupler_location(a.id).and_then(|(manual, local)| {
                    organ.odf_manual_number_at(manual).map(|number| (number, local + 1, a.is_on))
                });
                if located.is_none() {
                    log::warn!("[General] {:?}: a referenced coupler no longer exists, skipped", name);
                }
                located
            })
            .collect();
        write_manual_entries(w, "NumberOfCouplers", "Coupler", &couplers);

        let tremulants = resolve(
            name,
            "tremulant",
            self.tremulants.iter().map(|a| (organ.tremulant_index(a.id), a.is_on)),
        );
        write_signed_entries(w, "NumberOfTremulants", "Tremulant", &tremulants);
        let switches = resolve(name, "switch", self.switches.iter().map(|a| (organ.switch_index(a.id), a.is_on)));
        write_signed_entries(w, "NumberOfSwitches", "Switch", &switches);
        let divisional_couplers = resolve(
            name,
            "divisional coupler",
            self.divisional_couplers
                .iter()
                .map(|a| (organ.divisional_coupler_index(a.id), a.is_on)),
        );
        write_signed_entries(w, "NumberOfDivisionalCouplers", "DivisionalCoupler", &divisional_couplers);
    }

    pub fn read(reader: &OdfReader, section: &str, organ: &Organ, id: GeneralId) -> Self {
        let mut general = Self::new(id);
        general.button = Button::read(reader, section);
        general.protected = reader.read_bool(section, "Protected", false);

        let total_stops = organ.manuals().iter().map(|m| m.stops().len()).sum();
        for i in 1..=read_count(reader, section, "NumberOfStops", total_stops) {
            let Some((manual, index, is_on)) = read_manual_entry(reader, section, organ, "Stop", i, |m| m.stops().len())
            else {
                continue;
            };
            let stop = manual.stops()[index].id();
            if general.stops.has(stop) {
                log::warn!("[{}] Stop{} is a duplicate, skipped", section, format_index(i));
            } else {
                general.stops.add(stop, is_on);
            }
        }

        let total_couplers = organ.manuals().iter().map(|m| m.couplers().len()).sum();
        for i in 1..=read_count(reader, section, "NumberOfCouplers", total_couplers) {
            let Some((manual, index, is_on)) =
                read_manual_entry(reader, section, organ, "Coupler", i, |m| m.couplers().len())
            else {
                continue;
            };
            let coupler = manual.couplers()[index].id();
            if general.couplers.has(coupler) {
                log::warn!("[{}] Coupler{} is a duplicate, skipped", section, format_index(i));
            } else {
                general.couplers.add(coupler, is_on);
            }
        }

        let tremulants = organ.tremulants();
        for i in 1..=read_count(reader, section, "NumberOfTremulants", tremulants.len()) {
            let key = format!("Tremulant{}", format_index(i));
            match read_signed_entry(reader, section, &key, tremulants.len()) {
                Some((index, is_on)) if !general.tremulants.has(tremulants[index].id()) => {
                    general.tremulants.add(tremulants[index].id(), is_on)
                }
                Some(_) => log::warn!("[{}] {} is a duplicate, skipped", section, key),
                None => log::error!("[{}] {} is out of range for the organ's tremulants", section, key),
            }
        }

        let switches = organ.switches();
        for i in 1..=read_count(reader, section, "NumberOfSwitches", switches.len()) {
            let key = format!("Switch{}", format_index(i));
            match read_signed_entry(reader, section, &key, switches.len()) {
                Some((index, is_on)) if !general.switches.has(switches[index].id()) => {
                    general.switches.add(switches[index].id(), is_on)
                }
                Some(_) => log::warn!("[{}] {} is a duplicate, skipped", section, key),
                None => log::error!("[{}] {} is out of range for the organ's switches", section, key),
            }
        }

        let divisional_couplers = organ.divisional_couplers();
        for i in 1..=read_count(reader, section, "NumberOfDivisionalCouplers", divisional_couplers.len()) {
            let key = format!("DivisionalCoupler{}", format_index(i));
            match read_signed_entry(reader, section, &key, divisional_couplers.len()) {
                Some((index, is_on)) if !general.divisional_couplers.has(divisional_couplers[index].id()) => {
                    general.divisional_couplers.add(divisional_couplers[index].id(), is_on)
                }
                Some(_) => log::warn!("[{}] {} is a duplicate, skipped", section, key),
                None => log::warn!("[{}] {} is not a valid divisional coupler reference", section, key),
            }
        }
        general
    }
}

impl HasId for General {
    type Id = GeneralId;

    fn id(&self) -> GeneralId {
        self.id
    }
}

/// Writes `count_key=N`, then `{prefix}ManualNNN` and `{prefix}NNN=±number`
/// for each entry.
fn write_manual_entries(w: &mut OdfWriter, count_key: &str, prefix: &str, entries: &[(usize, usize, bool)]) {
    w.add_key(count_key, entries.len());
    for (i, (manual, number, is_on)) in entries.iter().enumerate() {
        let suffix = format_index(i + 1);
        w.add_key(&format!("{}Manual{}", prefix, suffix), manual);
        w.add_key(
            &format!("{}{}", prefix, suffix),
            crate::combination::signed_number(*number, *is_on),
        );
    }
}

fn read_manual_entry<'a>(
    reader: &OdfReader,
    section: &str,
    organ: &'a Organ,
    prefix: &str,
    i: usize,
    len: impl Fn(&Manual) -> usize,
) -> Option<(&'a Manual, usize, bool)> {
    let suffix = format_index(i);
    let manual_key = format!("{}Manual{}", prefix, suffix);
    let manual = reader
        .read_int_opt(section, &manual_key, 0..=organ.number_of_manuals() as i32)
        .and_then(|number| organ.manual_from_odf_number(number))
        .and_then(|id| organ.manual(id));
    let Some(manual) = manual else {
        log::warn!("[{}] {} is not a valid manual", section, manual_key);
        return None;
    };
    let key = format!("{}{}", prefix, suffix);
    match read_signed_entry(reader, section, &key, len(manual)) {
        Some((index, is_on)) => Some((manual, index, is_on)),
        None => {
            log::warn!("[{}] {} is out of range for manual {:?}", section, key, manual.name);
            None
        }
    }
}

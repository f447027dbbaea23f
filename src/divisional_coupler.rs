use crate::drawstop::{Drawstop, HasDrawstop};
use crate::ids::{DivisionalCouplerId, HasId, ManualId};
use crate::odf_io::{OdfReader, OdfWriter, format_index};
use crate::organ::Organ;

/// Links the divisionals of several manuals so that pressing one recalls the
/// same divisional on the others.
#[derive(Debug, Clone, PartialEq)]
pub struct DivisionalCoupler {
    id: DivisionalCouplerId,
    pub drawstop: Drawstop,
    pub bi_directional_coupling: bool,
    manuals: Vec<ManualId>,
}

impl DivisionalCoupler {
    pub fn new(id: DivisionalCouplerId) -> Self {
        Self {
            id,
            drawstop: Drawstop::default(),
            bi_directional_coupling: false,
            manuals: Vec::new(),
        }
    }

    pub fn manuals(&self) -> &[ManualId] {
        &self.manuals
    }

    pub fn add_manual(&mut self, manual: ManualId) -> bool {
        if self.manuals.contains(&manual) {
            return false;
        }
        self.manuals.push(manual);
        true
    }

    pub fn remove_manual(&mut self, manual: ManualId) {
        self.manuals.retain(|m| *m != manual);
    }

    pub fn write(&self, w: &mut OdfWriter, organ: &Organ) {
        self.drawstop.write(w, organ);
        w.add_bool("BiDirectionalCoupling", self.bi_directional_coupling);
        let numbers: Vec<usize> = self
            .manuals
            .iter()
            .filter_map(|m| organ.odf_manual_number(*m))
            .collect();
        w.add_key("NumberOfManuals", numbers.len());
        for (i, number) in numbers.iter().enumerate() {
            w.add_key(&format!("Manual{}", format_index(i + 1)), number);
        }
    }

    pub fn read(reader: &OdfReader, section: &str, organ: &Organ, id: DivisionalCouplerId) -> Self {
        let mut coupler = Self::new(id);
        coupler.drawstop = Drawstop::read(reader, section, organ);
        coupler.bi_directional_coupling = reader.read_bool(section, "BiDirectionalCoupling", false);
        let manual_count = organ.number_of_manuals() as i32;
        let count = reader.read_int(section, "NumberOfManuals", 0..=organ.manuals().len() as i32, 0);
        for i in 1..=count as usize {
            let key = format!("Manual{}", format_index(i));
            match reader
                .read_int_opt(section, &key, 0..=manual_count)
                .and_then(|number| organ.manual_from_odf_number(number))
            {
                Some(manual) => {
                    if !coupler.add_manual(manual) {
                        log::warn!("[{}] {} is a duplicate, skipped", section, key);
                    }
                }
                None => log::warn!("[{}] {} does not reference a valid manual", section, key),
            }
        }
        coupler
    }
}

impl HasId for DivisionalCoupler {
    type Id = DivisionalCouplerId;

    fn id(&self) -> DivisionalCouplerId {
        self.id
    }
}

impl HasDrawstop for DivisionalCoupler {
    fn drawstop(&self) -> &Drawstop {
        &self.drawstop
    }

    fn drawstop_mut(&mut self) -> &mut Drawstop {
        &mut self.drawstop
    }
}

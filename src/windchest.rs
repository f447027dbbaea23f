use crate::acoustics::AcousticAttributes;
use crate::ids::{EnclosureId, HasId, TremulantId, WindchestId};
use crate::odf_io::{OdfReader, OdfWriter, format_index};
use crate::organ::Organ;

/// Groups ranks that share enclosures, tremulants and voicing.
#[derive(Debug, Clone, PartialEq)]
pub struct WindchestGroup {
    id: WindchestId,
    pub name: String,
    enclosures: Vec<EnclosureId>,
    tremulants: Vec<TremulantId>,
    pub acoustics: AcousticAttributes,
}

impl WindchestGroup {
    pub fn new(id: WindchestId) -> Self {
        Self {
            id,
            name: String::new(),
            enclosures: Vec::new(),
            tremulants: Vec::new(),
            acoustics: AcousticAttributes::default(),
        }
    }

    pub fn enclosures(&self) -> &[EnclosureId] {
        &self.enclosures
    }

    pub fn tremulants(&self) -> &[TremulantId] {
        &self.tremulants
    }

    pub fn add_enclosure(&mut self, id: EnclosureId) -> bool {
        if self.enclosures.contains(&id) {
            return false;
        }
        self.enclosures.push(id);
        true
    }

    pub fn remove_enclosure(&mut self, id: EnclosureId) {
        self.enclosures.retain(|e| *e != id);
    }

    pub fn add_tremulant(&mut self, id: TremulantId) -> bool {
        if self.tremulants.contains(&id) {
            return false;
        }
        self.tremulants.push(id);
        true
    }

    pub fn remove_tremulant(&mut self, id: TremulantId) {
        self.tremulants.retain(|t| *t != id);
    }

    pub fn write(&self, w: &mut OdfWriter, organ: &Organ) {
        w.add_key("Name", self.name.trim_end());
        let enclosures: Vec<usize> = self
            .enclosures
            .iter()
            .filter_map(|id| organ.enclosure_index(*id).map(|i| i + 1))
            .collect();
        w.add_key("NumberOfEnclosures", enclosures.len());
        for (i, number) in enclosures.iter().enumerate() {
            w.add_key(&format!("Enclosure{}", format_index(i + 1)), number);
        }
        let tremulants: Vec<usize> = self
            .tremulants
            .iter()
            .filter_map(|id| organ.tremulant_index(*id).map(|i| i + 1))
            .collect();
        w.add_key("NumberOfTremulants", tremulants.len());
        for (i, number) in tremulants.iter().enumerate() {
            w.add_key(&format!("Tremulant{}", format_index(i + 1)), number);
        }
        self.acoustics.write(w, "");
    }

    pub fn read(reader: &OdfReader, section: &str, organ: &Organ, id: WindchestId) -> Self {
        let mut windchest = Self::new(id);
        windchest.name = reader.read_string_or(section, "Name", "");

        let enclosure_count = organ.enclosures().len() as i32;
        let count = reader.read_int(section, "NumberOfEnclosures", 0..=999, 0);
        for i in 1..=count as usize {
            let key = format!("Enclosure{}", format_index(i));
            let enclosure = reader
                .read_int_opt(section, &key, 1..=enclosure_count)
                .and_then(|number| organ.enclosure_id_at(number as usize - 1));
            match enclosure {
                Some(enclosure) => {
                    if !windchest.add_enclosure(enclosure) {
                        log::warn!("[{}] {} is a duplicate, skipped", section, key);
                    }
                }
                None => log::warn!("[{}] {} does not reference a valid enclosure", section, key),
            }
        }

        let tremulant_count = organ.tremulants().len() as i32;
        let count = reader.read_int(section, "NumberOfTremulants", 0..=999, 0);
        for i in 1..=count as usize {
            let key = format!("Tremulant{}", format_index(i));
            let tremulant = reader
                .read_int_opt(section, &key, 1..=tremulant_count)
                .and_then(|number| organ.tremulant_id_at(number as usize - 1));
            match tremulant {
                Some(tremulant) => {
                    if !windchest.add_tremulant(tremulant) {
                        log::warn!("[{}] {} is a duplicate, skipped", section, key);
                    }
                }
                None => log::error!("[{}] {} does not reference a valid tremulant", section, key),
            }
        }

        windchest.acoustics = AcousticAttributes::read(reader, section, "");
        windchest
    }
}

impl HasId for WindchestGroup {
    type Id = WindchestId;

    fn id(&self) -> WindchestId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_with_references() {
        let mut organ = Organ::new();
        let e1 = organ.add_enclosure();
        let e2 = organ.add_enclosure();
        let t1 = organ.add_tremulant();
        let mut wc = WindchestGroup::new(WindchestId(77));
        wc.name = "Swell chest".to_string();
        wc.add_enclosure(e2);
        wc.add_enclosure(e1);
        assert!(!wc.add_enclosure(e1));
        wc.add_tremulant(t1);
        wc.acoustics.gain = -3.0;

        let mut w = OdfWriter::new();
        w.add_section("WindchestGroup001");
        wc.write(&mut w, &organ);
        assert!(w.lines().contains(&"Enclosure001=2".to_string()));
        assert!(w.lines().contains(&"Gain=-3".to_string()));
        let reader = OdfReader::from_str(&w.to_text()).unwrap();
        assert_eq!(WindchestGroup::read(&reader, "WindchestGroup001", &organ, WindchestId(77)), wc);
    }

    #[test]
    fn read_skips_invalid_references() {
        let mut organ = Organ::new();
        organ.add_enclosure();
        let reader = OdfReader::from_str(
            "[WindchestGroup001]\nNumberOfEnclosures=2\nEnclosure001=1\nEnclosure002=2\nNumberOfTremulants=1\nTremulant001=1\n",
        )
        .unwrap();
        let wc = WindchestGroup::read(&reader, "WindchestGroup001", &organ, WindchestId(1));
        assert_eq!(wc.enclosures().len(), 1);
        assert!(wc.tremulants().is_empty());
    }
}

use crate::drawstop::{Drawstop, HasDrawstop};
use crate::ids::{HasId, TremulantId};
use crate::odf_io::{OdfReader, OdfWriter};
use crate::organ::Organ;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TremulantType {
    #[default]
    Synth,
    Wave,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tremulant {
    id: TremulantId,
    pub drawstop: Drawstop,
    pub trem_type: TremulantType,
    /// Milliseconds, 32..=44100.
    pub period: u32,
    /// 1..=100
    pub start_rate: u32,
    /// 1..=100
    pub stop_rate: u32,
    /// 1..=100
    pub amp_mod_depth: u32,
}

impl Tremulant {
    pub fn new(id: TremulantId) -> Self {
        Self {
            id,
            drawstop: Drawstop::default(),
            trem_type: TremulantType::Synth,
            period: 160,
            start_rate: 8,
            stop_rate: 8,
            amp_mod_depth: 18,
        }
    }

    pub fn write(&self, w: &mut OdfWriter, organ: &Organ) {
        self.drawstop.write(w, organ);
        match self.trem_type {
            TremulantType::Synth => {
                w.add_key("Period", self.period);
                w.add_key("StartRate", self.start_rate);
                w.add_key("StopRate", self.stop_rate);
                w.add_key("AmpModDepth", self.amp_mod_depth);
            }
            TremulantType::Wave => w.add_key("TremulantType", "Wave"),
        }
    }

    pub fn read(reader: &OdfReader, section: &str, organ: &Organ, id: TremulantId) -> Self {
        let mut tremulant = Self::new(id);
        tremulant.drawstop = Drawstop::read(reader, section, organ);
        tremulant.trem_type = reader.read_choice(
            section,
            "TremulantType",
            &[("Synth", TremulantType::Synth), ("Wave", TremulantType::Wave)],
            TremulantType::Synth,
        );
        if tremulant.trem_type == TremulantType::Synth {
            tremulant.period = reader.read_int(section, "Period", 32..=44100, 160) as u32;
            tremulant.start_rate = reader.read_int(section, "StartRate", 1..=100, 8) as u32;
            tremulant.stop_rate = reader.read_int(section, "StopRate", 1..=100, 8) as u32;
            tremulant.amp_mod_depth = reader.read_int(section, "AmpModDepth", 1..=100, 18) as u32;
        }
        tremulant
    }
}

impl HasId for Tremulant {
    type Id = TremulantId;

    fn id(&self) -> TremulantId {
        self.id
    }
}

impl HasDrawstop for Tremulant {
    fn drawstop(&self) -> &Drawstop {
        &self.drawstop
    }

    fn drawstop_mut(&mut self) -> &mut Drawstop {
        &mut self.drawstop
    }
}

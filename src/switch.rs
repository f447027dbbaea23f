use crate::drawstop::{Drawstop, HasDrawstop};
use crate::ids::{HasId, SwitchId};
use crate::odf_io::{OdfReader, OdfWriter};
use crate::organ::Organ;

/// A drawstop with no sound of its own, used as a logic node or indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct GoSwitch {
    id: SwitchId,
    pub drawstop: Drawstop,
}

impl GoSwitch {
    pub fn new(id: SwitchId) -> Self {
        Self {
            id,
            drawstop: Drawstop::default(),
        }
    }

    pub fn write(&self, w: &mut OdfWriter, organ: &Organ) {
        self.drawstop.write(w, organ);
    }

    pub fn read(reader: &OdfReader, section: &str, organ: &Organ, id: SwitchId) -> Self {
        let drawstop = Drawstop::read(reader, section, organ);
        if drawstop.has_switch_reference(id) {
            log::warn!("[{}] switch references itself", section);
        }
        Self { id, drawstop }
    }
}

impl HasId for GoSwitch {
    type Id = SwitchId;

    fn id(&self) -> SwitchId {
        self.id
    }
}

impl HasDrawstop for GoSwitch {
    fn drawstop(&self) -> &Drawstop {
        &self.drawstop
    }

    fn drawstop_mut(&mut self) -> &mut Drawstop {
        &mut self.drawstop
    }
}

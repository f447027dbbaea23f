use crate::button::Button;
use crate::ids::{CouplerId, HasId, PistonId, StopId, SwitchId, TremulantId};
use crate::odf_io::{OdfReader, OdfWriter};
use crate::organ::Organ;

/// The single element a reversible piston toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PistonTarget {
    Stop(StopId),
    Coupler(CouplerId),
    Switch(SwitchId),
    Tremulant(TremulantId),
}

impl PistonTarget {
    pub fn object_type(&self) -> &'static str {
        match self {
            PistonTarget::Stop(_) => "STOP",
            PistonTarget::Coupler(_) => "COUPLER",
            PistonTarget::Switch(_) => "SWITCH",
            PistonTarget::Tremulant(_) => "TREMULANT",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReversiblePiston {
    id: PistonId,
    pub button: Button,
    target: Option<PistonTarget>,
}

impl ReversiblePiston {
    pub fn new(id: PistonId) -> Self {
        Self {
            id,
            button: Button::default(),
            target: None,
        }
    }

    pub fn target(&self) -> Option<PistonTarget> {
        self.target
    }

    pub fn set_target(&mut self, target: Option<PistonTarget>) {
        self.target = target;
    }

    pub fn set_stop(&mut self, stop: StopId) {
        self.target = Some(PistonTarget::Stop(stop));
    }

    pub fn set_coupler(&mut self, coupler: CouplerId) {
        self.target = Some(PistonTarget::Coupler(coupler));
    }

    pub fn set_switch(&mut self, switch: SwitchId) {
        self.target = Some(PistonTarget::Switch(switch));
    }

    pub fn set_tremulant(&mut self, tremulant: TremulantId) {
        self.target = Some(PistonTarget::Tremulant(tremulant));
    }

    pub fn stop(&self) -> Option<StopId> {
        match self.target {
            Some(PistonTarget::Stop(id)) => Some(id),
            _ => None,
        }
    }

    pub fn coupler(&self) -> Option<CouplerId> {
        match self.target {
            Some(PistonTarget::Coupler(id)) => Some(id),
            _ => None,
        }
    }

    pub fn switch(&self) -> Option<SwitchId> {
        match self.target {
            Some(PistonTarget::Switch(id)) => Some(id),
            _ => None,
        }
    }

    pub fn tremulant(&self) -> Option<TremulantId> {
        match self.target {
            Some(PistonTarget::Tremulant(id)) => Some(id),
            _ => None,
        }
    }

    /// `STOP`, `COUPLER`, `SWITCH`, `TREMULANT`, or empty without a target.
    pub fn object_type(&self) -> &'static str {
        self.target.as_ref().map_or("", PistonTarget::object_type)
    }

    pub fn write(&self, w: &mut OdfWriter, organ: &Organ) {
        self.button.write(w);
        let Some(target) = self.target else {
            return;
        };
        // (manual number, object number)
        let resolved = match target {
            PistonTarget::Stop(id) => organ.stop_location(id).and_then(|(manual, local)| {
                organ.odf_manual_number_at(manual).map(|number| (Some(number), local + 1))
            }),
            PistonTarget::Coupler(id) => organ.coupler_location(id).and_then(|(manual, local)| {
                organ.odf_manual_number_at(manual).map(|number| (Some(number), local + 1))
            }),
            PistonTarget::Switch(id) => organ.switch_index(id).map(|i| (None, i + 1)),
            PistonTarget::Tremulant(id) => organ.tremulant_index(id).map(|i| (None, i + 1)),
        };
        let Some((manual_number, object_number)) = resolved else {
            log::warn!("[ReversiblePiston] {:?}: its target no longer exists", self.button.name());
            return;
        };
        w.add_key("ObjectType", target.object_type());
        if let Some(manual_number) = manual_number {
            w.add_key("ManualNumber", manual_number);
        }
        w.add_key("ObjectNumber", object_number);
    }

    pub fn read(reader: &OdfReader, section: &str, organ: &Organ, id: PistonId) -> Self {
        let mut piston = Self::new(id);
        piston.button = Button::read(reader, section);
        let Some(object_type) = reader.read_string(section, "ObjectType") else {
            return piston;
        };
        piston.target = match object_type.to_uppercase().as_str() {
            "STOP" | "COUPLER" => {
                let manual = reader
                    .read_int_opt(section, "ManualNumber", 0..=organ.number_of_manuals() as i32)
                    .and_then(|number| organ.manual_from_odf_number(number))
                    .and_then(|id| organ.manual(id));
                manual.and_then(|manual| {
                    if object_type.eq_ignore_ascii_case("STOP") {
                        reader
                            .read_int_opt(section, "ObjectNumber", 1..=manual.stops().len() as i32)
                            .map(|n| PistonTarget::Stop(manual.stops()[n as usize - 1].id()))
                    } else {
                        reader
                            .read_int_opt(section, "ObjectNumber", 1..=manual.couplers().len() as i32)
                            .map(|n| PistonTarget::Coupler(manual.couplers()[n as usize - 1].id()))
                    }
                })
            }
            "SWITCH" => reader
                .read_int_opt(section, "ObjectNumber", 1..=organ.switches().len() as i32)
                .and_then(|n| organ.switch_id_at(n as usize - 1))
                .map(PistonTarget::Switch),
            "TREMULANT" => reader
                .read_int_opt(section, "ObjectNumber", 1..=organ.tremulants().len() as i32)
                .and_then(|n| organ.tremulant_id_at(n as usize - 1))
                .map(PistonTarget::Tremulant),
            other => {
                log::warn!("[{}] unknown ObjectType {:?}", section, other);
                None
            }
        };
        if piston.target.is_none() {
            log::warn!("[{}] reversible piston target could not be resolved", section);
        }
        piston
    }
}

impl HasId for ReversiblePiston {
    type Id = PistonId;

    fn id(&self) -> PistonId {
        self.id
    }
}

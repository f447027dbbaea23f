use crate::button::Button;
use crate::ids::{SwitchId, position_of_id};
use crate::odf_io::{OdfReader, OdfWriter, format_index};
use crate::organ::Organ;

/// Logic function a drawstop applies to the switches it references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawstopFunction {
    #[default]
    Input,
    And,
    Nand,
    Not,
    Nor,
    Or,
    Xor,
}

impl DrawstopFunction {
    pub const ALL: [(&'static str, DrawstopFunction); 7] = [
        ("Input", DrawstopFunction::Input),
        ("And", DrawstopFunction::And),
        ("Nand", DrawstopFunction::Nand),
        ("Not", DrawstopFunction::Not),
        ("Nor", DrawstopFunction::Nor),
        ("Or", DrawstopFunction::Or),
        ("Xor", DrawstopFunction::Xor),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DrawstopFunction::Input => "Input",
            DrawstopFunction::And => "And",
            DrawstopFunction::Nand => "Nand",
            DrawstopFunction::Not => "Not",
            DrawstopFunction::Nor => "Nor",
            DrawstopFunction::Or => "Or",
            DrawstopFunction::Xor => "Xor",
        }
    }
}

/// What general cancel does to an input drawstop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GcState {
    Off,
    #[default]
    NoChange,
    On,
}

impl GcState {
    pub fn as_i32(&self) -> i32 {
        match self {
            GcState::Off => -1,
            GcState::NoChange => 0,
            GcState::On => 1,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            -1 => Some(GcState::Off),
            0 => Some(GcState::NoChange),
            1 => Some(GcState::On),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Drawstop {
    pub button: Button,
    function: DrawstopFunction,
    switches: Vec<SwitchId>,
    pub default_to_engaged: bool,
    pub gc_state: GcState,
    pub store_in_divisional: bool,
    pub store_in_general: bool,
}

impl Default for Drawstop {
    fn default() -> Self {
        Self {
            button: Button::default(),
            function: DrawstopFunction::Input,
            switches: Vec::new(),
            default_to_engaged: false,
            gc_state: GcState::NoChange,
            store_in_divisional: true,
            store_in_general: true,
        }
    }
}

/// Gives uniform access to the drawstop part of stops, couplers, switches,
/// tremulants and divisional couplers.
pub trait HasDrawstop {
    fn drawstop(&self) -> &Drawstop;
    fn drawstop_mut(&mut self) -> &mut Drawstop;
}

impl Drawstop {
    pub fn function(&self) -> DrawstopFunction {
        self.function
    }

    pub fn set_function(&mut self, function: DrawstopFunction) {
        self.function = function;
    }

    pub fn switches(&self) -> &[SwitchId] {
        &self.switches
    }

    /// Appends a switch reference without any guard; callers check
    /// [Drawstop::has_switch_reference] first.
    pub fn add_switch_reference(&mut self, switch: SwitchId) {
        self.switches.push(switch);
    }

    pub fn has_switch_reference(&self, switch: SwitchId) -> bool {
        self.switches.contains(&switch)
    }

    pub fn switch_reference_index(&self, switch: SwitchId) -> Option<usize> {
        position_of_id(&self.switches, switch)
    }

    /// Removes every reference to `switch`.
    pub fn remove_switch_reference(&mut self, switch: SwitchId) {
        self.switches.retain(|s| *s != switch);
    }

    pub fn remove_switch_reference_at(&mut self, index: usize) -> Option<SwitchId> {
        (index < self.switches.len()).then(|| self.switches.remove(index))
    }

    pub fn remove_all_switch_references(&mut self) {
        self.switches.clear();
    }

    pub fn write(&self, w: &mut OdfWriter, organ: &Organ) {
        self.button.write(w);

        let numbers: Vec<usize> = self
            .switches
            .iter()
            .filter_map(|id| {
                let number = organ.switch_index(*id).map(|i| i + 1);
                if number.is_none() {
                    log::warn!("[Drawstop] {:?}: referenced {} no longer exists", self.button.name(), id);
                }
                number
            })
            .collect();

        match self.function {
            DrawstopFunction::Input => {
                w.add_bool("DefaultToEngaged", self.default_to_engaged);
            }
            function if numbers.is_empty() => {
                log::warn!(
                    "[Drawstop] {:?} uses function {} but references no switch, the function is not written",
                    self.button.name(),
                    function.as_str()
                );
            }
            DrawstopFunction::Not => {
                w.add_key("Function", DrawstopFunction::Not.as_str());
                w.add_key("Switch001", numbers[0]);
            }
            function => {
                w.add_key("Function", function.as_str());
                w.add_key("SwitchCount", numbers.len());
                for (i, number) in numbers.iter().enumerate() {
                    w.add_key(&format!("Switch{}", format_index(i + 1)), number);
                }
            }
        }

        if self.function == DrawstopFunction::Input && self.gc_state != GcState::NoChange {
            w.add_key("GCState", self.gc_state.as_i32());
        }
        if !self.store_in_divisional {
            w.add_bool("StoreInDivisional", false);
        }
        if !self.store_in_general {
            w.add_bool("StoreInGeneral", false);
        }
    }

    pub fn read(reader: &OdfReader, section: &str, organ: &Organ) -> Self {
        let mut drawstop = Drawstop {
            button: Button::read(reader, section),
            ..Default::default()
        };

        drawstop.function = reader.read_choice(section, "Function", &DrawstopFunction::ALL, DrawstopFunction::Input);
        if drawstop.function != DrawstopFunction::Input {
            let total_switches = organ.switches().len() as i32;
            let count = if drawstop.function == DrawstopFunction::Not {
                1
            } else {
                reader.read_int(section, "SwitchCount", 1..=999, 0)
            };
            for i in 1..=count as usize {
                let key = format!("Switch{}", format_index(i));
                let Some(number) = reader.read_int_opt(section, &key, 1..=total_switches.max(1)) else {
                    log::warn!("[{}] {} does not reference a valid switch", section, key);
                    continue;
                };
                let Some(switch) = organ.switch_id_at(number as usize - 1) else {
                    log::warn!("[{}] {}={} does not reference a valid switch", section, key, number);
                    continue;
                };
                if drawstop.has_switch_reference(switch) {
                    log::warn!("[{}] {}={} is a duplicate switch reference, skipped", section, key, number);
                    continue;
                }
                drawstop.add_switch_reference(switch);
            }
        }

        drawstop.default_to_engaged = reader.read_bool(section, "DefaultToEngaged", false);
        drawstop.gc_state = reader
            .read_int_opt(section, "GCState", -1..=1)
            .and_then(GcState::from_i32)
            .unwrap_or_default();
        drawstop.store_in_divisional = reader.read_bool(section, "StoreInDivisional", true);
        drawstop.store_in_general = reader.read_bool(section, "StoreInGeneral", true);
        drawstop
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::switch::GoSwitch;

    fn organ_with_switches(n: usize) -> (Organ, Vec<SwitchId>) {
        let mut organ = Organ::new();
        let ids = (0..n).map(|_| organ.add_switch()).collect();
        (organ, ids)
    }

    fn written(drawstop: &Drawstop, organ: &Organ) -> Vec<String> {
        let mut w = OdfWriter::new();
        drawstop.write(&mut w, organ);
        w.lines().to_vec()
    }

    #[test]
    fn input_function_writes_default_to_engaged() {
        let (organ, _) = organ_with_switches(0);
        let mut d = Drawstop::default();
        d.button.set_name("Flute");
        d.default_to_engaged = true;
        d.gc_state = GcState::Off;
        d.store_in_general = false;
        assert_eq!(
            written(&d, &organ),
            [
                "Name=Flute",
                "Displayed=N",
                "DefaultToEngaged=Y",
                "GCState=-1",
                "StoreInGeneral=N"
            ]
        );
    }

    #[test]
    fn not_function_writes_only_first_switch() {
        let (organ, ids) = organ_with_switches(3);
        let mut d = Drawstop::default();
        d.set_function(DrawstopFunction::Not);
        d.add_switch_reference(ids[2]);
        d.add_switch_reference(ids[0]);
        let lines = written(&d, &organ);
        let switch_lines: Vec<_> = lines.iter().filter(|l| l.starts_with("Switch")).collect();
        assert_eq!(switch_lines, ["Switch001=3"], "Only the first reference is written for Not");
        assert!(lines.contains(&"Function=Not".to_string()));
        assert!(!lines.iter().any(|l| l.starts_with("SwitchCount")));
    }

    #[test]
    fn logic_function_without_switches_is_not_written() {
        let (organ, _) = organ_with_switches(2);
        let mut d = Drawstop::default();
        d.set_function(DrawstopFunction::And);
        d.gc_state = GcState::On;
        let lines = written(&d, &organ);
        assert!(!lines.iter().any(|l| l.starts_with("Function")));
        assert!(!lines.iter().any(|l| l.starts_with("GCState")), "GCState only applies to Input");
    }

    #[test]
    fn switch_numbers_follow_current_order() {
        let (mut organ, ids) = organ_with_switches(3);
        let mut d = Drawstop::default();
        d.set_function(DrawstopFunction::Or);
        d.add_switch_reference(ids[0]);
        d.add_switch_reference(ids[2]);
        organ.move_switch(0, 2).unwrap();
        let lines = written(&d, &organ);
        assert!(lines.contains(&"SwitchCount=2".to_string()));
        assert!(lines.contains(&"Switch001=3".to_string()));
        assert!(lines.contains(&"Switch002=2".to_string()));
    }

    #[test]
    fn read_skips_duplicates_and_invalid_references() {
        let (organ, ids) = organ_with_switches(2);
        let reader = OdfReader::from_str(
            "[Switch003]\nName=Logic\nFunction=and\nSwitchCount=4\nSwitch001=2\nSwitch002=2\nSwitch003=9\nSwitch004=1\nGCState=5\n",
        )
        .unwrap();
        let d = Drawstop::read(&reader, "Switch003", &organ);
        assert_eq!(d.function(), DrawstopFunction::And);
        assert_eq!(d.switches(), [ids[1], ids[0]]);
        assert_eq!(d.gc_state, GcState::NoChange, "Out of range GCState keeps the default");
        assert!(d.store_in_divisional);
        assert!(d.store_in_general);
    }

    #[test]
    fn not_reads_a_single_switch_regardless_of_count() {
        let (organ, ids) = organ_with_switches(3);
        let reader =
            OdfReader::from_str("[Switch004]\nName=Inv\nFunction=Not\nSwitchCount=3\nSwitch001=3\nSwitch002=1\n")
                .unwrap();
        let d = Drawstop::read(&reader, "Switch004", &organ);
        assert_eq!(d.switches(), [ids[2]]);
    }

    #[test]
    fn round_trip_keeps_values() {
        let (organ, ids) = organ_with_switches(4);
        let mut d = Drawstop::default();
        d.button.set_name("Combined");
        d.button.displayed = true;
        d.set_function(DrawstopFunction::Xor);
        d.add_switch_reference(ids[3]);
        d.add_switch_reference(ids[1]);
        d.store_in_divisional = false;

        let mut w = OdfWriter::new();
        w.add_section("Switch005");
        d.write(&mut w, &organ);
        let reader = OdfReader::from_str(&w.to_text()).unwrap();
        assert_eq!(Drawstop::read(&reader, "Switch005", &organ), d);

        let switch = GoSwitch::read(&reader, "Switch005", &organ, ids[0]);
        assert_eq!(switch.drawstop, d);
    }
}

use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::acoustics::AcousticAttributes;
use crate::coupler::Coupler;
use crate::divisional::Divisional;
use crate::divisional_coupler::DivisionalCoupler;
use crate::drawstop::Drawstop;
use crate::enclosure::Enclosure;
use crate::general::General;
use crate::ids::{
    CouplerId, DivisionalCouplerId, DivisionalId, EnclosureId, GeneralId, HasId, IdFactory, IsId, ManualId, PistonId,
    RankId, StopId, SwitchId, TremulantId, WindchestId, position_of,
};
use crate::manual::Manual;
use crate::odf_io::{OdfReader, OdfWriter, format_index};
use crate::rank::Rank;
use crate::reversible_piston::{PistonTarget, ReversiblePiston};
use crate::stop::Stop;
use crate::switch::GoSwitch;
use crate::tremulant::Tremulant;
use crate::windchest::WindchestGroup;

/// Manuals an organ may have besides the pedal.
pub const MAX_MANUALS: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrganError {
    #[error("{0} does not exist in this organ")]
    UnknownElement(String),

    #[error("position {index} is out of range for {len} element(s)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("the organ already has a pedal")]
    SecondPedal,

    #[error("the pedal must stay the first manual")]
    PedalPinned,

    #[error("an organ can have at most {MAX_MANUALS} manuals besides the pedal")]
    TooManyManuals,
}

fn unknown(id: impl IsId + std::fmt::Display) -> OrganError {
    OrganError::UnknownElement(id.to_string())
}

fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> Result<(), OrganError> {
    let len = items.len();
    for index in [from, to] {
        if index >= len {
            return Err(OrganError::IndexOutOfRange { index, len });
        }
    }
    let item = items.remove(from);
    items.insert(to, item);
    Ok(())
}

/// The root of the model. Owns every element directly or through its
/// manuals, mints their handles and translates handles into ODF positions.
#[derive(Debug, Clone)]
pub struct Organ {
    ids: IdFactory,
    pub church_name: String,
    pub church_address: String,
    pub organ_builder: String,
    pub organ_build_date: String,
    pub organ_comments: String,
    pub recording_details: String,
    pub info_filename: String,
    pub divisionals_store_intermanual_couplers: bool,
    pub divisionals_store_intramanual_couplers: bool,
    pub divisionals_store_tremulants: bool,
    pub generals_store_divisional_couplers: bool,
    pub combinations_store_non_displayed_drawstops: bool,
    pub acoustics: AcousticAttributes,
    /// Cleared when the file carried a `Panel000` section. Panel sections are
    /// never written, so a saved organ is always in the old format.
    pub using_old_panel_format: bool,
    /// `[StopNNN]` numbers of the stops as they were read from a file.
    file_stop_numbers: HashMap<usize, StopId>,
    manuals: Vec<Manual>,
    enclosures: Vec<Enclosure>,
    tremulants: Vec<Tremulant>,
    windchest_groups: Vec<WindchestGroup>,
    switches: Vec<GoSwitch>,
    ranks: Vec<Rank>,
    divisional_couplers: Vec<DivisionalCoupler>,
    generals: Vec<General>,
    reversible_pistons: Vec<ReversiblePiston>,
}

impl Default for Organ {
    fn default() -> Self {
        Self::new()
    }
}

impl Organ {
    pub fn new() -> Self {
        Self {
            ids: IdFactory::default(),
            church_name: String::new(),
            church_address: String::new(),
            organ_builder: String::new(),
            organ_build_date: String::new(),
            organ_comments: String::new(),
            recording_details: String::new(),
            info_filename: String::new(),
            divisionals_store_intermanual_couplers: true,
            divisionals_store_intramanual_couplers: true,
            divisionals_store_tremulants: true,
            generals_store_divisional_couplers: true,
            combinations_store_non_displayed_drawstops: true,
            acoustics: AcousticAttributes::default(),
            using_old_panel_format: true,
            file_stop_numbers: HashMap::new(),
            manuals: Vec::new(),
            enclosures: Vec::new(),
            tremulants: Vec::new(),
            windchest_groups: Vec::new(),
            switches: Vec::new(),
            ranks: Vec::new(),
            divisional_couplers: Vec::new(),
            generals: Vec::new(),
            reversible_pistons: Vec::new(),
        }
    }

    pub(crate) fn mint<I: IsId>(&mut self) -> I {
        self.ids.mint()
    }

    // Manuals and manual numbering

    pub fn manuals(&self) -> &[Manual] {
        &self.manuals
    }

    pub fn manual(&self, id: ManualId) -> Option<&Manual> {
        self.manuals.iter().find(|m| m.id() == id)
    }

    pub fn manual_mut(&mut self, id: ManualId) -> Option<&mut Manual> {
        self.manuals.iter_mut().find(|m| m.id() == id)
    }

    pub fn manual_index(&self, id: ManualId) -> Option<usize> {
        position_of(&self.manuals, id)
    }

    pub fn has_pedal(&self) -> bool {
        self.manuals.first().is_some_and(Manual::is_pedal)
    }

    /// Manuals excluding the pedal, as written to `NumberOfManuals`.
    pub fn number_of_manuals(&self) -> usize {
        self.manuals.len() - usize::from(self.has_pedal())
    }

    /// ODF number of the manual at `index`: the pedal is `000`, the other
    /// manuals count from `001`.
    pub fn odf_manual_number_at(&self, index: usize) -> Option<usize> {
        if index >= self.manuals.len() {
            return None;
        }
        Some(if self.has_pedal() { index } else { index + 1 })
    }

    pub fn odf_manual_number(&self, id: ManualId) -> Option<usize> {
        self.manual_index(id).and_then(|index| self.odf_manual_number_at(index))
    }

    pub fn manual_from_odf_number(&self, number: i32) -> Option<ManualId> {
        let number = usize::try_from(number).ok()?;
        let index = if self.has_pedal() { number } else { number.checked_sub(1)? };
        self.manuals.get(index).map(Manual::id)
    }

    // Manual-owned elements

    pub fn stop(&self, id: StopId) -> Option<&Stop> {
        self.manuals.iter().find_map(|m| m.stop(id))
    }

    pub fn stop_mut(&mut self, id: StopId) -> Option<&mut Stop> {
        self.manuals.iter_mut().find_map(|m| m.stop_mut(id))
    }

    /// (manual index, position within the manual)
    pub fn stop_location(&self, id: StopId) -> Option<(usize, usize)> {
        self.manuals
            .iter()
            .enumerate()
            .find_map(|(mi, m)| m.stop_index(id).map(|si| (mi, si)))
    }

    /// 1-based number of the `[StopNNN]` section.
    pub fn organ_stop_number(&self, id: StopId) -> Option<usize> {
        self.all_stops().position(|s| s.id() == id).map(|i| i + 1)
    }

    pub fn stop_at_number(&self, number: usize) -> Option<StopId> {
        self.all_stops().nth(number.checked_sub(1)?).map(Stop::id)
    }

    /// Resolves a `[StopNNN]` number of the file the organ was read from.
    /// Organs built in memory fall back to the current organ-wide number.
    pub fn stop_at_file_number(&self, number: usize) -> Option<StopId> {
        if self.file_stop_numbers.is_empty() {
            return self.stop_at_number(number);
        }
        let id = *self.file_stop_numbers.get(&number)?;
        self.stop(id).map(Stop::id)
    }

    pub(crate) fn record_file_stop_number(&mut self, number: usize, id: StopId) {
        self.file_stop_numbers.entry(number).or_insert(id);
    }

    pub fn all_stops(&self) -> impl Iterator<Item = &Stop> {
        self.manuals.iter().flat_map(|m| m.stops())
    }

    pub fn coupler(&self, id: CouplerId) -> Option<&Coupler> {
        self.manuals.iter().find_map(|m| m.coupler(id))
    }

    pub fn coupler_mut(&mut self, id: CouplerId) -> Option<&mut Coupler> {
        self.manuals.iter_mut().find_map(|m| m.coupler_mut(id))
    }

    pub fn coupler_location(&self, id: CouplerId) -> Option<(usize, usize)> {
        self.manuals
            .iter()
            .enumerate()
            .find_map(|(mi, m)| m.coupler_index(id).map(|ci| (mi, ci)))
    }

    pub fn organ_coupler_number(&self, id: CouplerId) -> Option<usize> {
        self.all_couplers().position(|c| c.id() == id).map(|i| i + 1)
    }

    pub fn all_couplers(&self) -> impl Iterator<Item = &Coupler> {
        self.manuals.iter().flat_map(|m| m.couplers())
    }

    pub fn divisional(&self, id: DivisionalId) -> Option<&Divisional> {
        self.manuals.iter().find_map(|m| m.divisional(id))
    }

    pub fn divisional_mut(&mut self, id: DivisionalId) -> Option<&mut Divisional> {
        self.manuals.iter_mut().find_map(|m| m.divisional_mut(id))
    }

    pub fn organ_divisional_number(&self, id: DivisionalId) -> Option<usize> {
        self.all_divisionals().position(|d| d.id() == id).map(|i| i + 1)
    }

    pub fn all_divisionals(&self) -> impl Iterator<Item = &Divisional> {
        self.manuals.iter().flat_map(|m| m.divisionals())
    }

    // Organ-owned elements

    pub fn switches(&self) -> &[GoSwitch] {
        &self.switches
    }

    pub fn switch(&self, id: SwitchId) -> Option<&GoSwitch> {
        self.switches.iter().find(|s| s.id() == id)
    }

    pub fn switch_mut(&mut self, id: SwitchId) -> Option<&mut GoSwitch> {
        self.switches.iter_mut().find(|s| s.id() == id)
    }

    pub fn switch_index(&self, id: SwitchId) -> Option<usize> {
        position_of(&self.switches, id)
    }

    pub fn switch_id_at(&self, index: usize) -> Option<SwitchId> {
        self.switches.get(index).map(GoSwitch::id)
    }

    pub fn tremulants(&self) -> &[Tremulant] {
        &self.tremulants
    }

    pub fn tremulant(&self, id: TremulantId) -> Option<&Tremulant> {
        self.tremulants.iter().find(|t| t.id() == id)
    }

    pub fn tremulant_mut(&mut self, id: TremulantId) -> Option<&mut Tremulant> {
        self.tremulants.iter_mut().find(|t| t.id() == id)
    }

    pub fn tremulant_index(&self, id: TremulantId) -> Option<usize> {
        position_of(&self.tremulants, id)
    }

    pub fn tremulant_id_at(&self, index: usize) -> Option<TremulantId> {
        self.tremulants.get(index).map(Tremulant::id)
    }

    pub fn enclosures(&self) -> &[Enclosure] {
        &self.enclosures
    }

    pub fn enclosure_mut(&mut self, id: EnclosureId) -> Option<&mut Enclosure> {
        self.enclosures.iter_mut().find(|e| e.id() == id)
    }

    pub fn enclosure_index(&self, id: EnclosureId) -> Option<usize> {
        position_of(&self.enclosures, id)
    }

    pub fn enclosure_id_at(&self, index: usize) -> Option<EnclosureId> {
        self.enclosures.get(index).map(Enclosure::id)
    }

    pub fn windchest_groups(&self) -> &[WindchestGroup] {
        &self.windchest_groups
    }

    pub fn windchest_group_mut(&mut self, id: WindchestId) -> Option<&mut WindchestGroup> {
        self.windchest_groups.iter_mut().find(|w| w.id() == id)
    }

    pub fn windchest_index(&self, id: WindchestId) -> Option<usize> {
        position_of(&self.windchest_groups, id)
    }

    pub fn windchest_id_at(&self, index: usize) -> Option<WindchestId> {
        self.windchest_groups.get(index).map(WindchestGroup::id)
    }

    pub fn ranks(&self) -> &[Rank] {
        &self.ranks
    }

    pub fn rank(&self, id: RankId) -> Option<&Rank> {
        self.ranks.iter().find(|r| r.id() == id)
    }

    pub fn rank_mut(&mut self, id: RankId) -> Option<&mut Rank> {
        self.ranks.iter_mut().find(|r| r.id() == id)
    }

    pub fn rank_index(&self, id: RankId) -> Option<usize> {
        position_of(&self.ranks, id)
    }

    pub fn rank_id_at(&self, index: usize) -> Option<RankId> {
        self.ranks.get(index).map(Rank::id)
    }

    pub fn divisional_couplers(&self) -> &[DivisionalCoupler] {
        &self.divisional_couplers
    }

    pub fn divisional_coupler_mut(&mut self, id: DivisionalCouplerId) -> Option<&mut DivisionalCoupler> {
        self.divisional_couplers.iter_mut().find(|d| d.id() == id)
    }

    pub fn divisional_coupler_index(&self, id: DivisionalCouplerId) -> Option<usize> {
        position_of(&self.divisional_couplers, id)
    }

    pub fn generals(&self) -> &[General] {
        &self.generals
    }

    pub fn general_mut(&mut self, id: GeneralId) -> Option<&mut General> {
        self.generals.iter_mut().find(|g| g.id() == id)
    }

    pub fn general_index(&self, id: GeneralId) -> Option<usize> {
        position_of(&self.generals, id)
    }

    pub fn reversible_pistons(&self) -> &[ReversiblePiston] {
        &self.reversible_pistons
    }

    pub fn reversible_piston_mut(&mut self, id: PistonId) -> Option<&mut ReversiblePiston> {
        self.reversible_pistons.iter_mut().find(|p| p.id() == id)
    }

    pub fn reversible_piston_index(&self, id: PistonId) -> Option<usize> {
        position_of(&self.reversible_pistons, id)
    }

    // Adding elements

    /// Adds a manual. A pedal always goes to position 0 and there can only be
    /// one.
    pub fn add_manual(&mut self, is_pedal: bool) -> Result<ManualId, OrganError> {
        if is_pedal && self.has_pedal() {
            return Err(OrganError::SecondPedal);
        }
        if !is_pedal && self.number_of_manuals() >= MAX_MANUALS {
            return Err(OrganError::TooManyManuals);
        }
        let id = self.mint();
        let manual = Manual::new(id, is_pedal);
        if is_pedal {
            self.manuals.insert(0, manual);
        } else {
            self.manuals.push(manual);
        }
        Ok(id)
    }

    /// Adds a stop with an internal rank to the end of `manual`.
    pub fn add_stop(&mut self, manual: ManualId) -> Result<StopId, OrganError> {
        if self.manual(manual).is_none() {
            return Err(unknown(manual));
        }
        let id = self.mint();
        let rank_id = self.mint();
        let mut stop = Stop::new(id, manual, rank_id);
        let target = self.manual_mut(manual).ok_or_else(|| unknown(manual))?;
        if let Some(rank) = stop.internal_rank_mut() {
            rank.first_midi_note_number = u32::from(target.first_accessible_key_midi_note_number);
        }
        target.stops.push(stop);
        Ok(id)
    }

    pub fn add_coupler(&mut self, manual: ManualId) -> Result<CouplerId, OrganError> {
        if self.manual(manual).is_none() {
            return Err(unknown(manual));
        }
        let id = self.mint();
        let target = self.manual_mut(manual).ok_or_else(|| unknown(manual))?;
        target.couplers.push(Coupler::new(id, manual));
        Ok(id)
    }

    pub fn add_divisional(&mut self, manual: ManualId) -> Result<DivisionalId, OrganError> {
        if self.manual(manual).is_none() {
            return Err(unknown(manual));
        }
        let id = self.mint();
        let target = self.manual_mut(manual).ok_or_else(|| unknown(manual))?;
        target.divisionals.push(Divisional::new(id));
        Ok(id)
    }

    pub fn add_switch(&mut self) -> SwitchId {
        let id = self.mint();
        self.switches.push(GoSwitch::new(id));
        id
    }

    pub fn add_tremulant(&mut self) -> TremulantId {
        let id = self.mint();
        self.tremulants.push(Tremulant::new(id));
        id
    }

    pub fn add_enclosure(&mut self) -> EnclosureId {
        let id = self.mint();
        self.enclosures.push(Enclosure::new(id));
        id
    }

    pub fn add_windchest_group(&mut self) -> WindchestId {
        let id = self.mint();
        self.windchest_groups.push(WindchestGroup::new(id));
        id
    }

    pub fn add_rank(&mut self) -> RankId {
        let id = self.mint();
        self.ranks.push(Rank::new(id));
        id
    }

    pub fn add_divisional_coupler(&mut self) -> DivisionalCouplerId {
        let id = self.mint();
        self.divisional_couplers.push(DivisionalCoupler::new(id));
        id
    }

    pub fn add_general(&mut self) -> GeneralId {
        let id = self.mint();
        self.generals.push(General::new(id));
        id
    }

    pub fn add_reversible_piston(&mut self) -> PistonId {
        let id = self.mint();
        self.reversible_pistons.push(ReversiblePiston::new(id));
        id
    }

    // Replacing elements read from a file

    pub(crate) fn replace_switch(&mut self, switch: GoSwitch) {
        if let Some(slot) = self.switch_mut(switch.id()) {
            *slot = switch;
        }
    }

    pub(crate) fn replace_tremulant(&mut self, tremulant: Tremulant) {
        if let Some(slot) = self.tremulant_mut(tremulant.id()) {
            *slot = tremulant;
        }
    }

    pub(crate) fn replace_enclosure(&mut self, enclosure: Enclosure) {
        if let Some(slot) = self.enclosure_mut(enclosure.id()) {
            *slot = enclosure;
        }
    }

    pub(crate) fn replace_windchest_group(&mut self, windchest: WindchestGroup) {
        if let Some(slot) = self.windchest_group_mut(windchest.id()) {
            *slot = windchest;
        }
    }

    pub(crate) fn replace_rank(&mut self, rank: Rank) {
        if let Some(slot) = self.rank_mut(rank.id()) {
            *slot = rank;
        }
    }

    /// Swaps in a manual read from a file, keeping the stops, couplers and
    /// divisionals already attached to the placeholder.
    pub(crate) fn replace_manual_attributes(&mut self, mut manual: Manual) {
        if let Some(slot) = self.manual_mut(manual.id()) {
            manual.stops = std::mem::take(&mut slot.stops);
            manual.couplers = std::mem::take(&mut slot.couplers);
            manual.divisionals = std::mem::take(&mut slot.divisionals);
            *slot = manual;
        }
    }

    pub(crate) fn push_stop(&mut self, stop: Stop) {
        if let Some(manual) = self.manual_mut(stop.owning_manual()) {
            manual.stops.push(stop);
        }
    }

    pub(crate) fn push_coupler(&mut self, coupler: Coupler) {
        if let Some(manual) = self.manual_mut(coupler.owning_manual()) {
            manual.couplers.push(coupler);
        }
    }

    pub(crate) fn push_divisional(&mut self, manual: ManualId, divisional: Divisional) {
        if let Some(manual) = self.manual_mut(manual) {
            manual.divisionals.push(divisional);
        }
    }

    pub(crate) fn push_divisional_coupler(&mut self, coupler: DivisionalCoupler) {
        self.divisional_couplers.push(coupler);
    }

    pub(crate) fn push_general(&mut self, general: General) {
        self.generals.push(general);
    }

    pub(crate) fn push_reversible_piston(&mut self, piston: ReversiblePiston) {
        self.reversible_pistons.push(piston);
    }

    pub(crate) fn push_rank(&mut self, rank: Rank) {
        self.ranks.push(rank);
    }

    // Removing elements and sweeping references to them

    fn drawstops_mut(&mut self) -> impl Iterator<Item = &mut Drawstop> {
        self.switches
            .iter_mut()
            .map(|s| &mut s.drawstop)
            .chain(self.tremulants.iter_mut().map(|t| &mut t.drawstop))
            .chain(self.divisional_couplers.iter_mut().map(|d| &mut d.drawstop))
            .chain(self.manuals.iter_mut().flat_map(|m| {
                m.stops
                    .iter_mut()
                    .map(|s| &mut s.drawstop)
                    .chain(m.couplers.iter_mut().map(|c| &mut c.drawstop))
            }))
    }

    fn divisionals_mut(&mut self) -> impl Iterator<Item = &mut Divisional> {
        self.manuals.iter_mut().flat_map(|m| m.divisionals.iter_mut())
    }

    fn clear_piston_target(&mut self, target: PistonTarget) {
        for piston in &mut self.reversible_pistons {
            if piston.target() == Some(target) {
                piston.set_target(None);
            }
        }
    }

    fn sweep_stop(&mut self, id: StopId) {
        for divisional in self.divisionals_mut() {
            divisional.stops.remove(id);
        }
        for general in &mut self.generals {
            general.stops.remove(id);
        }
        self.clear_piston_target(PistonTarget::Stop(id));
    }

    fn sweep_coupler(&mut self, id: CouplerId) {
        for divisional in self.divisionals_mut() {
            divisional.couplers.remove(id);
        }
        for general in &mut self.generals {
            general.couplers.remove(id);
        }
        self.clear_piston_target(PistonTarget::Coupler(id));
    }

    /// Removes a manual with everything it owns. Couplers elsewhere that
    /// targeted it lose their destination.
    pub fn remove_manual(&mut self, id: ManualId) -> Result<Manual, OrganError> {
        let index = self.manual_index(id).ok_or_else(|| unknown(id))?;
        let manual = self.manuals.remove(index);
        for stop in manual.stops() {
            self.sweep_stop(stop.id());
        }
        for coupler in manual.couplers() {
            self.sweep_coupler(coupler.id());
        }
        for m in &mut self.manuals {
            for coupler in &mut m.couplers {
                if coupler.destination_manual == Some(id) {
                    coupler.destination_manual = None;
                }
            }
        }
        for coupler in &mut self.divisional_couplers {
            coupler.remove_manual(id);
        }
        log::info!("[Organ] Removed manual {:?}", manual.name);
        Ok(manual)
    }

    pub fn remove_stop(&mut self, id: StopId) -> Result<Stop, OrganError> {
        let (manual, index) = self.stop_location(id).ok_or_else(|| unknown(id))?;
        let stop = self.manuals[manual].stops.remove(index);
        self.sweep_stop(id);
        Ok(stop)
    }

    pub fn remove_coupler(&mut self, id: CouplerId) -> Result<Coupler, OrganError> {
        let (manual, index) = self.coupler_location(id).ok_or_else(|| unknown(id))?;
        let coupler = self.manuals[manual].couplers.remove(index);
        self.sweep_coupler(id);
        Ok(coupler)
    }

    pub fn remove_divisional(&mut self, id: DivisionalId) -> Result<Divisional, OrganError> {
        for manual in &mut self.manuals {
            if let Some(index) = manual.divisional_index(id) {
                return Ok(manual.divisionals.remove(index));
            }
        }
        Err(unknown(id))
    }

    pub fn remove_switch(&mut self, id: SwitchId) -> Result<GoSwitch, OrganError> {
        let index = self.switch_index(id).ok_or_else(|| unknown(id))?;
        let switch = self.switches.remove(index);
        for drawstop in self.drawstops_mut() {
            drawstop.remove_switch_reference(id);
        }
        for manual in &mut self.manuals {
            manual.remove_switch(id);
        }
        for divisional in self.divisionals_mut() {
            divisional.switches.remove(id);
        }
        for general in &mut self.generals {
            general.switches.remove(id);
        }
        self.clear_piston_target(PistonTarget::Switch(id));
        Ok(switch)
    }

    pub fn remove_tremulant(&mut self, id: TremulantId) -> Result<Tremulant, OrganError> {
        let index = self.tremulant_index(id).ok_or_else(|| unknown(id))?;
        let tremulant = self.tremulants.remove(index);
        for manual in &mut self.manuals {
            manual.remove_tremulant(id);
        }
        for windchest in &mut self.windchest_groups {
            windchest.remove_tremulant(id);
        }
        for divisional in self.divisionals_mut() {
            divisional.tremulants.remove(id);
        }
        for general in &mut self.generals {
            general.tremulants.remove(id);
        }
        self.clear_piston_target(PistonTarget::Tremulant(id));
        Ok(tremulant)
    }

    pub fn remove_enclosure(&mut self, id: EnclosureId) -> Result<Enclosure, OrganError> {
        let index = self.enclosure_index(id).ok_or_else(|| unknown(id))?;
        for windchest in &mut self.windchest_groups {
            windchest.remove_enclosure(id);
        }
        Ok(self.enclosures.remove(index))
    }

    pub fn remove_windchest_group(&mut self, id: WindchestId) -> Result<WindchestGroup, OrganError> {
        let index = self.windchest_index(id).ok_or_else(|| unknown(id))?;
        let unassign = |rank: &mut Rank| {
            if rank.windchest == Some(id) {
                rank.windchest = None;
            }
        };
        self.ranks.iter_mut().for_each(unassign);
        for manual in &mut self.manuals {
            manual.stops.iter_mut().filter_map(Stop::internal_rank_mut).for_each(unassign);
        }
        Ok(self.windchest_groups.remove(index))
    }

    pub fn remove_rank(&mut self, id: RankId) -> Result<Rank, OrganError> {
        let index = self.rank_index(id).ok_or_else(|| unknown(id))?;
        for manual in &mut self.manuals {
            for stop in &mut manual.stops {
                stop.remove_references_to_rank(id);
            }
        }
        Ok(self.ranks.remove(index))
    }

    pub fn remove_divisional_coupler(&mut self, id: DivisionalCouplerId) -> Result<DivisionalCoupler, OrganError> {
        let index = self.divisional_coupler_index(id).ok_or_else(|| unknown(id))?;
        for general in &mut self.generals {
            general.divisional_couplers.remove(id);
        }
        Ok(self.divisional_couplers.remove(index))
    }

    pub fn remove_general(&mut self, id: GeneralId) -> Result<General, OrganError> {
        let index = self.general_index(id).ok_or_else(|| unknown(id))?;
        Ok(self.generals.remove(index))
    }

    pub fn remove_reversible_piston(&mut self, id: PistonId) -> Result<ReversiblePiston, OrganError> {
        let index = self.reversible_piston_index(id).ok_or_else(|| unknown(id))?;
        Ok(self.reversible_pistons.remove(index))
    }

    // Reordering

    pub fn move_manual(&mut self, from: usize, to: usize) -> Result<(), OrganError> {
        if self.has_pedal() && (from == 0 || to == 0) {
            return Err(OrganError::PedalPinned);
        }
        move_item(&mut self.manuals, from, to)
    }

    pub fn move_stop(&mut self, manual: ManualId, from: usize, to: usize) -> Result<(), OrganError> {
        let manual = self.manual_mut(manual).ok_or_else(|| unknown(manual))?;
        move_item(&mut manual.stops, from, to)
    }

    pub fn move_coupler(&mut self, manual: ManualId, from: usize, to: usize) -> Result<(), OrganError> {
        let manual = self.manual_mut(manual).ok_or_else(|| unknown(manual))?;
        move_item(&mut manual.couplers, from, to)
    }

    pub fn move_divisional(&mut self, manual: ManualId, from: usize, to: usize) -> Result<(), OrganError> {
        let manual = self.manual_mut(manual).ok_or_else(|| unknown(manual))?;
        move_item(&mut manual.divisionals, from, to)
    }

    pub fn move_switch(&mut self, from: usize, to: usize) -> Result<(), OrganError> {
        move_item(&mut self.switches, from, to)
    }

    pub fn move_tremulant(&mut self, from: usize, to: usize) -> Result<(), OrganError> {
        move_item(&mut self.tremulants, from, to)
    }

    pub fn move_enclosure(&mut self, from: usize, to: usize) -> Result<(), OrganError> {
        move_item(&mut self.enclosures, from, to)
    }

    pub fn move_windchest_group(&mut self, from: usize, to: usize) -> Result<(), OrganError> {
        move_item(&mut self.windchest_groups, from, to)
    }

    pub fn move_rank(&mut self, from: usize, to: usize) -> Result<(), OrganError> {
        move_item(&mut self.ranks, from, to)
    }

    pub fn move_divisional_coupler(&mut self, from: usize, to: usize) -> Result<(), OrganError> {
        move_item(&mut self.divisional_couplers, from, to)
    }

    pub fn move_general(&mut self, from: usize, to: usize) -> Result<(), OrganError> {
        move_item(&mut self.generals, from, to)
    }

    pub fn move_reversible_piston(&mut self, from: usize, to: usize) -> Result<(), OrganError> {
        move_item(&mut self.reversible_pistons, from, to)
    }

    // Reading and writing

    /// Reads the `[Organ]` section attributes. Element counts are handled by
    /// the file parser.
    pub fn read_attributes(&mut self, reader: &OdfReader) {
        let section = "Organ";
        self.church_name = reader.read_string_or(section, "ChurchName", "");
        self.church_address = reader.read_string_or(section, "ChurchAddress", "");
        self.organ_builder = reader.read_string_or(section, "OrganBuilder", "");
        self.organ_build_date = reader.read_string_or(section, "OrganBuildDate", "");
        self.organ_comments = reader.read_string_or(section, "OrganComments", "");
        self.recording_details = reader.read_string_or(section, "RecordingDetails", "");
        let info_filename = reader.read_string_or(section, "InfoFilename", "");
        if info_filename.contains('\\') {
            log::debug!("[{}] InfoFilename: rewriting '\\' separators in {:?} to '/'", section, info_filename);
        }
        self.info_filename = info_filename.replace('\\', "/");
        self.divisionals_store_intermanual_couplers =
            reader.read_bool(section, "DivisionalsStoreIntermanualCouplers", true);
        self.divisionals_store_intramanual_couplers =
            reader.read_bool(section, "DivisionalsStoreIntramanualCouplers", true);
        self.divisionals_store_tremulants = reader.read_bool(section, "DivisionalsStoreTremulants", true);
        self.generals_store_divisional_couplers = reader.read_bool(section, "GeneralsStoreDivisionalCouplers", true);
        self.combinations_store_non_displayed_drawstops =
            reader.read_bool(section, "CombinationsStoreNonDisplayedDrawstops", true);
        self.acoustics = AcousticAttributes::read(reader, section, "");
    }

    fn write_attributes(&self, w: &mut OdfWriter) {
        w.add_section("Organ");
        w.add_key("ChurchName", self.church_name.trim_end());
        w.add_key("ChurchAddress", self.church_address.trim_end());
        if !self.organ_builder.is_empty() {
            w.add_key("OrganBuilder", &self.organ_builder);
        }
        if !self.organ_build_date.is_empty() {
            w.add_key("OrganBuildDate", &self.organ_build_date);
        }
        if !self.organ_comments.is_empty() {
            w.add_key("OrganComments", &self.organ_comments);
        }
        if !self.recording_details.is_empty() {
            w.add_key("RecordingDetails", &self.recording_details);
        }
        if !self.info_filename.is_empty() {
            w.add_key("InfoFilename", &self.info_filename);
        }
        w.add_key("NumberOfManuals", self.number_of_manuals());
        w.add_bool("HasPedals", self.has_pedal());
        w.add_key("NumberOfEnclosures", self.enclosures.len());
        w.add_key("NumberOfTremulants", self.tremulants.len());
        w.add_key("NumberOfWindchestGroups", self.windchest_groups.len());
        w.add_key("NumberOfReversiblePistons", self.reversible_pistons.len());
        w.add_key("NumberOfGenerals", self.generals.len());
        w.add_key("NumberOfDivisionalCouplers", self.divisional_couplers.len());
        w.add_key("NumberOfSwitches", self.switches.len());
        w.add_key("NumberOfRanks", self.ranks.len());
        w.add_bool(
            "DivisionalsStoreIntermanualCouplers",
            self.divisionals_store_intermanual_couplers,
        );
        w.add_bool(
            "DivisionalsStoreIntramanualCouplers",
            self.divisionals_store_intramanual_couplers,
        );
        w.add_bool("DivisionalsStoreTremulants", self.divisionals_store_tremulants);
        w.add_bool("GeneralsStoreDivisionalCouplers", self.generals_store_divisional_couplers);
        w.add_bool(
            "CombinationsStoreNonDisplayedDrawstops",
            self.combinations_store_non_displayed_drawstops,
        );
        self.acoustics.write(w, "");
    }

    /// Serialises the whole organ. Every cross reference is resolved to the
    /// current position of its target.
    pub fn write_organ(&self) -> OdfWriter {
        if !self.using_old_panel_format {
            log::warn!("[Organ] Panel sections of the source file are not written, saving in the old panel format");
        }
        let mut w = OdfWriter::new();
        w.add_comment(" Organ Definition File written by rusty-odf");
        self.write_attributes(&mut w);

        for (index, manual) in self.manuals.iter().enumerate() {
            let number = if self.has_pedal() { index } else { index + 1 };
            w.add_section(&format!("Manual{}", format_index(number)));
            manual.write(&mut w, self);
        }
        for (i, enclosure) in self.enclosures.iter().enumerate() {
            w.add_section(&format!("Enclosure{}", format_index(i + 1)));
            enclosure.write(&mut w);
        }
        for (i, tremulant) in self.tremulants.iter().enumerate() {
            w.add_section(&format!("Tremulant{}", format_index(i + 1)));
            tremulant.write(&mut w, self);
        }
        for (i, windchest) in self.windchest_groups.iter().enumerate() {
            w.add_section(&format!("WindchestGroup{}", format_index(i + 1)));
            windchest.write(&mut w, self);
        }
        for (i, switch) in self.switches.iter().enumerate() {
            w.add_section(&format!("Switch{}", format_index(i + 1)));
            switch.write(&mut w, self);
        }
        for (i, rank) in self.ranks.iter().enumerate() {
            w.add_section(&format!("Rank{}", format_index(i + 1)));
            rank.write(&mut w, self);
        }
        for (i, stop) in self.all_stops().enumerate() {
            w.add_section(&format!("Stop{}", format_index(i + 1)));
            stop.write(&mut w, self);
        }
        for (i, coupler) in self.all_couplers().enumerate() {
            w.add_section(&format!("Coupler{}", format_index(i + 1)));
            coupler.write(&mut w, self);
        }
        let divisionals = self
            .manuals
            .iter()
            .flat_map(|m| m.divisionals().iter().map(move |d| (m, d)));
        for (i, (manual, divisional)) in divisionals.enumerate() {
            w.add_section(&format!("Divisional{}", format_index(i + 1)));
            divisional.write(&mut w, manual);
        }
        for (i, coupler) in self.divisional_couplers.iter().enumerate() {
            w.add_section(&format!("DivisionalCoupler{}", format_index(i + 1)));
            coupler.write(&mut w, self);
        }
        for (i, general) in self.generals.iter().enumerate() {
            w.add_section(&format!("General{}", format_index(i + 1)));
            general.write(&mut w, self);
        }
        for (i, piston) in self.reversible_pistons.iter().enumerate() {
            w.add_section(&format!("ReversiblePiston{}", format_index(i + 1)));
            piston.write(&mut w, self);
        }
        w
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.write_organ().save(path)
    }
}

use crate::drawstop::{Drawstop, HasDrawstop};
use crate::ids::{HasId, ManualId, RankId, StopId};
use crate::odf_io::{OdfReader, OdfWriter, format_index};
use crate::organ::Organ;
use crate::rank::{MAX_LOGICAL_PIPES, Rank};

/// One rank a stop sounds, and the slice of it that is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankReference {
    pub rank: RankId,
    pub first_pipe_number: u32,
    pub pipe_count: u32,
    pub first_accessible_key_number: u32,
}

impl RankReference {
    /// Reference covering the whole rank from its first pipe.
    pub fn whole(rank: &Rank) -> Self {
        Self {
            rank: rank.id(),
            first_pipe_number: 1,
            pipe_count: rank.number_of_logical_pipes() as u32,
            first_accessible_key_number: 1,
        }
    }

    /// Pipes left in the rank from `first_pipe_number` to its end.
    fn remaining_pipes(logical_pipes: u32, first_pipe_number: u32) -> u32 {
        (logical_pipes + 1).saturating_sub(first_pipe_number)
    }
}

/// Where a stop gets its pipes from.
#[derive(Debug, Clone, PartialEq)]
pub enum RankSource {
    Internal(Box<Rank>),
    Referenced(Vec<RankReference>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    id: StopId,
    owning_manual: ManualId,
    pub drawstop: Drawstop,
    /// 1..=128
    pub first_accessible_pipe_logical_key_number: u32,
    /// 1..=192
    pub number_of_accessible_pipes: u32,
    /// 1..=192, only used with an internal rank.
    pub first_accessible_pipe_logical_pipe_number: u32,
    source: RankSource,
}

impl Stop {
    pub fn new(id: StopId, owning_manual: ManualId, internal_rank: RankId) -> Self {
        Self {
            id,
            owning_manual,
            drawstop: Drawstop::default(),
            first_accessible_pipe_logical_key_number: 1,
            number_of_accessible_pipes: 1,
            first_accessible_pipe_logical_pipe_number: 1,
            source: RankSource::Internal(Box::new(Rank::new(internal_rank))),
        }
    }

    pub fn owning_manual(&self) -> ManualId {
        self.owning_manual
    }

    pub(crate) fn set_owning_manual(&mut self, manual: ManualId) {
        self.owning_manual = manual;
    }

    pub fn source(&self) -> &RankSource {
        &self.source
    }

    pub fn is_using_internal_rank(&self) -> bool {
        matches!(self.source, RankSource::Internal(_))
    }

    pub fn internal_rank(&self) -> Option<&Rank> {
        match &self.source {
            RankSource::Internal(rank) => Some(&**rank),
            RankSource::Referenced(_) => None,
        }
    }

    pub fn internal_rank_mut(&mut self) -> Option<&mut Rank> {
        match &mut self.source {
            RankSource::Internal(rank) => Some(&mut **rank),
            RankSource::Referenced(_) => None,
        }
    }

    /// Switches to an owned rank, dropping any rank references.
    pub fn use_internal_rank(&mut self, rank: Rank) {
        self.source = RankSource::Internal(Box::new(rank));
    }

    /// Switches to referenced ranks, dropping the owned rank. Keeps existing
    /// references when already in that mode.
    pub fn use_referenced_ranks(&mut self) {
        if self.is_using_internal_rank() {
            self.source = RankSource::Referenced(Vec::new());
        }
    }

    pub fn rank_references(&self) -> &[RankReference] {
        match &self.source {
            RankSource::Referenced(refs) => refs,
            RankSource::Internal(_) => &[],
        }
    }

    pub fn rank_references_mut(&mut self) -> Option<&mut Vec<RankReference>> {
        match &mut self.source {
            RankSource::Referenced(refs) => Some(refs),
            RankSource::Internal(_) => None,
        }
    }

    /// Number of referenced ranks; 0 when an internal rank is used.
    pub fn number_of_ranks(&self) -> usize {
        self.rank_references().len()
    }

    /// Adds a reference, switching to referenced mode if necessary.
    pub fn add_rank_reference(&mut self, reference: RankReference) {
        self.use_referenced_ranks();
        if let RankSource::Referenced(refs) = &mut self.source {
            refs.push(reference);
        }
    }

    pub fn remove_rank_reference_at(&mut self, index: usize) -> Option<RankReference> {
        let refs = self.rank_references_mut()?;
        (index < refs.len()).then(|| refs.remove(index))
    }

    /// Removes every reference to `rank`.
    pub fn remove_references_to_rank(&mut self, rank: RankId) {
        if let Some(refs) = self.rank_references_mut() {
            refs.retain(|r| r.rank != rank);
        }
    }

    pub fn write(&self, w: &mut OdfWriter, organ: &Organ) {
        self.drawstop.write(w, organ);
        w.add_key("FirstAccessiblePipeLogicalKeyNumber", self.first_accessible_pipe_logical_key_number);
        w.add_key("NumberOfAccessiblePipes", self.number_of_accessible_pipes);
        match &self.source {
            RankSource::Internal(rank) => {
                w.add_key(
                    "FirstAccessiblePipeLogicalPipeNumber",
                    self.first_accessible_pipe_logical_pipe_number,
                );
                rank.write_as_internal(w, organ);
            }
            RankSource::Referenced(refs) => {
                let resolved: Vec<(usize, &Rank, &RankReference)> = refs
                    .iter()
                    .filter_map(|r| match organ.rank_index(r.rank) {
                        Some(index) => Some((index, &organ.ranks()[index], r)),
                        None => {
                            log::warn!("[Stop] {:?}: referenced {} no longer exists", self.drawstop.button.name(), r.rank);
                            None
                        }
                    })
                    .collect();
                w.add_key("NumberOfRanks", resolved.len());
                for (i, (index, rank, reference)) in resolved.into_iter().enumerate() {
                    let key = format!("Rank{}", format_index(i + 1));
                    w.add_key(&key, index + 1);
                    if reference.first_pipe_number != 1 {
                        w.add_key(&format!("{}FirstPipeNumber", key), reference.first_pipe_number);
                    }
                    let remaining = RankReference::remaining_pipes(
                        rank.number_of_logical_pipes() as u32,
                        reference.first_pipe_number,
                    );
                    if reference.pipe_count != remaining {
                        w.add_key(&format!("{}PipeCount", key), reference.pipe_count);
                    }
                    if reference.first_accessible_key_number != 1 {
                        w.add_key(
                            &format!("{}FirstAccessibleKeyNumber", key),
                            reference.first_accessible_key_number,
                        );
                    }
                }
            }
        }
    }

    pub fn read(
        reader: &OdfReader,
        section: &str,
        organ: &Organ,
        id: StopId,
        owning_manual: ManualId,
        internal_rank: RankId,
    ) -> Self {
        let mut stop = Self::new(id, owning_manual, internal_rank);
        stop.drawstop = Drawstop::read(reader, section, organ);
        stop.first_accessible_pipe_logical_key_number =
            reader.read_int(section, "FirstAccessiblePipeLogicalKeyNumber", 1..=128, 1) as u32;
        stop.number_of_accessible_pipes =
            reader.read_int(section, "NumberOfAccessiblePipes", 1..=MAX_LOGICAL_PIPES as i32, 1) as u32;

        match reader.read_int_opt(section, "NumberOfRanks", 0..=999) {
            Some(count) => {
                let mut refs = Vec::new();
                for i in 1..=count as usize {
                    if let Some(reference) = stop.read_rank_reference(reader, section, organ, i) {
                        refs.push(reference);
                    }
                }
                stop.source = RankSource::Referenced(refs);
            }
            None => {
                stop.first_accessible_pipe_logical_pipe_number = reader.read_int(
                    section,
                    "FirstAccessiblePipeLogicalPipeNumber",
                    1..=MAX_LOGICAL_PIPES as i32,
                    1,
                ) as u32;
                let first_midi_note = organ
                    .manual(owning_manual)
                    .map(|m| m.first_accessible_key_midi_note_number as u32)
                    .unwrap_or(36);
                let rank = Rank::read_internal(reader, section, organ, internal_rank, first_midi_note);
                stop.source = RankSource::Internal(Box::new(rank));
            }
        }
        stop
    }

    fn read_rank_reference(&self, reader: &OdfReader, section: &str, organ: &Organ, i: usize) -> Option<RankReference> {
        let key = format!("Rank{}", format_index(i));
        let rank_count = organ.ranks().len() as i32;
        let Some(number) = reader.read_int_opt(section, &key, 1..=rank_count.max(1)) else {
            log::warn!("[{}] {} does not reference a valid rank", section, key);
            return None;
        };
        let rank = organ.ranks().get(number as usize - 1)?;
        let logical_pipes = rank.number_of_logical_pipes() as u32;

        let first_pipe_number =
            reader.read_int(section, &format!("{}FirstPipeNumber", key), 1..=logical_pipes as i32, 1) as u32;
        let remaining = RankReference::remaining_pipes(logical_pipes, first_pipe_number);
        let pipe_count =
            reader.read_int(section, &format!("{}PipeCount", key), 0..=remaining as i32, remaining as i32) as u32;
        let first_accessible_key_number = reader.read_int(
            section,
            &format!("{}FirstAccessibleKeyNumber", key),
            1..=self.number_of_accessible_pipes as i32,
            1,
        ) as u32;

        Some(RankReference {
            rank: rank.id(),
            first_pipe_number,
            pipe_count,
            first_accessible_key_number,
        })
    }
}

impl HasId for Stop {
    type Id = StopId;

    fn id(&self) -> StopId {
        self.id
    }
}

impl HasDrawstop for Stop {
    fn drawstop(&self) -> &Drawstop {
        &self.drawstop
    }

    fn drawstop_mut(&mut self) -> &mut Drawstop {
        &mut self.drawstop
    }
}

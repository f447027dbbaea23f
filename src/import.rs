//! Merging data from outside the organ being edited: CMB voicing settings and
//! stops or ranks taken from another organ definition.

use anyhow::{Result, anyhow};

use crate::acoustics::AcousticAttributes;
use crate::cmb::{CmbAttributes, CmbElement, CmbOrgan};
use crate::ids::{HasId, ManualId, RankId, StopId};
use crate::organ::Organ;
use crate::rank::Rank;
use crate::stop::{RankSource, Stop};

/// What [apply_cmb] changed, and what it could not place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmbImportSummary {
    pub windchest_groups: usize,
    pub ranks: usize,
    pub stops: usize,
    pub pipes: usize,
    pub missed: usize,
}

impl From<&CmbAttributes> for AcousticAttributes {
    fn from(cmb: &CmbAttributes) -> Self {
        AcousticAttributes {
            amplitude: cmb.amplitude,
            gain: cmb.user_gain,
            pitch_tuning: cmb.manual_tuning,
            pitch_correction: cmb.auto_tuning_correction,
            tracker_delay: cmb.delay.max(0) as u32,
        }
        .clamped()
    }
}

/// Copies the voicing of `cmb` into `organ`. Windchest groups and ranks are
/// matched by number, stops by their `[StopNNN]` number in the file the organ
/// was read from and pipes by pipe number. Values are clamped to their ODF ranges.
pub fn apply_cmb(organ: &mut Organ, cmb: &CmbOrgan) -> CmbImportSummary {
    let mut summary = CmbImportSummary::default();
    if !cmb.church_name.is_empty() && cmb.church_name != organ.church_name {
        log::warn!(
            "[Import] CMB was saved for {:?} but the organ is {:?}",
            cmb.church_name,
            organ.church_name
        );
    }
    organ.acoustics = AcousticAttributes::from(&cmb.attributes);

    for element in &cmb.windchest_groups {
        match organ
            .windchest_id_at(element.number.wrapping_sub(1))
            .and_then(|id| organ.windchest_group_mut(id))
        {
            Some(windchest) => {
                windchest.acoustics = AcousticAttributes::from(&element.attributes);
                summary.windchest_groups += 1;
            }
            None => {
                log::warn!("[Import] No WindchestGroup{:03} in the organ", element.number);
                summary.missed += 1;
            }
        }
    }

    for element in &cmb.ranks {
        match organ.rank_id_at(element.number.wrapping_sub(1)).and_then(|id| organ.rank_mut(id)) {
            Some(rank) => {
                apply_to_rank(rank, element, &mut summary);
                summary.ranks += 1;
            }
            None => {
                log::warn!("[Import] No Rank{:03} in the organ", element.number);
                summary.missed += 1;
            }
        }
    }

    for element in &cmb.stops {
        let rank = organ
            .stop_at_file_number(element.number)
            .and_then(|id| organ.stop_mut(id))
            .and_then(Stop::internal_rank_mut);
        match rank {
            Some(rank) => {
                apply_to_rank(rank, element, &mut summary);
                summary.stops += 1;
            }
            None => {
                log::warn!(
                    "[Import] Stop{:03} does not exist or has no internal rank",
                    element.number
                );
                summary.missed += 1;
            }
        }
    }

    log::info!("[Import] CMB applied: {:?}", summary);
    summary
}

fn apply_to_rank(rank: &mut Rank, element: &CmbElement, summary: &mut CmbImportSummary) {
    rank.acoustics = AcousticAttributes::from(&element.attributes);
    for pipe in &element.pipes {
        match rank.pipe_mut(pipe.pipe_number) {
            Some(target) => {
                target.acoustics = AcousticAttributes::from(&pipe.attributes);
                summary.pipes += 1;
            }
            None => {
                log::warn!("[Import] {:?} has no pipe {}", rank.name, pipe.pipe_number);
                summary.missed += 1;
            }
        }
    }
}

/// Copies a rank from `source` into `target` under a new handle. The
/// windchest assignment does not carry over.
pub fn import_rank(target: &mut Organ, source: &Organ, rank: RankId) -> Result<RankId> {
    let original = source.rank(rank).ok_or_else(|| anyhow!("{} does not exist in the source organ", rank))?;
    let id = target.mint();
    let mut copy = original.clone();
    copy.set_id(id);
    copy.windchest = None;
    target.push_rank(copy);
    log::info!("[Import] Imported rank {:?}", original.name);
    Ok(id)
}

/// Copies a stop from `source` to the end of `manual` in `target`. Switch
/// references and windchest assignments are dropped; ranks a stop refers to
/// are imported alongside it.
pub fn import_stop(target: &mut Organ, source: &Organ, stop: StopId, manual: ManualId) -> Result<StopId> {
    let original = source.stop(stop).ok_or_else(|| anyhow!("{} does not exist in the source organ", stop))?;
    if target.manual(manual).is_none() {
        return Err(anyhow!("{} does not exist in the target organ", manual));
    }
    let (id, rank_id): (StopId, RankId) = (target.mint(), target.mint());
    let mut copy = Stop::new(id, manual, rank_id);
    copy.drawstop = original.drawstop.clone();
    copy.drawstop.remove_all_switch_references();
    copy.first_accessible_pipe_logical_key_number = original.first_accessible_pipe_logical_key_number;
    copy.number_of_accessible_pipes = original.number_of_accessible_pipes;
    copy.first_accessible_pipe_logical_pipe_number = original.first_accessible_pipe_logical_pipe_number;

    match original.source() {
        RankSource::Internal(rank) => {
            let mut rank = (**rank).clone();
            rank.set_id(rank_id);
            rank.windchest = None;
            copy.use_internal_rank(rank);
        }
        RankSource::Referenced(references) => {
            copy.use_referenced_ranks();
            for reference in references {
                let mut imported = *reference;
                imported.rank = import_rank(target, source, reference.rank)?;
                copy.add_rank_reference(imported);
            }
        }
    }

    log::info!("[Import] Imported stop {:?}", original.drawstop.button.name());
    target.push_stop(copy);
    Ok(id)
}

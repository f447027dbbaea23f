use crate::acoustics::AcousticAttributes;
use crate::ids::{HasId, RankId, WindchestId};
use crate::odf_io::{OdfReader, OdfWriter, format_index};
use crate::organ::Organ;

pub const MAX_LOGICAL_PIPES: usize = 192;

/// Placeholder sample name GrandOrgue accepts for silent pipes.
pub const DUMMY_SAMPLE: &str = "DUMMY";

/// A single pipe of a rank. `pipe_nbr` is 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipe {
    pipe_nbr: usize,
    /// Sample path, `DUMMY`, or a `REF:` reference. Paths are read with `/`
    /// separators.
    pub sample: String,
    pub percussive: bool,
    pub harmonic_number: u32,
    pub acoustics: AcousticAttributes,
}

impl Pipe {
    pub fn new(pipe_nbr: usize, percussive: bool, harmonic_number: u32) -> Self {
        Self {
            pipe_nbr,
            sample: DUMMY_SAMPLE.to_string(),
            percussive,
            harmonic_number,
            acoustics: AcousticAttributes::default(),
        }
    }

    pub fn pipe_nbr(&self) -> usize {
        self.pipe_nbr
    }

    fn key_prefix(&self) -> String {
        format!("Pipe{}", format_index(self.pipe_nbr))
    }

    fn write(&self, w: &mut OdfWriter, rank: &Rank) {
        let prefix = self.key_prefix();
        w.add_key(&prefix, &self.sample);
        if self.percussive != rank.percussive {
            w.add_bool(&format!("{}Percussive", prefix), self.percussive);
        }
        if self.harmonic_number != rank.harmonic_number {
            w.add_key(&format!("{}HarmonicNumber", prefix), self.harmonic_number);
        }
        self.acoustics.write(w, &prefix);
    }

    fn read(reader: &OdfReader, section: &str, pipe_nbr: usize, rank: &Rank) -> Self {
        let mut pipe = Self::new(pipe_nbr, rank.percussive, rank.harmonic_number);
        let prefix = pipe.key_prefix();
        match reader.read_string(section, &prefix) {
            Some(sample) => {
                if sample.contains('\\') {
                    log::debug!("[{}] {}: rewriting '\\' separators in {:?} to '/'", section, prefix, sample);
                }
                pipe.sample = sample.replace('\\', "/");
            }
            None => log::warn!("[{}] {} is missing, using {}", section, prefix, DUMMY_SAMPLE),
        }
        pipe.percussive = reader.read_bool(section, &format!("{}Percussive", prefix), rank.percussive);
        pipe.harmonic_number = reader.read_int(
            section,
            &format!("{}HarmonicNumber", prefix),
            1..=1024,
            rank.harmonic_number as i32,
        ) as u32;
        pipe.acoustics = AcousticAttributes::read(reader, section, &prefix);
        pipe
    }
}

/// A row of pipes with shared voicing. Either stands alone in a `RankNNN`
/// section or lives inside a stop that uses an internal rank.
#[derive(Debug, Clone, PartialEq)]
pub struct Rank {
    id: RankId,
    pub name: String,
    /// MIDI note of the first pipe, 0..=256.
    pub first_midi_note_number: u32,
    pub windchest: Option<WindchestId>,
    pub percussive: bool,
    pub harmonic_number: u32,
    pub min_velocity_volume: f32,
    pub max_velocity_volume: f32,
    pub accepts_retuning: bool,
    pub acoustics: AcousticAttributes,
    pipes: Vec<Pipe>,
}

impl Rank {
    pub fn new(id: RankId) -> Self {
        let mut rank = Self {
            id,
            name: String::new(),
            first_midi_note_number: 36,
            windchest: None,
            percussive: false,
            harmonic_number: 8,
            min_velocity_volume: 100.0,
            max_velocity_volume: 100.0,
            accepts_retuning: true,
            acoustics: AcousticAttributes::default(),
            pipes: Vec::new(),
        };
        rank.set_number_of_logical_pipes(1);
        rank
    }

    pub(crate) fn set_id(&mut self, id: RankId) {
        self.id = id;
    }

    pub fn pipes(&self) -> &[Pipe] {
        &self.pipes
    }

    pub fn pipes_mut(&mut self) -> &mut [Pipe] {
        &mut self.pipes
    }

    /// Looks up a pipe by its 1-based number.
    pub fn pipe_mut(&mut self, pipe_nbr: usize) -> Option<&mut Pipe> {
        pipe_nbr.checked_sub(1).and_then(|i| self.pipes.get_mut(i))
    }

    pub fn number_of_logical_pipes(&self) -> usize {
        self.pipes.len()
    }

    /// Grows or shrinks the rank to `count` pipes (1..=192). New pipes are
    /// dummies.
    pub fn set_number_of_logical_pipes(&mut self, count: usize) {
        let count = count.clamp(1, MAX_LOGICAL_PIPES);
        self.pipes.truncate(count);
        while self.pipes.len() < count {
            let nbr = self.pipes.len() + 1;
            self.pipes.push(Pipe::new(nbr, self.percussive, self.harmonic_number));
        }
    }

    fn write_attributes(&self, w: &mut OdfWriter, organ: &Organ) {
        w.add_key("NumberOfLogicalPipes", self.pipes.len());
        match self.windchest.and_then(|id| organ.windchest_index(id)) {
            Some(index) => w.add_key("WindchestGroup", index + 1),
            None => log::warn!("[Rank] {:?} is not assigned to a windchest group", self.name),
        }
        w.add_bool("Percussive", self.percussive);
        if self.harmonic_number != 8 {
            w.add_key("HarmonicNumber", self.harmonic_number);
        }
        if self.min_velocity_volume != 100.0 {
            w.add_decimal("MinVelocityVolume", self.min_velocity_volume);
        }
        if self.max_velocity_volume != 100.0 {
            w.add_decimal("MaxVelocityVolume", self.max_velocity_volume);
        }
        if !self.accepts_retuning {
            w.add_bool("AcceptsRetuning", false);
        }
        self.acoustics.write(w, "");
        for pipe in &self.pipes {
            pipe.write(w, self);
        }
    }

    /// Writes a standalone `[RankNNN]` body.
    pub fn write(&self, w: &mut OdfWriter, organ: &Organ) {
        w.add_key("Name", self.name.trim_end());
        w.add_key("FirstMidiNoteNumber", self.first_midi_note_number);
        self.write_attributes(w, organ);
    }

    /// Writes the rank keys into the section of a stop that owns it.
    pub fn write_as_internal(&self, w: &mut OdfWriter, organ: &Organ) {
        self.write_attributes(w, organ);
    }

    fn read_attributes(&mut self, reader: &OdfReader, section: &str, organ: &Organ) {
        let windchest_count = organ.windchest_groups().len() as i32;
        self.windchest = reader
            .read_int_opt(section, "WindchestGroup", 1..=windchest_count.max(1))
            .and_then(|number| organ.windchest_id_at(number as usize - 1));
        if self.windchest.is_none() {
            log::warn!("[{}] no valid WindchestGroup", section);
        }
        self.percussive = reader.read_bool(section, "Percussive", false);
        self.harmonic_number = reader.read_int(section, "HarmonicNumber", 1..=1024, 8) as u32;
        self.min_velocity_volume = reader.read_float(section, "MinVelocityVolume", 0.0..=1000.0, 100.0);
        self.max_velocity_volume = reader.read_float(section, "MaxVelocityVolume", 0.0..=1000.0, 100.0);
        self.accepts_retuning = reader.read_bool(section, "AcceptsRetuning", true);
        self.acoustics = AcousticAttributes::read(reader, section, "");

        let count = reader.read_int(section, "NumberOfLogicalPipes", 1..=MAX_LOGICAL_PIPES as i32, 1) as usize;
        self.pipes = (1..=count).map(|nbr| Pipe::read(reader, section, nbr, self)).collect();
    }

    pub fn read(reader: &OdfReader, section: &str, organ: &Organ, id: RankId) -> Self {
        let mut rank = Self::new(id);
        rank.name = reader.read_string_or(section, "Name", "");
        rank.first_midi_note_number = reader.read_int(section, "FirstMidiNoteNumber", 0..=256, 36) as u32;
        rank.read_attributes(reader, section, organ);
        rank
    }

    /// Reads the rank embedded in a stop section. Its first MIDI note follows
    /// the owning manual.
    pub fn read_internal(reader: &OdfReader, section: &str, organ: &Organ, id: RankId, first_midi_note: u32) -> Self {
        let mut rank = Self::new(id);
        rank.name = reader.read_string_or(section, "Name", "");
        rank.first_midi_note_number = first_midi_note;
        rank.read_attributes(reader, section, organ);
        rank
    }
}

impl HasId for Rank {
    type Id = RankId;

    fn id(&self) -> RankId {
        self.id
    }
}

//! Reader for the gzip-compressed voicing settings (`.cmb`) files.
//!
//! A CMB file is an INI document with an `[Organ]` section followed by
//! numbered `WindchestGroupNNN`, `RankNNN` and `StopNNN` sections. Ranks and
//! stops can carry per-pipe values as `PipeNNNAmplitude`, `PipeNNNUserGain`,
//! and so on.

use flate2::read::{GzDecoder, ZlibDecoder};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use crate::odf_io::{OdfReader, decode_text, format_index};
use crate::rank::MAX_LOGICAL_PIPES;

const ORGAN: &str = "Organ";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CmbError {
    #[error("Failed to create stream from filename!")]
    StreamCreation,

    #[error("Decompression of the stream failed!")]
    Decompression,

    #[error("Couldn't find an [Organ] section in the file!")]
    MissingOrganSection,
}

/// The five voicing values stored for every CMB element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CmbAttributes {
    pub amplitude: f32,
    pub user_gain: f32,
    pub manual_tuning: f32,
    pub auto_tuning_correction: f32,
    pub delay: i32,
}

impl Default for CmbAttributes {
    fn default() -> Self {
        Self {
            amplitude: 100.0,
            user_gain: 0.0,
            manual_tuning: 0.0,
            auto_tuning_correction: 0.0,
            delay: 0,
        }
    }
}

impl CmbAttributes {
    fn read(reader: &OdfReader, section: &str, prefix: &str) -> Self {
        let defaults = Self::default();
        let float = |key: &str, default: f32| {
            reader.read_float(section, &format!("{}{}", prefix, key), f32::MIN..=f32::MAX, default)
        };
        Self {
            amplitude: float("Amplitude", defaults.amplitude),
            user_gain: float("UserGain", defaults.user_gain),
            manual_tuning: float("ManualTuning", defaults.manual_tuning),
            auto_tuning_correction: float("AutoTuningCorrection", defaults.auto_tuning_correction),
            delay: reader.read_int(section, &format!("{}Delay", prefix), i32::MIN..=i32::MAX, defaults.delay),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CmbPipe {
    /// 1-based
    pub pipe_number: usize,
    pub attributes: CmbAttributes,
}

/// One numbered section: a windchest group, a rank or a stop.
#[derive(Debug, Clone, PartialEq)]
pub struct CmbElement {
    /// 1-based number from the section name.
    pub number: usize,
    pub attributes: CmbAttributes,
    pub pipes: Vec<CmbPipe>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CmbOrgan {
    pub church_name: String,
    pub odf_path: String,
    pub attributes: CmbAttributes,
    pub windchest_groups: Vec<CmbElement>,
    pub ranks: Vec<CmbElement>,
    pub stops: Vec<CmbElement>,
}

/// Parses a CMB file into a caller-provided [CmbOrgan] and remembers whether
/// that worked.
#[derive(Debug)]
pub struct CmbParser {
    parsed_ok: bool,
    error_text: String,
}

impl CmbParser {
    /// On failure `organ` is left untouched.
    pub fn new(path: &Path, organ: &mut CmbOrgan) -> Self {
        match parse_cmb_file(path) {
            Ok(parsed) => {
                *organ = parsed;
                Self {
                    parsed_ok: true,
                    error_text: String::new(),
                }
            }
            Err(e) => {
                log::error!("[CmbParser] {:?}: {}", path, e);
                Self {
                    parsed_ok: false,
                    error_text: e.to_string(),
                }
            }
        }
    }

    pub fn is_parsed_ok(&self) -> bool {
        self.parsed_ok
    }

    pub fn error_text(&self) -> &str {
        &self.error_text
    }
}

pub fn parse_cmb_file(path: &Path) -> Result<CmbOrgan, CmbError> {
    let mut file = File::open(path).map_err(|_| CmbError::StreamCreation)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|_| CmbError::StreamCreation)?;
    parse_cmb_bytes(&bytes)
}

pub fn parse_cmb_bytes(bytes: &[u8]) -> Result<CmbOrgan, CmbError> {
    let text = decode_text(&decompress(bytes)?);
    let reader = OdfReader::from_str(&text).map_err(|e| {
        log::warn!("[CmbParser] Decompressed content is not valid INI: {}", e);
        CmbError::MissingOrganSection
    })?;
    if !reader.has_group(ORGAN) {
        return Err(CmbError::MissingOrganSection);
    }

    let organ = CmbOrgan {
        church_name: reader.read_string_or(ORGAN, "ChurchName", ""),
        odf_path: reader.read_string_or(ORGAN, "ODFPath", ""),
        attributes: CmbAttributes::read(&reader, ORGAN, ""),
        windchest_groups: read_elements(&reader, "WindchestGroup", false),
        ranks: read_elements(&reader, "Rank", true),
        stops: read_elements(&reader, "Stop", true),
    };
    log::info!(
        "[CmbParser] {:?}: {} windchest group(s), {} rank(s), {} stop(s)",
        organ.church_name,
        organ.windchest_groups.len(),
        organ.ranks.len(),
        organ.stops.len()
    );
    Ok(organ)
}

/// Accepts a gzip stream, or a bare zlib stream as a fallback.
fn decompress(bytes: &[u8]) -> Result<Vec<u8>, CmbError> {
    if bytes.is_empty() {
        return Err(CmbError::Decompression);
    }
    let mut out = Vec::new();
    if GzDecoder::new(bytes).read_to_end(&mut out).is_ok() {
        return Ok(out);
    }
    out.clear();
    if ZlibDecoder::new(bytes).read_to_end(&mut out).is_ok() {
        log::debug!("[CmbParser] Stream is zlib rather than gzip");
        return Ok(out);
    }
    Err(CmbError::Decompression)
}

/// Reads `{prefix}001`, `{prefix}002`, ... until the first missing number.
fn read_elements(reader: &OdfReader, prefix: &str, with_pipes: bool) -> Vec<CmbElement> {
    (1..)
        .map(|number| (number, format!("{}{}", prefix, format_index(number))))
        .take_while(|(_, section)| reader.has_group(section))
        .map(|(number, section)| CmbElement {
            number,
            attributes: CmbAttributes::read(reader, &section, ""),
            pipes: if with_pipes { read_pipes(reader, &section) } else { Vec::new() },
        })
        .collect()
}

fn read_pipes(reader: &OdfReader, section: &str) -> Vec<CmbPipe> {
    (1..=MAX_LOGICAL_PIPES)
        .filter_map(|pipe_number| {
            let prefix = format!("Pipe{}", format_index(pipe_number));
            reader
                .has_key(section, &format!("{}Amplitude", prefix))
                .then(|| CmbPipe {
                    pipe_number,
                    attributes: CmbAttributes::read(reader, section, &prefix),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use std::io::Write;

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn sequential_sections_stop_at_first_gap() {
        let cmb = gzip(
            "[Organ]\nChurchName=Test\n[Rank001]\nAmplitude=90\n[Rank002]\nDelay=1\n[Rank003]\nUserGain=-2\n[Rank005]\nAmplitude=50\n",
        );
        let organ = parse_cmb_bytes(&cmb).unwrap();
        assert_eq!(organ.ranks.len(), 3);
        assert_eq!(organ.ranks[0].attributes.amplitude, 90.0);
        assert_eq!(organ.ranks[2].attributes.user_gain, -2.0);
        assert_eq!(organ.ranks[2].number, 3);
    }

    #[test]
    fn pipes_are_found_by_amplitude_key() {
        let cmb = gzip(
            "[Organ]\nODFPath=organs/test.organ\nAmplitude=80\n[Stop001]\nPipe002Amplitude=95\nPipe002ManualTuning=3.5\nPipe002Delay=12\nPipe003UserGain=4\nPipe192Amplitude=100\n",
        );
        let organ = parse_cmb_bytes(&cmb).unwrap();
        assert_eq!(organ.odf_path, "organs/test.organ");
        assert_eq!(organ.attributes.amplitude, 80.0);
        let pipes = &organ.stops[0].pipes;
        assert_eq!(pipes.len(), 2, "Pipe003 has no Amplitude key");
        assert_eq!(pipes[0].pipe_number, 2);
        assert_eq!(pipes[0].attributes.manual_tuning, 3.5);
        assert_eq!(pipes[0].attributes.delay, 12);
        assert_eq!(pipes[0].attributes.user_gain, 0.0);
        assert_eq!(pipes[1].pipe_number, 192);
    }

    #[test]
    fn zlib_streams_are_accepted() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"[Organ]\nChurchName=Z\n").unwrap();
        let organ = parse_cmb_bytes(&encoder.finish().unwrap()).unwrap();
        assert_eq!(organ.church_name, "Z");
    }

    #[test]
    fn error_taxonomy() {
        assert_eq!(parse_cmb_bytes(b"[Organ]\nplain text\n"), Err(CmbError::Decompression));
        assert_eq!(parse_cmb_bytes(&[]), Err(CmbError::Decompression));
        assert_eq!(
            parse_cmb_bytes(&gzip("[Rank001]\nAmplitude=1\n")),
            Err(CmbError::MissingOrganSection)
        );
        assert_eq!(
            CmbError::MissingOrganSection.to_string(),
            "Couldn't find an [Organ] section in the file!"
        );
        assert_eq!(
            parse_cmb_file(Path::new("/nonexistent/settings.cmb")),
            Err(CmbError::StreamCreation)
        );
    }
}

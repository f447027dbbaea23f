//! Model, reader and writer for GrandOrgue organ definition files (ODF),
//! plus a reader for the compressed voicing settings (CMB) files that go
//! with them.

pub mod acoustics;
pub mod button;
pub mod cmb;
pub mod combination;
pub mod config;
pub mod coupler;
pub mod divisional;
pub mod divisional_coupler;
pub mod drawstop;
pub mod enclosure;
pub mod general;
pub mod ids;
pub mod import;
pub mod manual;
pub mod odf_io;
pub mod organ;
pub mod organ_file_parser;
pub mod rank;
pub mod reversible_piston;
pub mod stop;
pub mod switch;
pub mod tremulant;
pub mod windchest;

pub use cmb::{CmbError, CmbOrgan, CmbParser};
pub use organ::{Organ, OrganError};
pub use organ_file_parser::OrganFileParser;

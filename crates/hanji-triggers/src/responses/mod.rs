//! Canned replies used when AI mode is off

pub mod canned;
pub mod random;

pub use canned::{
    CannedCategory, CannedResponder, CannedResponseTable, DEFAULT_PERSONA_TAG,
    GENERIC_CATEGORY, GENERIC_REPLY_PROBABILITY,
};
pub use random::{RandomSource, SeededRandom, ThreadRandom};

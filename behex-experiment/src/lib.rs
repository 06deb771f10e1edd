pub mod breaks;
pub mod experiment;
pub mod instructions;
pub mod present;
pub mod sequence;
pub mod sim;
pub mod subject;
pub mod trialgen;

pub use breaks::{BreakOptions, break_due};
pub use experiment::Experiment;
pub use instructions::{Instructions, NavAction, Navigation, Page};
pub use present::PresentOptions;
pub use sequence::{
    Paradigm, RunOptions, RunOutcome, Staircase, StaircaseReport,
};
pub use subject::{Subject, SubjectInfo};

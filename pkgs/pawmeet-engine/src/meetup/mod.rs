//! Meetup proposals: state machine, data structures and coordinator

mod coordinator;
mod status;
mod types;

pub use coordinator::{can_propose, ListFilter, MeetupCoordinator};
pub use status::{Direction, MeetupAction, MeetupStatus};
pub use types::{MeetupKind, MeetupSummary, NewProposal, ProposalTarget};

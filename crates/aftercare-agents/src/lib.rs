//! Agent layer for Aftercare.
//!
//! The turn router owns the session store and drives two agents: the intake
//! agent (identification, small talk, routing) and the clinical agent
//! (evidence-grounded answers). Router state transitions follow a closed,
//! validated table.

pub mod clinical;
pub mod generation;
pub mod intake;
pub mod lookup;
pub mod router;
pub mod session;
pub mod state_machine;

pub use clinical::{ClinicalAgent, ClinicalReply};
pub use generation::TextGeneration;
pub use intake::{IntakeAgent, IntakeOutcome};
pub use lookup::{InMemoryPatientDirectory, LookupOutcome, PatientLookup};
pub use router::{TurnOutcome, TurnRequest, TurnRouter};
pub use session::SessionStore;
pub use state_machine::validate_transition;

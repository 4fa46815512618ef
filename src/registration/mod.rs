//! Registration flow: a guided conversation that fills one student
//! registration record a field at a time.
//!
//! The sequencer picks the first unfilled field, the processor validates the
//! inbound message against it and persists the value, and the routes expose
//! start/continue over HTTP. Every turn is appended to the session transcript.

pub mod choices;
pub mod fields;
pub mod model;
pub mod processor;
pub mod routes;
pub mod sequencer;

pub use fields::{FIELD_ORDER, Field, FieldValue};
pub use model::{RegistrationRecord, RegistrationSession, Sender, TranscriptMessage, Trade};
pub use processor::{COMPLETION_MESSAGE, RegistrationResponse, RegistrationService, WELCOME_MESSAGE};
pub use routes::{RegistrationRouteState, app, registration_routes};
pub use sequencer::{FieldPrompt, NextStep, next_field};

// Voice mock-interview simulator.
// Turn-taking controller, its speech and LLM collaborators, and the HTTP surface
// a browser client uses to drive it.

pub mod collaborators;
pub mod controller;
pub mod fallback;
pub mod handlers;
pub mod models;
pub mod prompts;
pub mod registry;
pub mod relay;
pub mod runner;
pub mod session;
pub mod speech;

pub use controller::{Collaborators, InterviewSettings};
pub use registry::SessionRegistry;

//! Agent run orchestration: process lifecycle, state fold, and outcome
//! classification.

mod outcome;
mod process;
mod state;
mod supervisor;

pub use outcome::*;
pub use process::*;
pub use state::*;
pub use supervisor::*;

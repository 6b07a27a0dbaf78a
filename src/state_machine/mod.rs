// Record lifecycle rules
//
// Tasks move Open -> Advanced | Finished and never back. Accounts pass two
// independent approval gates before they may log in. Both are derived from
// stored flags; nothing here talks to the ledger.

pub mod guards;
pub mod states;

pub use guards::{AccountActiveGuard, StateGuard, TaskOpenGuard};
pub use states::{AccountStanding, TaskPhase};

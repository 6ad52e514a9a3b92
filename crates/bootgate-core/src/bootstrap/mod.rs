//! Bootstrap stage (BOOT-01..BOOT-05).
//!
//! Stage two of the gate protocol: acquire five locks in strict order and
//! seal the session behind a bootstrap token. The canonical sequence:
//!
//! 1. **BOOT-01 Identity Lock** — bind a validated GID and its role.
//! 2. **BOOT-02 Mode Lock** — bind an execution mode permitted for the GID.
//! 3. **BOOT-03 Lane Lock** — bind a work lane permitted for the GID.
//! 4. **BOOT-04 Tool Strip** — bind the permitted/stripped tool sets
//!    resolved from the `(mode, lane)` pair.
//! 5. **BOOT-05 Echo Handshake** — record the `"gid | mode | lane"` echo.
//!
//! Only a session holding all five locks can seal; sealing mints the
//! bootstrap token and is terminal. A sealed session can never be
//! bootstrapped again.
//!
//! [`BootstrapState`] is the immutable value driven through the locks,
//! [`BootstrapBuilder`] the fluent sequencer, and [`BootstrapEnforcer`]
//! the orchestrator that validates against policy, aggregates outcomes,
//! and guards the context slot.

pub mod builder;
pub mod enforcer;
pub mod error;
pub mod state;


pub use builder::BootstrapBuilder;
pub use enforcer::{BootstrapEnforcer, BootstrapReport};
pub use error::BootstrapError;
pub use state::{BootstrapState, BootstrapStatus, LockId, LockState};

//! Session-token lifecycle: acquired on login, persisted in the platform
//! store, attached to every outgoing request, cleared on logout.

pub mod flows;
pub mod store;

pub use flows::{login, logout, register, session_active, AuthOutcome, LoginInput, RegisterInput};
pub use store::{
    select_store, FileTokenStore, KeyringTokenStore, MemoryTokenStore, NoopTokenStore, StoreError,
    TokenStore,
};

//! Documents stored in the session and the account store.

pub mod account;
pub mod session;
pub mod setup;

pub use account::{AccountState, SetupRequest};
pub use session::{
    BROWSER_SESSION_KEY, BrowserSession, Entitlements, PaymentRecord, SessionUser,
    SetupPaymentRecord, SignupIntent, StoredToken, UserScratch,
};
pub use setup::{ContactMethod, FormStep, SetupDraft, Timeline};

pub mod auth;
pub mod core;
pub mod main_module;

#[cfg(feature = "tasks")]
pub mod tasks;

#[cfg(feature = "shopping")]
pub mod shopping;

#[cfg(feature = "meals")]
pub mod meals;

#[cfg(feature = "budget")]
pub mod budget;

#[cfg(feature = "calendar")]
pub mod calendar;

#[cfg(feature = "goals")]
pub mod goals;

#[cfg(feature = "journal")]
pub mod journal;

#[cfg(feature = "habits")]
pub mod habits;

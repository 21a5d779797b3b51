mod controller;
mod status;
mod switch;

pub use controller::{transition, Effect, Event, ProxyController, ProxyState};
pub use status::ProxyStatus;
pub use switch::{CommandSwitch, ProxySwitch};

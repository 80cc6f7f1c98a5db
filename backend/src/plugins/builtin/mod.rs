//! Plugins shipped with the server. The list is fixed at compile time;
//! settings decide which of them are constructed.

use super::PluginConstructor;

pub mod email_sender;
pub mod file_reader;
pub mod home_automation;
pub mod pc_control;

pub fn constructors() -> Vec<(&'static str, PluginConstructor)> {
    vec![
        (pc_control::NAME, pc_control::register as PluginConstructor),
        (email_sender::NAME, email_sender::register),
        (file_reader::NAME, file_reader::register),
        (home_automation::NAME, home_automation::register),
    ]
}

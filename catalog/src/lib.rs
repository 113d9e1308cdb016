pub mod catalog;
pub mod esoui_client;

pub mod addon_manager;
pub mod checksum_ledger;
pub mod installer;
pub mod inventory;
pub mod resolution_store;
pub mod state;
pub mod update_resolver;

#[cfg(test)]
mod test_utils;

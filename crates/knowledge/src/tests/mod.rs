//! Cross-module scenarios for the knowledge store.

mod store_scenarios;

//! Test module with an empty descriptor table.

dynext_sdk::export_extensions! {}

//! Test module providing one extension per interface.

use dynext_sdk::export_extensions;
use test_interfaces::{IExt1, IExt2};

#[derive(Default)]
pub struct Ext1;

impl IExt1 for Ext1 {
    fn test1(&self) -> i32 {
        42
    }
}

#[derive(Default)]
pub struct Ext2;

impl IExt2 for Ext2 {
    fn test2(&self) -> String {
        "Hello from Ext2".to_string()
    }
}

export_extensions! {
    Ext1 => dyn IExt1 as "IExt1" {
        name: "Ext1",
        version: 100,
        description: "extension 1 for testing purposes",
        metadata: { "author" => "Alice", "company" => "MyCorp" },
    }
    Ext2 => dyn IExt2 as "dynext::IExt2" {
        name: "Ext2",
        version: 100,
        description: "extension 3 for testing purposes",
        metadata: { "author" => "Carol", "company" => "MyCorp" },
    }
}

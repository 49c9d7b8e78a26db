//! Test module providing a newer version of `Ext1`.

use dynext_sdk::export_extensions;
use test_interfaces::IExt1;

#[derive(Default)]
pub struct Ext1;

impl IExt1 for Ext1 {
    fn test1(&self) -> i32 {
        21
    }
}

export_extensions! {
    Ext1 => dyn IExt1 as "IExt1" {
        name: "Ext1",
        version: 110,
        description: "extension 2 for testing purposes",
        metadata: { "author" => "Bob", "company" => "OtherCorp" },
    }
}

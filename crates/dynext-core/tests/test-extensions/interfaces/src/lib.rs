//! Interfaces shared by the test modules and the integration tests.

use dynext_sdk::declare_interface;

pub trait IExt1: Send + Sync {
    fn test1(&self) -> i32;
}
declare_interface!(dyn IExt1, "IExt1");

pub trait IExt2: Send + Sync {
    fn test2(&self) -> String;
}
declare_interface!(dyn IExt2, "dynext::IExt2");

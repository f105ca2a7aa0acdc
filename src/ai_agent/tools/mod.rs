pub mod charts;
pub mod exporters;
pub mod finance;

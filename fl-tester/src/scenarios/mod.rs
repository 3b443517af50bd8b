//! Scenario groups for each surface. Groups run in the order given by their
//! suite; every group leaves the fixture namespace without the function.

pub mod cli;
pub mod http;
pub mod sdk;

pub(crate) mod chain_builder;

pub(crate) mod counter_app;

pub(crate) mod doubles;

pub(crate) mod harness;

pub(crate) mod logging;

pub(crate) mod mem_db;

pub(crate) mod network;

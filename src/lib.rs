pub mod backtest;
pub mod cache;
pub mod commands;
pub mod config;
pub mod data;
pub mod ensemble;
pub mod error;
pub mod frame;
pub mod indicators;
pub mod measures;
pub mod models;
pub mod normalizer;
pub mod param_utils;
pub mod pipeline;
pub mod portfolio;
pub mod report;
pub mod returns;

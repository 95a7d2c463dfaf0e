//! Warehouse Recon
//!
//! マーキング写真・仕様書・納品書テンプレートから出荷を照合し、
//! 記入済み納品書と更新済み仕様書を生成する。

pub mod cli;
pub mod config;
pub mod dimensions;
pub mod engine;
pub mod error;
pub mod export;
pub mod quality;
pub mod recognizer;
pub mod scanner;
pub mod sheet;
pub mod workspace;

//! Firmware for an AHT20 temperature / humidity node that uploads readings
//! over a WiFi station link.

pub mod config;
pub mod logging;
pub mod models;
pub mod network;
pub mod schedule;
pub mod sensors;
pub mod time_utils;
pub mod upload;

// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

pub fn main() {
    fhir_viewer_lib::run();
}

pub mod app;
pub mod camera_controller;

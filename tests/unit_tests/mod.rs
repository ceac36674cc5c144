mod config;
mod fom;
mod observer;
